//! Per-family sensor registry: ordered records plus their latest readings.

use thiserror::Error;

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("registry full ({capacity} sensors max)")]
    Full { capacity: usize },
    #[error("capture returned {got} values for {expected} sensors")]
    LengthMismatch { expected: usize, got: usize },
}

/// Freshness of one captured value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading<V> {
    /// Nothing captured since startup.
    Pending,
    /// Captured during the most recent step of this family.
    Fresh(V),
    /// The most recent step failed; this is the previous value.
    Stale(V),
}

impl<V: Copy> Reading<V> {
    pub fn value(&self) -> Option<V> {
        match self {
            Reading::Pending => None,
            Reading::Fresh(v) | Reading::Stale(v) => Some(*v),
        }
    }

    pub fn is_fresh(&self) -> bool {
        matches!(self, Reading::Fresh(_))
    }

    fn into_stale(self) -> Self {
        match self {
            Reading::Fresh(v) => Reading::Stale(v),
            other => other,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SensorRegistry<R, V> {
    capacity: usize,
    records: Vec<R>,
    readings: Vec<Reading<V>>,
}

impl<R, V: Copy> SensorRegistry<R, V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            records: Vec::with_capacity(capacity),
            readings: Vec::with_capacity(capacity),
        }
    }

    pub fn register(&mut self, record: R) -> Result<(), RegistryError> {
        if self.records.len() >= self.capacity {
            return Err(RegistryError::Full { capacity: self.capacity });
        }
        self.records.push(record);
        self.readings.push(Reading::Pending);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn records(&self) -> &[R] {
        &self.records
    }

    pub fn readings(&self) -> &[Reading<V>] {
        &self.readings
    }

    pub fn reading(&self, index: usize) -> Reading<V> {
        self.readings.get(index).copied().unwrap_or(Reading::Pending)
    }

    /// Overwrites every reading with a fresh value. The batch must cover every
    /// record; otherwise nothing changes.
    pub fn store(&mut self, values: Vec<V>) -> Result<(), RegistryError> {
        if values.len() != self.records.len() {
            return Err(RegistryError::LengthMismatch {
                expected: self.records.len(),
                got: values.len(),
            });
        }
        self.readings = values.into_iter().map(Reading::Fresh).collect();
        Ok(())
    }

    /// Keeps the previous values but flags them as stale.
    pub fn mark_stale(&mut self) {
        for reading in &mut self.readings {
            *reading = reading.into_stale();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_beyond_capacity_leaves_registry_untouched() {
        let mut registry: SensorRegistry<u8, f32> = SensorRegistry::new(2);
        registry.register(34).unwrap();
        registry.register(35).unwrap();
        assert_eq!(registry.register(36), Err(RegistryError::Full { capacity: 2 }));
        assert_eq!(registry.records(), &[34, 35]);
        assert_eq!(registry.readings().len(), 2);
    }

    #[test]
    fn store_requires_one_value_per_record() {
        let mut registry: SensorRegistry<u8, f32> = SensorRegistry::new(4);
        registry.register(34).unwrap();
        registry.register(35).unwrap();

        let err = registry.store(vec![7.0]).unwrap_err();
        assert_eq!(err, RegistryError::LengthMismatch { expected: 2, got: 1 });
        assert_eq!(registry.reading(0), Reading::Pending);

        registry.store(vec![7.0, 7.2]).unwrap();
        assert_eq!(registry.reading(1), Reading::Fresh(7.2));
    }

    #[test]
    fn failed_capture_keeps_values_as_stale() {
        let mut registry: SensorRegistry<u8, f32> = SensorRegistry::new(4);
        registry.register(34).unwrap();
        registry.register(35).unwrap();

        registry.mark_stale();
        assert_eq!(registry.reading(0), Reading::Pending);

        registry.store(vec![6.9, 7.1]).unwrap();
        registry.mark_stale();
        assert_eq!(registry.reading(0), Reading::Stale(6.9));
        assert_eq!(registry.reading(1).value(), Some(7.1));
        assert!(!registry.reading(1).is_fresh());
    }
}
