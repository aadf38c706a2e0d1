//! ==============================================================================
//! source.rs - sectioned key/value view over station.toml
//! ==============================================================================
//!
//! purpose:
//!     the discovery protocol only needs "does this section exist" and
//!     "what string is stored under (section, key)". this module defines that
//!     contract and implements it over a parsed toml document.
//!
//! key mapping:
//!     sections are top-level tables, e.g. `["sensors:pH"]`.
//!     keys may be dotted: `sensor1.pin = 34` is stored by toml as a nested
//!     table and `get("sensors:pH", "sensor1.pin")` walks it. a literal quoted
//!     key (`"sensor1.pin" = 34`) is found as well.
//!     scalars (strings, integers, floats, booleans) are rendered to strings;
//!     arrays and tables are not values.
//!
//! relationships:
//!     - used by: discovery.rs (probing), config.rs (loading)
//!
//! ==============================================================================

use std::str::FromStr;

use anyhow::{Context, Result};
use toml::{Table, Value};

pub trait ConfigSource {
    fn section_exists(&self, section: &str) -> bool;

    fn get(&self, section: &str, key: &str) -> Option<String>;

    /// Present AND parseable, otherwise `None`.
    fn get_parsed<T: FromStr>(&self, section: &str, key: &str) -> Option<T>
    where
        Self: Sized,
    {
        self.get(section, key)?.trim().parse().ok()
    }
}

/// Sensor configuration backed by a toml document.
#[derive(Debug, Clone, Default)]
pub struct TomlSource {
    root: Table,
}

impl TomlSource {
    pub fn parse(text: &str) -> Result<Self> {
        let root: Table = text.parse().context("invalid toml in sensor configuration")?;
        Ok(Self { root })
    }

    /// A source with no sections; every family falls back to its defaults.
    pub fn empty() -> Self {
        Self::default()
    }

    fn section(&self, section: &str) -> Option<&Table> {
        self.root.get(section)?.as_table()
    }
}

impl ConfigSource for TomlSource {
    fn section_exists(&self, section: &str) -> bool {
        self.section(section).is_some()
    }

    fn get(&self, section: &str, key: &str) -> Option<String> {
        let table = self.section(section)?;

        if let Some(value) = table.get(key) {
            return scalar_to_string(value);
        }

        let mut parts = key.split('.');
        let mut current = table.get(parts.next()?)?;
        for part in parts {
            current = current.as_table()?.get(part)?;
        }
        scalar_to_string(current)
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Integer(i) => Some(i.to_string()),
        Value::Float(f) => Some(f.to_string()),
        Value::Boolean(b) => Some(b.to_string()),
        Value::Datetime(d) => Some(d.to_string()),
        Value::Array(_) | Value::Table(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[polling]
interval_seconds = 600

["sensors:pH"]
sensor1.pin = 34
"sensor2.pin" = "35"

["sensors:lux"]
sensor1 = "BH1750, 0x23, 0"
"#;

    #[test]
    fn dotted_and_quoted_keys_resolve() {
        let source = TomlSource::parse(SAMPLE).unwrap();
        assert_eq!(source.get("sensors:pH", "sensor1.pin").as_deref(), Some("34"));
        assert_eq!(source.get("sensors:pH", "sensor2.pin").as_deref(), Some("35"));
        assert_eq!(source.get("sensors:pH", "sensor3.pin"), None);
    }

    #[test]
    fn missing_sections_and_tables_are_misses() {
        let source = TomlSource::parse(SAMPLE).unwrap();
        assert!(source.section_exists("sensors:lux"));
        assert!(!source.section_exists("sensors:DHT"));
        assert_eq!(source.get("sensors:DHT", "sensor1.pin"), None);
        // `sensor1` under pH is a table, not a value
        assert_eq!(source.get("sensors:pH", "sensor1"), None);
    }

    #[test]
    fn typed_lookup_requires_presence_and_parse() {
        let source = TomlSource::parse(SAMPLE).unwrap();
        assert_eq!(source.get_parsed::<u8>("sensors:pH", "sensor2.pin"), Some(35));
        assert_eq!(source.get_parsed::<u8>("sensors:lux", "sensor1"), None);
        assert_eq!(source.get_parsed::<u64>("polling", "interval_seconds"), Some(600));
    }

    #[test]
    fn empty_source_has_nothing() {
        let source = TomlSource::empty();
        assert!(!source.section_exists("sensors:pH"));
        assert_eq!(source.get("sensors:pH", "sensor1.pin"), None);
    }
}
