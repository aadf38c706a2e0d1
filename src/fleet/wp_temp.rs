//! ==============================================================================
//! wp_temp.rs - waterproof temperature probe pairs
//! ==============================================================================
//!
//! purpose:
//!     each culture tank carries two DS18B20 probes on one shared 1-wire bus:
//!     one near the surface and one at the bottom. a pair is only useful when
//!     both probes answer, so registration checks both before accepting.
//!
//! relationships:
//!     - used by: discovery.rs (add_pair), scheduler.rs (capture),
//!       record.rs and display.rs (readings, pair means)
//!     - uses: hal.rs (1-wire presence and conversion)
//!
//! ==============================================================================

use anyhow::{bail, Context, Result};

use super::records::{OneWireAddress, PairReading, TempPair};
use super::registry::{Reading, RegistryError, SensorRegistry};
use crate::hal::HardwareProvider;

pub const MAX_PAIRS: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairRejection {
    SurfaceMissing(OneWireAddress),
    BackgroundMissing(OneWireAddress),
    Registry(RegistryError),
}

impl std::fmt::Display for PairRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SurfaceMissing(a) => write!(f, "surface probe {a} not on bus"),
            Self::BackgroundMissing(a) => write!(f, "background probe {a} not on bus"),
            Self::Registry(e) => write!(f, "{e}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TempPairs {
    one_wire_pin: u8,
    sensors: SensorRegistry<TempPair, PairReading>,
}

impl TempPairs {
    pub fn new(one_wire_pin: u8) -> Self {
        Self {
            one_wire_pin,
            sensors: SensorRegistry::new(MAX_PAIRS),
        }
    }

    pub fn one_wire_pin(&self) -> u8 {
        self.one_wire_pin
    }

    /// Registers the pair when both probes answer on the bus.
    pub fn add_pair(&mut self, hal: &dyn HardwareProvider, pair: TempPair) -> Result<(), PairRejection> {
        if !hal.onewire_is_present(self.one_wire_pin, &pair.surface) {
            return Err(PairRejection::SurfaceMissing(pair.surface));
        }
        if !hal.onewire_is_present(self.one_wire_pin, &pair.background) {
            return Err(PairRejection::BackgroundMissing(pair.background));
        }
        self.sensors.register(pair).map_err(PairRejection::Registry)
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    pub fn pairs(&self) -> &[TempPair] {
        self.sensors.records()
    }

    pub fn reading(&self, index: usize) -> Reading<PairReading> {
        self.sensors.reading(index)
    }

    pub fn readings(&self) -> &[Reading<PairReading>] {
        self.sensors.readings()
    }

    /// Mean of surface and background for one pair, if it was ever captured.
    pub fn pair_mean(&self, index: usize) -> Option<f32> {
        self.reading(index).value().map(|r| r.mean())
    }

    /// One conversion for the whole bus, then every probe is read.
    /// On failure the previous readings are kept and marked stale.
    pub fn capture(&mut self, hal: &dyn HardwareProvider) -> Result<()> {
        let addresses: Vec<OneWireAddress> = self
            .pairs()
            .iter()
            .flat_map(|p| [p.surface, p.background])
            .collect();

        let result = hal
            .onewire_read_temperatures(self.one_wire_pin, &addresses)
            .context("1-wire conversion failed")
            .and_then(|temps| {
                if temps.len() != addresses.len() {
                    bail!("bus returned {} temperatures for {} probes", temps.len(), addresses.len());
                }
                let values = temps
                    .chunks_exact(2)
                    .map(|c| PairReading { surface: c[0], background: c[1] })
                    .collect();
                self.sensors.store(values).map_err(anyhow::Error::from)
            });

        if result.is_err() {
            self.sensors.mark_stale();
        }
        result
    }
}
