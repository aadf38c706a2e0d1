//! The station's sensor fleet: one optional registry per family.
//!
//! A family's registry exists only if discovery accepted at least one sensor or
//! the family has compiled-in defaults. Absent and empty are different states:
//! absent families are skipped by the scheduler and leave no fields in records.

pub mod records;
pub mod registry;
pub mod wp_temp;

use std::fmt;

use records::{
    ComboReading, ComboSensor, CurrentSensor, GasSensor, LightModel, LightSensor, OpticalReading,
    OpticalSensor, OrpProbe, PhProbe, PresenceSensor, TempPair,
};
use registry::SensorRegistry;
use wp_temp::TempPairs;

pub const MAX_COMBO: usize = 4;
pub const MAX_PH: usize = 4;
pub const MAX_ORP: usize = 4;
pub const MAX_LIGHT: usize = 2;
pub const MAX_PRESENCE: usize = 3;
pub const MAX_GAS: usize = 2;
pub const MAX_CURRENT: usize = 4;
pub const MAX_OPTICAL: usize = 1;

/// Samples per gas reading before trimming.
pub const DEFAULT_GAS_SAMPLES: usize = 10;
/// Each gas sample costs one sample spacing per cycle.
pub const MAX_GAS_SAMPLES: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    Current,
    TempPairs,
    Ph,
    Orp,
    Combo,
    Light,
    Presence,
    Optical,
    Gas,
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Family::Current => "current",
            Family::TempPairs => "wp_temp",
            Family::Ph => "pH",
            Family::Orp => "ORP",
            Family::Combo => "DHT",
            Family::Light => "lux",
            Family::Presence => "PIR",
            Family::Optical => "DO",
            Family::Gas => "CO2",
        };
        f.write_str(name)
    }
}

/// Gas channels share one sample count.
#[derive(Debug, Clone)]
pub struct GasChannels {
    pub samples: usize,
    pub sensors: SensorRegistry<GasSensor, f32>,
}

#[derive(Debug, Clone, Default)]
pub struct Fleet {
    pub temp_pairs: Option<TempPairs>,
    pub combo: Option<SensorRegistry<ComboSensor, ComboReading>>,
    pub light: Option<SensorRegistry<LightSensor, f32>>,
    pub ph: Option<SensorRegistry<PhProbe, f32>>,
    pub orp: Option<SensorRegistry<OrpProbe, f32>>,
    pub optical: Option<SensorRegistry<OpticalSensor, OpticalReading>>,
    pub presence: Option<SensorRegistry<PresenceSensor, bool>>,
    pub gas: Option<GasChannels>,
    pub current: Option<SensorRegistry<CurrentSensor, f32>>,
}

impl Fleet {
    /// Families with a registry, in acquisition order.
    pub fn families(&self) -> Vec<(Family, usize)> {
        let mut present = Vec::new();
        let mut push = |family, len: Option<usize>| {
            if let Some(len) = len {
                present.push((family, len));
            }
        };
        push(Family::Current, self.current.as_ref().map(|r| r.len()));
        push(Family::TempPairs, self.temp_pairs.as_ref().map(|r| r.len()));
        push(Family::Ph, self.ph.as_ref().map(|r| r.len()));
        push(Family::Orp, self.orp.as_ref().map(|r| r.len()));
        push(Family::Combo, self.combo.as_ref().map(|r| r.len()));
        push(Family::Light, self.light.as_ref().map(|r| r.len()));
        push(Family::Presence, self.presence.as_ref().map(|r| r.len()));
        push(Family::Optical, self.optical.as_ref().map(|r| r.len()));
        push(Family::Gas, self.gas.as_ref().map(|g| g.sensors.len()));
        present
    }
}

// ==============================================================================
// compiled-in defaults
// ==============================================================================

/// Sensors registered when the configuration has nothing usable for a family.
#[derive(Debug, Clone)]
pub struct FleetDefaults {
    pub one_wire_pin: u8,
    pub temp_pairs: Vec<TempPair>,
    pub combo: Vec<ComboSensor>,
    pub light: Vec<LightSensor>,
    pub ph: Vec<PhProbe>,
    pub orp: Vec<OrpProbe>,
    /// Registered only when `optical_active` is set.
    pub optical: OpticalSensor,
    pub optical_active: bool,
    pub presence: Vec<PresenceSensor>,
    pub gas: Vec<GasSensor>,
    pub gas_samples: usize,
    pub current: Vec<CurrentSensor>,
}

impl FleetDefaults {
    /// Nothing at all; handy for tests that want to see discovery alone.
    pub fn none() -> Self {
        Self {
            temp_pairs: Vec::new(),
            combo: Vec::new(),
            light: Vec::new(),
            ph: Vec::new(),
            orp: Vec::new(),
            optical_active: false,
            presence: Vec::new(),
            gas: Vec::new(),
            current: Vec::new(),
            ..Self::default()
        }
    }
}

impl Default for FleetDefaults {
    fn default() -> Self {
        Self {
            one_wire_pin: 4,
            // probe addresses are unit specific, there is no sensible default pair
            temp_pairs: Vec::new(),
            combo: vec![ComboSensor { pin: 17 }],
            light: vec![LightSensor {
                model: LightModel::Bh1750,
                address: 0x23,
                address_pin: 0,
            }],
            ph: Vec::new(),
            orp: Vec::new(),
            optical: OpticalSensor {
                address: 0x5C,
                led_red: 5,
                led_green: 6,
                led_blue: 13,
            },
            optical_active: false,
            presence: Vec::new(),
            gas: Vec::new(),
            gas_samples: DEFAULT_GAS_SAMPLES,
            current: Vec::new(),
        }
    }
}
