//! ==============================================================================
//! discovery.rs - config-driven sensor discovery
//! ==============================================================================
//!
//! purpose:
//!     builds the Fleet once at startup. every family is discovered with the
//!     same loop: probe index 1, 2, 3... until the source has nothing at that
//!     index, parse each hit with a family-specific strategy and register it.
//!     when a family accepted nothing, its compiled-in defaults are used.
//!
//! probe outcomes:
//!     - Miss        nothing stored at this index, probing ends
//!     - Hit         parsed record, handed to the family's registry
//!     - Malformed   something stored but unusable; the strategy decides
//!                   whether to skip to the next index or give up
//!
//! strategies:
//!     - PinOnly       `sensor<N>.pin`              pH, DHT, PIR, CO2
//!     - HexAddress    `sensor<N>.addr`             ORP
//!     - Composite     `sensor<N> = "a, b, c"`      lux, current
//!     - OpticalFields `address`, `led_*_pin`       DO (single sensor)
//!     - PairedAddress `addr_t<N>_s`, `addr_t<N>_b` wp_temp (stops on failure)
//!
//! relationships:
//!     - used by: main.rs
//!     - uses: source.rs (lookups), fleet (registries, defaults),
//!       hal.rs (bus presence for temperature pairs)
//!
//! ==============================================================================

use std::fmt::Debug;

use tracing::{debug, info, warn};

use crate::fleet::records::{
    ComboSensor, CurrentModel, CurrentSensor, GasSensor, LightModel, LightSensor, OneWireAddress,
    OpticalReading, OpticalSensor, OrpProbe, PhProbe, PresenceSensor, TempPair,
};
use crate::fleet::registry::SensorRegistry;
use crate::fleet::wp_temp::TempPairs;
use crate::fleet::{
    Family, Fleet, FleetDefaults, GasChannels, DEFAULT_GAS_SAMPLES, MAX_COMBO, MAX_CURRENT,
    MAX_GAS, MAX_GAS_SAMPLES, MAX_LIGHT, MAX_OPTICAL, MAX_ORP, MAX_PH, MAX_PRESENCE,
};
use crate::hal::HardwareProvider;
use crate::source::ConfigSource;

pub const SECTION_TEMP_PAIRS: &str = "sensors:wp_temp";
pub const SECTION_COMBO: &str = "sensors:DHT";
pub const SECTION_LIGHT: &str = "sensors:lux";
pub const SECTION_PH: &str = "sensors:pH";
pub const SECTION_ORP: &str = "sensors:ORP";
pub const SECTION_OPTICAL: &str = "sensor:DO";
pub const SECTION_PRESENCE: &str = "sensors:PIR";
pub const SECTION_GAS: &str = "sensors:CO2";
pub const SECTION_CURRENT: &str = "sensors:current";

/// Gas sample counts at or below this leave nothing after trimming.
const MIN_GAS_SAMPLES: usize = 4;

// ==============================================================================
// probe strategies
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe<R> {
    Miss,
    Hit(R),
    Malformed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnInvalid {
    /// Log and try the next index.
    Skip,
    /// Log and end discovery for the family.
    Stop,
}

pub trait RecordParser {
    type Record;

    fn section(&self) -> &str;

    fn on_invalid(&self) -> OnInvalid {
        OnInvalid::Skip
    }

    fn probe<S: ConfigSource>(&self, source: &S, index: usize) -> Probe<Self::Record>;
}

/// `sensor<N>.pin` holding a decimal pin number.
pub struct PinOnly<R> {
    pub section: &'static str,
    pub build: fn(u8) -> R,
}

impl<R> RecordParser for PinOnly<R> {
    type Record = R;

    fn section(&self) -> &str {
        self.section
    }

    fn probe<S: ConfigSource>(&self, source: &S, index: usize) -> Probe<R> {
        let key = format!("sensor{index}.pin");
        match source.get(self.section, &key) {
            None => Probe::Miss,
            Some(raw) => match raw.trim().parse::<u8>() {
                Ok(pin) => Probe::Hit((self.build)(pin)),
                Err(_) => Probe::Malformed(format!("{key} = {raw:?} is not a pin number")),
            },
        }
    }
}

/// `sensor<N>.addr` holding one hex byte, `0x` optional.
pub struct HexAddress<R> {
    pub section: &'static str,
    pub build: fn(u8) -> R,
}

impl<R> RecordParser for HexAddress<R> {
    type Record = R;

    fn section(&self) -> &str {
        self.section
    }

    fn probe<S: ConfigSource>(&self, source: &S, index: usize) -> Probe<R> {
        let key = format!("sensor{index}.addr");
        match source.get(self.section, &key) {
            None => Probe::Miss,
            Some(raw) => match parse_hex_byte(&raw) {
                Some(address) => Probe::Hit((self.build)(address)),
                None => Probe::Malformed(format!("{key} = {raw:?} is not a hex byte")),
            },
        }
    }
}

/// `sensor<N>` holding one comma separated string.
pub struct Composite<R> {
    pub section: &'static str,
    pub parse: fn(&str) -> Option<R>,
}

impl<R> RecordParser for Composite<R> {
    type Record = R;

    fn section(&self) -> &str {
        self.section
    }

    fn probe<S: ConfigSource>(&self, source: &S, index: usize) -> Probe<R> {
        let key = format!("sensor{index}");
        match source.get(self.section, &key) {
            None => Probe::Miss,
            Some(raw) => match (self.parse)(&raw) {
                Some(record) => Probe::Hit(record),
                None => Probe::Malformed(format!("{key} = {raw:?} could not be parsed")),
            },
        }
    }
}

/// The single optical sensor. Only index 1 exists; each LED pin falls back
/// to its default on its own.
pub struct OpticalFields {
    pub defaults: OpticalSensor,
}

impl RecordParser for OpticalFields {
    type Record = OpticalSensor;

    fn section(&self) -> &str {
        SECTION_OPTICAL
    }

    fn probe<S: ConfigSource>(&self, source: &S, index: usize) -> Probe<OpticalSensor> {
        if index > MAX_OPTICAL {
            return Probe::Miss;
        }
        let Some(raw) = source.get(SECTION_OPTICAL, "address") else {
            return Probe::Miss;
        };
        let Some(address) = parse_hex_byte(&raw) else {
            return Probe::Malformed(format!("address = {raw:?} is not a hex byte"));
        };
        let d = &self.defaults;
        Probe::Hit(OpticalSensor {
            address,
            led_red: source.get_parsed(SECTION_OPTICAL, "led_R_pin").unwrap_or(d.led_red),
            led_green: source.get_parsed(SECTION_OPTICAL, "led_G_pin").unwrap_or(d.led_green),
            led_blue: source.get_parsed(SECTION_OPTICAL, "led_B_pin").unwrap_or(d.led_blue),
        })
    }
}

/// `addr_t<N>_s` and `addr_t<N>_b`, eight hex components each.
pub struct PairedAddress;

impl RecordParser for PairedAddress {
    type Record = TempPair;

    fn section(&self) -> &str {
        SECTION_TEMP_PAIRS
    }

    fn on_invalid(&self) -> OnInvalid {
        OnInvalid::Stop
    }

    fn probe<S: ConfigSource>(&self, source: &S, index: usize) -> Probe<TempPair> {
        let surface_key = format!("addr_t{index}_s");
        let Some(surface_raw) = source.get(SECTION_TEMP_PAIRS, &surface_key) else {
            return Probe::Miss;
        };
        let background_key = format!("addr_t{index}_b");
        let Some(background_raw) = source.get(SECTION_TEMP_PAIRS, &background_key) else {
            return Probe::Malformed(format!("{surface_key} has no matching {background_key}"));
        };
        let Some(surface) = OneWireAddress::parse(&surface_raw) else {
            return Probe::Malformed(format!("{surface_key} = {surface_raw:?} is not an 8 byte address"));
        };
        let Some(background) = OneWireAddress::parse(&background_raw) else {
            return Probe::Malformed(format!(
                "{background_key} = {background_raw:?} is not an 8 byte address"
            ));
        };
        Probe::Hit(TempPair { surface, background })
    }
}

pub fn parse_hex_byte(text: &str) -> Option<u8> {
    let text = text.trim();
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    if digits.is_empty() || digits.len() > 2 {
        return None;
    }
    u8::from_str_radix(digits, 16).ok()
}

/// `model, addr(hex), addr_pin`, e.g. `"BH1750, 0x23, 0"`.
pub fn parse_light_line(line: &str) -> Option<LightSensor> {
    let mut fields = line.split(',').map(str::trim);
    let model = LightModel::from_tag(fields.next()?)?;
    let address = parse_hex_byte(fields.next()?)?;
    let address_pin = fields.next()?.parse().ok()?;
    if fields.next().is_some() {
        return None;
    }
    Some(LightSensor { model, address, address_pin })
}

/// `pin, model, variant`, e.g. `"0, ACS712, 30"`.
pub fn parse_current_line(line: &str) -> Option<CurrentSensor> {
    let mut fields = line.split(',').map(str::trim);
    let pin = fields.next()?.parse().ok()?;
    let model = CurrentModel::from_tag(fields.next()?)?;
    let variant = fields.next()?.parse().ok()?;
    if fields.next().is_some() {
        return None;
    }
    Some(CurrentSensor { pin, model, variant })
}

/// Runs the probe loop for one family and returns how many records `accept` took.
///
/// `accept` owns registration; an `Err` from it is treated like a malformed
/// entry and follows the parser's `on_invalid` policy.
pub fn probe_family<S, P, F>(source: &S, parser: &P, family: Family, mut accept: F) -> usize
where
    S: ConfigSource,
    P: RecordParser,
    P::Record: Debug,
    F: FnMut(P::Record) -> Result<(), String>,
{
    let mut accepted = 0;
    let mut index = 1;

    loop {
        let rejection = match parser.probe(source, index) {
            Probe::Miss => break,
            Probe::Hit(record) => {
                debug!(%family, index, ?record, "found sensor");
                match accept(record) {
                    Ok(()) => {
                        accepted += 1;
                        None
                    }
                    Err(reason) => Some(reason),
                }
            }
            Probe::Malformed(reason) => Some(reason),
        };

        if let Some(reason) = rejection {
            match parser.on_invalid() {
                OnInvalid::Skip => {
                    warn!(%family, section = parser.section(), index, %reason, "sensor skipped");
                }
                OnInvalid::Stop => {
                    warn!(%family, section = parser.section(), index, %reason, "discovery stopped");
                    break;
                }
            }
        }
        index += 1;
    }

    accepted
}

// ==============================================================================
// fleet loader
// ==============================================================================

pub struct FleetLoader<'a, S: ConfigSource> {
    source: &'a S,
    hal: &'a dyn HardwareProvider,
    defaults: FleetDefaults,
}

impl<'a, S: ConfigSource> FleetLoader<'a, S> {
    pub fn new(source: &'a S, hal: &'a dyn HardwareProvider, defaults: FleetDefaults) -> Self {
        Self { source, hal, defaults }
    }

    /// Discovers every family. Never fails: bad entries are logged and skipped.
    pub fn load(&self) -> Fleet {
        let fleet = Fleet {
            temp_pairs: self.load_temp_pairs(),
            combo: self.load_registry(
                Family::Combo,
                &PinOnly { section: SECTION_COMBO, build: |pin| ComboSensor { pin } },
                MAX_COMBO,
                &self.defaults.combo,
            ),
            light: self.load_registry(
                Family::Light,
                &Composite { section: SECTION_LIGHT, parse: parse_light_line },
                MAX_LIGHT,
                &self.defaults.light,
            ),
            ph: self.load_registry(
                Family::Ph,
                &PinOnly { section: SECTION_PH, build: |pin| PhProbe { pin } },
                MAX_PH,
                &self.defaults.ph,
            ),
            orp: self.load_registry(
                Family::Orp,
                &HexAddress { section: SECTION_ORP, build: |address| OrpProbe { address } },
                MAX_ORP,
                &self.defaults.orp,
            ),
            optical: self.load_optical(),
            presence: self.load_registry(
                Family::Presence,
                &PinOnly { section: SECTION_PRESENCE, build: |pin| PresenceSensor { pin } },
                MAX_PRESENCE,
                &self.defaults.presence,
            ),
            gas: self.load_gas(),
            current: self.load_registry(
                Family::Current,
                &Composite { section: SECTION_CURRENT, parse: parse_current_line },
                MAX_CURRENT,
                &self.defaults.current,
            ),
        };

        for (family, count) in fleet.families() {
            info!(%family, count, "sensor family ready");
        }
        fleet
    }

    fn load_registry<P, V>(
        &self,
        family: Family,
        parser: &P,
        capacity: usize,
        defaults: &[P::Record],
    ) -> Option<SensorRegistry<P::Record, V>>
    where
        P: RecordParser,
        P::Record: Clone + Debug,
        V: Copy,
    {
        let mut registry: Option<SensorRegistry<P::Record, V>> = None;
        probe_family(self.source, parser, family, |record| {
            registry
                .get_or_insert_with(|| SensorRegistry::new(capacity))
                .register(record)
                .map_err(|e| e.to_string())
        });

        if registry.is_none() && !defaults.is_empty() {
            info!(%family, count = defaults.len(), "no usable config, loading defaults");
            let mut fallback = SensorRegistry::new(capacity);
            for record in defaults {
                if let Err(e) = fallback.register(record.clone()) {
                    warn!(%family, ?record, error = %e, "default sensor dropped");
                }
            }
            registry = Some(fallback);
        }
        registry
    }

    fn load_temp_pairs(&self) -> Option<TempPairs> {
        let family = Family::TempPairs;
        let mut pairs: Option<TempPairs> = None;

        match self.source.get_parsed::<u8>(SECTION_TEMP_PAIRS, "one_wire_pin") {
            Some(bus_pin) => {
                probe_family(self.source, &PairedAddress, family, |pair| {
                    let mut candidate = pairs.take().unwrap_or_else(|| TempPairs::new(bus_pin));
                    let result = candidate.add_pair(self.hal, pair).map_err(|e| e.to_string());
                    if !candidate.is_empty() {
                        pairs = Some(candidate);
                    }
                    result
                });
            }
            None => debug!(%family, "no one_wire_pin configured"),
        }

        if pairs.is_none() && !self.defaults.temp_pairs.is_empty() {
            info!(%family, count = self.defaults.temp_pairs.len(), "no usable config, loading defaults");
            let mut fallback = TempPairs::new(self.defaults.one_wire_pin);
            for pair in &self.defaults.temp_pairs {
                if let Err(e) = fallback.add_pair(self.hal, *pair) {
                    warn!(%family, error = %e, "default pair refused");
                }
            }
            if fallback.is_empty() {
                warn!(%family, "no default pair answered, family disabled");
            } else {
                pairs = Some(fallback);
            }
        }
        pairs
    }

    fn load_optical(&self) -> Option<SensorRegistry<OpticalSensor, OpticalReading>> {
        let active_default: &[OpticalSensor] = if self.defaults.optical_active {
            std::slice::from_ref(&self.defaults.optical)
        } else {
            &[]
        };
        self.load_registry(
            Family::Optical,
            &OpticalFields { defaults: self.defaults.optical },
            MAX_OPTICAL,
            active_default,
        )
    }

    fn load_gas(&self) -> Option<GasChannels> {
        let sensors = self.load_registry(
            Family::Gas,
            &PinOnly { section: SECTION_GAS, build: |pin| GasSensor { pin } },
            MAX_GAS,
            &self.defaults.gas,
        )?;
        Some(GasChannels { samples: self.gas_samples(), sensors })
    }

    fn gas_samples(&self) -> usize {
        match self.source.get(SECTION_GAS, "n_samples") {
            None => self.defaults.gas_samples,
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(n) if n > MIN_GAS_SAMPLES && n <= MAX_GAS_SAMPLES => n,
                _ => {
                    warn!(
                        n_samples = %raw,
                        fallback = DEFAULT_GAS_SAMPLES,
                        "n_samples must be a number above {MIN_GAS_SAMPLES} and at most {MAX_GAS_SAMPLES}"
                    );
                    DEFAULT_GAS_SAMPLES
                }
            },
        }
    }
}

// ==============================================================================
// tests
// ==============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::MockHal;
    use crate::source::TomlSource;

    const S1: &str = "28:FF:4B:6B:79:A2:16:03";
    const B1: &str = "28:FF:4B:6B:79:A2:16:04";
    const S2: &str = "28:FF:4B:6B:79:A2:16:05";
    const B2: &str = "28:FF:4B:6B:79:A2:16:06";

    fn load(toml: &str, hal: &MockHal, defaults: FleetDefaults) -> Fleet {
        let source = TomlSource::parse(toml).unwrap();
        FleetLoader::new(&source, hal, defaults).load()
    }

    fn addr(text: &str) -> OneWireAddress {
        OneWireAddress::parse(text).unwrap()
    }

    #[test]
    fn ph_pins_register_in_order_without_defaults() {
        let hal = MockHal::new();
        let defaults = FleetDefaults { ph: vec![PhProbe { pin: 1 }], ..FleetDefaults::none() };
        let fleet = load(
            r#"
            ["sensors:pH"]
            sensor1.pin = 34
            sensor2.pin = 35
            "#,
            &hal,
            defaults,
        );
        let ph = fleet.ph.unwrap();
        assert_eq!(ph.records(), &[PhProbe { pin: 34 }, PhProbe { pin: 35 }]);
    }

    #[test]
    fn probing_stops_at_first_missing_index() {
        let hal = MockHal::new();
        let fleet = load(
            r#"
            ["sensors:pH"]
            sensor1.pin = 34
            sensor3.pin = 36
            "#,
            &hal,
            FleetDefaults::none(),
        );
        assert_eq!(fleet.ph.unwrap().records(), &[PhProbe { pin: 34 }]);
    }

    #[test]
    fn absent_family_without_defaults_stays_absent() {
        let hal = MockHal::new();
        let fleet = load("", &hal, FleetDefaults::none());
        assert!(fleet.ph.is_none());
        assert!(fleet.temp_pairs.is_none());
        assert!(fleet.optical.is_none());
        assert!(fleet.families().is_empty());
    }

    #[test]
    fn defaults_apply_only_when_nothing_was_accepted() {
        let hal = MockHal::new();
        let defaults = FleetDefaults {
            combo: vec![ComboSensor { pin: 17 }],
            ..FleetDefaults::none()
        };

        let fleet = load("", &hal, defaults.clone());
        assert_eq!(fleet.combo.unwrap().records(), &[ComboSensor { pin: 17 }]);

        let fleet = load(
            r#"
            ["sensors:DHT"]
            sensor1.pin = 22
            "#,
            &hal,
            defaults.clone(),
        );
        assert_eq!(fleet.combo.unwrap().records(), &[ComboSensor { pin: 22 }]);

        // present but unusable counts as nothing accepted
        let fleet = load(
            r#"
            ["sensors:DHT"]
            sensor1.pin = "twenty"
            "#,
            &hal,
            defaults,
        );
        assert_eq!(fleet.combo.unwrap().records(), &[ComboSensor { pin: 17 }]);
    }

    #[test]
    fn composite_gap_is_skipped() {
        let hal = MockHal::new();
        let fleet = load(
            r#"
            ["sensors:current"]
            sensor1 = "0, ACS712, 30"
            sensor2 = "1, INA219, 5"
            sensor3 = " 2 , sct013 , 100 "
            "#,
            &hal,
            FleetDefaults::none(),
        );
        let current = fleet.current.unwrap();
        assert_eq!(
            current.records(),
            &[
                CurrentSensor { pin: 0, model: CurrentModel::Acs712, variant: 30 },
                CurrentSensor { pin: 2, model: CurrentModel::Sct013, variant: 100 },
            ]
        );
    }

    #[test]
    fn light_lines_parse_model_address_and_pin() {
        assert_eq!(
            parse_light_line("MAX44009, 0x4A, 7"),
            Some(LightSensor { model: LightModel::Max44009, address: 0x4A, address_pin: 7 })
        );
        assert_eq!(parse_light_line("BH1750, 0x23"), None);
        assert_eq!(parse_light_line("BH1750, 0x23, 0, 9"), None);
        assert_eq!(parse_light_line("TSL2561, 0x39, 0"), None);
    }

    #[test]
    fn malformed_light_line_is_skipped() {
        let hal = MockHal::new();
        let fleet = load(
            r#"
            ["sensors:lux"]
            sensor1 = "TSL2561, 0x39, 0"
            sensor2 = "MAX44009, 0x4A, 1"
            "#,
            &hal,
            FleetDefaults::none(),
        );
        assert_eq!(
            fleet.light.unwrap().records(),
            &[LightSensor { model: LightModel::Max44009, address: 0x4A, address_pin: 1 }]
        );
    }

    #[test]
    fn light_capacity_overflow_is_refused() {
        let hal = MockHal::new();
        let fleet = load(
            r#"
            ["sensors:lux"]
            sensor1 = "BH1750, 0x23, 0"
            sensor2 = "BH1750, 0x5C, 0"
            sensor3 = "MAX44009, 0x4A, 0"
            "#,
            &hal,
            FleetDefaults::none(),
        );
        let light = fleet.light.unwrap();
        assert_eq!(light.len(), MAX_LIGHT);
        assert_eq!(light.records()[1].address, 0x5C);
    }

    #[test]
    fn orp_addresses_are_hex() {
        let hal = MockHal::new();
        let fleet = load(
            r#"
            ["sensors:ORP"]
            sensor1.addr = "0x62"
            sensor2.addr = "63"
            "#,
            &hal,
            FleetDefaults::none(),
        );
        assert_eq!(
            fleet.orp.unwrap().records(),
            &[OrpProbe { address: 0x62 }, OrpProbe { address: 0x63 }]
        );
    }

    #[test]
    fn temp_pairs_register_when_both_probes_answer() {
        let hal = MockHal::new();
        let fleet = load(
            &format!(
                r#"
                ["sensors:wp_temp"]
                one_wire_pin = 4
                addr_t1_s = "{S1}"
                addr_t1_b = "{B1}"
                addr_t2_s = "{S2}"
                addr_t2_b = "{B2}"
                "#
            ),
            &hal,
            FleetDefaults::none(),
        );
        let pairs = fleet.temp_pairs.unwrap();
        assert_eq!(pairs.one_wire_pin(), 4);
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs.pairs()[1].background, addr(B2));
    }

    #[test]
    fn nine_byte_background_means_no_pairs_then_defaults() {
        let hal = MockHal::new();
        let default_pair = TempPair { surface: addr(S2), background: addr(B2) };
        let defaults = FleetDefaults {
            one_wire_pin: 27,
            temp_pairs: vec![default_pair],
            ..FleetDefaults::none()
        };
        let toml = format!(
            r#"
            ["sensors:wp_temp"]
            one_wire_pin = 4
            addr_t1_s = "{S1}"
            addr_t1_b = "{B1}:99"
            "#
        );

        let fleet = load(&toml, &hal, FleetDefaults::none());
        assert!(fleet.temp_pairs.is_none());

        let fleet = load(&toml, &hal, defaults);
        let pairs = fleet.temp_pairs.unwrap();
        assert_eq!(pairs.one_wire_pin(), 27);
        assert_eq!(pairs.pairs(), &[default_pair]);
    }

    #[test]
    fn pair_gap_stops_discovery() {
        let hal = MockHal::new();
        let fleet = load(
            &format!(
                r#"
                ["sensors:wp_temp"]
                one_wire_pin = 4
                addr_t1_s = "{S1}"
                addr_t1_b = "{B1}"
                addr_t2_s = "not-an-address"
                addr_t2_b = "{B2}"
                addr_t3_s = "{S2}"
                addr_t3_b = "{B2}"
                "#
            ),
            &hal,
            FleetDefaults::none(),
        );
        assert_eq!(fleet.temp_pairs.unwrap().len(), 1);
    }

    #[test]
    fn silent_probe_stops_discovery() {
        let hal = MockHal::new().with_absent(addr(B1));
        let fleet = load(
            &format!(
                r#"
                ["sensors:wp_temp"]
                one_wire_pin = 4
                addr_t1_s = "{S1}"
                addr_t1_b = "{B1}"
                addr_t2_s = "{S2}"
                addr_t2_b = "{B2}"
                "#
            ),
            &hal,
            FleetDefaults::none(),
        );
        assert!(fleet.temp_pairs.is_none());
    }

    #[test]
    fn default_pairs_that_do_not_answer_leave_family_absent() {
        let hal = MockHal::new().with_absent(addr(S2)).with_absent(addr(B2));
        let defaults = FleetDefaults {
            one_wire_pin: 27,
            temp_pairs: vec![TempPair { surface: addr(S2), background: addr(B2) }],
            ..FleetDefaults::none()
        };
        let fleet = load("", &hal, defaults);
        assert!(fleet.temp_pairs.is_none());
        assert!(!fleet.families().iter().any(|(family, _)| *family == Family::TempPairs));
    }

    #[test]
    fn pairs_need_a_bus_pin() {
        let hal = MockHal::new();
        let fleet = load(
            &format!(
                r#"
                ["sensors:wp_temp"]
                addr_t1_s = "{S1}"
                addr_t1_b = "{B1}"
                "#
            ),
            &hal,
            FleetDefaults::none(),
        );
        assert!(fleet.temp_pairs.is_none());
    }

    #[test]
    fn optical_leds_fall_back_one_by_one() {
        let hal = MockHal::new();
        let fleet = load(
            r#"
            ["sensor:DO"]
            address = "0x39"
            led_G_pin = 20
            "#,
            &hal,
            FleetDefaults::default(),
        );
        let optical: SensorRegistry<OpticalSensor, OpticalReading> = fleet.optical.unwrap();
        assert_eq!(
            optical.records(),
            &[OpticalSensor { address: 0x39, led_red: 5, led_green: 20, led_blue: 13 }]
        );
    }

    #[test]
    fn optical_default_needs_active_flag() {
        let hal = MockHal::new();
        assert!(load("", &hal, FleetDefaults::default()).optical.is_none());

        let active = FleetDefaults { optical_active: true, ..FleetDefaults::default() };
        let fleet = load("", &hal, active);
        assert_eq!(fleet.optical.unwrap().records()[0].address, 0x5C);
    }

    #[test]
    fn gas_sample_count_is_validated() {
        let hal = MockHal::new();
        let fleet = load(
            r#"
            ["sensors:CO2"]
            n_samples = 20
            sensor1.pin = 2
            "#,
            &hal,
            FleetDefaults::none(),
        );
        assert_eq!(fleet.gas.unwrap().samples, 20);

        let fleet = load(
            r#"
            ["sensors:CO2"]
            n_samples = 4
            sensor1.pin = 2
            "#,
            &hal,
            FleetDefaults::none(),
        );
        assert_eq!(fleet.gas.unwrap().samples, DEFAULT_GAS_SAMPLES);

        for oversized in ["101", "9223372036854775807"] {
            let fleet = load(
                &format!(
                    r#"
                    ["sensors:CO2"]
                    n_samples = "{oversized}"
                    sensor1.pin = 2
                    "#
                ),
                &hal,
                FleetDefaults::none(),
            );
            assert_eq!(fleet.gas.unwrap().samples, DEFAULT_GAS_SAMPLES);
        }

        let fleet = load(
            &format!(
                r#"
                ["sensors:CO2"]
                n_samples = {MAX_GAS_SAMPLES}
                sensor1.pin = 2
                "#
            ),
            &hal,
            FleetDefaults::none(),
        );
        assert_eq!(fleet.gas.unwrap().samples, MAX_GAS_SAMPLES);
    }

    #[test]
    fn presence_pins_are_discovered() {
        let hal = MockHal::new();
        let fleet = load(
            r#"
            ["sensors:PIR"]
            sensor1.pin = 23
            "#,
            &hal,
            FleetDefaults::none(),
        );
        assert_eq!(fleet.presence.unwrap().records(), &[PresenceSensor { pin: 23 }]);
    }
}
