//! ==============================================================================
//! record.rs - sample serialization for the local log and the remote endpoint
//! ==============================================================================
//!
//! purpose:
//!     turns the fleet's latest readings into
//!       - a `#`-terminated header line (written once per log file)
//!       - a `#`-terminated data line (one per cycle)
//!       - a query string and GET request for the telemetry endpoint
//!
//! field plan:
//!     all three outputs are derived from one ordered list of fields built from
//!     the registered sensors, so the header and the data line can never
//!     disagree on count or order. field order:
//!       [DateTime] wp_temp, DHT, lux, pH, DO, PIR, CO2, current, ORP
//!     the timestamp only exists locally.
//!
//! missing values:
//!     a sensor that has never produced a value leaves an empty local field
//!     and is left out of the query. stale values are still written.
//!
//! ==============================================================================

use std::fmt::Write as _;

use crate::fleet::records::{ComboReading, OpticalReading, PairReading};
use crate::fleet::registry::Reading;
use crate::fleet::Fleet;

pub const DELIMITER: char = '#';
pub const TIMESTAMP_HEADER: &str = "DateTime";

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Number(Option<f32>),
    Flag(Option<bool>),
    Text(String),
}

impl FieldValue {
    /// `None` when nothing has been captured yet.
    pub fn render(&self) -> Option<String> {
        match self {
            FieldValue::Number(v) => v.map(|v| format!("{v:.2}")),
            FieldValue::Flag(v) => v.map(|on| if on { "1" } else { "0" }.to_string()),
            FieldValue::Text(s) => Some(s.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub header: String,
    /// Query key; `None` for local-only fields.
    pub key: Option<String>,
    pub value: FieldValue,
}

impl Field {
    fn number(header: String, key: String, value: Option<f32>) -> Self {
        Self { header, key: Some(key), value: FieldValue::Number(value) }
    }
}

/// One output column per sensor of a family.
struct Column<V> {
    header: fn(usize) -> String,
    key: fn(usize) -> String,
    pick: fn(V) -> f32,
}

fn push_columns<V: Copy>(fields: &mut Vec<Field>, readings: &[Reading<V>], columns: &[Column<V>]) {
    for (i, reading) in readings.iter().enumerate() {
        let n = i + 1;
        for column in columns {
            fields.push(Field::number(
                (column.header)(n),
                (column.key)(n),
                reading.value().map(column.pick),
            ));
        }
    }
}

fn single(header: fn(usize) -> String, key: fn(usize) -> String) -> [Column<f32>; 1] {
    [Column { header, key, pick: |v| v }]
}

/// Every sensor field of the fleet, in serialization order. No timestamp.
pub fn field_plan(fleet: &Fleet) -> Vec<Field> {
    let mut fields = Vec::new();

    if let Some(pairs) = &fleet.temp_pairs {
        push_columns(
            &mut fields,
            pairs.readings(),
            &[
                Column {
                    header: |n| format!("Temp{n}_s"),
                    key: |n| format!("temp{n}_s"),
                    pick: |r: PairReading| r.surface,
                },
                Column {
                    header: |n| format!("Temp{n}_b"),
                    key: |n| format!("temp{n}_b"),
                    pick: |r: PairReading| r.background,
                },
            ],
        );
    }

    if let Some(combo) = &fleet.combo {
        push_columns(
            &mut fields,
            combo.readings(),
            &[
                Column {
                    header: |n| format!("ambient_{n}_temp"),
                    key: |n| format!("ta{n}"),
                    pick: |r: ComboReading| r.temperature,
                },
                Column {
                    header: |n| format!("ambient_{n}_humidity"),
                    key: |n| format!("ha{n}"),
                    pick: |r: ComboReading| r.humidity,
                },
            ],
        );
    }

    if let Some(light) = &fleet.light {
        push_columns(&mut fields, light.readings(), &single(|n| format!("lux_{n}"), |n| format!("lux{n}")));
    }

    if let Some(ph) = &fleet.ph {
        push_columns(&mut fields, ph.readings(), &single(|n| format!("pH_{n}"), |n| format!("ph{n}")));
    }

    if let Some(optical) = &fleet.optical {
        push_columns(
            &mut fields,
            optical.readings(),
            &[
                Column {
                    header: |_| "pre_lux".to_string(),
                    key: |_| "pre_L".to_string(),
                    pick: |r: OpticalReading| r.pre_light,
                },
                Column {
                    header: |n| format!("DO_{n}_R"),
                    key: |n| format!("do{n}_R"),
                    pick: |r: OpticalReading| r.red,
                },
                Column {
                    header: |n| format!("DO_{n}_G"),
                    key: |n| format!("do{n}_G"),
                    pick: |r: OpticalReading| r.green,
                },
                Column {
                    header: |n| format!("DO_{n}_B"),
                    key: |n| format!("do{n}_B"),
                    pick: |r: OpticalReading| r.blue,
                },
                Column {
                    header: |n| format!("DO_{n}_RGB"),
                    key: |n| format!("do{n}_RGB"),
                    pick: |r: OpticalReading| r.white,
                },
            ],
        );
    }

    if let Some(presence) = &fleet.presence {
        for (i, reading) in presence.readings().iter().enumerate() {
            let n = i + 1;
            fields.push(Field {
                header: format!("pir_{n}"),
                key: Some(format!("pir{n}")),
                value: FieldValue::Flag(reading.value()),
            });
        }
    }

    if let Some(gas) = &fleet.gas {
        push_columns(
            &mut fields,
            gas.sensors.readings(),
            &single(|n| format!("CO2_{n}"), |n| format!("co2{n}")),
        );
    }

    if let Some(current) = &fleet.current {
        push_columns(&mut fields, current.readings(), &single(|n| format!("curr_{n}"), |n| format!("curr{n}")));
    }

    if let Some(orp) = &fleet.orp {
        push_columns(&mut fields, orp.readings(), &single(|n| format!("orp_{n}"), |n| format!("orp{n}")));
    }

    fields
}

/// Local fields: the sensor plan, led by the timestamp when a clock is present.
pub fn local_fields(fleet: &Fleet, timestamp: Option<&str>) -> Vec<Field> {
    let mut fields = Vec::new();
    if let Some(ts) = timestamp {
        fields.push(Field {
            header: TIMESTAMP_HEADER.to_string(),
            key: None,
            value: FieldValue::Text(ts.to_string()),
        });
    }
    fields.extend(field_plan(fleet));
    fields
}

fn terminated(parts: impl Iterator<Item = String>) -> String {
    let mut line = String::new();
    for part in parts {
        line.push_str(&part);
        line.push(DELIMITER);
    }
    line
}

pub fn header_line(fields: &[Field]) -> String {
    terminated(fields.iter().map(|f| f.header.clone()))
}

pub fn data_line(fields: &[Field]) -> String {
    terminated(fields.iter().map(|f| f.value.render().unwrap_or_default()))
}

/// Identity of this station on the telemetry endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationIdentity {
    pub id: String,
    pub pin: String,
}

/// `<path>?idarduino=<id>&pin=<pin>&key=value...`
pub fn query_string(path: &str, identity: &StationIdentity, fields: &[Field]) -> String {
    let mut query = format!("{path}?idarduino={}&pin={}", identity.id, identity.pin);
    for field in fields {
        if let (Some(key), Some(value)) = (&field.key, field.value.render()) {
            let _ = write!(query, "&{key}={value}");
        }
    }
    query
}

/// Full request as written to the socket.
pub fn http_request(query: &str, host: &str, user_agent: &str) -> String {
    format!(
        "GET {query} HTTP/1.1\r\nHost: {host}\r\nUser-Agent: {user_agent}\r\nConnection: close\r\n\r\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fleet::records::{
        ComboSensor, CurrentModel, CurrentSensor, GasSensor, LightModel, LightSensor,
        OneWireAddress, OpticalSensor, OrpProbe, PhProbe, PresenceSensor, TempPair,
    };
    use crate::fleet::registry::SensorRegistry;
    use crate::fleet::wp_temp::TempPairs;
    use crate::fleet::{GasChannels, MAX_PH};
    use crate::hal::MockHal;
    use crate::scheduler::acquire;

    fn identity() -> StationIdentity {
        StationIdentity { id: "7".into(), pin: "1234".into() }
    }

    fn registry<R, V: Copy>(records: Vec<R>) -> SensorRegistry<R, V> {
        let mut registry = SensorRegistry::new(4);
        for record in records {
            registry.register(record).unwrap();
        }
        registry
    }

    fn pair(n: u8) -> TempPair {
        TempPair {
            surface: OneWireAddress([0x28, 0, 0, 0, 0, 0, n, 1]),
            background: OneWireAddress([0x28, 0, 0, 0, 0, 0, n, 2]),
        }
    }

    fn full_fleet(hal: &MockHal) -> Fleet {
        let mut pairs = TempPairs::new(4);
        pairs.add_pair(hal, pair(1)).unwrap();
        pairs.add_pair(hal, pair(2)).unwrap();
        Fleet {
            temp_pairs: Some(pairs),
            combo: Some(registry(vec![ComboSensor { pin: 17 }])),
            light: Some(registry(vec![LightSensor {
                model: LightModel::Bh1750,
                address: 0x23,
                address_pin: 0,
            }])),
            ph: Some(registry(vec![PhProbe { pin: 34 }, PhProbe { pin: 35 }])),
            orp: Some(registry(vec![OrpProbe { address: 0x62 }])),
            optical: Some(registry(vec![OpticalSensor {
                address: 0x5C,
                led_red: 5,
                led_green: 6,
                led_blue: 13,
            }])),
            presence: Some(registry(vec![PresenceSensor { pin: 23 }])),
            gas: Some(GasChannels { samples: 5, sensors: registry(vec![GasSensor { pin: 2 }]) }),
            current: Some(registry(vec![CurrentSensor {
                pin: 0,
                model: CurrentModel::Acs712,
                variant: 30,
            }])),
        }
    }

    fn field_count(line: &str) -> usize {
        line.matches(DELIMITER).count()
    }

    #[test]
    fn header_and_data_agree_for_every_fleet_shape() {
        let hal = MockHal::new();
        let full = full_fleet(&hal);

        let shapes = vec![
            Fleet::default(),
            Fleet { ph: full.ph.clone(), ..Fleet::default() },
            Fleet { temp_pairs: full.temp_pairs.clone(), gas: full.gas.clone(), ..Fleet::default() },
            Fleet { optical: full.optical.clone(), presence: full.presence.clone(), ..Fleet::default() },
            Fleet { current: full.current.clone(), orp: full.orp.clone(), ..Fleet::default() },
            full.clone(),
        ];

        for fleet in &shapes {
            for timestamp in [None, Some("18/10/2026 09:30:00")] {
                let fields = local_fields(fleet, timestamp);
                let header = header_line(&fields);
                let data = data_line(&fields);
                assert_eq!(field_count(&header), field_count(&data), "{header}");
                assert_eq!(field_count(&header), fields.len());
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn full_fleet_layout() {
        let hal = MockHal::new();
        hal.set_digital(23, true);
        let mut fleet = full_fleet(&hal);
        acquire(&mut fleet, &hal).await;

        let fields = local_fields(&fleet, Some("18/10/2026 09:30:00"));
        assert_eq!(
            header_line(&fields),
            "DateTime#Temp1_s#Temp1_b#Temp2_s#Temp2_b#ambient_1_temp#ambient_1_humidity#\
             lux_1#pH_1#pH_2#pre_lux#DO_1_R#DO_1_G#DO_1_B#DO_1_RGB#pir_1#CO2_1#curr_1#orp_1#"
        );
        assert_eq!(
            data_line(&fields),
            "18/10/2026 09:30:00#24.50#23.75#24.50#23.75#25.00#50.00#\
             1250.00#9.80#9.80#3.00#410.00#380.00#150.00#920.00#1#415.00#1.20#220.00#"
        );
    }

    #[test]
    fn query_for_pairs_and_ph() {
        let hal = MockHal::new();
        let mut pairs = TempPairs::new(4);
        pairs.add_pair(&hal, pair(1)).unwrap();
        let mut ph: SensorRegistry<PhProbe, f32> = SensorRegistry::new(MAX_PH);
        ph.register(PhProbe { pin: 34 }).unwrap();
        ph.register(PhProbe { pin: 35 }).unwrap();
        ph.store(vec![9.8, 10.05]).unwrap();
        pairs.capture(&hal).unwrap();

        let fleet = Fleet { temp_pairs: Some(pairs), ph: Some(ph), ..Fleet::default() };
        let query = query_string("/afegir.php", &identity(), &field_plan(&fleet));
        assert_eq!(
            query,
            "/afegir.php?idarduino=7&pin=1234&temp1_s=24.50&temp1_b=23.75&ph1=9.80&ph2=10.05"
        );
    }

    #[test]
    fn pending_values_are_blank_locally_and_absent_remotely() {
        let ph: SensorRegistry<PhProbe, f32> = registry(vec![PhProbe { pin: 34 }]);
        let fleet = Fleet { ph: Some(ph), ..Fleet::default() };
        let fields = local_fields(&fleet, None);

        assert_eq!(header_line(&fields), "pH_1#");
        assert_eq!(data_line(&fields), "#");
        assert_eq!(
            query_string("/afegir.php", &identity(), &fields),
            "/afegir.php?idarduino=7&pin=1234"
        );
    }

    #[test]
    fn timestamp_never_reaches_the_query() {
        let fields = local_fields(&Fleet::default(), Some("18/10/2026 09:30:00"));
        assert_eq!(query_string("/p", &identity(), &fields), "/p?idarduino=7&pin=1234");
    }

    #[test]
    fn request_framing() {
        let request = http_request("/afegir.php?idarduino=7&pin=1234", "example.org", "station/0.1");
        assert_eq!(
            request,
            "GET /afegir.php?idarduino=7&pin=1234 HTTP/1.1\r\nHost: example.org\r\n\
             User-Agent: station/0.1\r\nConnection: close\r\n\r\n"
        );
    }
}
