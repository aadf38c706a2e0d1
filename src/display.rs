//! Status display collaborator.
//!
//! The station only decides what to show; rendering belongs to the display.
//! `LogDisplay` renders to the log, which is what headless installs use.

use tracing::info;

use crate::delivery::DeliveryOutcome;
use crate::fleet::registry::Reading;
use crate::fleet::Fleet;

pub trait StatusDisplay: Send {
    fn progress(&mut self, message: &str);
    fn show(&mut self, lines: &[String]);
}

fn value_or_dash(value: Option<f32>, decimals: usize) -> String {
    value.map_or_else(|| "--".to_string(), |v| format!("{v:.decimals$}"))
}

/// First two pair means, first two pH values, first gas value and the
/// last delivery result.
pub fn status_lines(fleet: &Fleet, last: Option<&DeliveryOutcome>) -> Vec<String> {
    let mut lines = Vec::new();

    if let Some(pairs) = &fleet.temp_pairs {
        let temps: Vec<String> = (0..pairs.len().min(2))
            .map(|i| format!("T{}:{}", i + 1, value_or_dash(pairs.pair_mean(i), 1)))
            .collect();
        lines.push(temps.join(" "));
    }

    if let Some(ph) = &fleet.ph {
        let values: Vec<String> = ph
            .readings()
            .iter()
            .take(2)
            .enumerate()
            .map(|(i, r)| format!("pH{}:{}", i + 1, value_or_dash(r.value(), 1)))
            .collect();
        lines.push(values.join(" "));
    }

    if let Some(gas) = &fleet.gas {
        lines.push(format!("CO2:{}", value_or_dash(gas.sensors.reading(0).value(), 1)));
    }

    lines.push(match last {
        Some(outcome) => format!(
            "Sent {} {}",
            outcome.at,
            if outcome.success { "OK" } else { "FAIL" }
        ),
        None => "Sent --".to_string(),
    });
    lines
}

pub fn calibration_lines(ph: &[Reading<f32>]) -> Vec<String> {
    let mut lines = vec!["CALIBRATION".to_string()];
    lines.extend(
        ph.iter()
            .enumerate()
            .map(|(i, r)| format!("pH{}:{}", i + 1, value_or_dash(r.value(), 2))),
    );
    lines
}

pub struct LogDisplay;

impl StatusDisplay for LogDisplay {
    fn progress(&mut self, message: &str) {
        info!(target: "display", "{message}");
    }

    fn show(&mut self, lines: &[String]) {
        info!(target: "display", screen = %lines.join(" | "));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fleet::records::{GasSensor, OneWireAddress, PhProbe, TempPair};
    use crate::fleet::registry::SensorRegistry;
    use crate::fleet::wp_temp::TempPairs;
    use crate::fleet::GasChannels;
    use crate::hal::MockHal;

    #[test]
    fn status_shows_pairs_ph_gas_and_last_send() {
        let hal = MockHal::new();
        let mut pairs = TempPairs::new(4);
        for n in 1..=3u8 {
            pairs
                .add_pair(
                    &hal,
                    TempPair {
                        surface: OneWireAddress([0x28, 0, 0, 0, 0, 0, n, 1]),
                        background: OneWireAddress([0x28, 0, 0, 0, 0, 0, n, 2]),
                    },
                )
                .unwrap();
        }
        pairs.capture(&hal).unwrap();

        let mut ph: SensorRegistry<PhProbe, f32> = SensorRegistry::new(4);
        ph.register(PhProbe { pin: 34 }).unwrap();
        ph.register(PhProbe { pin: 35 }).unwrap();
        ph.store(vec![9.81, 10.02]).unwrap();

        let mut gas = GasChannels { samples: 10, sensors: SensorRegistry::new(2) };
        gas.sensors.register(GasSensor { pin: 2 }).unwrap();

        let fleet = Fleet {
            temp_pairs: Some(pairs),
            ph: Some(ph),
            gas: Some(gas),
            ..Fleet::default()
        };
        let outcome = DeliveryOutcome { at: "09:30".into(), success: true };

        assert_eq!(
            status_lines(&fleet, Some(&outcome)),
            vec!["T1:24.1 T2:24.1", "pH1:9.8 pH2:10.0", "CO2:--", "Sent 09:30 OK"]
        );
    }

    #[test]
    fn empty_fleet_shows_only_delivery() {
        assert_eq!(status_lines(&Fleet::default(), None), vec!["Sent --"]);
    }

    #[test]
    fn calibration_screen_lists_every_probe() {
        let lines = calibration_lines(&[Reading::Fresh(7.0), Reading::Pending]);
        assert_eq!(lines, vec!["CALIBRATION", "pH1:7.00", "pH2:--"]);
    }
}
