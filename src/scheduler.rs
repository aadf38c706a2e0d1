//! ==============================================================================
//! scheduler.rs - one acquisition pass over the fleet
//! ==============================================================================
//!
//! purpose:
//!     captures every registered family in a fixed order:
//!     current -> wp_temp -> pH -> ORP -> DHT -> lux -> PIR -> DO -> CO2
//!
//!     absent families are skipped. a family whose driver fails keeps its
//!     previous values (marked stale) and the pass moves on; one bad sensor
//!     never costs the rest of the cycle.
//!
//! timing:
//!     the optical sensor toggles LEDs, so the pass waits 500 ms after it
//!     before sampling gas. each gas channel takes N samples 100 ms apart and
//!     reports the mean with the two lowest and two highest removed.
//!
//! ==============================================================================

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::fleet::records::ComboReading;
use crate::fleet::registry::SensorRegistry;
use crate::fleet::{Family, Fleet, GasChannels, MAX_GAS_SAMPLES};
use crate::hal::HardwareProvider;

pub const OPTICAL_SETTLE: Duration = Duration::from_millis(500);
pub const GAS_SAMPLE_SPACING: Duration = Duration::from_millis(100);

/// Samples dropped from each end before averaging gas readings.
const GAS_TRIM: usize = 2;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    pub captured: Vec<Family>,
    pub failed: Vec<(Family, String)>,
}

impl CycleReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    fn record(&mut self, family: Family, result: Result<()>) {
        match result {
            Ok(()) => {
                debug!(%family, "captured");
                self.captured.push(family);
            }
            Err(e) => {
                warn!(%family, error = %format!("{e:#}"), "capture failed, keeping stale values");
                self.failed.push((family, format!("{e:#}")));
            }
        }
    }
}

/// Sorts the samples and averages what is left after dropping two from each end.
/// `None` when nothing would be left.
pub fn trimmed_mean(samples: &mut [f32]) -> Option<f32> {
    if samples.len() <= 2 * GAS_TRIM {
        return None;
    }
    samples.sort_by(|a, b| a.total_cmp(b));
    let kept = &samples[GAS_TRIM..samples.len() - GAS_TRIM];
    Some(kept.iter().sum::<f32>() / kept.len() as f32)
}

/// Reads every sensor of a registry; any failure leaves the whole family stale.
fn capture_registry<R, V: Copy>(
    registry: &mut SensorRegistry<R, V>,
    mut read: impl FnMut(&R) -> Result<V>,
) -> Result<()> {
    let values: Result<Vec<V>> = registry.records().iter().map(&mut read).collect();
    match values {
        Ok(values) => Ok(registry.store(values)?),
        Err(e) => {
            registry.mark_stale();
            Err(e)
        }
    }
}

async fn capture_gas(gas: &mut GasChannels, hal: &dyn HardwareProvider) -> Result<()> {
    let mut values = Vec::with_capacity(gas.sensors.len());
    let mut outcome = Ok(());
    let sample_count = gas.samples.min(MAX_GAS_SAMPLES);

    for sensor in gas.sensors.records() {
        let mut samples = Vec::with_capacity(sample_count);
        for n in 0..sample_count {
            if n > 0 {
                tokio::time::sleep(GAS_SAMPLE_SPACING).await;
            }
            match hal.read_gas_ppm(sensor.pin) {
                Ok(ppm) => samples.push(ppm),
                Err(e) => {
                    outcome = Err(e.context(format!("gas sensor on pin {}", sensor.pin)));
                    break;
                }
            }
        }
        if outcome.is_err() {
            break;
        }
        match trimmed_mean(&mut samples) {
            Some(ppm) => values.push(ppm),
            None => {
                outcome = Err(anyhow::anyhow!("{} gas samples are too few to trim", samples.len()));
                break;
            }
        }
    }

    match outcome {
        Ok(()) => Ok(gas.sensors.store(values)?),
        Err(e) => {
            gas.sensors.mark_stale();
            Err(e)
        }
    }
}

/// pH only; calibration mode uses this between full passes.
pub fn capture_ph(fleet: &mut Fleet, hal: &dyn HardwareProvider) -> Option<Result<()>> {
    let ph = fleet.ph.as_mut()?;
    Some(capture_registry(ph, |p| {
        hal.read_ph(p.pin).with_context(|| format!("pH probe on pin {}", p.pin))
    }))
}

/// Runs one full pass. Never fails; failures are listed in the report.
pub async fn acquire(fleet: &mut Fleet, hal: &dyn HardwareProvider) -> CycleReport {
    let mut report = CycleReport::default();

    if let Some(current) = fleet.current.as_mut() {
        let result = capture_registry(current, |s| {
            hal.read_current(s).with_context(|| format!("current sensor on pin {}", s.pin))
        });
        report.record(Family::Current, result);
    }

    if let Some(pairs) = fleet.temp_pairs.as_mut() {
        report.record(Family::TempPairs, pairs.capture(hal));
    }

    if let Some(result) = capture_ph(fleet, hal) {
        report.record(Family::Ph, result);
    }

    if let Some(orp) = fleet.orp.as_mut() {
        let result = capture_registry(orp, |p| {
            hal.read_orp(p.address)
                .with_context(|| format!("ORP probe at 0x{:02X}", p.address))
        });
        report.record(Family::Orp, result);
    }

    if let Some(combo) = fleet.combo.as_mut() {
        let result = capture_registry(combo, |s| {
            let (temperature, humidity) = hal
                .read_dht22(s.pin)
                .with_context(|| format!("DHT22 on pin {}", s.pin))?;
            Ok(ComboReading { temperature, humidity })
        });
        report.record(Family::Combo, result);
    }

    if let Some(light) = fleet.light.as_mut() {
        let result = capture_registry(light, |s| {
            hal.read_light(s)
                .with_context(|| format!("{:?} at 0x{:02X}", s.model, s.address))
        });
        report.record(Family::Light, result);
    }

    if let Some(presence) = fleet.presence.as_mut() {
        let result = capture_registry(presence, |s| {
            hal.read_digital(s.pin).with_context(|| format!("PIR on pin {}", s.pin))
        });
        report.record(Family::Presence, result);
    }

    if let Some(optical) = fleet.optical.as_mut() {
        let result = capture_registry(optical, |s| {
            hal.capture_optical(s)
                .with_context(|| format!("optical sensor at 0x{:02X}", s.address))
        });
        report.record(Family::Optical, result);
        tokio::time::sleep(OPTICAL_SETTLE).await;
    }

    if let Some(gas) = fleet.gas.as_mut() {
        let result = capture_gas(gas, hal).await;
        report.record(Family::Gas, result);
    }

    report
}
