//! ==============================================================================
//! clock.rs - wall clock, operator interrupt and the inter-cycle wait
//! ==============================================================================
//!
//! purpose:
//!     after each cycle the station waits one polling interval before
//!     sampling again. with a wall clock the wait targets a deadline
//!     (`now + interval`) and is re-evaluated every second; without one it
//!     simply counts `interval` one-second ticks. either way the operator
//!     interrupt (the calibration switch) is checked first on every tick and
//!     ends the wait early.
//!
//!     the remaining time is capped at the interval and the loop never runs
//!     more than `interval` ticks, so a clock that jumps backwards or stops
//!     cannot hold the station up.
//!
//! relationships:
//!     - used by: station.rs
//!     - uses: chrono (local time), hal.rs (switch input)
//!
//! ==============================================================================

use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use tracing::{debug, warn};

use crate::hal::HardwareProvider;

pub const TICK: Duration = Duration::from_secs(1);

pub trait ClockSource: Send + Sync {
    fn now(&self) -> NaiveDateTime;

    /// `dd/mm/yyyy hh:mm:ss`, the timestamp written to the local log.
    fn date_time_string(&self) -> String {
        self.now().format("%d/%m/%Y %H:%M:%S").to_string()
    }

    /// `hh:mm`, shown next to the last delivery result.
    fn time_string(&self) -> String {
        self.now().format("%H:%M").to_string()
    }
}

/// The host's local time.
pub struct SystemClock;

impl ClockSource for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

pub trait InterruptSource: Send + Sync {
    fn is_active(&self) -> bool;
}

/// Nothing can interrupt the wait.
pub struct NoInterrupt;

impl InterruptSource for NoInterrupt {
    fn is_active(&self) -> bool {
        false
    }
}

/// Calibration toggle on a GPIO input; high means calibration requested.
pub struct CalibrationSwitch<'a> {
    hal: &'a dyn HardwareProvider,
    pin: u8,
}

impl<'a> CalibrationSwitch<'a> {
    pub fn new(hal: &'a dyn HardwareProvider, pin: u8) -> Self {
        Self { hal, pin }
    }
}

impl InterruptSource for CalibrationSwitch<'_> {
    fn is_active(&self) -> bool {
        match self.hal.read_digital(self.pin) {
            Ok(level) => level,
            Err(e) => {
                warn!(pin = self.pin, error = %e, "calibration switch unreadable");
                false
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Elapsed,
    Interrupted,
}

#[derive(Debug, Clone, Copy)]
pub struct CycleClock {
    interval_secs: u64,
}

impl CycleClock {
    /// A zero interval is raised to one tick.
    pub fn new(interval_secs: u64) -> Self {
        Self { interval_secs: interval_secs.max(1) }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Waits until the next cycle is due or the interrupt fires.
    pub async fn wait(&self, clock: Option<&dyn ClockSource>, interrupt: &dyn InterruptSource) -> WaitOutcome {
        // out-of-range intervals skip the deadline and only count ticks
        let interval = i64::try_from(self.interval_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds);
        let deadline = clock
            .zip(interval)
            .and_then(|(c, interval)| c.now().checked_add_signed(interval));

        for _ in 0..self.interval_secs {
            if interrupt.is_active() {
                debug!("wait interrupted");
                return WaitOutcome::Interrupted;
            }
            if let (Some(clock), Some(deadline), Some(interval)) = (clock, deadline, interval) {
                let remaining = (deadline - clock.now()).min(interval);
                if remaining <= chrono::Duration::zero() {
                    break;
                }
            }
            tokio::time::sleep(TICK).await;
        }
        WaitOutcome::Elapsed
    }
}
