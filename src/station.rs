//! ==============================================================================
//! station.rs - the monitoring loop
//! ==============================================================================
//!
//! purpose:
//!     owns everything the loop touches and runs it:
//!
//!         ┌──────────────────────────────────────────────────────────┐
//!         │ calibration checkpoint (while switch active: pH, 10 s)   │
//!         │ acquisition pass            -> scheduler.rs              │
//!         │ serialize                   -> record.rs                 │
//!         │ save locally, then deliver  -> storage.rs, delivery.rs   │
//!         │ status screen               -> display.rs                │
//!         │ wait for the next cycle     -> clock.rs                  │
//!         └──────────────────────────────────────────────────────────┘
//!
//!     nothing in here is fatal once the loop runs: storage and delivery
//!     failures are logged and the next cycle starts on time.
//!
//! ==============================================================================

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::clock::{CalibrationSwitch, ClockSource, CycleClock, InterruptSource, NoInterrupt, WaitOutcome};
use crate::delivery::{DeliveryManager, DeliveryOutcome};
use crate::display::{calibration_lines, status_lines, StatusDisplay};
use crate::fleet::Fleet;
use crate::hal::{HardwareProvider, PinMode};
use crate::record::{self, StationIdentity};
use crate::scheduler::{self, CycleReport};
use crate::storage::LocalLog;
use crate::transport::{ModemTransport, SocketTransport};

pub const CALIBRATION_PAUSE: Duration = Duration::from_secs(10);

/// Fixed settings the loop needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct StationSettings {
    pub identity: StationIdentity,
    pub host: String,
    pub path: String,
    pub user_agent: String,
    pub interval_seconds: u64,
    pub calibration_pin: Option<u8>,
    pub show_sensor_data: bool,
}

/// Where the local log lives; kept so the log can be reopened after a failure.
#[derive(Debug, Clone)]
struct LogTarget {
    directory: PathBuf,
    extension: String,
}

pub struct Station<S, M> {
    fleet: Fleet,
    hal: Arc<dyn HardwareProvider>,
    delivery: DeliveryManager<S, M>,
    settings: StationSettings,
    cycle_clock: CycleClock,
    clock: Option<Box<dyn ClockSource>>,
    display: Option<Box<dyn StatusDisplay>>,
    log_target: Option<LogTarget>,
    log: Option<LocalLog>,
    last_outcome: Option<DeliveryOutcome>,
    loops: u64,
}

impl<S: SocketTransport, M: ModemTransport> Station<S, M> {
    pub fn new(
        fleet: Fleet,
        hal: Arc<dyn HardwareProvider>,
        delivery: DeliveryManager<S, M>,
        settings: StationSettings,
    ) -> Self {
        Self {
            cycle_clock: CycleClock::new(settings.interval_seconds),
            fleet,
            hal,
            delivery,
            settings,
            clock: None,
            display: None,
            log_target: None,
            log: None,
            last_outcome: None,
            loops: 0,
        }
    }

    pub fn with_clock(mut self, clock: Box<dyn ClockSource>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_display(mut self, display: Box<dyn StatusDisplay>) -> Self {
        self.display = Some(display);
        self
    }

    /// Opens a new log file whose header matches this fleet. Call after the
    /// clock is set: the timestamp column exists only with a clock.
    ///
    /// The location is kept even when opening fails; every save retries it
    /// until a file can be created.
    pub fn open_log(&mut self, directory: &Path, extension: &str) -> Result<()> {
        self.log_target = Some(LogTarget {
            directory: directory.to_path_buf(),
            extension: extension.to_string(),
        });
        self.log = None;
        self.reopen_log()
    }

    fn reopen_log(&mut self) -> Result<()> {
        let Some(target) = &self.log_target else {
            return Ok(());
        };
        let timestamp = self.clock.as_ref().map(|_| "");
        let header = record::header_line(&record::local_fields(&self.fleet, timestamp));
        self.log = Some(LocalLog::open(&target.directory, &target.extension, &header)?);
        Ok(())
    }

    /// Appends one line, reopening the log first when it is not available.
    /// A failed append drops the file so the next save starts a new one.
    fn save(&mut self, line: &str) {
        if self.log.is_none() {
            if let Err(e) = self.reopen_log() {
                warn!(error = %format!("{e:#}"), "storage unavailable, record dropped");
                return;
            }
        }
        let Some(log) = &self.log else {
            return;
        };
        match log.append(line) {
            Ok(()) => debug!(path = %log.path().display(), "record saved"),
            Err(e) => {
                warn!(error = %format!("{e:#}"), "record dropped");
                self.log = None;
            }
        }
    }

    pub fn fleet(&self) -> &Fleet {
        &self.fleet
    }

    pub fn last_outcome(&self) -> Option<&DeliveryOutcome> {
        self.last_outcome.as_ref()
    }

    pub fn loops(&self) -> u64 {
        self.loops
    }

    fn progress(&mut self, message: &str) {
        if let Some(display) = self.display.as_mut() {
            display.progress(message);
        }
    }

    /// Presence sensors and the calibration switch are plain inputs.
    pub fn setup_pins(&self) {
        let presence = self.fleet.presence.iter().flat_map(|r| r.records().iter().map(|s| s.pin));
        for pin in presence.chain(self.settings.calibration_pin) {
            if let Err(e) = self.hal.set_gpio_mode(pin, PinMode::Input) {
                warn!(pin, error = %e, "cannot configure input pin");
            }
        }
    }

    fn calibration_requested(&self) -> bool {
        self.settings
            .calibration_pin
            .is_some_and(|pin| CalibrationSwitch::new(self.hal.as_ref(), pin).is_active())
    }

    /// Stays in calibration mode while the switch is on. Returns the number
    /// of calibration rounds shown.
    pub async fn calibration_checkpoint(&mut self) -> usize {
        let mut rounds = 0;
        while self.calibration_requested() {
            if rounds == 0 {
                info!("calibration mode");
            }
            if let Some(Err(e)) = scheduler::capture_ph(&mut self.fleet, self.hal.as_ref()) {
                warn!(error = %format!("{e:#}"), "pH capture failed during calibration");
            }
            let readings = self.fleet.ph.as_ref().map(|r| r.readings().to_vec()).unwrap_or_default();
            if let Some(display) = self.display.as_mut() {
                display.show(&calibration_lines(&readings));
            }
            rounds += 1;
            tokio::time::sleep(CALIBRATION_PAUSE).await;
        }
        if rounds > 0 {
            info!(rounds, "calibration mode left");
        }
        rounds
    }

    /// One acquisition, save and delivery.
    pub async fn run_cycle(&mut self) -> CycleReport {
        self.loops += 1;
        self.progress("Reading sensors");
        let report = scheduler::acquire(&mut self.fleet, self.hal.as_ref()).await;
        info!(
            cycle = self.loops,
            captured = report.captured.len(),
            failed = report.failed.len(),
            "acquisition done"
        );

        let timestamp = self.clock.as_ref().map(|c| c.date_time_string());
        let fields = record::local_fields(&self.fleet, timestamp.as_deref());

        if self.settings.show_sensor_data {
            for field in &fields {
                if field.key.is_some() {
                    info!(field = %field.header, value = %field.value.render().unwrap_or_default(), "reading");
                }
            }
        }

        if self.log_target.is_some() {
            self.progress("Saving data");
            self.save(&record::data_line(&fields));
        }

        if self.delivery.is_enabled() {
            self.progress("Sending data");
            let query = record::query_string(&self.settings.path, &self.settings.identity, &fields);
            let request = record::http_request(&query, &self.settings.host, &self.settings.user_agent);
            let at = self
                .clock
                .as_ref()
                .map(|c| c.time_string())
                .unwrap_or_else(|| format!("#{}", self.loops));
            if let Some(outcome) = self.delivery.deliver(&request, at).await {
                self.last_outcome = Some(outcome);
            }
        }

        let lines = status_lines(&self.fleet, self.last_outcome.as_ref());
        if let Some(display) = self.display.as_mut() {
            display.show(&lines);
        }
        report
    }

    pub async fn wait_for_next_cycle(&self) -> WaitOutcome {
        let clock = self.clock.as_deref();
        match self.settings.calibration_pin {
            Some(pin) => {
                let switch = CalibrationSwitch::new(self.hal.as_ref(), pin);
                self.cycle_clock.wait(clock, &switch).await
            }
            None => self.cycle_clock.wait(clock, &NoInterrupt).await,
        }
    }

    /// Runs until the future is dropped.
    pub async fn run(&mut self) {
        loop {
            self.calibration_checkpoint().await;
            self.run_cycle().await;
            if self.wait_for_next_cycle().await == WaitOutcome::Interrupted {
                debug!("wait cut short by calibration switch");
            }
        }
    }
}
