//! ==============================================================================
//! main.rs - monitoring station entry point
//! ==============================================================================
//!
//! purpose:
//!     unattended environmental monitoring for culture tanks. every polling
//!     interval the station reads its sensors, appends a line to the local
//!     log and uploads the same sample to the telemetry server.
//!
//! responsibilities:
//!     - load station.toml (host settings + sensor sections)
//!     - pick the hardware layer (real pi or mock)
//!     - discover the sensor fleet once
//!     - wire storage, uplink, clock and display into the station loop
//!     - run until ctrl-c
//!
//! architecture:
//!
//!     ┌─────────────────────────────────────────────────────────────┐
//!     │                     station-host (this file)                │
//!     │                                                             │
//!     │  config.rs ──► discovery.rs ──► Fleet                       │
//!     │                                   │                         │
//!     │                     ┌─────────────┴────────────┐            │
//!     │                     │ station.rs (cycle loop)  │            │
//!     │                     └──┬──────┬──────┬──────┬──┘            │
//!     │                        │      │      │      │               │
//!     │              scheduler │ record│storage│ delivery            │
//!     │                        ▼      ▼      ▼      ▼               │
//!     │                      hal.rs        files   transport/        │
//!     └─────────────────────────────────────────────────────────────┘
//!
//! relationships:
//!     - uses: every module below; this file only does the wiring.
//!
//! ==============================================================================

mod clock;
mod config;
mod delivery;
mod discovery;
mod display;
mod fleet;
mod hal;
mod record;
mod scheduler;
mod source;
mod station;
mod storage;
mod transport;

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use crate::config::{HostConfig, TransportKind};
use crate::delivery::{DeliveryManager, StationUplink, Uplink};
use crate::discovery::FleetLoader;
use crate::fleet::FleetDefaults;
use crate::hal::HardwareProvider;
use crate::record::StationIdentity;
use crate::station::{Station, StationSettings};
use crate::transport::modem::ApnSettings;
use crate::transport::{AtModem, EthernetTransport};

fn init_tracing(default_level: &str) -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("{default_level},station_host={default_level}").into());
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init()
        .map_err(|err| anyhow::anyhow!(err.to_string()))?;
    Ok(())
}

fn select_hal() -> Arc<dyn HardwareProvider> {
    #[cfg(feature = "hardware")]
    {
        match hal::RppalHal::new() {
            Ok(hal) => {
                println!("[STARTUP] ✓ Raspberry Pi hardware ready");
                return Arc::new(hal);
            }
            Err(e) => {
                eprintln!("[STARTUP] ⚠ Hardware init failed ({e:#}), falling back to mock");
            }
        }
    }
    Arc::new(hal::MockHal::new())
}

fn build_uplink(config: &HostConfig) -> StationUplink {
    match config.network.transport {
        TransportKind::None => Uplink::Disabled,
        TransportKind::Ethernet => Uplink::Socket(EthernetTransport::new(&config.network.interface)),
        TransportKind::Modem => {
            let apn = ApnSettings {
                apn: config.modem.apn.clone(),
                user: config.modem.user.clone(),
                password: config.modem.password.clone(),
            };
            match AtModem::open(&config.modem.device, config.modem.baud, apn) {
                Ok(modem) => Uplink::Modem(modem),
                Err(e) => {
                    warn!(error = %format!("{e:#}"), "modem unavailable, delivery disabled");
                    Uplink::Disabled
                }
            }
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // startup banner
    println!("===========================================================");
    println!("  Station Host - Environmental Monitoring");
    println!("  v{}", env!("CARGO_PKG_VERSION"));
    println!("===========================================================");

    // step 1: load configuration
    let (config, sensors) = HostConfig::load_or_default();
    config.print_summary();
    init_tracing(&config.logging.level)?;

    // step 2: hardware layer
    let hal = select_hal();

    // step 3: discover sensors
    println!("\n[STARTUP] Discovering sensors...");
    let fleet = FleetLoader::new(&sensors, hal.as_ref(), FleetDefaults::default()).load();
    for (family, count) in fleet.families() {
        println!("[STARTUP] ✓ {family}: {count} sensor(s)");
    }

    // step 4: wire the station
    let delivery = DeliveryManager::new(build_uplink(&config), &config.network.host, config.network.port);
    let settings = StationSettings {
        identity: StationIdentity {
            id: config.station.id.clone(),
            pin: config.station.pin.clone(),
        },
        host: config.network.host.clone(),
        path: config.network.path.clone(),
        user_agent: config.network.user_agent.clone(),
        interval_seconds: config.polling.interval_seconds,
        calibration_pin: config.calibration.switch_pin,
        show_sensor_data: config.logging.show_sensor_data,
    };

    let mut station = Station::new(fleet, hal, delivery, settings);
    if config.clock.enabled {
        station = station.with_clock(Box::new(clock::SystemClock));
    }
    if config.display.enabled {
        station = station.with_display(Box::new(display::LogDisplay));
    }
    if config.storage.enabled {
        if let Err(e) = station.open_log(&config.storage.directory, &config.storage.extension) {
            warn!(error = %format!("{e:#}"), "local storage unavailable, retrying on every save");
        }
    }
    station.setup_pins();

    // step 5: main loop
    println!(
        "\n[RUNTIME] Starting acquisition ({}s interval)",
        config.polling.interval_seconds
    );
    println!("────────────────────────────────────────────────────────────");

    tokio::select! {
        _ = station.run() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("ctrl-c received, shutting down");
        }
    }
    Ok(())
}
