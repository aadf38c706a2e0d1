//! ==============================================================================
//! config.rs - station configuration loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `station.toml` and loads it, falling back to
//!     defaults when the file is missing or broken.
//!
//! structure:
//!     one file carries two kinds of settings:
//!     - host settings, deserialized with serde into HostConfig:
//!         [station] [polling] [clock] [storage] [display] [logging]
//!         [network] [modem] [calibration]
//!     - sensor sections (`["sensors:pH"]`, `["sensor:DO"]`, ...), which
//!       serde ignores and discovery reads through a TomlSource.
//!
//! search order:
//!     $STATION_CONFIG, config/station.toml, ../config/station.toml
//!
//! ==============================================================================

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::source::TomlSource;

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct HostConfig {
    pub station: StationConfig,
    pub polling: PollingConfig,
    pub clock: ToggleConfig,
    pub storage: StorageConfig,
    pub display: ToggleConfig,
    pub logging: LoggingConfig,
    pub network: NetworkConfig,
    pub modem: ModemConfig,
    pub calibration: CalibrationConfig,
}

/// Identity sent with every upload.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StationConfig {
    pub id: String,
    pub pin: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ToggleConfig {
    pub enabled: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub enabled: bool,
    pub directory: PathBuf,
    pub extension: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Log every value after each cycle.
    pub show_sensor_data: bool,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    None,
    Ethernet,
    Modem,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct NetworkConfig {
    pub transport: TransportKind,
    pub host: String,
    pub port: u16,
    pub path: String,
    pub user_agent: String,
    /// Interface whose link state decides "attached" for the ethernet uplink.
    pub interface: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ModemConfig {
    pub device: String,
    pub baud: u32,
    pub apn: String,
    pub user: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct CalibrationConfig {
    /// GPIO of the calibration switch; no switch when unset.
    pub switch_pin: Option<u8>,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self { id: "0".to_string(), pin: "0000".to_string() }
    }
}

impl PollingConfig {
    /// One day; longer intervals are clamped.
    pub const MAX_INTERVAL_SECONDS: u64 = 86_400;

    /// Clamps the interval into `1..=MAX_INTERVAL_SECONDS`.
    fn sanitize(&mut self) {
        let clamped = self.interval_seconds.clamp(1, Self::MAX_INTERVAL_SECONDS);
        if clamped != self.interval_seconds {
            println!(
                "[CONFIG] Warning: interval_seconds = {} out of range, using {}",
                self.interval_seconds, clamped
            );
            self.interval_seconds = clamped;
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self { interval_seconds: 600 }
    }
}

impl Default for ToggleConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: PathBuf::from("data"),
            extension: "txt".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), show_sensor_data: true }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::Ethernet,
            host: "sensors.openspirulina.com".to_string(),
            port: 80,
            path: "/afegir.php".to_string(),
            user_agent: concat!("station-host/", env!("CARGO_PKG_VERSION")).to_string(),
            interface: "eth0".to_string(),
        }
    }
}

impl Default for ModemConfig {
    fn default() -> Self {
        Self {
            device: "/dev/ttyS0".to_string(),
            baud: 9600,
            apn: "internet".to_string(),
            user: String::new(),
            password: String::new(),
        }
    }
}

impl HostConfig {
    /// Parses host settings and sensor sections from the same text.
    pub fn parse(text: &str) -> Result<(Self, TomlSource)> {
        let mut config: HostConfig = toml::from_str(text).context("failed to parse config")?;
        config.polling.sanitize();
        let sensors = TomlSource::parse(text)?;
        Ok((config, sensors))
    }

    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<(Self, TomlSource)> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("failed to read config file {}", path.as_ref().display()))?;
        Self::parse(&content)
    }

    /// Load with default fallback. Without a usable file every sensor family
    /// falls back to its compiled-in defaults.
    pub fn load_or_default() -> (Self, TomlSource) {
        let mut paths = Vec::new();
        if let Ok(path) = std::env::var("STATION_CONFIG") {
            paths.push(PathBuf::from(path));
        }
        paths.push(PathBuf::from("config").join("station.toml"));
        paths.push(PathBuf::from("..").join("config").join("station.toml"));

        for path in &paths {
            if path.exists() {
                match Self::load(path) {
                    Ok(loaded) => {
                        println!("[CONFIG] Loaded from {}", path.display());
                        return loaded;
                    }
                    Err(e) => {
                        println!("[CONFIG] Warning: Failed to load {}: {:#}", path.display(), e);
                    }
                }
            }
        }

        println!("[CONFIG] Warning: No config file found - using defaults");
        (Self::default(), TomlSource::empty())
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        let on = |b: bool| if b { "on" } else { "off" };
        println!("┌─────────────────────────────────────────┐");
        println!("│          STATION CONFIGURATION          │");
        println!("├─────────────────────────────────────────┤");
        println!("│ Station ID: {:<28}│", self.station.id);
        println!("│ Poll Interval: {:<25}│", format!("{}s", self.polling.interval_seconds));
        println!("│ Clock: {:<33}│", on(self.clock.enabled));
        println!("│ Display: {:<31}│", on(self.display.enabled));
        println!(
            "│ Storage: {:<31}│",
            if self.storage.enabled { self.storage.directory.display().to_string() } else { "off".into() }
        );
        println!("│ Transport: {:<29}│", format!("{:?}", self.network.transport).to_lowercase());
        println!("│ Server: {:<32}│", format!("{}:{}", self.network.host, self.network.port));
        println!("│ Log Level: {:<29}│", self.logging.level);
        println!("└─────────────────────────────────────────┘");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ConfigSource;

    #[test]
    fn empty_file_gives_defaults() {
        let (config, sensors) = HostConfig::parse("").unwrap();
        assert_eq!(config.polling.interval_seconds, 600);
        assert_eq!(config.network.transport, TransportKind::Ethernet);
        assert_eq!(config.network.path, "/afegir.php");
        assert!(config.calibration.switch_pin.is_none());
        assert!(!sensors.section_exists("sensors:pH"));
    }

    #[test]
    fn host_and_sensor_sections_share_one_file() {
        let text = r#"
            [station]
            id = "42"
            pin = "9876"

            [network]
            transport = "modem"

            [modem]
            apn = "movistar.es"

            [calibration]
            switch_pin = 26

            ["sensors:pH"]
            sensor1.pin = 34
        "#;
        let (config, sensors) = HostConfig::parse(text).unwrap();
        assert_eq!(config.station.id, "42");
        assert_eq!(config.network.transport, TransportKind::Modem);
        assert_eq!(config.network.port, 80);
        assert_eq!(config.modem.apn, "movistar.es");
        assert_eq!(config.modem.baud, 9600);
        assert_eq!(config.calibration.switch_pin, Some(26));
        assert_eq!(sensors.get("sensors:pH", "sensor1.pin").as_deref(), Some("34"));
    }

    #[test]
    fn interval_is_clamped_into_range() {
        let (config, _) = HostConfig::parse("[polling]\ninterval_seconds = 0").unwrap();
        assert_eq!(config.polling.interval_seconds, 1);

        let (config, _) = HostConfig::parse("[polling]\ninterval_seconds = 100000000000000000").unwrap();
        assert_eq!(config.polling.interval_seconds, PollingConfig::MAX_INTERVAL_SECONDS);

        let (config, _) = HostConfig::parse("[polling]\ninterval_seconds = 300").unwrap();
        assert_eq!(config.polling.interval_seconds, 300);
    }

    #[test]
    fn negative_interval_is_an_error() {
        assert!(HostConfig::parse("[polling]\ninterval_seconds = -5").is_err());
    }

    #[test]
    fn unknown_transport_is_an_error() {
        assert!(HostConfig::parse("[network]\ntransport = \"carrier-pigeon\"").is_err());
    }

    #[test]
    fn load_reads_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("station.toml");
        std::fs::write(&path, "[polling]\ninterval_seconds = 60\n").unwrap();
        let (config, _) = HostConfig::load(&path).unwrap();
        assert_eq!(config.polling.interval_seconds, 60);
        assert!(HostConfig::load(dir.path().join("missing.toml")).is_err());
    }
}
