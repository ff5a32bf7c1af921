use std::{net::Ipv4Addr, path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{app::LogLevel, Error, Result};

pub mod loader;

pub const DEFAULT_LISTEN_PORT: u16 = 37030;
pub const DEFAULT_PROBE_PORT: u16 = 37020;
pub const DEFAULT_PROBE_PAYLOAD: &str = "GSM_DISCOVER";
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_FOUND_PAUSE: Duration = Duration::from_secs(10);
pub const DEFAULT_HTTP_PORT: u16 = 80;
pub const DEFAULT_DATA_PATH: &str = "/data";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_ERROR_THRESHOLD: u32 = 5;
pub const DEFAULT_SUCCESS_HOLD_SECS: u32 = 10;
pub const DEFAULT_FAILURE_HOLD_SECS: u32 = 5;
pub const DEFAULT_I2C_BUS: u8 = 1;
pub const DEFAULT_PCF8574_ADDR: Pcf8574Addr = Pcf8574Addr::Auto;
pub const DEFAULT_DARKNESS_THRESHOLD: f64 = 300_000.0;
pub const DEFAULT_TEMPERATURE_UNIT: char = 'F';
pub const DEFAULT_LOG_FILE: &str = "/var/log/sensorlcd.log";
pub const DEFAULT_PID_FILE: &str = "/run/sensorlcd.pid";
const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Pcf8574Addr {
    Auto,
    Addr(u8),
}

impl std::str::FromStr for Pcf8574Addr {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        parse_pcf_addr(s)
    }
}

impl TryFrom<String> for Pcf8574Addr {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        parse_pcf_addr(&value)
    }
}

impl From<Pcf8574Addr> for String {
    fn from(value: Pcf8574Addr) -> Self {
        match value {
            Pcf8574Addr::Auto => "auto".into(),
            Pcf8574Addr::Addr(a) => format!("{a:#04x}"),
        }
    }
}

/// UDP broadcast discovery settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DiscoveryConfig {
    pub listen_port: u16,
    pub probe_port: u16,
    pub broadcast_addr: Ipv4Addr,
    pub probe_payload: String,
    #[serde(with = "duration_str")]
    pub probe_timeout: Duration,
    #[serde(with = "duration_str")]
    pub found_pause: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            listen_port: DEFAULT_LISTEN_PORT,
            probe_port: DEFAULT_PROBE_PORT,
            broadcast_addr: Ipv4Addr::BROADCAST,
            probe_payload: DEFAULT_PROBE_PAYLOAD.to_string(),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            found_pause: DEFAULT_FOUND_PAUSE,
        }
    }
}

/// Where the sensor serves its JSON snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SensorConfig {
    pub http_port: u16,
    pub data_path: String,
    #[serde(with = "duration_str")]
    pub request_timeout: Duration,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            http_port: DEFAULT_HTTP_PORT,
            data_path: DEFAULT_DATA_PATH.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PollingConfig {
    /// Consecutive failures tolerated before searching for the sensor again.
    pub error_threshold: u32,
    pub success_hold_secs: u32,
    pub failure_hold_secs: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            error_threshold: DEFAULT_ERROR_THRESHOLD,
            success_hold_secs: DEFAULT_SUCCESS_HOLD_SECS,
            failure_hold_secs: DEFAULT_FAILURE_HOLD_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DisplayConfig {
    pub i2c_bus: u8,
    pub pcf8574_addr: Pcf8574Addr,
    pub darkness_threshold: f64,
    pub temperature_unit: char,
    pub headless: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            i2c_bus: DEFAULT_I2C_BUS,
            pcf8574_addr: DEFAULT_PCF8574_ADDR,
            darkness_threshold: DEFAULT_DARKNESS_THRESHOLD,
            temperature_unit: DEFAULT_TEMPERATURE_UNIT,
            headless: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: LogLevel,
    /// Append-only log file; an empty string disables it.
    pub file: String,
    pub syslog: bool,
}

impl LoggingConfig {
    pub fn file_path(&self) -> Option<String> {
        let trimmed = self.file.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            file: DEFAULT_LOG_FILE.to_string(),
            syslog: false,
        }
    }
}

/// User-supplied settings loaded from the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub pid_file: String,
    pub discovery: DiscoveryConfig,
    pub sensor: SensorConfig,
    pub polling: PollingConfig,
    pub display: DisplayConfig,
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pid_file: DEFAULT_PID_FILE.to_string(),
            discovery: DiscoveryConfig::default(),
            sensor: SensorConfig::default(),
            polling: PollingConfig::default(),
            display: DisplayConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    pub fn load_or_default() -> Result<Self> {
        loader::load_or_default()
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        loader::load_from_path(path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        loader::save_to_path(self, path)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        loader::parse(raw)
    }
}

pub(crate) fn validate(cfg: &Config) -> Result<()> {
    if cfg.discovery.probe_timeout.is_zero() {
        return Err(Error::Config("discovery.probe_timeout must be non-zero".into()));
    }
    if cfg.discovery.probe_payload.is_empty() {
        return Err(Error::Config("discovery.probe_payload must not be empty".into()));
    }
    if !cfg.sensor.data_path.starts_with('/') {
        return Err(Error::Config(format!(
            "sensor.data_path '{}' must start with '/'",
            cfg.sensor.data_path
        )));
    }
    if !cfg.display.temperature_unit.is_ascii_graphic() {
        return Err(Error::Config(
            "display.temperature_unit must be a printable ASCII character".into(),
        ));
    }
    if cfg.pid_file.trim().is_empty() {
        return Err(Error::Config("pid_file must not be empty".into()));
    }
    Ok(())
}

fn parse_pcf_addr(raw: &str) -> std::result::Result<Pcf8574Addr, String> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("auto") {
        return Ok(Pcf8574Addr::Auto);
    }
    let value = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16).ok(),
        None => raw.parse::<u8>().ok(),
    };
    value
        .map(Pcf8574Addr::Addr)
        .ok_or_else(|| "expected 'auto' or a hex/decimal address (e.g., 0x27)".to_string())
}

/// Serde adapter for humantime duration strings such as `"5s"` or `"250ms"`.
mod duration_str {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(raw.trim()).map_err(serde::de::Error::custom)
    }
}
