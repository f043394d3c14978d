//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every field has a default, so a missing file or a missing section simply
//! falls back to the settings the sensor firmware ships with.

use serde::Deserialize;
use serde::de::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{BridgeError, Result};

/// Line prefix identifying a frequency sweep record
pub const SWEEP_RECORD_PREFIX: &str = "1,frequency_sweep_easy";

/// Baud rates accepted by the sensor's USB serial bridge
const SUPPORTED_BAUD_RATES: &[u32] = &[
    300, 1200, 2400, 4800, 9600, 19200, 38400, 57600, 115200, 230400, 460800, 921600,
];

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,

    #[serde(default)]
    pub acquisition: AcquisitionConfig,

    #[serde(default)]
    pub chart: ChartConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Serial port configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    #[serde(default = "default_serial_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Delay after opening while the board resets
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

/// Acquisition configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AcquisitionConfig {
    #[serde(default = "default_prefix")]
    pub prefix: String,

    #[serde(default = "default_data_dir")]
    pub output_dir: PathBuf,
}

/// Chart configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ChartConfig {
    #[serde(default = "default_data_dir")]
    pub input_dir: PathBuf,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    /// Directory for daily rolling log files; console only when unset
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

// Default value functions
fn default_serial_port() -> String { "/dev/cu.usbmodem101".to_string() }
fn default_baud_rate() -> u32 { 9600 }
fn default_timeout_ms() -> u64 { 5000 }
fn default_settle_ms() -> u64 { 2000 }

fn default_prefix() -> String { SWEEP_RECORD_PREFIX.to_string() }
fn default_data_dir() -> PathBuf { PathBuf::from("./data") }

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
            timeout_ms: default_timeout_ms(),
            settle_ms: default_settle_ms(),
        }
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            output_dir: default_data_dir(),
        }
    }
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            input_dir: default_data_dir(),
        }
    }
}

impl SerialConfig {
    /// Per-read timeout as a `Duration`
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Post-open settle delay as a `Duration`
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use bioimpedance_bridge::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` when given, otherwise use built-in defaults
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.serial.port.is_empty() {
            return Err(invalid("serial port cannot be empty"));
        }

        if !SUPPORTED_BAUD_RATES.contains(&self.serial.baud_rate) {
            return Err(invalid(format!(
                "baud_rate {} is not a standard rate",
                self.serial.baud_rate
            )));
        }

        if self.serial.timeout_ms == 0 || self.serial.timeout_ms > 60000 {
            return Err(invalid("timeout_ms must be between 1 and 60000"));
        }

        if self.serial.settle_ms > 10000 {
            return Err(invalid("settle_ms must be at most 10000"));
        }

        if self.acquisition.prefix.is_empty() {
            return Err(invalid("acquisition prefix cannot be empty"));
        }

        if self.acquisition.output_dir.as_os_str().is_empty() {
            return Err(invalid("acquisition output_dir cannot be empty"));
        }

        if self.chart.input_dir.as_os_str().is_empty() {
            return Err(invalid("chart input_dir cannot be empty"));
        }

        Ok(())
    }
}

fn invalid(msg: impl std::fmt::Display) -> BridgeError {
    BridgeError::Config(toml::de::Error::custom(msg))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.acquisition.prefix, SWEEP_RECORD_PREFIX);
        assert!(config.logging.log_dir.is_none());
    }

    #[test]
    fn test_load_config_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let toml_content = r#"
[serial]
port = "/dev/ttyACM0"
baud_rate = 115200

[acquisition]
output_dir = "/tmp/sweeps"

[logging]
log_dir = "/tmp/sweeps/logs"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.serial.port, "/dev/ttyACM0");
        assert_eq!(config.serial.baud_rate, 115200);
        assert_eq!(config.serial.timeout_ms, 5000);
        assert_eq!(config.acquisition.output_dir, PathBuf::from("/tmp/sweeps"));
        assert_eq!(config.acquisition.prefix, SWEEP_RECORD_PREFIX);
        assert_eq!(config.chart.input_dir, PathBuf::from("./data"));
        assert_eq!(config.logging.log_dir, Some(PathBuf::from("/tmp/sweeps/logs")));
    }

    #[test]
    fn test_load_empty_file_uses_defaults() {
        use tempfile::NamedTempFile;

        let temp_file = NamedTempFile::new().unwrap();
        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.serial.port, "/dev/cu.usbmodem101");
        assert_eq!(config.serial.baud_rate, 9600);
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"[serial]\nbaud_rate = 12345\n").unwrap();
        temp_file.flush().unwrap();

        assert!(matches!(
            Config::load(temp_file.path()),
            Err(BridgeError::Config(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load("/nonexistent/bioimpedance.toml");
        assert!(matches!(result, Err(BridgeError::Io(_))));
    }

    #[test]
    fn test_load_or_default_without_path() {
        let config = Config::load_or_default(None::<&str>).unwrap();
        assert_eq!(config.serial.settle_ms, 2000);
    }

    #[test]
    fn test_empty_serial_port() {
        let mut config = Config::default();
        config.serial.port = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_baud_rate() {
        let mut config = Config::default();
        config.serial.baud_rate = 420000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_valid_baud_rates() {
        for &baud in SUPPORTED_BAUD_RATES {
            let mut config = Config::default();
            config.serial.baud_rate = baud;
            assert!(config.validate().is_ok(), "Baud rate {} should be valid", baud);
        }
    }

    #[test]
    fn test_timeout_ms_zero() {
        let mut config = Config::default();
        config.serial.timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_timeout_ms_too_high() {
        let mut config = Config::default();
        config.serial.timeout_ms = 60001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_settle_ms_zero_is_allowed() {
        let mut config = Config::default();
        config.serial.settle_ms = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_settle_ms_too_high() {
        let mut config = Config::default();
        config.serial.settle_ms = 10001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_prefix() {
        let mut config = Config::default();
        config.acquisition.prefix = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_directories() {
        let mut config = Config::default();
        config.acquisition.output_dir = PathBuf::new();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.chart.input_dir = PathBuf::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_durations() {
        let serial = SerialConfig::default();
        assert_eq!(serial.read_timeout(), Duration::from_secs(5));
        assert_eq!(serial.settle_delay(), Duration::from_secs(2));
    }

    #[test]
    fn test_default_functions() {
        assert_eq!(default_serial_port(), "/dev/cu.usbmodem101");
        assert_eq!(default_baud_rate(), 9600);
        assert_eq!(default_timeout_ms(), 5000);
        assert_eq!(default_settle_ms(), 2000);
        assert_eq!(default_prefix(), "1,frequency_sweep_easy");
        assert_eq!(default_data_dir(), PathBuf::from("./data"));
    }
}
