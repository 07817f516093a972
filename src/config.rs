//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working simulator setup.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::error::{HohError, Result};
use crate::motor::MotorParams;
use crate::presence::BraceSide;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub control: ControlConfig,
    #[serde(default)]
    pub motor: MotorConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub presence: PresenceConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Serial link to the companion application
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    #[serde(default = "default_serial_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Run without a link (simulator only)
    #[serde(default)]
    pub enabled: bool,
}

/// Control loop timing
#[derive(Debug, Deserialize, Clone)]
pub struct ControlConfig {
    #[serde(default = "default_tick_period_ms")]
    pub tick_period_ms: u64,

    #[serde(default = "default_housekeeping_period_ms")]
    pub housekeeping_period_ms: u64,
}

/// How a finger signals that it reached a mechanical end.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum EndStopSignal {
    /// The motor stalls and its current rises above the threshold.
    #[default]
    Stall,
    /// An end switch cuts the motor and its current drops below the threshold.
    CurrentLoss,
}

/// Motor timing and current sensing
#[derive(Debug, Deserialize, Clone)]
pub struct MotorConfig {
    #[serde(default = "default_current_threshold")]
    pub current_threshold: f32,

    #[serde(default)]
    pub end_stop_signal: EndStopSignal,

    #[serde(default = "default_reset_timeout_us")]
    pub reset_timeout_us: u32,

    #[serde(default = "default_reset_debounce_us")]
    pub reset_debounce_us: u32,

    #[serde(default = "default_calibration_debounce_us")]
    pub calibration_debounce_us: u32,

    #[serde(default = "default_dt_full_rom_us")]
    pub default_dt_full_rom_us: u32,

    #[serde(default = "default_cpm_wait_us")]
    pub cpm_wait_us: u32,

    #[serde(default = "default_sequential_stagger_us")]
    pub sequential_stagger_us: u32,
}

/// Persisted settings
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_storage_path")]
    pub path: String,
}

/// Outbound streams and the status recorder
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    #[serde(default = "default_true")]
    pub status_on_start: bool,

    #[serde(default = "default_true")]
    pub data_on_start: bool,

    #[serde(default)]
    pub log_enabled: bool,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,
}

/// Identification strings
#[derive(Debug, Deserialize, Clone)]
pub struct DeviceConfig {
    #[serde(default = "default_device_name")]
    pub name: String,

    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default = "default_development")]
    pub development: String,
}

/// Static presence report
#[derive(Debug, Deserialize, Clone, Default)]
pub struct PresenceConfig {
    #[serde(default)]
    pub cable_connected: bool,

    #[serde(default)]
    pub brace_side: BraceSide,
}

/// Simulated hardware
#[derive(Debug, Deserialize, Clone)]
pub struct SimulationConfig {
    /// Travel time of a simulated finger over the full range of motion
    #[serde(default = "default_dt_full_rom_us")]
    pub full_rom_us: u32,

    /// Acceleration seen by the simulated tilt sensor (x, y, z)
    #[serde(default = "default_acceleration")]
    pub acceleration: [f32; 3],
}

/// Diagnostic log output
#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    /// Directory for daily rolling log files; console only when unset
    #[serde(default)]
    pub dir: Option<String>,
}

// Default value functions
fn default_serial_port() -> String { "/dev/ttyUSB0".to_string() }
fn default_baud_rate() -> u32 { 115200 }

fn default_tick_period_ms() -> u64 { 20 }
fn default_housekeeping_period_ms() -> u64 { 1000 }

fn default_current_threshold() -> f32 { 10.0 }
fn default_reset_timeout_us() -> u32 { 3_000_000 }
fn default_reset_debounce_us() -> u32 { 500_000 }
fn default_calibration_debounce_us() -> u32 { 1_000_000 }
fn default_dt_full_rom_us() -> u32 { 2_340_000 }
fn default_cpm_wait_us() -> u32 { 1_000_000 }
fn default_sequential_stagger_us() -> u32 { 500_000 }

fn default_storage_path() -> String { "./hoh-settings.toml".to_string() }

fn default_true() -> bool { true }
fn default_log_dir() -> String { "./logs".to_string() }

fn default_device_name() -> String { "RR_HOH_BLE".to_string() }
fn default_version() -> String { "V1.0.0".to_string() }
fn default_development() -> String { "v20240531".to_string() }

fn default_acceleration() -> [f32; 3] { [0.0, 0.0, 9.81] }

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
            enabled: false,
        }
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            tick_period_ms: default_tick_period_ms(),
            housekeeping_period_ms: default_housekeeping_period_ms(),
        }
    }
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self {
            current_threshold: default_current_threshold(),
            end_stop_signal: EndStopSignal::default(),
            reset_timeout_us: default_reset_timeout_us(),
            reset_debounce_us: default_reset_debounce_us(),
            calibration_debounce_us: default_calibration_debounce_us(),
            default_dt_full_rom_us: default_dt_full_rom_us(),
            cpm_wait_us: default_cpm_wait_us(),
            sequential_stagger_us: default_sequential_stagger_us(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { path: default_storage_path() }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            status_on_start: true,
            data_on_start: true,
            log_enabled: false,
            log_dir: default_log_dir(),
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: default_device_name(),
            version: default_version(),
            development: default_development(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            full_rom_us: default_dt_full_rom_us(),
            acceleration: default_acceleration(),
        }
    }
}

impl MotorConfig {
    /// Controller parameters built from this section.
    pub fn params(&self) -> MotorParams {
        MotorParams {
            reset_timeout_us: self.reset_timeout_us,
            reset_debounce_us: self.reset_debounce_us,
            calibration_debounce_us: self.calibration_debounce_us,
            default_dt_full_rom_us: self.default_dt_full_rom_us,
            cpm_wait_us: self.cpm_wait_us,
            sequential_stagger_us: self.sequential_stagger_us,
            current_threshold: self.current_threshold,
            end_stop_signal: self.end_stop_signal,
        }
    }
}

fn invalid(message: impl std::fmt::Display) -> HohError {
    HohError::Config(toml::de::Error::custom(message))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
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
    /// use hoh_control::config::Config;
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

    /// Load `path` if it exists, otherwise fall back to the built-in defaults.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read, parsed or validated
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Self::load(path);
        }
        info!("No configuration at {}, using defaults", path.display());
        let config = Config::default();
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Returns
    ///
    /// * `Result<()>` - Ok if valid, Err if invalid
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        // Serial link
        if self.serial.enabled && self.serial.port.is_empty() {
            return Err(invalid("serial port cannot be empty when enabled"));
        }

        if ![9600, 57600, 115200, 230400, 460800, 921600].contains(&self.serial.baud_rate) {
            return Err(invalid(
                "baud_rate must be one of: 9600, 57600, 115200, 230400, 460800, 921600",
            ));
        }

        // Loop timing
        if self.control.tick_period_ms == 0 || self.control.tick_period_ms > 1000 {
            return Err(invalid("tick_period_ms must be between 1 and 1000"));
        }

        if self.control.housekeeping_period_ms < self.control.tick_period_ms {
            return Err(invalid("housekeeping_period_ms must not be shorter than tick_period_ms"));
        }

        // Motor
        if !(self.motor.current_threshold > 0.0) {
            return Err(invalid("current_threshold must be greater than 0"));
        }

        for (name, value) in [
            ("reset_timeout_us", self.motor.reset_timeout_us),
            ("reset_debounce_us", self.motor.reset_debounce_us),
            ("calibration_debounce_us", self.motor.calibration_debounce_us),
            ("default_dt_full_rom_us", self.motor.default_dt_full_rom_us),
            ("cpm_wait_us", self.motor.cpm_wait_us),
            ("sequential_stagger_us", self.motor.sequential_stagger_us),
            ("simulation.full_rom_us", self.simulation.full_rom_us),
        ] {
            if value == 0 {
                return Err(invalid(format!("{} must be greater than 0", name)));
            }
        }

        if self.motor.reset_debounce_us >= self.motor.reset_timeout_us {
            return Err(invalid("reset_debounce_us must be shorter than reset_timeout_us"));
        }

        if self.motor.calibration_debounce_us >= self.motor.reset_timeout_us {
            return Err(invalid("calibration_debounce_us must be shorter than reset_timeout_us"));
        }

        // Storage
        if self.storage.path.is_empty() {
            return Err(invalid("storage path cannot be empty"));
        }

        // Telemetry
        if self.telemetry.log_enabled && self.telemetry.log_dir.is_empty() {
            return Err(invalid("telemetry log_dir cannot be empty when enabled"));
        }

        // Identification strings
        for (name, value) in [
            ("device version", &self.device.version),
            ("device development", &self.device.development),
        ] {
            if value.is_empty() || value.len() > crate::protocol::frame::MAX_TEXT_LENGTH {
                return Err(invalid(format!("{} must be 1 to 252 bytes long", name)));
            }
        }

        if self.device.name.is_empty() {
            return Err(invalid("device name cannot be empty"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.control.tick_period_ms, 20);
        assert_eq!(config.motor.end_stop_signal, EndStopSignal::Stall);
        assert_eq!(config.device.version, "V1.0.0");
        assert!(!config.serial.enabled);
    }

    #[test]
    fn test_default_params_match_controller_defaults() {
        assert_eq!(MotorConfig::default().params(), MotorParams::default());
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.motor.reset_timeout_us, 3_000_000);
        assert_eq!(config.simulation.acceleration, [0.0, 0.0, 9.81]);
    }

    #[test]
    fn test_load_config_from_file() {
        let toml_content = r#"
[serial]
port = "/dev/ttyACM0"
baud_rate = 921600
enabled = true

[motor]
end_stop_signal = "current_loss"
current_threshold = 12.5

[presence]
cable_connected = true
brace_side = "left"

[logging]
dir = "./logs"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.serial.port, "/dev/ttyACM0");
        assert_eq!(config.motor.end_stop_signal, EndStopSignal::CurrentLoss);
        assert_eq!(config.motor.params().current_threshold, 12.5);
        assert_eq!(config.presence.brace_side, BraceSide::Left);
        assert_eq!(config.logging.dir.as_deref(), Some("./logs"));
    }

    #[test]
    fn test_load_or_default_without_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = Config::load_or_default(dir.path().join("missing.toml")).unwrap();
        assert_eq!(config.storage.path, "./hoh-settings.toml");
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"[control]\ntick_period_ms = 0\n").unwrap();
        temp_file.flush().unwrap();

        assert!(matches!(
            Config::load_or_default(temp_file.path()),
            Err(HohError::Config(_))
        ));
    }

    #[test]
    fn test_unknown_end_stop_signal() {
        assert!(toml::from_str::<Config>("[motor]\nend_stop_signal = \"magic\"").is_err());
    }

    #[test]
    fn test_empty_serial_port_when_enabled() {
        let mut config = Config::default();
        config.serial.port = String::new();
        assert!(config.validate().is_ok(), "ignored while the link is disabled");
        config.serial.enabled = true;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_baud_rate() {
        let mut config = Config::default();
        config.serial.baud_rate = 420000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tick_period_bounds() {
        let mut config = Config::default();
        config.control.tick_period_ms = 0;
        assert!(config.validate().is_err());

        config.control.tick_period_ms = 1001;
        config.control.housekeeping_period_ms = 2000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_housekeeping_shorter_than_tick() {
        let mut config = Config::default();
        config.control.housekeeping_period_ms = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_current_threshold_must_be_positive() {
        let mut config = Config::default();
        config.motor.current_threshold = 0.0;
        assert!(config.validate().is_err());
        config.motor.current_threshold = f32::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_durations_rejected() {
        let mut config = Config::default();
        config.motor.cpm_wait_us = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.simulation.full_rom_us = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debounce_longer_than_timeout() {
        let mut config = Config::default();
        config.motor.reset_debounce_us = 3_000_000;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.motor.calibration_debounce_us = 4_000_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_log_dir_when_enabled() {
        let mut config = Config::default();
        config.telemetry.log_dir = String::new();
        assert!(config.validate().is_ok());
        config.telemetry.log_enabled = true;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_version_length() {
        let mut config = Config::default();
        config.device.version = String::new();
        assert!(config.validate().is_err());

        config.device.version = "v".repeat(253);
        assert!(config.validate().is_err());

        config.device.version = "v".repeat(252);
        assert!(config.validate().is_ok());
    }
}
