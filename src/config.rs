//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::Deserialize;
use serde::de::Error;
use std::fs;
use std::path::Path;

use crate::error::{Fdc1Error, Result};
use crate::fdc1::protocol::FDC1_BAUD_RATE;
use crate::serial::SourceKind;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub serial: SerialConfig,
    #[serde(default)]
    pub driver: DriverConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Serial port configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    #[serde(default)]
    pub ports: Vec<PortConfig>,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
}

/// One controller connection, in channel order
#[derive(Debug, Deserialize, Clone)]
pub struct PortConfig {
    pub path: String,

    #[serde(default = "default_port_kind")]
    pub kind: PortKind,
}

/// Port kind as written in the config file
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PortKind {
    Hardware,
    Software,
}

impl From<PortKind> for SourceKind {
    fn from(kind: PortKind) -> Self {
        match kind {
            PortKind::Hardware => SourceKind::Hardware,
            PortKind::Software => SourceKind::Software,
        }
    }
}

/// Tick handler configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DriverConfig {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u32,

    #[serde(default = "default_max_bytes_per_tick")]
    pub max_bytes_per_tick: usize,

    #[serde(default = "default_silence_timeout_ms")]
    pub silence_timeout_ms: u32,
}

/// Foreground monitor configuration
#[derive(Debug, Deserialize, Clone)]
pub struct MonitorConfig {
    #[serde(default = "default_read_interval_ms")]
    pub read_interval_ms: u64,

    #[serde(default = "default_settings_interval_s")]
    pub settings_interval_s: u64,

    #[serde(default)]
    pub demo: bool,
}

/// Log output configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    #[serde(default)]
    pub log_dir: Option<String>,

    #[serde(default)]
    pub jsonl_path: Option<String>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            max_bytes_per_tick: default_max_bytes_per_tick(),
            silence_timeout_ms: default_silence_timeout_ms(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            read_interval_ms: default_read_interval_ms(),
            settings_interval_s: default_settings_interval_s(),
            demo: false,
        }
    }
}

// Default value functions
fn default_baud_rate() -> u32 { FDC1_BAUD_RATE }
fn default_port_kind() -> PortKind { PortKind::Hardware }

fn default_tick_interval_ms() -> u32 { 1 }
fn default_max_bytes_per_tick() -> usize { 32 }
fn default_silence_timeout_ms() -> u32 { 2000 }

fn default_read_interval_ms() -> u64 { 5000 }
fn default_settings_interval_s() -> u64 { 300 }

fn invalid(message: impl std::fmt::Display) -> Fdc1Error {
    Fdc1Error::Config(toml::de::Error::custom(message))
}

impl Config {
    /// Load configuration from a TOML file
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
    /// use fdc1_driver::config::Config;
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

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        // Demo mode drives a simulated line and needs no ports
        if !self.monitor.demo {
            if self.serial.ports.is_empty() || self.serial.ports.len() > 2 {
                return Err(invalid("serial.ports must list 1 or 2 ports"));
            }

            for port in &self.serial.ports {
                if port.path.is_empty() {
                    return Err(invalid("serial port path cannot be empty"));
                }
            }

            let software = self
                .serial
                .ports
                .iter()
                .filter(|p| p.kind == PortKind::Software)
                .count();
            if software > 1 {
                return Err(invalid("at most one serial port may be software-emulated"));
            }
        }

        if self.serial.baud_rate != FDC1_BAUD_RATE {
            return Err(invalid(format!("baud_rate must be {} (fixed by FDC1)", FDC1_BAUD_RATE)));
        }

        self.driver.validate()?;

        if self.monitor.read_interval_ms < 500 || self.monitor.read_interval_ms > 3_600_000 {
            return Err(invalid("read_interval_ms must be between 500 and 3600000"));
        }

        if let Some(dir) = &self.logging.log_dir {
            if dir.is_empty() {
                return Err(invalid("log_dir cannot be empty when set"));
            }
        }

        if let Some(path) = &self.logging.jsonl_path {
            if path.is_empty() {
                return Err(invalid("jsonl_path cannot be empty when set"));
            }
        }

        Ok(())
    }
}

impl DriverConfig {
    /// Validate tick handler limits
    pub fn validate(&self) -> Result<()> {
        if self.tick_interval_ms == 0 || self.tick_interval_ms > 10 {
            return Err(invalid("tick_interval_ms must be between 1 and 10"));
        }

        if self.max_bytes_per_tick == 0 || self.max_bytes_per_tick > 256 {
            return Err(invalid("max_bytes_per_tick must be between 1 and 256"));
        }

        if self.silence_timeout_ms < 500 || self.silence_timeout_ms > 60000 {
            return Err(invalid("silence_timeout_ms must be between 500 and 60000"));
        }

        Ok(())
    }
}
