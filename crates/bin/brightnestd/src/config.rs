//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `brightnest.toml` in the working directory (or the path in
//! `BRIGHTNEST_CONFIG`). Every field has a sensible default so the file is
//! optional. Environment variables take precedence over file values.

use std::collections::HashSet;

use serde::Deserialize;

use brightnest_adapter_drivers::{DriverSpec, default_specs};
use brightnest_adapter_mqtt::MqttConfig;

/// Top-level configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database settings.
    pub database: DatabaseConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Rule evaluation settings.
    pub evaluation: EvaluationConfig,
    /// MQTT telemetry transport.
    pub mqtt: MqttConfig,
    /// Driver table; replaces the built-in one when present.
    pub drivers: Vec<DriverSpec>,
}

/// `SQLite` database configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `SQLite` connection URL or file path.
    pub url: String,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Rule evaluation configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Measures buffered between ingestion and the rule engine.
    pub queue_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            evaluation: EvaluationConfig::default(),
            mqtt: MqttConfig::default(),
            drivers: default_specs(),
        }
    }
}

impl Config {
    /// Load configuration from `brightnest.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// result fails validation.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("BRIGHTNEST_CONFIG").unwrap_or_else(|_| "brightnest.toml".to_string());
        let mut config = Self::from_file(&path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("BRIGHTNEST_DATABASE_URL") {
            self.database.url = val;
        }
        if let Some(val) = var("BRIGHTNEST_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("RUST_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("BRIGHTNEST_MQTT_ENABLED") {
            if let Ok(enabled) = val.parse() {
                self.mqtt.enabled = enabled;
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.evaluation.queue_capacity == 0 {
            return Err(ConfigError::Validation(
                "evaluation queue capacity must be non-zero".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for spec in &self.drivers {
            if !seen.insert((spec.kind, spec.device_type.as_str())) {
                return Err(ConfigError::Validation(format!(
                    "duplicate driver for {} type {:?}",
                    spec.kind, spec.device_type
                )));
            }
        }
        Ok(())
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:brightnest.db?mode=rwc".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "brightnestd=info,brightnest=info".to_string(),
        }
    }
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self { queue_capacity: 256 }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
