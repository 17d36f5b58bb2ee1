//! Configuration loading using Figment.
//!
//! Configuration is loaded from:
//! 1. a TOML file (base configuration)
//! 2. environment variables prefixed with `NAV_`, using `__` between nested
//!    keys (e.g. `NAV_APPLICATION__LOG_LEVEL=debug`)
//!
//! Stream-specific settings stay as a raw `toml::Value` in
//! [`StreamDefinition::config`]; each driver crate deserializes its own
//! section.
//!
//! # Example
//!
//! ```no_run
//! use nav_core::config::NavConfig;
//!
//! let config = NavConfig::load_from("config/nav.toml")?;
//! config.validate()?;
//! println!("Application: {}", config.application.name);
//! # Ok::<(), nav_core::NavError>(())
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{NavError, Result};
use crate::limits::{
    DEFAULT_BUFFER_CAPACITY, DEFAULT_EPOCH_INTERVAL_S, DEFAULT_TOLERANCE_S, MAX_BUFFER_CAPACITY,
};
use crate::observation::ObservationKind;

/// Log levels accepted by [`ApplicationConfig::log_level`].
pub const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavConfig {
    /// Application settings
    pub application: ApplicationConfig,
    /// Estimator cadence used by the replay tool
    #[serde(default)]
    pub estimator: EstimatorConfig,
    /// Sensor stream definitions
    #[serde(default)]
    pub streams: Vec<StreamDefinition>,
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Application name
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Query cadence of the downstream estimator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EstimatorConfig {
    /// Seconds between estimator epochs
    #[serde(default = "default_epoch_interval")]
    pub epoch_interval_s: f64,
    /// Half-width of the tolerance window in seconds
    #[serde(default = "default_tolerance")]
    pub tolerance_s: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            epoch_interval_s: default_epoch_interval(),
            tolerance_s: default_tolerance(),
        }
    }
}

/// Sensor stream definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamDefinition {
    /// Unique stream identifier
    pub id: String,
    /// Decoder type (e.g., "odometer")
    pub r#type: String,
    /// Observation kind produced by the stream
    #[serde(default = "default_kind")]
    pub kind: ObservationKind,
    /// Whether this stream is enabled
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Byte source (file path or serial device)
    #[serde(default)]
    pub source: Option<PathBuf>,
    /// Line buffer capacity in bytes
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,
    /// Decoder-specific configuration (dynamic)
    #[serde(default = "default_stream_config")]
    pub config: toml::Value,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_epoch_interval() -> f64 {
    DEFAULT_EPOCH_INTERVAL_S
}

fn default_tolerance() -> f64 {
    DEFAULT_TOLERANCE_S
}

fn default_kind() -> ObservationKind {
    ObservationKind::Odometer
}

fn default_enabled() -> bool {
    true
}

fn default_buffer_capacity() -> usize {
    DEFAULT_BUFFER_CAPACITY
}

fn default_stream_config() -> toml::Value {
    toml::Value::Table(toml::map::Map::new())
}

impl NavConfig {
    /// Load configuration from a TOML file merged with `NAV_` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`NavError::Config`] if the sources cannot be parsed or required
    /// fields are missing.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("NAV_").split("__"))
            .extract()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string, without environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`NavError::Config`] if the string is not valid configuration.
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let config = Figment::new().merge(Toml::string(toml)).extract()?;
        Ok(config)
    }

    /// Validate configuration after loading.
    ///
    /// # Errors
    ///
    /// Returns [`NavError::Configuration`] naming the first invalid value.
    pub fn validate(&self) -> Result<()> {
        if !VALID_LOG_LEVELS.contains(&self.application.log_level.to_lowercase().as_str()) {
            return Err(NavError::configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                VALID_LOG_LEVELS.join(", ")
            )));
        }

        let estimator = &self.estimator;
        if !(estimator.epoch_interval_s.is_finite() && estimator.epoch_interval_s > 0.0) {
            return Err(NavError::configuration(format!(
                "epoch_interval_s must be positive, got {}",
                estimator.epoch_interval_s
            )));
        }
        if !(estimator.tolerance_s.is_finite() && estimator.tolerance_s >= 0.0) {
            return Err(NavError::configuration(format!(
                "tolerance_s must be non-negative, got {}",
                estimator.tolerance_s
            )));
        }

        let mut ids = HashSet::new();
        for stream in &self.streams {
            if !ids.insert(stream.id.as_str()) {
                return Err(NavError::configuration(format!(
                    "Duplicate stream ID: {}",
                    stream.id
                )));
            }
            if stream.buffer_capacity == 0 || stream.buffer_capacity > MAX_BUFFER_CAPACITY {
                return Err(NavError::configuration(format!(
                    "Stream '{}': buffer_capacity {} out of range (1-{})",
                    stream.id, stream.buffer_capacity, MAX_BUFFER_CAPACITY
                )));
            }
        }

        Ok(())
    }

    /// Get all enabled streams
    #[must_use]
    pub fn enabled_streams(&self) -> Vec<&StreamDefinition> {
        self.streams.iter().filter(|s| s.enabled).collect()
    }
}
