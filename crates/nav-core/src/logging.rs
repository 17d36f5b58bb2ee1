//! Tracing setup for the ingestion pipeline.
//!
//! One `tracing-subscriber` fmt layer writing to stderr, filtered by
//! `RUST_LOG` when set and by `application.log_level` otherwise. Stdout is
//! left to the binaries' data output.
//!
//! Malformed-record diagnostics are emitted at WARN with the offending line
//! in the `line` field, so they survive the default `info` filter.
//!
//! # Example
//! ```no_run
//! use nav_core::{config::NavConfig, logging};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = NavConfig::load_from("config/nav.toml")?;
//! logging::init_from_config(&config)?;
//! tracing::info!("pipeline starting");
//! # Ok(())
//! # }
//! ```

use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

use crate::config::NavConfig;
use crate::error::{NavError, Result};

/// Log line layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Multi-line, for reading at a terminal.
    Pretty,
    /// One line per event.
    #[default]
    Compact,
    /// One JSON object per event.
    Json,
}

impl FromStr for OutputFormat {
    type Err = NavError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(NavError::configuration(format!(
                "Unknown log format '{}' (expected pretty, compact or json)",
                other
            ))),
        }
    }
}

/// Subscriber options.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Fallback level when `RUST_LOG` is unset.
    pub level: Level,
    /// Line layout.
    pub format: OutputFormat,
    /// Colors in pretty output. Compact and JSON output never carry ANSI codes.
    pub ansi: bool,
    /// Print the emitting module (`nav_driver_odometer::decoder`, ...).
    pub show_targets: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: OutputFormat::default(),
            ansi: true,
            show_targets: true,
        }
    }
}

impl TracingConfig {
    /// Defaults with the given fallback level.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self {
            level,
            ..Self::default()
        }
    }

    /// Takes the level from `application.log_level`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured level is not a tracing level.
    pub fn from_nav_config(config: &NavConfig) -> Result<Self> {
        Ok(Self::new(parse_log_level(&config.application.log_level)?))
    }

    /// Sets the line layout.
    #[must_use]
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Enables or disables colors in pretty output.
    #[must_use]
    pub fn with_ansi(mut self, ansi: bool) -> Self {
        self.ansi = ansi;
        self
    }

    /// Shows or hides the emitting module on each event.
    #[must_use]
    pub fn with_targets(mut self, show_targets: bool) -> Self {
        self.show_targets = show_targets;
        self
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.level.as_str().to_ascii_lowercase()))
    }

    fn fmt_layer(&self) -> Box<dyn Layer<Registry> + Send + Sync> {
        let base = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(self.show_targets);
        match self.format {
            OutputFormat::Pretty => base.pretty().with_ansi(self.ansi).boxed(),
            OutputFormat::Compact => base.compact().with_ansi(false).boxed(),
            OutputFormat::Json => base.json().with_ansi(false).boxed(),
        }
    }
}

/// [`init`] with options taken from the application configuration.
///
/// # Errors
///
/// See [`TracingConfig::from_nav_config`] and [`init`].
pub fn init_from_config(config: &NavConfig) -> Result<()> {
    init(TracingConfig::from_nav_config(config)?)
}

/// Installs the global subscriber.
///
/// Returns `Ok(())` without changes when a global subscriber is already set,
/// so tests and embedding binaries may call it repeatedly.
///
/// # Errors
///
/// Returns [`NavError::Configuration`] if installation fails for any other
/// reason.
pub fn init(config: TracingConfig) -> Result<()> {
    let layer = config.fmt_layer().with_filter(config.filter());
    match tracing_subscriber::registry().with(layer).try_init() {
        Ok(()) => Ok(()),
        Err(e) if e.to_string().contains("already been set") => Ok(()),
        Err(e) => Err(NavError::configuration(format!(
            "Failed to install tracing subscriber: {}",
            e
        ))),
    }
}

/// Parses `trace`, `debug`, `info`, `warn` or `error`, in any case.
///
/// # Errors
///
/// Returns [`NavError::Configuration`] for anything else.
pub fn parse_log_level(level: &str) -> Result<Level> {
    Level::from_str(level.trim()).map_err(|_| {
        NavError::configuration(format!(
            "Unknown log level '{}' (expected trace, debug, info, warn or error)",
            level
        ))
    })
}
