//! Odometer calibration parameters and their configuration.
//!
//! Configuration (`[streams.config]` of an odometer stream):
//!
//! ```toml
//! wheel_radius_m = 0.5      # scale factor = radius * 2π
//! format = "Pulse"          # "Raw" | "Pulse" | "Velocity"
//! time_scale = 1.0          # divisor applied to raw pulse counts
//! orientation = "Right"     # "Right" => +1, anything else => -1
//! parse_failure_policy = "drop"
//! ```

use std::f64::consts::TAU;
use std::str::FromStr;

use nav_core::{NavError, Result};
use serde::{Deserialize, Serialize};

/// Wire format of an odometer record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WireFormat {
    /// Full receiver log line; count and direction flag near the end.
    Raw,
    /// `<timestamp> <raw_count> <ignored> <flag>`
    Pulse,
    /// `<timestamp> <value>`, already calibrated.
    Velocity,
}

impl FromStr for WireFormat {
    type Err = NavError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Raw" => Ok(Self::Raw),
            "Pulse" => Ok(Self::Pulse),
            "Velocity" => Ok(Self::Velocity),
            other => Err(NavError::configuration(format!(
                "Unknown odometer format '{}'. Must be one of: Raw, Pulse, Velocity",
                other
            ))),
        }
    }
}

/// Mounting side of the odometer.
///
/// Only the exact setting `"Right"` maps to [`Orientation::Right`]; every
/// other value is treated as [`Orientation::Left`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Orientation {
    /// Sign +1.
    Right,
    /// Sign -1.
    Left,
}

impl Orientation {
    /// Sign applied to forward motion.
    #[must_use]
    pub const fn sign(self) -> f64 {
        match self {
            Orientation::Right => 1.0,
            Orientation::Left => -1.0,
        }
    }
}

impl From<String> for Orientation {
    fn from(setting: String) -> Self {
        if setting == "Right" {
            Orientation::Right
        } else {
            Orientation::Left
        }
    }
}

impl From<Orientation> for String {
    fn from(orientation: Orientation) -> Self {
        match orientation {
            Orientation::Right => "Right".to_string(),
            Orientation::Left => "Left".to_string(),
        }
    }
}

/// What to do with a line that fails tokenization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseFailurePolicy {
    /// Report the line and deliver nothing.
    #[default]
    Drop,
    /// Deliver whatever was parsed before the failure, then report the line.
    ///
    /// Fields that were not reached keep their zero defaults. This matches
    /// legacy receivers that broadcast before validating.
    BroadcastPartial,
}

/// Odometer section of a stream definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OdometerConfig {
    /// Wheel radius in metres
    pub wheel_radius_m: f64,
    /// Wire format of the records
    pub format: WireFormat,
    /// Divisor applied to raw pulse counts
    #[serde(default = "default_time_scale")]
    pub time_scale: f64,
    /// Mounting side
    #[serde(default = "default_orientation")]
    pub orientation: Orientation,
    /// Handling of malformed lines
    #[serde(default)]
    pub parse_failure_policy: ParseFailurePolicy,
}

fn default_time_scale() -> f64 {
    1.0
}

fn default_orientation() -> Orientation {
    Orientation::Right
}

impl OdometerConfig {
    /// Deserialize from the dynamic `config` table of a stream definition.
    ///
    /// # Errors
    ///
    /// Returns [`NavError::Configuration`] if fields are missing or mistyped.
    pub fn from_value(value: &toml::Value) -> Result<Self> {
        value
            .clone()
            .try_into()
            .map_err(|e| NavError::configuration(format!("Invalid odometer config: {}", e)))
    }

    /// Semantic checks on the parsed values.
    ///
    /// # Errors
    ///
    /// Returns [`NavError::Configuration`] for a non-positive radius or time scale.
    pub fn validate(&self) -> Result<()> {
        if !(self.wheel_radius_m.is_finite() && self.wheel_radius_m > 0.0) {
            return Err(NavError::configuration(format!(
                "wheel_radius_m must be positive, got {}",
                self.wheel_radius_m
            )));
        }
        if !(self.time_scale.is_finite() && self.time_scale > 0.0) {
            return Err(NavError::configuration(format!(
                "time_scale must be positive, got {}",
                self.time_scale
            )));
        }
        Ok(())
    }
}

/// Calibration applied by one decoder. Fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationParams {
    /// Distance per raw count unit (wheel radius × 2π).
    pub scale_factor: f64,
    /// Wire format being decoded.
    pub wire_format: WireFormat,
    /// Divisor applied to raw pulse counts.
    pub time_scale: f64,
    /// +1 or -1 from the mounting orientation.
    pub sign: f64,
}

impl CalibrationParams {
    /// Creates parameters directly.
    #[must_use]
    pub const fn new(scale_factor: f64, wire_format: WireFormat, time_scale: f64, sign: f64) -> Self {
        Self {
            scale_factor,
            wire_format,
            time_scale,
            sign,
        }
    }

    /// Derives parameters from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`NavError::Configuration`] if the configuration is invalid.
    pub fn from_config(config: &OdometerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(
            config.wheel_radius_m * TAU,
            config.format,
            config.time_scale,
            config.orientation.sign(),
        ))
    }

    /// Converts a raw pulse count and direction flag into a speed.
    ///
    /// A zero flag means forward motion; any other value reverses the sign.
    #[must_use]
    pub fn calibrate_pulses(&self, raw_count: f64, flag: i64) -> f64 {
        let direction = if flag == 0 { self.sign } else { -self.sign };
        raw_count * self.scale_factor * direction / self.time_scale
    }
}
