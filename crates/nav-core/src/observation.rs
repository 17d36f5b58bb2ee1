//! Scalar observations and the kinds of sensor stream that produce them.

use serde::{Deserialize, Serialize};

/// One calibrated scalar measurement.
///
/// `timestamp` is GNSS seconds-of-week including the fractional part.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Seconds of week.
    pub timestamp: f64,
    /// Calibrated physical quantity.
    pub value: f64,
}

impl Observation {
    /// Creates an observation.
    #[must_use]
    pub const fn new(timestamp: f64, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// The kind of observation a decoder produces and a sink accepts.
///
/// Broadcast is routed by comparing kinds, so one decoder never feeds a
/// store registered for a different sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationKind {
    /// Wheel odometer speed.
    Odometer,
    /// GNSS epoch derived scalar.
    Gnss,
    /// Inertial sample derived scalar.
    Inertial,
}

impl std::fmt::Display for ObservationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ObservationKind::Odometer => "odometer",
            ObservationKind::Gnss => "gnss",
            ObservationKind::Inertial => "inertial",
        };
        write!(f, "{}", label)
    }
}
