//! [`DecoderFactory`] for odometer streams.
//!
//! ```toml
//! [[streams]]
//! id = "odo"
//! type = "odometer"
//! source = "data/odo.log"
//!
//! [streams.config]
//! wheel_radius_m = 0.5
//! format = "Pulse"
//! ```

use std::sync::Arc;

use nav_core::config::StreamDefinition;
use nav_core::{DecoderFactory, NavError, ObservationKind, Result, SinkSet, StreamDecoder};

use crate::calibration::{CalibrationParams, OdometerConfig};
use crate::decoder::OdometerDecoder;

// =============================================================================
// OdometerFactory - DecoderFactory implementation
// =============================================================================

/// Builds [`OdometerDecoder`]s from `type = "odometer"` stream definitions.
#[derive(Debug, Clone, Copy, Default)]
pub struct OdometerFactory;

impl OdometerFactory {
    fn parse(definition: &StreamDefinition) -> Result<OdometerConfig> {
        if definition.kind != ObservationKind::Odometer {
            return Err(NavError::configuration(format!(
                "Stream '{}': odometer decoder produces odometer observations, not {}",
                definition.id, definition.kind
            )));
        }
        let cfg = OdometerConfig::from_value(&definition.config)?;
        cfg.validate()?;
        Ok(cfg)
    }
}

impl DecoderFactory for OdometerFactory {
    fn driver_type(&self) -> &'static str {
        "odometer"
    }

    fn name(&self) -> &'static str {
        "Wheel Odometer"
    }

    fn validate(&self, definition: &StreamDefinition) -> Result<()> {
        Self::parse(definition).map(|_| ())
    }

    fn build(
        &self,
        definition: &StreamDefinition,
        sinks: SinkSet,
    ) -> Result<Arc<dyn StreamDecoder>> {
        let cfg = Self::parse(definition)?;
        let params = CalibrationParams::from_config(&cfg)?;

        tracing::info!(
            stream = %definition.id,
            format = ?cfg.format,
            scale_factor = params.scale_factor,
            sign = params.sign,
            "Building odometer decoder"
        );

        let decoder = OdometerDecoder::with_capacity(
            definition.id.clone(),
            params,
            sinks,
            definition.buffer_capacity,
        )
        .with_parse_failure_policy(cfg.parse_failure_policy);
        Ok(Arc::new(decoder))
    }
}
