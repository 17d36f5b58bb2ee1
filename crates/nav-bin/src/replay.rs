//! Stream ingestion and estimator epoch replay.
//!
//! Ingestion builds one decoder and one store per enabled stream and pumps
//! every source concurrently. The epoch walk then plays the estimator: at each
//! epoch it sweeps every store with `try_consume_near` and, when a sample is
//! available, reads it with `load`.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use nav_core::config::{EstimatorConfig, NavConfig, StreamDefinition};
use nav_core::{
    DecoderFactory, ObservationKind, ObservationStore, SharedStore, SinkSet, StoreStats,
    StreamDecoder,
};
use nav_driver_odometer::{OdometerFactory, PumpStats, StreamPump};
use serde::Serialize;

/// Per-stream outcome of ingestion.
#[derive(Debug, Clone, Serialize)]
pub struct StreamSummary {
    /// Stream identifier
    pub id: String,
    /// Observation kind the stream produced
    pub kind: ObservationKind,
    /// Resolved byte source
    pub source: PathBuf,
    /// Pump counters (absent if the pump failed)
    pub pump: Option<PumpStats>,
    /// Pump failure, if any
    pub error: Option<String>,
    /// Store contents after ingestion, before the epoch walk
    pub store: StoreStats,
}

/// A stream whose source has been pumped into its store.
#[derive(Debug)]
pub struct IngestedStream {
    /// Store the decoder broadcast into
    pub store: SharedStore,
    /// Ingestion outcome
    pub summary: StreamSummary,
}

/// Totals of one epoch walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EpochTotals {
    /// Epochs processed
    pub epochs: u64,
    /// Rows written (one per stream with a value at an epoch)
    pub rows: u64,
}

/// Everything `nav-replay` reports at the end of a run.
#[derive(Debug, Serialize)]
pub struct ReplaySummary {
    /// Application name from the configuration
    pub application: String,
    /// Estimator epoch interval (s)
    pub epoch_interval_s: f64,
    /// Query tolerance (s)
    pub tolerance_s: f64,
    /// Epoch walk totals
    #[serde(flatten)]
    pub totals: EpochTotals,
    /// Per-stream outcomes
    pub streams: Vec<StreamSummary>,
}

/// Decoder factories known to the replay tool.
#[must_use]
pub fn factories() -> Vec<Box<dyn DecoderFactory>> {
    vec![Box::new(OdometerFactory)]
}

/// Checks every enabled stream against its factory without building anything.
///
/// # Errors
///
/// Returns an error naming the first stream with an unknown type or an
/// invalid decoder configuration.
pub fn validate_streams(config: &NavConfig) -> Result<()> {
    let registry = factories();
    for def in config.enabled_streams() {
        factory_for(&registry, def)?
            .validate(def)
            .with_context(|| format!("Stream '{}' is misconfigured", def.id))?;
    }
    Ok(())
}

fn factory_for<'a>(
    registry: &'a [Box<dyn DecoderFactory>],
    def: &StreamDefinition,
) -> Result<&'a dyn DecoderFactory> {
    registry
        .iter()
        .find(|f| f.driver_type() == def.r#type)
        .map(|f| &**f)
        .ok_or_else(|| anyhow!("Stream '{}': unknown stream type '{}'", def.id, def.r#type))
}

fn resolve_source(def: &StreamDefinition, base_dir: &Path) -> Result<PathBuf> {
    let source = def
        .source
        .as_ref()
        .ok_or_else(|| anyhow!("Stream '{}' has no source", def.id))?;
    if source.is_absolute() {
        Ok(source.clone())
    } else {
        Ok(base_dir.join(source))
    }
}

/// Builds decoders and stores for all enabled streams and pumps their sources.
///
/// Relative sources are resolved against `base_dir`. A failing pump is
/// recorded in its summary; the other streams still complete.
///
/// # Errors
///
/// Returns an error for configuration problems (unknown type, missing source,
/// invalid decoder settings) or if a pump task panics.
pub async fn ingest(
    config: &NavConfig,
    base_dir: &Path,
    live_capture: Duration,
) -> Result<Vec<IngestedStream>> {
    let registry = factories();
    let mut pending = Vec::new();

    for def in config.enabled_streams() {
        let factory = factory_for(&registry, def)?;
        let store = ObservationStore::shared();
        let sinks = SinkSet::new().with(def.kind, store.clone());
        let decoder = factory
            .build(def, sinks)
            .with_context(|| format!("Failed to build decoder for stream '{}'", def.id))?;
        let source = resolve_source(def, base_dir)?;

        tracing::info!(stream = %def.id, source = %source.display(), "Ingesting stream");
        let task = tokio::spawn(pump_source(
            decoder,
            source.clone(),
            def.config.clone(),
            live_capture,
        ));
        pending.push((def.id.clone(), def.kind, source, store, task));
    }

    let mut streams = Vec::with_capacity(pending.len());
    for (id, kind, source, store, task) in pending {
        let outcome = task
            .await
            .with_context(|| format!("Pump task for stream '{}' panicked", id))?;
        let (pump, error) = match outcome {
            Ok(stats) => (Some(stats), None),
            Err(e) => {
                tracing::error!(stream = %id, error = %e, "Stream ingestion failed");
                (None, Some(format!("{:#}", e)))
            }
        };
        let stats = store.read().stats();
        streams.push(IngestedStream {
            store,
            summary: StreamSummary {
                id,
                kind,
                source,
                pump,
                error,
                store: stats,
            },
        });
    }
    Ok(streams)
}

#[cfg_attr(not(feature = "serial"), allow(unused_variables))]
async fn pump_source(
    decoder: Arc<dyn StreamDecoder>,
    source: PathBuf,
    stream_config: toml::Value,
    live_capture: Duration,
) -> Result<PumpStats> {
    #[cfg(feature = "serial")]
    {
        if source.starts_with("/dev") {
            return pump_serial(decoder, &source, &stream_config, live_capture).await;
        }
    }

    let file = tokio::fs::File::open(&source)
        .await
        .with_context(|| format!("Failed to open source {}", source.display()))?;
    Ok(StreamPump::new(decoder).run(file).await?)
}

#[cfg(feature = "serial")]
async fn pump_serial(
    decoder: Arc<dyn StreamDecoder>,
    source: &Path,
    stream_config: &toml::Value,
    live_capture: Duration,
) -> Result<PumpStats> {
    use nav_driver_odometer::serial::{open_serial_async, SerialSettings};

    let settings = SerialSettings::from_value(stream_config)?;
    let port_path = source.to_string_lossy();
    let port = open_serial_async(&port_path, settings.baud_rate).await?;

    tracing::info!(port = %port_path, window = ?live_capture, "Capturing from serial port");
    let stats = StreamPump::new(decoder)
        .run_until(port, tokio::time::sleep(live_capture))
        .await?;
    Ok(stats)
}

/// Largest number of epochs a single walk will visit.
pub const MAX_REPLAY_EPOCHS: f64 = 100_000_000.0;

/// Walks estimator epochs over the ingested stores, writing CSV rows.
///
/// Epochs run from the earliest held timestamp to the latest (plus the
/// tolerance) in steps of `epoch_interval_s`. Rows are
/// `epoch,stream,value`, one per stream that has a value at the epoch.
///
/// # Errors
///
/// Returns an error if writing to `out` fails, if the time bounds are not
/// finite, or if the walk would exceed [`MAX_REPLAY_EPOCHS`].
pub fn walk_epochs<W: Write>(
    streams: &[IngestedStream],
    estimator: &EstimatorConfig,
    out: &mut W,
) -> Result<EpochTotals> {
    let tol = estimator.tolerance_s;
    let interval = estimator.epoch_interval_s;
    if !(interval.is_finite() && interval > 0.0) {
        bail!("epoch_interval_s must be positive, got {}", interval);
    }

    writeln!(out, "epoch,stream,value")?;

    let bounds = streams
        .iter()
        .filter_map(|s| {
            let stats = s.summary.store;
            stats.earliest.zip(stats.latest)
        })
        .reduce(|(lo, hi), (e, l)| (lo.min(e), hi.max(l)));
    let Some((start, end)) = bounds else {
        tracing::warn!("No observations ingested; nothing to replay");
        return Ok(EpochTotals::default());
    };

    if !(start.is_finite() && end.is_finite()) {
        bail!("Observation time bounds are not finite: [{}, {}]", start, end);
    }
    let span = (end + tol - start) / interval;
    if !span.is_finite() || span >= MAX_REPLAY_EPOCHS {
        bail!(
            "Replay from {} to {} at {} s would visit {:.0} epochs (limit {})",
            start,
            end,
            interval,
            span,
            MAX_REPLAY_EPOCHS
        );
    }

    let mut totals = EpochTotals::default();
    let mut step: u32 = 0;
    loop {
        let epoch = start + f64::from(step) * interval;
        if epoch > end + tol {
            break;
        }
        for stream in streams {
            let mut store = stream.store.write();
            if !store.try_consume_near(epoch, tol) {
                continue;
            }
            if let Some(value) = store.load(epoch, tol) {
                writeln!(out, "{},{},{}", epoch, stream.summary.id, value)?;
                totals.rows += 1;
            }
        }
        totals.epochs += 1;
        step = step
            .checked_add(1)
            .ok_or_else(|| anyhow!("Too many epochs between {} and {}", start, end))?;
    }

    tracing::info!(epochs = totals.epochs, rows = totals.rows, "Epoch walk complete");
    Ok(totals)
}
