//! Shared defaults and hard limits for stream ingestion.
//!
//! This module centralizes:
//! - Buffer sizing for the per-stream byte buffers
//! - Query tolerances and epoch cadence used by the replay estimator
//! - I/O chunk sizes for the stream pump

use std::time::Duration;

// =============================================================================
// Buffer Limits
// =============================================================================

/// Default byte capacity of a stream's line buffer (64 KiB).
///
/// Odometer records are well under 200 bytes, so this holds hundreds of
/// records of backlog before a stalled decoder overflows.
pub const DEFAULT_BUFFER_CAPACITY: usize = 64 * 1024;

/// Upper bound accepted for a configured buffer capacity (16 MiB).
pub const MAX_BUFFER_CAPACITY: usize = 16 * 1024 * 1024;

/// Size of a single read issued by the stream pump (4 KiB).
pub const READ_CHUNK_SIZE: usize = 4 * 1024;

// =============================================================================
// Query Defaults
// =============================================================================

/// Default half-width of the tolerance window, in seconds.
pub const DEFAULT_TOLERANCE_S: f64 = 0.005;

/// Default interval between estimator epochs during replay, in seconds.
pub const DEFAULT_EPOCH_INTERVAL_S: f64 = 1.0;

/// Timeout for a single read from a live source before the pump logs a stall.
pub const READ_STALL_WARNING: Duration = Duration::from_secs(5);
