//! Error types for the ingestion pipeline.
//!
//! `NavError` covers everything the decoding side can report. The observation
//! store has no error path: "no data near this time" is a normal negative
//! result, not an error.
//!
//! ## Error Categories
//!
//! - **`BufferOverflow`**: the byte buffer would exceed its configured capacity.
//!   Fatal for the stream; the I/O driver should close or reset it.
//! - **`MalformedRecord`**: a complete line could not be tokenized. Recovered
//!   locally (the line is discarded) but reported with the offending text.
//! - **`Configuration`** / **`Config`**: semantic and parse errors from the
//!   configuration layer.
//! - **`Io`**: failures of the underlying byte source.

use thiserror::Error;

/// Convenience alias for results using the pipeline error type.
pub type Result<T> = std::result::Result<T, NavError>;

/// Primary error type for the ingestion pipeline.
#[derive(Error, Debug)]
pub enum NavError {
    /// Appending a chunk would overflow the stream buffer.
    ///
    /// **Error Type**: Permanent for the stream - unconsumed bytes are never
    /// dropped to make room, so the only recovery is to reset the stream.
    #[error("buffer overflow: capacity {capacity} bytes, attempted to hold {attempted}")]
    BufferOverflow {
        /// Configured buffer capacity in bytes.
        capacity: usize,
        /// Number of bytes the buffer would have held after the append.
        attempted: usize,
    },

    /// A complete line failed tokenization for the active wire format.
    ///
    /// **Error Type**: Transient - the line has already been consumed and the
    /// next `decode_body` call continues with the following line.
    #[error("malformed record ({reason}): {line:?}")]
    MalformedRecord {
        /// The offending line, without its terminator.
        line: String,
        /// Which field failed to parse.
        reason: String,
    },

    /// Configuration values parsed but failed semantic validation.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// Configuration file or environment could not be parsed.
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// Underlying byte source failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl NavError {
    /// Creates a buffer overflow error.
    #[must_use]
    pub const fn buffer_overflow(capacity: usize, attempted: usize) -> Self {
        Self::BufferOverflow {
            capacity,
            attempted,
        }
    }

    /// Creates a malformed record error.
    #[must_use]
    pub fn malformed(line: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            line: line.into(),
            reason: reason.into(),
        }
    }

    /// Creates a configuration validation error.
    #[must_use]
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration(reason.into())
    }

    /// Whether the stream can keep going after this error.
    ///
    /// Only malformed records are recoverable; everything else should stop
    /// the stream that produced it.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::MalformedRecord { .. })
    }
}

impl From<figment::Error> for NavError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}
