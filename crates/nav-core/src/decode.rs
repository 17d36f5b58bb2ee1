//! Two-phase decode contract shared by all sensor stream decoders.
//!
//! Every stream goes through a header phase followed by a body phase that is
//! re-entered on each delivery of new bytes. Streams without a header (the
//! odometer formats) still implement [`StreamDecoder::decode_header`] so the
//! stream pump can drive every decoder through the same loop.

use std::sync::Arc;

use crate::config::StreamDefinition;
use crate::error::Result;
use crate::observation::ObservationKind;
use crate::sink::SinkSet;

/// Outcome of a header decode call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderStatus {
    /// Header phase finished; `consumed` bytes belonged to the header.
    Complete {
        /// Bytes consumed by the header itself.
        consumed: usize,
    },
    /// The header is not complete yet; deliver more bytes.
    NeedMore,
}

/// Outcome of a body decode call that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyStatus {
    /// No bytes were held; nothing was done.
    NoProgress,
    /// All complete lines were processed. More may follow with the next chunk.
    MoreMayFollow {
        /// Records decoded during this call.
        records: usize,
    },
}

/// Decoder phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecoderPhase {
    /// Waiting for the header phase to complete.
    #[default]
    AwaitingHeader,
    /// Decoding records.
    Body,
}

/// A stateful decoder for one sensor stream.
///
/// Implementations serialize their own calls: two deliveries for the same
/// stream never interleave, so the trait takes `&self`.
pub trait StreamDecoder: Send + Sync {
    /// Identifier of the stream this decoder is bound to.
    fn stream_id(&self) -> &str;

    /// Kind of observation the decoder broadcasts.
    fn kind(&self) -> ObservationKind;

    /// Current phase.
    fn phase(&self) -> DecoderPhase;

    /// Runs the header phase over newly delivered bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes cannot be buffered or the header is invalid.
    fn decode_header(&self, bytes: &[u8]) -> Result<HeaderStatus>;

    /// Runs the body phase over newly delivered bytes.
    ///
    /// # Errors
    ///
    /// Returns [`crate::NavError::BufferOverflow`] if the bytes cannot be
    /// buffered, or [`crate::NavError::MalformedRecord`] when a line fails to
    /// parse. After a malformed record the decoder is still usable.
    fn decode_body(&self, bytes: &[u8]) -> Result<BodyStatus>;

    /// Total records decoded since construction.
    fn records_decoded(&self) -> u64;

    /// Bytes the decoder can accept before its next delivery overflows.
    ///
    /// Readers size their reads with this so a chunk never overflows a
    /// buffer that still has room for whole records.
    fn buffer_remaining(&self) -> usize {
        usize::MAX
    }
}

/// Builds decoders from stream definitions.
///
/// One factory exists per decoder type; the `type` field of a
/// [`StreamDefinition`] selects it.
pub trait DecoderFactory: Send + Sync {
    /// Value of [`StreamDefinition::r#type`] handled by this factory.
    fn driver_type(&self) -> &'static str;

    /// Human-readable name.
    fn name(&self) -> &'static str;

    /// Checks the decoder-specific configuration without building anything.
    ///
    /// # Errors
    ///
    /// Returns [`crate::NavError::Configuration`] describing the invalid setting.
    fn validate(&self, definition: &StreamDefinition) -> Result<()>;

    /// Builds a decoder that broadcasts into `sinks`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::NavError::Configuration`] if the definition is invalid.
    fn build(&self, definition: &StreamDefinition, sinks: SinkSet)
        -> Result<Arc<dyn StreamDecoder>>;
}
