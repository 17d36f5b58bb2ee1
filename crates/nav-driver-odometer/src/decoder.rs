//! Incremental odometer stream decoder.
//!
//! Protocol Overview:
//! - ASCII, one record per `\n`-terminated line (`\r\n` tolerated)
//! - Lines starting with `#` (comment) or `T` (header echo) are skipped
//! - `,` `*` `;` are field delimiters equivalent to whitespace
//! - No stream header; the header phase completes immediately
//!
//! Each decoded record is calibrated and broadcast as
//! `(timestamp, -calibrated_value)` to every odometer sink.
//!
//! # Locking
//!
//! All mutable state sits behind one `parking_lot::Mutex`. Each public entry
//! point locks it exactly once and hands the guard's contents to helpers that
//! never lock again, so every exit path (success, malformed line, overflow)
//! releases it by dropping the guard.
//!
//! # Usage
//!
//! ```rust
//! use nav_core::{ObservationKind, ObservationStore, SinkSet, StreamDecoder};
//! use nav_driver_odometer::{CalibrationParams, OdometerDecoder, WireFormat};
//!
//! let store = ObservationStore::shared();
//! let sinks = SinkSet::new().with(ObservationKind::Odometer, store.clone());
//! let params = CalibrationParams::new(1.0, WireFormat::Velocity, 1.0, 1.0);
//! let decoder = OdometerDecoder::new("odo", params, sinks);
//!
//! decoder.decode_header(b"").unwrap();
//! decoder.decode_body(b"10.0 2.5\n11.0 2").unwrap();
//! assert_eq!(decoder.records_decoded(), 1);
//!
//! decoder.decode_body(b".75\n").unwrap();
//! assert_eq!(store.read().len(), 2);
//! ```

use nav_core::limits::DEFAULT_BUFFER_CAPACITY;
use nav_core::{
    BodyStatus, DecoderPhase, HeaderStatus, LineBuffer, NavError, Observation, ObservationKind,
    Result, SinkSet, StreamDecoder,
};
use parking_lot::Mutex;

use crate::calibration::{CalibrationParams, ParseFailurePolicy, WireFormat};
use crate::format::{is_skippable, normalize_delimiters, tokenize, RecordFields};

/// Mutable decoder state guarded by the decoder lock.
#[derive(Debug)]
struct DecoderState {
    buffer: LineBuffer,
    phase: DecoderPhase,
    records: u64,
}

/// What happened to one line.
enum LineOutcome {
    Skipped,
    Record,
    Malformed(NavError),
}

/// Decoder for one odometer stream.
#[derive(Debug)]
pub struct OdometerDecoder {
    stream_id: String,
    params: CalibrationParams,
    policy: ParseFailurePolicy,
    sinks: SinkSet,
    state: Mutex<DecoderState>,
}

impl OdometerDecoder {
    /// Creates a decoder with the default buffer capacity and
    /// [`ParseFailurePolicy::Drop`].
    #[must_use]
    pub fn new(stream_id: impl Into<String>, params: CalibrationParams, sinks: SinkSet) -> Self {
        Self::with_capacity(stream_id, params, sinks, DEFAULT_BUFFER_CAPACITY)
    }

    /// Creates a decoder whose line buffer holds at most `capacity` bytes.
    #[must_use]
    pub fn with_capacity(
        stream_id: impl Into<String>,
        params: CalibrationParams,
        sinks: SinkSet,
        capacity: usize,
    ) -> Self {
        let stream_id = stream_id.into();
        if sinks.count_accepting(ObservationKind::Odometer) == 0 {
            tracing::warn!(stream = %stream_id, "Odometer decoder has no odometer sinks");
        }
        Self {
            stream_id,
            params,
            policy: ParseFailurePolicy::default(),
            sinks,
            state: Mutex::new(DecoderState {
                buffer: LineBuffer::new(capacity),
                phase: DecoderPhase::AwaitingHeader,
                records: 0,
            }),
        }
    }

    /// Sets how lines that fail tokenization are handled.
    #[must_use]
    pub fn with_parse_failure_policy(mut self, policy: ParseFailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Calibration in use.
    #[must_use]
    pub const fn params(&self) -> &CalibrationParams {
        &self.params
    }

    /// Policy for malformed lines.
    #[must_use]
    pub const fn parse_failure_policy(&self) -> ParseFailurePolicy {
        self.policy
    }

    /// Bytes buffered but not yet consumed (incomplete trailing record, or
    /// lines left after an early return).
    #[must_use]
    pub fn held_bytes(&self) -> usize {
        self.state.lock().buffer.len()
    }

    /// Classifies, tokenizes, calibrates and broadcasts one line.
    ///
    /// `raw` includes its terminator. Called with the decoder lock held.
    ///
    /// Empty and whitespace-only lines are skipped like comments: they are
    /// neither counted nor reported as malformed, under either
    /// [`ParseFailurePolicy`].
    fn decode_line(&self, raw: &[u8]) -> LineOutcome {
        let line = trim_terminator(raw);
        if is_skippable(line) {
            return LineOutcome::Skipped;
        }

        let text = String::from_utf8_lossy(line);
        if text.trim().is_empty() {
            return LineOutcome::Skipped;
        }

        let mut fields = RecordFields::default();
        let parsed = tokenize(self.params.wire_format, &normalize_delimiters(&text), &mut fields);

        let deliver = parsed.is_ok() || self.policy == ParseFailurePolicy::BroadcastPartial;
        if deliver {
            let value = self.calibrate(&fields);
            self.sinks.broadcast(
                ObservationKind::Odometer,
                Observation::new(fields.timestamp, -value),
            );
        }

        match parsed {
            Ok(()) => LineOutcome::Record,
            Err(reason) => {
                tracing::warn!(
                    stream = %self.stream_id,
                    line = %text,
                    reason = %reason,
                    partial_broadcast = deliver,
                    "Malformed odometer record"
                );
                LineOutcome::Malformed(NavError::malformed(text.into_owned(), reason))
            }
        }
    }

    fn calibrate(&self, fields: &RecordFields) -> f64 {
        match self.params.wire_format {
            WireFormat::Raw | WireFormat::Pulse => {
                self.params.calibrate_pulses(fields.count, fields.flag)
            }
            WireFormat::Velocity => fields.count,
        }
    }

    /// Body loop over every complete line held. Called with the lock held.
    fn drain_lines(&self, state: &mut DecoderState) -> Result<BodyStatus> {
        let mut records = 0usize;
        while let Some(len) = state.buffer.next_line(0) {
            let outcome = self.decode_line(&state.buffer.as_bytes()[..len]);
            state.buffer.consume(len);
            match outcome {
                LineOutcome::Skipped => {}
                LineOutcome::Record => {
                    records += 1;
                    state.records += 1;
                }
                LineOutcome::Malformed(err) => return Err(err),
            }
        }
        if records > 0 {
            tracing::trace!(stream = %self.stream_id, records, "Decoded odometer records");
        }
        Ok(BodyStatus::MoreMayFollow { records })
    }
}

impl StreamDecoder for OdometerDecoder {
    fn stream_id(&self) -> &str {
        &self.stream_id
    }

    fn kind(&self) -> ObservationKind {
        ObservationKind::Odometer
    }

    fn phase(&self) -> DecoderPhase {
        self.state.lock().phase
    }

    fn decode_header(&self, bytes: &[u8]) -> Result<HeaderStatus> {
        let mut state = self.state.lock();
        state.buffer.append(bytes)?;
        if state.phase == DecoderPhase::AwaitingHeader {
            tracing::debug!(stream = %self.stream_id, "Odometer stream has no header");
            state.phase = DecoderPhase::Body;
        }
        Ok(HeaderStatus::Complete { consumed: 0 })
    }

    fn decode_body(&self, bytes: &[u8]) -> Result<BodyStatus> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        state.phase = DecoderPhase::Body;

        if let Err(err) = state.buffer.append(bytes) {
            tracing::error!(stream = %self.stream_id, error = %err, "Odometer stream buffer overflow");
            return Err(err);
        }
        if state.buffer.is_empty() {
            return Ok(BodyStatus::NoProgress);
        }
        self.drain_lines(state)
    }

    fn records_decoded(&self) -> u64 {
        self.state.lock().records
    }

    fn buffer_remaining(&self) -> usize {
        self.state.lock().buffer.remaining()
    }
}

fn trim_terminator(raw: &[u8]) -> &[u8] {
    let line = raw.strip_suffix(b"\n").unwrap_or(raw);
    line.strip_suffix(b"\r").unwrap_or(line)
}
