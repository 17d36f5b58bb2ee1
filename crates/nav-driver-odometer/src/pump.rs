//! Async I/O driver that feeds a byte source into a [`StreamDecoder`].
//!
//! The pump reads chunks of at most `chunk_size` bytes, completes the header
//! phase, then hands every chunk to the body phase. Chunk boundaries carry no
//! meaning; records split across reads are reassembled by the decoder.
//!
//! Error handling follows the decoder contract:
//! - `MalformedRecord`: counted, then the body phase is re-entered with an
//!   empty slice so the lines after the bad one are still decoded
//! - `BufferOverflow` and I/O failures end the run with an error
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn demo() -> nav_core::Result<()> {
//! use std::sync::Arc;
//! use nav_core::{ObservationKind, ObservationStore, SinkSet};
//! use nav_driver_odometer::{CalibrationParams, OdometerDecoder, StreamPump, WireFormat};
//!
//! let store = ObservationStore::shared();
//! let sinks = SinkSet::new().with(ObservationKind::Odometer, store.clone());
//! let params = CalibrationParams::new(1.0, WireFormat::Velocity, 1.0, 1.0);
//! let decoder = Arc::new(OdometerDecoder::new("odo", params, sinks));
//!
//! let file = tokio::fs::File::open("odo.log").await?;
//! let stats = StreamPump::new(decoder).run(file).await?;
//! println!("{} records", stats.records);
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use nav_core::limits::{READ_CHUNK_SIZE, READ_STALL_WARNING};
use nav_core::{DecoderPhase, HeaderStatus, Result, StreamDecoder};
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Counters for one pump run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PumpStats {
    /// Non-empty reads delivered to the decoder.
    pub chunks: u64,
    /// Bytes delivered.
    pub bytes: u64,
    /// Records decoded during the run.
    pub records: u64,
    /// Malformed lines reported by the decoder.
    pub malformed: u64,
}

/// Drives one decoder from one byte source.
pub struct StreamPump<D: StreamDecoder + ?Sized> {
    decoder: Arc<D>,
    chunk_size: usize,
    stall_warning: Duration,
}

impl<D: StreamDecoder + ?Sized> StreamPump<D> {
    /// Creates a pump with the default chunk size and stall warning.
    #[must_use]
    pub fn new(decoder: Arc<D>) -> Self {
        Self {
            decoder,
            chunk_size: READ_CHUNK_SIZE,
            stall_warning: READ_STALL_WARNING,
        }
    }

    /// Sets the maximum bytes per read.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Sets how long a read may wait before a stall warning is logged.
    #[must_use]
    pub const fn with_stall_warning(mut self, stall_warning: Duration) -> Self {
        self.stall_warning = stall_warning;
        self
    }

    /// The decoder being driven.
    #[must_use]
    pub fn decoder(&self) -> &Arc<D> {
        &self.decoder
    }

    /// Reads `reader` to EOF, delivering every chunk to the decoder.
    ///
    /// # Errors
    ///
    /// Returns [`nav_core::NavError::BufferOverflow`] or
    /// [`nav_core::NavError::Io`]; counters up to that point are logged.
    pub async fn run<R: AsyncRead + Unpin>(&self, reader: R) -> Result<PumpStats> {
        self.run_until(reader, std::future::pending()).await
    }

    /// Like [`Self::run`], but also ends cleanly when `stop` completes.
    ///
    /// Used for live sources that never reach EOF. The counters gathered up
    /// to the stop are returned.
    ///
    /// # Errors
    ///
    /// Same as [`Self::run`].
    pub async fn run_until<R, F>(&self, mut reader: R, stop: F) -> Result<PumpStats>
    where
        R: AsyncRead + Unpin,
        F: Future<Output = ()>,
    {
        let stream = self.decoder.stream_id().to_string();
        let records_at_start = self.decoder.records_decoded();
        let mut stats = PumpStats::default();
        let mut chunk = vec![0u8; self.chunk_size];
        let mut stop = std::pin::pin!(stop);

        tracing::debug!(stream = %stream, chunk_size = self.chunk_size, "Stream pump started");

        let outcome = loop {
            // Never read more than the decoder can hold. With no room left the
            // held bytes are a record longer than the buffer, and the one-byte
            // read surfaces the overflow.
            let want = self.chunk_size.min(self.decoder.buffer_remaining()).max(1);
            let read = tokio::time::timeout(self.stall_warning, reader.read(&mut chunk[..want]));
            let n = tokio::select! {
                biased;
                () = &mut stop => {
                    tracing::info!(stream = %stream, "Stream pump stopped on request");
                    break Ok(());
                }
                res = read => match res {
                    Err(_) => {
                        tracing::warn!(
                            stream = %stream,
                            waited = ?self.stall_warning,
                            "No data from stream source"
                        );
                        continue;
                    }
                    Ok(Ok(n)) => n,
                    Ok(Err(e)) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Ok(Err(e)) => break Err(e.into()),
                },
            };
            if n == 0 {
                break Ok(());
            }

            stats.chunks += 1;
            stats.bytes += n as u64;
            if let Err(e) = self.deliver(&chunk[..n], &mut stats) {
                break Err(e);
            }
        };

        stats.records = self.decoder.records_decoded() - records_at_start;
        match outcome {
            Ok(()) => {
                tracing::info!(
                    stream = %stream,
                    chunks = stats.chunks,
                    bytes = stats.bytes,
                    records = stats.records,
                    malformed = stats.malformed,
                    "Stream source finished"
                );
                Ok(stats)
            }
            Err(e) => {
                tracing::error!(
                    stream = %stream,
                    error = %e,
                    records = stats.records,
                    "Stream pump stopped"
                );
                Err(e)
            }
        }
    }

    /// Hands one chunk to the decoder.
    fn deliver(&self, bytes: &[u8], stats: &mut PumpStats) -> Result<()> {
        let mut pending = bytes;
        if self.decoder.phase() == DecoderPhase::AwaitingHeader {
            match self.decoder.decode_header(pending)? {
                HeaderStatus::NeedMore => return Ok(()),
                HeaderStatus::Complete { consumed } => {
                    tracing::debug!(stream = self.decoder.stream_id(), consumed, "Header complete");
                }
            }
            // The header call buffered the chunk; the body continues from there.
            pending = &[];
        }

        loop {
            match self.decoder.decode_body(pending) {
                Ok(_) => return Ok(()),
                Err(e) if e.is_recoverable() => {
                    stats.malformed += 1;
                    pending = &[];
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::{CalibrationParams, WireFormat};
    use crate::decoder::OdometerDecoder;
    use nav_core::{NavError, ObservationKind, ObservationStore, SharedStore, SinkSet};
    use tokio::io::AsyncWriteExt;
    use tracing_test::traced_test;

    fn velocity_decoder(capacity: usize) -> (Arc<OdometerDecoder>, SharedStore) {
        let store = ObservationStore::shared();
        let sinks = SinkSet::new().with(ObservationKind::Odometer, store.clone());
        let params = CalibrationParams::new(1.0, WireFormat::Velocity, 1.0, 1.0);
        let decoder = OdometerDecoder::with_capacity("pump", params, sinks, capacity);
        (Arc::new(decoder), store)
    }

    #[tokio::test]
    async fn pumps_small_chunks_to_eof() {
        let (decoder, store) = velocity_decoder(64);
        let input: &[u8] = b"# log\n1.0 1.5\n2.0 2.5\n3.0 3.5\n";

        let stats = StreamPump::new(decoder.clone())
            .with_chunk_size(3)
            .run(input)
            .await
            .unwrap();

        assert_eq!(stats.bytes, input.len() as u64);
        assert_eq!(stats.chunks, input.len().div_ceil(3) as u64);
        assert_eq!(stats.records, 3);
        assert_eq!(stats.malformed, 0);
        assert_eq!(decoder.phase(), DecoderPhase::Body);
        assert_eq!(store.read().len(), 3);
    }

    #[tokio::test]
    async fn malformed_lines_are_counted_and_skipped() {
        let (decoder, store) = velocity_decoder(256);
        let input: &[u8] = b"1.0 1.0\nabc\n2.0 2.0\nxyz\n3.0 3.0\n";

        let stats = StreamPump::new(decoder).run(input).await.unwrap();
        assert_eq!(stats.malformed, 2);
        assert_eq!(stats.records, 3);
        assert_eq!(stats.chunks, 1);
        assert_eq!(store.read().len(), 3);
    }

    #[tokio::test]
    async fn overflow_stops_the_pump() {
        let (decoder, _) = velocity_decoder(8);
        let input: &[u8] = b"1.0 1.0\n123456789012345";

        let err = StreamPump::new(decoder.clone())
            .with_chunk_size(4)
            .run(input)
            .await
            .unwrap_err();
        assert!(matches!(err, NavError::BufferOverflow { capacity: 8, .. }));
        assert_eq!(decoder.records_decoded(), 1);
    }

    #[tokio::test]
    async fn reads_are_sized_to_a_small_buffer() {
        let (decoder, store) = velocity_decoder(128);
        let input: String = (0..40).map(|i| format!("{}.0 1.25\n", i)).collect();
        assert!(input.len() > 128);

        let stats = StreamPump::new(decoder.clone())
            .run(input.as_bytes())
            .await
            .unwrap();

        assert_eq!(stats.records, 40);
        assert_eq!(stats.bytes, input.len() as u64);
        assert!(stats.chunks > 1);
        assert_eq!(store.read().len(), 40);
        assert_eq!(decoder.held_bytes(), 0);
    }

    #[tokio::test]
    async fn record_longer_than_buffer_still_overflows() {
        let (decoder, store) = velocity_decoder(16);
        let input: &[u8] = b"1.0 1.0\n2.0 22222222222222222222\n3.0 3.0\n";

        let err = StreamPump::new(decoder).run(input).await.unwrap_err();
        assert!(matches!(err, NavError::BufferOverflow { capacity: 16, attempted: 17 }));
        assert_eq!(store.read().len(), 1);
    }

    #[tokio::test]
    async fn stop_signal_keeps_counters() {
        let (decoder, store) = velocity_decoder(256);
        let (mut tx, rx) = tokio::io::duplex(64);
        tx.write_all(b"1.0 1.0\nbad\n2.0 2.0\n").await.unwrap();

        // The writer stays open, so only the stop signal ends the run.
        let stats = StreamPump::new(decoder)
            .run_until(rx, tokio::time::sleep(Duration::from_millis(50)))
            .await
            .unwrap();
        drop(tx);

        assert_eq!(stats.records, 2);
        assert_eq!(stats.malformed, 1);
        assert_eq!(stats.bytes, 20);
        assert!(stats.chunks >= 1);
        assert_eq!(store.read().len(), 2);
    }

    #[tokio::test]
    async fn io_error_stops_the_pump() {
        let (decoder, store) = velocity_decoder(64);
        let reader = tokio_test::io::Builder::new()
            .read(b"1.0 1.0\n2.0 ")
            .read(b"2.0\n")
            .read_error(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "link down"))
            .build();

        let err = StreamPump::new(decoder).run(reader).await.unwrap_err();
        assert!(matches!(err, NavError::Io(_)));
        assert_eq!(store.read().len(), 2);
    }

    #[tokio::test]
    async fn trailing_partial_record_is_not_decoded() {
        let (decoder, store) = velocity_decoder(64);
        let stats = StreamPump::new(decoder.clone())
            .run(&b"1.0 1.0\n2.0 2."[..])
            .await
            .unwrap();
        assert_eq!(stats.records, 1);
        assert_eq!(decoder.held_bytes(), 6);
        assert_eq!(store.read().len(), 1);
    }

    #[tokio::test]
    async fn duplex_source_with_writer_task() {
        let (decoder, store) = velocity_decoder(64);
        let (mut tx, rx) = tokio::io::duplex(16);

        let writer = tokio::spawn(async move {
            for i in 0..20 {
                let line = format!("{}.0 {}.25\n", i, i);
                tx.write_all(line.as_bytes()).await.unwrap();
            }
        });

        let stats = StreamPump::new(decoder).run(rx).await.unwrap();
        writer.await.unwrap();

        assert_eq!(stats.records, 20);
        let mut guard = store.write();
        assert_eq!(guard.load(7.0, 0.0), Some(-7.25));
        assert_eq!(guard.latest_time(), 19.0);
    }

    #[tokio::test]
    #[traced_test]
    async fn stalled_source_is_reported() {
        let (decoder, _) = velocity_decoder(64);
        let (mut tx, rx) = tokio::io::duplex(16);

        let writer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            tx.write_all(b"1.0 1.0\n").await.unwrap();
        });

        let stats = StreamPump::new(decoder)
            .with_stall_warning(Duration::from_millis(20))
            .run(rx)
            .await
            .unwrap();
        writer.await.unwrap();

        assert_eq!(stats.records, 1);
        assert!(logs_contain("No data from stream source"));
    }
}
