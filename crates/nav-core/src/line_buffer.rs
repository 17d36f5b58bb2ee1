//! Bounded byte buffer with line extraction.
//!
//! Raw bytes arrive from the I/O layer in chunks that have no relation to
//! record boundaries. [`LineBuffer`] accumulates them, hands out complete
//! `\n`-terminated lines, and keeps any partial tail until the next append.
//!
//! # Example
//!
//! ```
//! use nav_core::line_buffer::LineBuffer;
//!
//! let mut buffer = LineBuffer::new(1024);
//! buffer.append(b"100.0 50 0 0\n100.").unwrap();
//!
//! let len = buffer.next_line(0).unwrap();
//! assert_eq!(&buffer.as_bytes()[..len], b"100.0 50 0 0\n");
//! buffer.consume(len);
//!
//! // The partial record waits for more bytes.
//! assert!(buffer.next_line(0).is_none());
//! buffer.append(b"1 50 0 0\n").unwrap();
//! assert_eq!(buffer.next_line(0), Some(b"100.1 50 0 0\n".len()));
//! ```

use bytes::{Buf, BytesMut};

use crate::error::{NavError, Result};

/// Line terminator recognized by [`LineBuffer::next_line`].
pub const LINE_TERMINATOR: u8 = b'\n';

/// Accumulates raw bytes up to a fixed capacity and extracts complete lines.
#[derive(Debug)]
pub struct LineBuffer {
    capacity: usize,
    held: BytesMut,
}

impl LineBuffer {
    /// Creates an empty buffer that will hold at most `capacity` bytes.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            held: BytesMut::with_capacity(capacity.min(crate::limits::READ_CHUNK_SIZE)),
        }
    }

    /// Maximum number of bytes the buffer may hold.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of unconsumed bytes currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.held.len()
    }

    /// Bytes that can still be appended without overflowing.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.capacity.saturating_sub(self.held.len())
    }

    /// Returns true if no bytes are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }

    /// The unconsumed bytes, oldest first.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.held
    }

    /// Appends newly arrived bytes.
    ///
    /// # Errors
    ///
    /// Returns [`NavError::BufferOverflow`] if the held bytes plus `bytes`
    /// would exceed the capacity. Nothing is appended in that case and the
    /// bytes already held are left untouched.
    pub fn append(&mut self, bytes: &[u8]) -> Result<()> {
        let attempted = self.held.len().saturating_add(bytes.len());
        if attempted > self.capacity {
            return Err(NavError::buffer_overflow(self.capacity, attempted));
        }
        self.held.extend_from_slice(bytes);
        Ok(())
    }

    /// Looks for a line terminator at or after `search_offset`.
    ///
    /// Returns the length of the line measured from the front of the buffer,
    /// including its terminator, or `None` if no complete line is held yet.
    #[must_use]
    pub fn next_line(&self, search_offset: usize) -> Option<usize> {
        let tail = self.held.get(search_offset..)?;
        tail.iter()
            .position(|&b| b == LINE_TERMINATOR)
            .map(|pos| search_offset + pos + 1)
    }

    /// Removes the first `n` bytes, keeping the remainder at the front.
    ///
    /// Consuming more than is held empties the buffer.
    pub fn consume(&mut self, n: usize) {
        let n = n.min(self.held.len());
        self.held.advance(n);
    }

    /// Drops all held bytes.
    pub fn clear(&mut self) {
        self.held.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_within_capacity() {
        let mut buffer = LineBuffer::new(16);
        buffer.append(b"0123456789").unwrap();
        assert_eq!(buffer.len(), 10);
        buffer.append(b"abcdef").unwrap();
        assert_eq!(buffer.len(), 16);
    }

    #[test]
    fn append_overflow_keeps_existing_bytes() {
        let mut buffer = LineBuffer::new(8);
        buffer.append(b"12345").unwrap();

        let err = buffer.append(b"6789").unwrap_err();
        assert!(matches!(
            err,
            NavError::BufferOverflow {
                capacity: 8,
                attempted: 9
            }
        ));
        assert_eq!(buffer.as_bytes(), b"12345");
    }

    #[test]
    fn next_line_without_terminator() {
        let mut buffer = LineBuffer::new(64);
        buffer.append(b"100.0 50").unwrap();
        assert_eq!(buffer.next_line(0), None);
    }

    #[test]
    fn next_line_includes_terminator() {
        let mut buffer = LineBuffer::new(64);
        buffer.append(b"ab\ncd\n").unwrap();
        assert_eq!(buffer.next_line(0), Some(3));
        assert_eq!(buffer.next_line(3), Some(6));
    }

    #[test]
    fn next_line_offset_past_end() {
        let mut buffer = LineBuffer::new(64);
        buffer.append(b"ab\n").unwrap();
        assert_eq!(buffer.next_line(3), None);
        assert_eq!(buffer.next_line(10), None);
    }

    #[test]
    fn consume_preserves_tail_across_appends() {
        let mut buffer = LineBuffer::new(64);
        buffer.append(b"first\nsec").unwrap();

        let len = buffer.next_line(0).unwrap();
        buffer.consume(len);
        assert_eq!(buffer.as_bytes(), b"sec");
        assert_eq!(buffer.next_line(0), None);

        buffer.append(b"ond\n").unwrap();
        let len = buffer.next_line(0).unwrap();
        assert_eq!(&buffer.as_bytes()[..len], b"second\n");
    }

    #[test]
    fn consume_frees_capacity() {
        let mut buffer = LineBuffer::new(6);
        buffer.append(b"abc\nde").unwrap();
        assert!(buffer.append(b"f").is_err());

        buffer.consume(4);
        buffer.append(b"f\n").unwrap();
        assert_eq!(buffer.as_bytes(), b"def\n");
    }

    #[test]
    fn remaining_tracks_appends_and_consumes() {
        let mut buffer = LineBuffer::new(10);
        assert_eq!(buffer.remaining(), 10);
        buffer.append(b"ab\ncd").unwrap();
        assert_eq!(buffer.remaining(), 5);
        buffer.consume(3);
        assert_eq!(buffer.remaining(), 8);
    }

    #[test]
    fn consume_more_than_held() {
        let mut buffer = LineBuffer::new(16);
        buffer.append(b"abc").unwrap();
        buffer.consume(10);
        assert!(buffer.is_empty());
    }
}
