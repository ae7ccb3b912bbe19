//! Output buffer with a forward-only match cursor.
//!
//! Everything the child writes is appended here. The cursor marks how much
//! has already been consumed by successful expectations; matching only ever
//! looks at what lies after it, so an earlier `expect` can never be
//! satisfied again by the same text.

use std::fmt;

use crate::types::Span;

/// Default maximum buffer size (1 MiB).
pub const DEFAULT_MAX_SIZE: usize = 1024 * 1024;

/// Accumulated terminal output plus the match cursor.
///
/// Invariants: `cursor <= len`, and the cursor never moves backward. When
/// the buffer grows past `max_size`, consumed history is discarded from the
/// front; unmatched bytes are never dropped.
#[derive(Clone)]
pub struct OutputBuffer {
    data: Vec<u8>,
    cursor: usize,
    before: Span,
    max_size: usize,
    discarded: usize,
}

impl OutputBuffer {
    /// Create a buffer that keeps at most `max_size` bytes of history.
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        Self {
            data: Vec::with_capacity(max_size.min(64 * 1024)),
            cursor: 0,
            before: Span::default(),
            max_size,
            discarded: 0,
        }
    }

    /// Append bytes read from the child. Empty input is a no-op.
    pub fn append(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        self.data.extend_from_slice(bytes);
        self.trim();
    }

    fn trim(&mut self) {
        let excess = self.data.len().saturating_sub(self.max_size);
        let drop = excess.min(self.cursor);
        if drop == 0 {
            return;
        }
        self.data.drain(..drop);
        self.cursor -= drop;
        self.before = Span::new(
            self.before.start.saturating_sub(drop),
            self.before.end.saturating_sub(drop),
        );
        self.discarded += drop;
    }

    /// The search space for the next expectation: everything after the
    /// cursor, minus a trailing incomplete UTF-8 sequence.
    ///
    /// A multi-byte character split across two reads is therefore only
    /// searched once its last byte has arrived.
    #[must_use]
    pub fn unmatched(&self) -> &[u8] {
        let tail = &self.data[self.cursor..];
        match std::str::from_utf8(tail) {
            Err(e) if e.error_len().is_none() => &tail[..e.valid_up_to()],
            _ => tail,
        }
    }

    /// Everything after the cursor, including any incomplete trailing bytes.
    #[must_use]
    pub fn unmatched_all(&self) -> &[u8] {
        &self.data[self.cursor..]
    }

    /// Unmatched output as (lossy) text, for diagnostics.
    #[must_use]
    pub fn unmatched_str(&self) -> String {
        String::from_utf8_lossy(self.unmatched_all()).into_owned()
    }

    /// Move the cursor forward to buffer position `to`.
    ///
    /// Positions at or behind the cursor are ignored; positions past the end
    /// are clamped. Consumed history beyond `max_size` is discarded here too,
    /// so buffer positions taken before the call may be stale after it.
    pub fn advance_cursor(&mut self, to: usize) {
        let to = to.min(self.data.len());
        if to > self.cursor {
            self.cursor = to;
            self.trim();
        }
    }

    /// Consume a match found in [`unmatched`](Self::unmatched).
    ///
    /// `span` is relative to the unmatched region. Records the skipped text
    /// as the "before" region and moves the cursor past the match. Returns
    /// the span counted from the first byte ever received.
    pub fn consume(&mut self, span: Span) -> Span {
        let abs = span.offset(self.cursor);
        let abs = Span::new(abs.start.min(self.data.len()), abs.end.min(self.data.len()));
        let stream = abs.offset(self.discarded);
        self.before = Span::new(self.cursor, abs.start);
        self.advance_cursor(abs.end);
        stream
    }

    /// Text between the previous cursor and the start of the last match,
    /// as far as it is still retained.
    #[must_use]
    pub fn before(&self) -> &[u8] {
        &self.data[self.before.start..self.before.end]
    }

    /// The retained buffer content, consumed history included.
    #[must_use]
    pub fn snapshot(&self) -> &[u8] {
        &self.data
    }

    /// Bytes in `span` (buffer positions), if still retained.
    #[must_use]
    pub fn slice(&self, span: Span) -> Option<&[u8]> {
        self.data.get(span.start..span.end)
    }

    /// Current cursor position within the retained buffer.
    #[must_use]
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    /// Retained length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether nothing is retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Maximum retained size before consumed history is discarded.
    #[must_use]
    pub const fn max_size(&self) -> usize {
        self.max_size
    }

    /// Bytes of consumed history discarded so far.
    #[must_use]
    pub const fn discarded(&self) -> usize {
        self.discarded
    }

    /// Total bytes received since the buffer was created.
    #[must_use]
    pub fn total_received(&self) -> usize {
        self.discarded + self.data.len()
    }
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SIZE)
    }
}

impl fmt::Debug for OutputBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputBuffer")
            .field("len", &self.data.len())
            .field("cursor", &self.cursor)
            .field("max_size", &self.max_size)
            .field("discarded", &self.discarded)
            .finish()
    }
}
