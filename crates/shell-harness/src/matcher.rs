//! Pattern matching engine for expect operations.
//!
//! The [`Matcher`] owns the [`OutputBuffer`] and is the only thing that
//! moves its cursor: a match found in the unmatched region is consumed,
//! everything else is left in place for the next attempt.

use crate::buffer::OutputBuffer;
use crate::pattern::Pattern;
use crate::types::{Match, Span};

/// The pattern matching engine.
#[derive(Debug, Default)]
pub struct Matcher {
    buffer: OutputBuffer,
}

impl Matcher {
    /// Create a new matcher with the specified buffer size.
    #[must_use]
    pub fn new(buffer_size: usize) -> Self {
        Self {
            buffer: OutputBuffer::new(buffer_size),
        }
    }

    /// Append data to the buffer.
    pub fn append(&mut self, data: &[u8]) {
        self.buffer.append(data);
    }

    /// Get the current buffer.
    #[must_use]
    pub const fn buffer(&self) -> &OutputBuffer {
        &self.buffer
    }

    /// Unmatched output as text, for diagnostics.
    #[must_use]
    pub fn unmatched_str(&self) -> String {
        self.buffer.unmatched_str()
    }

    /// Look for `pattern` in the unmatched region without consuming it.
    #[must_use]
    pub fn try_match(&self, pattern: &Pattern) -> Option<MatchResult> {
        pattern
            .matches(self.buffer.unmatched())
            .map(|m| MatchResult {
                span: m.span,
                captures: m.captures,
            })
    }

    /// Consume a match found by [`try_match`](Self::try_match).
    pub fn consume_match(&mut self, result: MatchResult) -> Match {
        // read both texts first: consuming may discard them
        let unmatched = self.buffer.unmatched_all();
        let end = result.span.end.min(unmatched.len());
        let start = result.span.start.min(end);
        let matched = String::from_utf8_lossy(&unmatched[start..end]).into_owned();
        let before = String::from_utf8_lossy(&unmatched[..start]).into_owned();

        let span = self.buffer.consume(result.span);
        Match {
            matched,
            before,
            captures: result.captures,
            span,
        }
    }

    /// Find and consume `pattern` in one step.
    pub fn match_and_consume(&mut self, pattern: &Pattern) -> Option<Match> {
        let result = self.try_match(pattern)?;
        Some(self.consume_match(result))
    }
}

/// A match found in the unmatched region, not yet consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    /// Position relative to the start of the unmatched region.
    pub span: Span,
    /// Capture groups.
    pub captures: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matcher_literal() {
        let mut matcher = Matcher::new(1024);
        matcher.append(b"hello world");

        let pattern = Pattern::exact("world").unwrap();
        let result = matcher.try_match(&pattern).unwrap();
        assert_eq!(result.span, Span::new(6, 11));
        // looking does not consume
        assert_eq!(matcher.buffer().cursor(), 0);
    }

    #[test]
    fn matcher_consume() {
        let mut matcher = Matcher::new(1024);
        matcher.append(b"prefix|match|suffix");

        let pattern = Pattern::exact("match").unwrap();
        let result = matcher.try_match(&pattern).unwrap();
        let m = matcher.consume_match(result);

        assert_eq!(m.before, "prefix|");
        assert_eq!(m.matched, "match");
        assert_eq!(m.span, Span::new(7, 12));
        assert_eq!(matcher.unmatched_str(), "|suffix");
    }

    #[test]
    fn consumed_text_is_not_matched_again() {
        let mut matcher = Matcher::new(1024);
        matcher.append(b"cush> ");

        let prompt = Pattern::prompt("[$#>%] ").unwrap();
        assert!(matcher.match_and_consume(&prompt).is_some());
        assert!(matcher.match_and_consume(&prompt).is_none());

        matcher.append(b"cush> ");
        assert!(matcher.match_and_consume(&prompt).is_some());
    }

    #[test]
    fn sequential_matches_move_forward() {
        let mut matcher = Matcher::new(1024);
        matcher.append(b"   1 sleep 1\r\n   2 history\r\ncush> ");

        let first = matcher
            .match_and_consume(&Pattern::regex("1 sleep 1").unwrap())
            .unwrap();
        let second = matcher
            .match_and_consume(&Pattern::regex("2 history").unwrap())
            .unwrap();
        assert!(second.span.start >= first.span.end);
        assert_eq!(second.before, "\r\n   ");

        // "1 sleep 1" is behind the cursor now
        assert!(
            matcher
                .match_and_consume(&Pattern::regex("1 sleep 1").unwrap())
                .is_none()
        );
    }

    #[test]
    fn regex_captures_are_kept() {
        let mut matcher = Matcher::new(1024);
        matcher.append(b"/tmp/work/cd-test-d\r\n");
        let m = matcher
            .match_and_consume(&Pattern::regex(r"/(\w+)/cd-test-d").unwrap())
            .unwrap();
        assert_eq!(m.capture(0), Some("work"));
    }

    #[test]
    fn spans_stay_stream_relative_after_discard() {
        let mut matcher = Matcher::new(8);
        matcher.append(b"aaaa> ");
        matcher
            .match_and_consume(&Pattern::exact("> ").unwrap())
            .unwrap();
        matcher.append(b"bbbb> ");
        let m = matcher
            .match_and_consume(&Pattern::exact("> ").unwrap())
            .unwrap();
        assert_eq!(m.span, Span::new(10, 12));
    }

    #[test]
    fn match_text_survives_discard() {
        let mut matcher = Matcher::new(4);
        matcher.append(b"banner\r\nsh> ");
        let m = matcher
            .match_and_consume(&Pattern::exact("sh> ").unwrap())
            .unwrap();
        assert_eq!(m.matched, "sh> ");
        assert_eq!(m.before, "banner\r\n");
        assert_eq!(m.span, Span::new(8, 12));
        assert!(matcher.buffer().len() <= 4);
    }
}
