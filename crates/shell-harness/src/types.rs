//! Common types used throughout shell-harness.

use std::fmt;

use serde::Serialize;

/// A half-open byte range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Span {
    /// First byte of the range.
    pub start: usize,
    /// One past the last byte of the range.
    pub end: usize,
}

impl Span {
    /// Create a new span.
    #[must_use]
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Length of the span in bytes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the span is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Shift both ends forward by `offset`.
    #[must_use]
    pub const fn offset(self, offset: usize) -> Self {
        Self::new(self.start + offset, self.end + offset)
    }
}

/// The result of a successful expectation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    /// The full text that matched.
    pub matched: String,

    /// Output between the previous match and this one.
    pub before: String,

    /// Capture groups from regex patterns (empty for unmatched groups).
    pub captures: Vec<String>,

    /// Where the match sits in the child's output, counted from the first
    /// byte the session received.
    pub span: Span,
}

impl Match {
    /// Get a capture group by index (0 is the first group, not the whole match).
    #[must_use]
    pub fn capture(&self, index: usize) -> Option<&str> {
        self.captures.get(index).map(String::as_str)
    }

    /// Get the full matched text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.matched
    }
}

impl fmt::Display for Match {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.matched)
    }
}

/// The state of a session's byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// The child is running and the stream is open.
    Running,

    /// The child closed its terminal; buffered output can still be matched.
    Eof,

    /// The session was closed and the child terminated.
    Closed,
}

impl SessionState {
    /// Whether input can still be sent.
    #[must_use]
    pub const fn is_usable(&self) -> bool {
        matches!(self, Self::Running)
    }
}

/// The lifecycle of one test run.
///
/// `Init → Running → Passed | Failed | Errored`. The last three are
/// terminal: once reached, the console refuses further operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    /// The shell has not been spawned yet.
    Init,
    /// The shell is up and the script is driving it.
    Running,
    /// The script called `test_success`.
    Passed,
    /// An expectation was not met.
    Failed,
    /// The harness or the script broke (spawn failure, I/O error, bad pattern).
    Errored,
}

impl RunState {
    /// Whether the run has reached a verdict.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Passed | Self::Failed | Self::Errored)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Init => "init",
            Self::Running => "running",
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Errored => "errored",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_arithmetic() {
        let span = Span::new(2, 5);
        assert_eq!(span.len(), 3);
        assert_eq!(span.offset(10), Span::new(12, 15));
        assert!(Span::new(4, 4).is_empty());
    }

    #[test]
    fn run_state_terminality() {
        assert!(!RunState::Init.is_terminal());
        assert!(!RunState::Running.is_terminal());
        assert!(RunState::Passed.is_terminal());
        assert!(RunState::Failed.is_terminal());
        assert!(RunState::Errored.is_terminal());
        assert_eq!(RunState::Errored.to_string(), "errored");
    }

    #[test]
    fn match_capture_access() {
        let m = Match {
            matched: "1 sleep 1".into(),
            before: String::new(),
            captures: vec!["1".into()],
            span: Span::new(0, 9),
        };
        assert_eq!(m.capture(0), Some("1"));
        assert_eq!(m.capture(1), None);
        assert_eq!(m.to_string(), "1 sleep 1");
    }
}
