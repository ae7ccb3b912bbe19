//! Error types for shell-harness.
//!
//! Failures that end an expectation (timeout, early exit) carry the pattern,
//! the test author's message and the unmatched output, so the rendered error
//! is enough to debug a failing scenario without re-running it.

use std::time::Duration;

use harness_pty::{ExitStatus, PtyError};
use thiserror::Error;

use crate::types::RunState;

/// Maximum length of buffer content to display in error messages.
const MAX_BUFFER_DISPLAY: usize = 500;

/// Context lines to show before/after truncation point.
const CONTEXT_LINES: usize = 3;

/// Format buffer content for display, truncating if necessary.
fn format_buffer_snippet(buffer: &str) -> String {
    if buffer.is_empty() {
        return "(empty buffer)".to_string();
    }

    let buffer_len = buffer.len();
    let lines: Vec<&str> = buffer.lines().collect();
    let total_lines = lines.len();

    if buffer_len <= MAX_BUFFER_DISPLAY || total_lines <= CONTEXT_LINES * 2 {
        return format!(
            "┌─ unmatched output ({buffer_len} bytes) ─────────────\n│ {}\n└────────────────────────────────────────",
            lines.join("\n│ ")
        );
    }

    let tail_lines = &lines[total_lines.saturating_sub(CONTEXT_LINES * 2)..];
    let hidden = total_lines - tail_lines.len();

    format!(
        "┌─ unmatched output ({buffer_len} bytes, {total_lines} lines) ─────────────\n│ ... ({hidden} lines hidden)\n│ {}\n└────────────────────────────────────────",
        tail_lines.join("\n│ ")
    )
}

fn format_message(message: &str) -> String {
    if message.is_empty() {
        String::new()
    } else {
        format!("Message: {message}\n")
    }
}

fn format_timeout_error(duration: Duration, pattern: &str, message: &str, buffer: &str) -> String {
    format!(
        "timeout after {duration:?} waiting for pattern\n\
         \n\
         Pattern: '{pattern}'\n\
         {}\
         \n\
         {}",
        format_message(message),
        format_buffer_snippet(buffer)
    )
}

fn format_eof_error(
    pattern: &str,
    message: &str,
    status: Option<&ExitStatus>,
    buffer: &str,
) -> String {
    let status = status.map_or_else(|| "unknown status".to_string(), ToString::to_string);
    format!(
        "process exited early ({status}) while waiting for pattern\n\
         \n\
         Pattern: '{pattern}'\n\
         {}\
         \n\
         {}",
        format_message(message),
        format_buffer_snippet(buffer)
    )
}

/// The main error type for shell-harness operations.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The shell under test could not be started.
    #[error("failed to spawn process: {0}")]
    Spawn(#[from] SpawnError),

    /// An I/O error occurred while talking to the child.
    #[error("{context}: {source}")]
    Io {
        /// What operation was being performed.
        context: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Input was sent to a session whose child is gone.
    #[error("session is closed: the child process is no longer running")]
    SessionClosed,

    /// The pattern did not appear before the deadline.
    #[error("{}", format_timeout_error(*duration, pattern, message, buffer))]
    Timeout {
        /// The timeout that elapsed.
        duration: Duration,
        /// The pattern that was being searched for.
        pattern: String,
        /// The test author's failure message.
        message: String,
        /// Unmatched output at the time of the timeout.
        buffer: String,
    },

    /// The child closed its terminal before the pattern appeared.
    #[error("{}", format_eof_error(pattern, message, status.as_ref(), buffer))]
    Eof {
        /// The pattern that was being searched for.
        pattern: String,
        /// The test author's failure message.
        message: String,
        /// How the child ended, if it has been reaped.
        status: Option<ExitStatus>,
        /// Unmatched output when the stream ended.
        buffer: String,
    },

    /// The pattern itself is unusable (e.g. empty).
    #[error("invalid pattern: {message}")]
    InvalidPattern {
        /// Description of what's wrong with the pattern.
        message: String,
    },

    /// Invalid regex pattern.
    #[error("invalid regex pattern: {0}")]
    Regex(#[from] regex::Error),

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// The test run has already reached a verdict.
    #[error("test run already finished ({state})")]
    RunFinished {
        /// The terminal state the run is in.
        state: RunState,
    },
}

/// Errors related to starting the shell under test.
#[derive(Debug, Error)]
pub enum SpawnError {
    /// Command not found.
    #[error("command not found: {command}")]
    CommandNotFound {
        /// The command that was not found.
        command: String,
    },

    /// PTY allocation failed.
    #[error("failed to allocate PTY: {reason}")]
    PtyAllocation {
        /// The reason for the failure.
        reason: String,
    },

    /// Working directory error.
    #[error("invalid working directory: {path}")]
    InvalidWorkingDir {
        /// The invalid working directory path.
        path: String,
    },

    /// The async runtime backing a console could not be created.
    #[error("failed to create runtime: {0}")]
    Runtime(#[source] std::io::Error),

    /// Any other failure while starting the child.
    #[error("I/O error during spawn: {0}")]
    Io(#[source] std::io::Error),
}

impl From<PtyError> for SpawnError {
    fn from(err: PtyError) -> Self {
        match err {
            PtyError::CommandNotFound { command } => Self::CommandNotFound { command },
            PtyError::Create(e) => Self::PtyAllocation {
                reason: e.to_string(),
            },
            PtyError::Spawn(e) | PtyError::Io(e) | PtyError::Resize(e) => Self::Io(e),
            other => Self::Io(std::io::Error::other(other.to_string())),
        }
    }
}

/// Result type alias for shell-harness operations.
pub type Result<T> = std::result::Result<T, HarnessError>;

impl HarnessError {
    /// Create a timeout error with the given details.
    pub fn timeout(
        duration: Duration,
        pattern: impl Into<String>,
        buffer: impl Into<String>,
    ) -> Self {
        Self::Timeout {
            duration,
            pattern: pattern.into(),
            message: String::new(),
            buffer: buffer.into(),
        }
    }

    /// Create an early-exit error.
    pub fn eof(
        pattern: impl Into<String>,
        status: Option<ExitStatus>,
        buffer: impl Into<String>,
    ) -> Self {
        Self::Eof {
            pattern: pattern.into(),
            message: String::new(),
            status,
            buffer: buffer.into(),
        }
    }

    /// Create an invalid pattern error.
    pub fn invalid_pattern(message: impl Into<String>) -> Self {
        Self::InvalidPattern {
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an I/O error with context.
    pub fn io_context(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Attach the test author's failure message to an expectation error.
    ///
    /// Other errors are returned unchanged.
    #[must_use]
    pub fn with_message(mut self, text: impl Into<String>) -> Self {
        if let Self::Timeout { message, .. } | Self::Eof { message, .. } = &mut self {
            *message = text.into();
        }
        self
    }

    /// Check if this is a timeout error.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Check if this is an early-exit error.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        matches!(self, Self::Eof { .. })
    }

    /// Whether this error means "the shell did not produce what the test
    /// expected" (a failed test) rather than a broken harness or script.
    #[must_use]
    pub const fn is_expectation_failure(&self) -> bool {
        self.is_timeout() || self.is_eof()
    }

    /// The pattern an expectation error was waiting for.
    #[must_use]
    pub fn pattern(&self) -> Option<&str> {
        match self {
            Self::Timeout { pattern, .. } | Self::Eof { pattern, .. } => Some(pattern),
            _ => None,
        }
    }

    /// The test author's message, if one was attached.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Timeout { message, .. } | Self::Eof { message, .. } if !message.is_empty() => {
                Some(message)
            }
            _ => None,
        }
    }

    /// Get the unmatched output if this error contains it.
    #[must_use]
    pub fn buffer(&self) -> Option<&str> {
        match self {
            Self::Timeout { buffer, .. } | Self::Eof { buffer, .. } => Some(buffer),
            _ => None,
        }
    }
}
