//! Error types for the harness-pty crate.
//!
//! [`PtyError`] covers every failure mode of a PTY session: allocation,
//! spawning, I/O on the master side, and the two non-data outcomes of a
//! timed read (timeout and end-of-stream).

use std::io;

/// The error type for PTY operations.
#[derive(Debug, thiserror::Error)]
pub enum PtyError {
    /// Failed to allocate a new PTY pair.
    #[error("failed to create PTY: {0}")]
    Create(#[source] io::Error),

    /// The program to spawn could not be found.
    #[error("command not found: {command}")]
    CommandNotFound {
        /// The program that was requested.
        command: String,
    },

    /// Failed to spawn the child process.
    #[error("failed to spawn process: {0}")]
    Spawn(#[source] io::Error),

    /// An I/O error occurred on the master side.
    #[error("PTY I/O error: {0}")]
    Io(#[from] io::Error),

    /// Failed to resize the PTY.
    #[error("failed to resize PTY: {0}")]
    Resize(#[source] io::Error),

    /// The session is no longer usable (child exited or PTY closed).
    #[error("PTY has been closed")]
    Closed,

    /// The child closed its side of the terminal.
    #[error("end of stream: child closed the terminal")]
    Eof,

    /// Nothing arrived within the read window.
    #[error("operation timed out")]
    Timeout,

    /// Failed to send a signal to the child process.
    #[error("failed to send signal: {0}")]
    Signal(#[source] io::Error),

    /// Failed to wait for the child process.
    #[error("failed to wait for child: {0}")]
    Wait(#[source] io::Error),
}

impl PtyError {
    /// Whether this error happened while creating the session.
    #[must_use]
    pub const fn is_spawn_error(&self) -> bool {
        matches!(
            self,
            Self::Create(_) | Self::CommandNotFound { .. } | Self::Spawn(_)
        )
    }
}

/// A specialized Result type for PTY operations.
pub type Result<T> = std::result::Result<T, PtyError>;

#[cfg(unix)]
impl From<rustix::io::Errno> for PtyError {
    fn from(errno: rustix::io::Errno) -> Self {
        Self::Io(io::Error::from_raw_os_error(errno.raw_os_error()))
    }
}
