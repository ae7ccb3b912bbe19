//! The byte stream a [`Session`](crate::Session) drives.
//!
//! A real test talks to a [`PtyProcess`]; unit and integration tests can
//! drive an in-memory [`DuplexStream`] and play the shell themselves from
//! the other end.

use std::future::Future;

use harness_pty::{ExitStatus, PtyProcess};
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream};

/// A bidirectional byte stream connected to the program under test.
///
/// The lifecycle methods default to "always alive, nothing to clean up",
/// which is right for streams that have no process behind them.
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send {
    /// Process id of the program at the other end, if there is one.
    fn pid(&self) -> Option<u32> {
        None
    }

    /// Whether the other end can still receive input.
    fn is_alive(&mut self) -> bool {
        true
    }

    /// How the program ended, once known.
    fn exit_status(&mut self) -> Option<ExitStatus> {
        None
    }

    /// Release the other end. Must be idempotent and must not fail.
    fn terminate(&mut self) -> impl Future<Output = ()> + Send {
        async {}
    }
}

impl Transport for PtyProcess {
    fn pid(&self) -> Option<u32> {
        Some(Self::pid(self))
    }

    fn is_alive(&mut self) -> bool {
        Self::is_alive(self)
    }

    fn exit_status(&mut self) -> Option<ExitStatus> {
        Self::exit_status(self)
    }

    fn terminate(&mut self) -> impl Future<Output = ()> + Send {
        Self::terminate(self)
    }
}

impl Transport for DuplexStream {}
