//! Unix platform implementation for PTY operations.
//!
//! - PTY master/slave pair allocation via openpt/grantpt/unlockpt
//! - Async I/O through tokio's `AsyncFd`
//! - Child process management with a new session and the slave as
//!   controlling terminal

mod child;
mod pty;

pub use child::{UnixPtyChild, spawn_child};
pub use pty::{UnixPtyMaster, open_slave};
