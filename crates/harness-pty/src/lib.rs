//! harness-pty: async pseudo-terminal sessions for driving interactive programs
//!
//! This crate owns the lowest layer of an interactive-process test harness:
//! allocating a pseudo-terminal, spawning a child attached to its slave side
//! so the child believes it is talking to a real terminal, and giving the
//! caller raw byte-level access to the master side.
//!
//! # Platform Support
//!
//! Unix only (Linux, macOS, the BSDs). PTY allocation and process control go
//! through `rustix`; async I/O goes through Tokio's `AsyncFd`.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::time::Duration;
//! use harness_pty::{PtyConfig, PtyProcess};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), harness_pty::PtyError> {
//!     let config = PtyConfig::default();
//!     let mut process = PtyProcess::spawn("/bin/sh", ["-i"], &config).await?;
//!
//!     process.write(b"echo hello\n").await?;
//!     let bytes = process.read_available(Duration::from_secs(1)).await?;
//!     println!("{}", String::from_utf8_lossy(&bytes));
//!
//!     process.terminate().await;
//!     Ok(())
//! }
//! ```

#[cfg(not(unix))]
compile_error!("harness-pty requires a Unix pseudo-terminal implementation");

pub mod config;
pub mod error;
pub mod io;
pub mod status;

#[cfg(unix)]
pub mod process;
#[cfg(unix)]
pub mod unix;

pub use config::{DEFAULT_GRACE_PERIOD, PtyConfig, PtyConfigBuilder, PtySignal, WindowSize};
pub use error::{PtyError, Result};
pub use io::{DEFAULT_READ_CHUNK, is_hangup, read_available};
pub use status::ExitStatus;

#[cfg(unix)]
pub use process::PtyProcess;
#[cfg(unix)]
pub use unix::{UnixPtyChild, UnixPtyMaster};
