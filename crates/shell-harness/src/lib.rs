//! shell-harness: expect-style tests for interactive shells
//!
//! Spawns a shell on a pseudo-terminal, feeds it lines, and waits for
//! expected output with timeouts. Each `expect` only looks at output that
//! arrived after the previous match, so a test reads as a straight-line
//! conversation with the shell.
//!
//! # Layers
//!
//! - [`buffer`]: accumulated output and the forward-only match cursor.
//! - [`pattern`] and [`matcher`]: literal and regex patterns over raw bytes.
//! - [`session`]: the async engine, generic over a [`Transport`].
//! - [`driver`]: the blocking [`Console`] used by test scripts, plus
//!   [`run_test`] which turns a script into a [`TestOutcome`].
//!
//! # Example
//!
//! ```ignore
//! use shell_harness::prelude::*;
//!
//! fn main() -> TestOutcome {
//!     init_logging();
//!     let config = HarnessConfig::load(None).expect("config");
//!     run_test(config, |c| {
//!         c.expect_prompt("no startup prompt")?;
//!         c.sendline("mkdir cd-test-d")?;
//!         c.sendline("cd cd-test-d")?;
//!         c.sendline("pwd")?;
//!         c.expect_exact("cd-test-d", "pwd did not show the new directory")?;
//!         c.expect_prompt("")?;
//!         c.test_success()?;
//!         Ok(())
//!     })
//! }
//! ```

pub mod buffer;
pub mod config;
pub mod driver;
pub mod error;
pub mod logging;
pub mod matcher;
pub mod outcome;
pub mod pattern;
pub mod prelude;
pub mod session;
pub mod transport;
pub mod types;
pub mod util;

pub use buffer::OutputBuffer;
pub use config::{HarnessConfig, LineEnding};
pub use driver::{
    Console, PidRecorder, ProcessObserver, run_script, run_test, setup_tests, setup_tests_with,
};
pub use error::{HarnessError, Result, SpawnError};
pub use logging::{LogFormat, init_logging, init_logging_with};
pub use matcher::{MatchResult, Matcher};
pub use outcome::{TestOutcome, Verdict};
pub use pattern::{CompiledRegex, Pattern, PatternMatch};
pub use session::Session;
pub use transport::Transport;
pub use types::{Match, RunState, SessionState, Span};
pub use util::Deadline;

pub use harness_pty::{ExitStatus, PtyProcess};
