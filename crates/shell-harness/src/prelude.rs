//! Convenient re-exports for test scripts.
//!
//! ```ignore
//! use shell_harness::prelude::*;
//! ```

pub use crate::config::{HarnessConfig, LineEnding};
pub use crate::driver::{
    Console, PidRecorder, ProcessObserver, run_script, run_test, setup_tests, setup_tests_with,
};
pub use crate::error::{HarnessError, Result, SpawnError};
pub use crate::logging::init_logging;
pub use crate::outcome::{TestOutcome, Verdict};
pub use crate::pattern::Pattern;
pub use crate::types::{Match, RunState};
