//! The script-facing API.
//!
//! A test script gets a [`Console`] from [`setup_tests`] and drives the
//! shell through it with blocking calls:
//!
//! ```ignore
//! use shell_harness::prelude::*;
//!
//! fn main() -> TestOutcome {
//!     init_logging();
//!     run_test(HarnessConfig::new("./cush"), |console| {
//!         console.expect_prompt("shell should print a prompt")?;
//!         console.sendline("pwd")?;
//!         console.expect_exact("/", "pwd should print a path")?;
//!         console.expect_prompt("")?;
//!         console.test_success()?;
//!         Ok(())
//!     })
//! }
//! ```
//!
//! Every failed call records the outcome, releases the shell and returns
//! the error, so `?` ends the script at the first unmet expectation. A
//! run is only ever passed by an explicit [`Console::test_success`].

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use harness_pty::PtyProcess;
use tokio::runtime::{Builder, Handle, Runtime};

use crate::config::HarnessConfig;
use crate::error::{HarnessError, Result, SpawnError};
use crate::outcome::{TestOutcome, Verdict};
use crate::pattern::Pattern;
use crate::session::Session;
use crate::transport::Transport;
use crate::types::{Match, RunState};

/// Hook for an external process-accounting collaborator.
///
/// `spawned` is called once the shell is running; `released` once it has
/// been terminated. A checker can use the pids to verify that nothing the
/// test started outlives it.
pub trait ProcessObserver: Send + Sync {
    /// The shell was started with this pid.
    fn spawned(&self, pid: u32);

    /// The shell with this pid was terminated and reaped.
    fn released(&self, pid: u32);
}

/// A [`ProcessObserver`] that remembers every pid it is told about.
#[derive(Debug, Default)]
pub struct PidRecorder {
    records: Mutex<PidRecords>,
}

#[derive(Debug, Default)]
struct PidRecords {
    spawned: Vec<u32>,
    live: Vec<u32>,
}

impl PidRecorder {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every pid reported as spawned, in order.
    #[must_use]
    pub fn spawned_pids(&self) -> Vec<u32> {
        self.lock().spawned.clone()
    }

    /// Pids spawned but not yet released.
    #[must_use]
    pub fn live_pids(&self) -> Vec<u32> {
        self.lock().live.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PidRecords> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ProcessObserver for PidRecorder {
    fn spawned(&self, pid: u32) {
        let mut records = self.lock();
        records.spawned.push(pid);
        records.live.push(pid);
    }

    fn released(&self, pid: u32) {
        self.lock().live.retain(|&p| p != pid);
    }
}

/// Spawn the configured shell and return a console driving it.
///
/// # Errors
///
/// [`HarnessError::Config`] for an unusable configuration (including an
/// invalid prompt pattern), [`HarnessError::Spawn`] if the shell cannot be
/// started.
pub fn setup_tests(config: HarnessConfig) -> Result<Console> {
    Console::spawn(&config, None)
}

/// Like [`setup_tests`], reporting the shell's pid to `observer`.
///
/// # Errors
///
/// Same as [`setup_tests`].
pub fn setup_tests_with(
    config: HarnessConfig,
    observer: Arc<dyn ProcessObserver>,
) -> Result<Console> {
    Console::spawn(&config, Some(observer))
}

/// Spawn the shell, run `script` against it and return the outcome.
///
/// The shell is always released, whether the script passes, fails,
/// returns an error or panics. A script that returns without calling
/// [`Console::test_success`] is reported as errored.
pub fn run_test<F>(config: HarnessConfig, script: F) -> TestOutcome
where
    F: FnOnce(&mut Console) -> Result<()>,
{
    match setup_tests(config) {
        Ok(console) => run_script(console, script),
        Err(e) => {
            tracing::error!(error = %e, "failed to set up test");
            TestOutcome::from_error(&e, None)
        }
    }
}

/// Run `script` against an existing console; see [`run_test`].
pub fn run_script<T, F>(mut console: Console<T>, script: F) -> TestOutcome
where
    T: Transport,
    F: FnOnce(&mut Console<T>) -> Result<()>,
{
    let result = panic::catch_unwind(AssertUnwindSafe(|| script(&mut console)));

    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            if console.state.is_terminal() {
                if console.state == RunState::Passed {
                    tracing::warn!(error = %e, "script failed after test_success");
                }
            } else {
                console.record_failure(&e);
            }
        }
        Err(payload) => {
            let text = format!("test script panicked: {}", panic_message(payload.as_ref()));
            tracing::error!("{text}");
            if !console.state.is_terminal() {
                console.finish(RunState::Errored, TestOutcome::errored(text, console.pid));
            }
        }
    }

    if !console.state.is_terminal() {
        console.finish(
            RunState::Errored,
            TestOutcome::errored(
                "test script returned without calling test_success",
                console.pid,
            ),
        );
    }

    console
        .outcome
        .take()
        .unwrap_or_else(|| TestOutcome::errored("no outcome recorded", console.pid))
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

fn build_runtime() -> Result<Runtime> {
    Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| SpawnError::Runtime(e).into())
}

/// A blocking handle on one shell under test.
///
/// The console owns the session and a single-threaded Tokio runtime that
/// drives it. It must not be used from inside another Tokio runtime.
pub struct Console<T: Transport = PtyProcess> {
    runtime: Runtime,
    session: Option<Session<T>>,
    prompt: Pattern,
    state: RunState,
    outcome: Option<TestOutcome>,
    observer: Option<Arc<dyn ProcessObserver>>,
    pid: Option<u32>,
}

impl Console<PtyProcess> {
    fn spawn(config: &HarnessConfig, observer: Option<Arc<dyn ProcessObserver>>) -> Result<Self> {
        let prompt = Pattern::prompt(&config.prompt_pattern)
            .map_err(|e| HarnessError::config(format!("prompt pattern: {e}")))?;
        let runtime = build_runtime()?;
        let session = runtime.block_on(Session::spawn(config))?;
        Ok(Self::assemble(runtime, session, prompt, observer))
    }
}

impl<T: Transport> Console<T> {
    /// Drive an already-connected transport instead of spawning a shell.
    ///
    /// # Errors
    ///
    /// [`HarnessError::Config`] if the prompt pattern is invalid,
    /// [`HarnessError::Spawn`] if the runtime cannot be created.
    pub fn new(transport: T, config: &HarnessConfig) -> Result<Self> {
        let prompt = Pattern::prompt(&config.prompt_pattern)
            .map_err(|e| HarnessError::config(format!("prompt pattern: {e}")))?;
        let runtime = build_runtime()?;
        let session = Session::new(transport, config);
        Ok(Self::assemble(runtime, session, prompt, None))
    }

    fn assemble(
        runtime: Runtime,
        session: Session<T>,
        prompt: Pattern,
        observer: Option<Arc<dyn ProcessObserver>>,
    ) -> Self {
        let pid = session.pid();
        if let (Some(observer), Some(pid)) = (&observer, pid) {
            observer.spawned(pid);
        }
        tracing::info!(pid, prompt = %prompt, "test run started");
        Self {
            runtime,
            session: Some(session),
            prompt,
            state: RunState::Running,
            outcome: None,
            observer,
            pid,
        }
    }

    /// Process id of the shell, if it has one.
    #[must_use]
    pub const fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Where the run is in its lifecycle.
    #[must_use]
    pub const fn state(&self) -> RunState {
        self.state
    }

    /// The recorded outcome, once the run has finished.
    #[must_use]
    pub const fn outcome(&self) -> Option<&TestOutcome> {
        self.outcome.as_ref()
    }

    /// The underlying session, while the shell is held.
    pub fn session_mut(&mut self) -> Option<&mut Session<T>> {
        self.session.as_mut()
    }

    /// Run a future on the console's runtime.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    /// Send `text` followed by the line terminator.
    ///
    /// # Errors
    ///
    /// [`HarnessError::RunFinished`] once a verdict exists; otherwise any
    /// error from [`Session::send_line`], which also ends the run.
    pub fn sendline(&mut self, text: &str) -> Result<()> {
        self.ensure_running()?;
        let result = match self.session.as_mut() {
            Some(session) => self.runtime.block_on(session.send_line(text)),
            None => Err(HarnessError::SessionClosed),
        };
        self.settle(result)
    }

    /// Wait for the regular expression `pattern`.
    ///
    /// `message` is attached to the failure if the pattern does not appear.
    ///
    /// # Errors
    ///
    /// See [`expect_timeout`](Self::expect_timeout).
    pub fn expect(&mut self, pattern: &str, message: &str) -> Result<Match> {
        self.expect_timeout(pattern, message, None)
    }

    /// [`expect`](Self::expect) with a per-call timeout (`None` uses the
    /// configured default).
    ///
    /// # Errors
    ///
    /// [`HarnessError::RunFinished`] once a verdict exists. A bad pattern,
    /// a timeout, an early exit or an I/O error ends the run and is
    /// returned.
    pub fn expect_timeout(
        &mut self,
        pattern: &str,
        message: &str,
        timeout: Option<Duration>,
    ) -> Result<Match> {
        self.ensure_running()?;
        match Pattern::regex(pattern) {
            Ok(pattern) => self.wait_for(&pattern, message, timeout),
            Err(e) => self.settle(Err(e)),
        }
    }

    /// Wait for the literal text `literal`.
    ///
    /// # Errors
    ///
    /// See [`expect_timeout`](Self::expect_timeout).
    pub fn expect_exact(&mut self, literal: &str, message: &str) -> Result<Match> {
        self.expect_exact_timeout(literal, message, None)
    }

    /// [`expect_exact`](Self::expect_exact) with a per-call timeout.
    ///
    /// # Errors
    ///
    /// See [`expect_timeout`](Self::expect_timeout).
    pub fn expect_exact_timeout(
        &mut self,
        literal: &str,
        message: &str,
        timeout: Option<Duration>,
    ) -> Result<Match> {
        self.ensure_running()?;
        match Pattern::exact(literal) {
            Ok(pattern) => self.wait_for(&pattern, message, timeout),
            Err(e) => self.settle(Err(e)),
        }
    }

    /// Wait for the configured prompt.
    ///
    /// # Errors
    ///
    /// See [`expect_timeout`](Self::expect_timeout).
    pub fn expect_prompt(&mut self, message: &str) -> Result<Match> {
        self.expect_prompt_timeout(message, None)
    }

    /// [`expect_prompt`](Self::expect_prompt) with a per-call timeout.
    ///
    /// # Errors
    ///
    /// See [`expect_timeout`](Self::expect_timeout).
    pub fn expect_prompt_timeout(
        &mut self,
        message: &str,
        timeout: Option<Duration>,
    ) -> Result<Match> {
        self.ensure_running()?;
        let prompt = self.prompt.clone();
        self.wait_for(&prompt, message, timeout)
    }

    /// Mark the run as passed and release the shell.
    ///
    /// # Errors
    ///
    /// [`HarnessError::RunFinished`] if a verdict already exists.
    pub fn test_success(&mut self) -> Result<TestOutcome> {
        self.ensure_running()?;
        let outcome = TestOutcome::passed(self.pid);
        self.finish(RunState::Passed, outcome.clone());
        Ok(outcome)
    }

    /// Mark the run as failed for a reason the harness cannot see, such as
    /// a check the script made itself.
    ///
    /// # Errors
    ///
    /// [`HarnessError::RunFinished`] if a verdict already exists.
    pub fn test_failure(&mut self, message: &str) -> Result<TestOutcome> {
        self.ensure_running()?;
        let outcome = TestOutcome::failed(message, self.pid);
        self.finish(RunState::Failed, outcome.clone());
        Ok(outcome)
    }

    fn wait_for(
        &mut self,
        pattern: &Pattern,
        message: &str,
        timeout: Option<Duration>,
    ) -> Result<Match> {
        let result = match self.session.as_mut() {
            Some(session) => {
                let timeout = timeout.unwrap_or_else(|| session.default_timeout());
                self.runtime
                    .block_on(session.expect_timeout(pattern, timeout))
                    .map_err(|e| e.with_message(message))
            }
            None => Err(HarnessError::SessionClosed),
        };
        self.settle(result)
    }

    fn ensure_running(&self) -> Result<()> {
        if self.state.is_terminal() {
            return Err(HarnessError::RunFinished { state: self.state });
        }
        Ok(())
    }

    fn settle<R>(&mut self, result: Result<R>) -> Result<R> {
        if let Err(e) = &result {
            self.record_failure(e);
        }
        result
    }

    fn record_failure(&mut self, err: &HarnessError) {
        let outcome = TestOutcome::from_error(err, self.pid);
        let state = match outcome.verdict {
            Verdict::Failed => RunState::Failed,
            _ => RunState::Errored,
        };
        self.finish(state, outcome);
    }

    fn finish(&mut self, state: RunState, outcome: TestOutcome) {
        self.state = state;
        tracing::info!(pid = self.pid, %state, "test run finished");
        self.outcome = Some(outcome);
        self.release();
    }

    fn release(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        if Handle::try_current().is_ok() {
            // Blocking here would panic; dropping the transport kills the
            // shell's process group instead.
            tracing::debug!(pid = self.pid, "releasing shell from inside a runtime");
            drop(session);
        } else {
            self.runtime.block_on(session.close());
        }
        if let (Some(observer), Some(pid)) = (&self.observer, self.pid) {
            observer.released(pid);
        }
    }
}

impl<T: Transport> Drop for Console<T> {
    fn drop(&mut self) {
        if !self.state.is_terminal() {
            tracing::debug!(pid = self.pid, "console dropped without a verdict");
        }
        self.release();
    }
}

impl<T: Transport> fmt::Debug for Console<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Console")
            .field("pid", &self.pid)
            .field("state", &self.state)
            .field("prompt", &self.prompt)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncWriteExt, DuplexStream, duplex};

    fn console(timeout: Duration) -> (Console<DuplexStream>, DuplexStream) {
        let (ours, theirs) = duplex(4096);
        let config = HarnessConfig::new("in-memory")
            .timeout(timeout)
            .prompt_pattern("cush> ");
        (Console::new(ours, &config).unwrap(), theirs)
    }

    fn feed(console: &Console<DuplexStream>, shell: &mut DuplexStream, data: &[u8]) {
        console.block_on(shell.write_all(data)).unwrap();
    }

    #[test]
    fn pass_requires_test_success() {
        let (mut console, mut shell) = console(Duration::from_secs(1));
        feed(&console, &mut shell, b"cush> ");
        console.expect_prompt("startup").unwrap();
        assert_eq!(console.state(), RunState::Running);

        let outcome = console.test_success().unwrap();
        assert!(outcome.is_success());
        assert_eq!(console.state(), RunState::Passed);
        assert!(matches!(
            console.sendline("pwd"),
            Err(HarnessError::RunFinished { state: RunState::Passed })
        ));
    }

    #[test]
    fn failed_expectation_records_message() {
        let (mut console, mut shell) = console(Duration::from_millis(50));
        feed(&console, &mut shell, b"cush> ");
        console.expect_prompt("").unwrap();

        let err = console.expect_prompt("second prompt").unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(console.state(), RunState::Failed);

        let outcome = console.outcome().unwrap();
        assert_eq!(outcome.verdict, Verdict::Failed);
        assert_eq!(outcome.message.as_deref(), Some("second prompt"));
        assert_eq!(outcome.expected.as_deref(), Some("cush> "));

        assert!(matches!(
            console.test_success(),
            Err(HarnessError::RunFinished { state: RunState::Failed })
        ));
    }

    #[test]
    fn bad_pattern_is_an_error_not_a_failure() {
        let (mut console, _shell) = console(Duration::from_secs(1));
        assert!(console.expect("(", "").is_err());
        assert_eq!(console.state(), RunState::Errored);
        assert_eq!(console.outcome().unwrap().verdict, Verdict::Errored);
    }

    #[test]
    fn per_call_timeout_overrides_default() {
        let (mut console, _shell) = console(Duration::from_secs(30));
        let started = std::time::Instant::now();
        let err = console
            .expect_exact_timeout("never", "", Some(Duration::from_millis(20)))
            .unwrap_err();
        assert!(err.is_timeout());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn run_script_without_verdict_is_errored() {
        let (console, mut shell) = console(Duration::from_secs(1));
        feed(&console, &mut shell, b"cush> ");
        let outcome = run_script(console, |c| {
            c.expect_prompt("")?;
            Ok(())
        });
        assert_eq!(outcome.verdict, Verdict::Errored);
        assert!(outcome.error.unwrap().contains("test_success"));
    }

    #[test]
    fn run_script_panic_is_errored() {
        let (console, _shell) = console(Duration::from_secs(1));
        let outcome = run_script(console, |_| panic!("boom"));
        assert_eq!(outcome.verdict, Verdict::Errored);
        assert!(outcome.error.unwrap().contains("boom"));
    }

    #[test]
    fn run_script_reports_first_failure() {
        let (console, mut shell) = console(Duration::from_millis(30));
        feed(&console, &mut shell, b"cush> ");
        let outcome = run_script(console, |c| {
            c.expect_prompt("")?;
            c.expect_exact("cd-test-d", "pwd should show the directory")?;
            c.test_success()?;
            Ok(())
        });
        assert_eq!(outcome.verdict, Verdict::Failed);
        assert_eq!(
            outcome.message.as_deref(),
            Some("pwd should show the directory")
        );
    }

    #[test]
    fn recorder_tracks_live_pids() {
        let recorder = PidRecorder::new();
        recorder.spawned(10);
        recorder.spawned(11);
        recorder.released(10);
        assert_eq!(recorder.spawned_pids(), vec![10, 11]);
        assert_eq!(recorder.live_pids(), vec![11]);
    }

    #[test]
    fn invalid_prompt_pattern_is_a_config_error() {
        let (ours, _theirs) = duplex(64);
        let config = HarnessConfig::new("in-memory").prompt_pattern("(");
        assert!(matches!(
            Console::new(ours, &config),
            Err(HarnessError::Config { .. })
        ));
    }
}
