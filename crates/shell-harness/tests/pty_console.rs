//! Console tests against a real `/bin/sh` on a pseudo-terminal.
//!
//! Skipped (with a message) where no PTY can be allocated.

#![cfg(unix)]

use std::sync::Arc;
use std::time::Duration;

use shell_harness::prelude::*;

fn sh() -> HarnessConfig {
    HarnessConfig::new("/bin/sh")
        .arg("-i")
        .env("PS1", "$ ")
        .env("ENV", "/dev/null")
        .timeout(Duration::from_secs(5))
        .grace_period(Duration::from_millis(200))
}

fn setup(config: HarnessConfig) -> Option<Console> {
    match setup_tests(config) {
        Ok(console) => Some(console),
        Err(HarnessError::Spawn(SpawnError::PtyAllocation { reason })) => {
            eprintln!("skipping: PTY allocation unavailable: {reason}");
            None
        }
        Err(e) => panic!("setup failed: {e}"),
    }
}

#[test]
fn sh_answers_a_command() {
    let Some(mut c) = setup(sh()) else {
        return;
    };
    assert!(c.pid().is_some());
    c.expect_prompt("sh should print a prompt").unwrap();
    c.sendline("echo $((6 * 7))").unwrap();
    c.expect_exact("42", "arithmetic result").unwrap();
    c.expect_prompt("").unwrap();
    let outcome = c.test_success().unwrap();
    assert_eq!(outcome.verdict, Verdict::Passed);
}

#[test]
fn observer_sees_spawn_and_release() {
    let recorder = Arc::new(PidRecorder::new());
    let console = match setup_tests_with(sh(), recorder.clone()) {
        Ok(console) => console,
        Err(HarnessError::Spawn(SpawnError::PtyAllocation { .. })) => return,
        Err(e) => panic!("setup failed: {e}"),
    };
    let pid = console.pid().unwrap();
    assert_eq!(recorder.live_pids(), vec![pid]);

    let outcome = run_script(console, |c| {
        c.expect_prompt("")?;
        c.test_success()?;
        Ok(())
    });
    assert!(outcome.is_success());
    assert_eq!(outcome.pid, Some(pid));
    assert_eq!(recorder.spawned_pids(), vec![pid]);
    assert!(recorder.live_pids().is_empty());

    #[cfg(target_os = "linux")]
    assert!(!std::path::Path::new(&format!("/proc/{pid}")).exists());
}

#[test]
fn dropping_a_console_releases_the_shell() {
    let recorder = Arc::new(PidRecorder::new());
    let console = match setup_tests_with(sh(), recorder.clone()) {
        Ok(console) => console,
        Err(HarnessError::Spawn(SpawnError::PtyAllocation { .. })) => return,
        Err(e) => panic!("setup failed: {e}"),
    };
    drop(console);
    assert!(recorder.live_pids().is_empty());
}

#[test]
fn early_exit_is_not_a_timeout() {
    let config = HarnessConfig::new("/bin/sh")
        .args(["-c", "echo bye"])
        .timeout(Duration::from_secs(5));
    let Some(mut c) = setup(config) else {
        return;
    };
    let err = c.expect_exact("never printed", "sh -c exits").unwrap_err();
    assert!(err.is_eof(), "{err}");
    assert!(err.buffer().unwrap_or_default().contains("bye"));
    assert_eq!(c.state(), RunState::Failed);
}

#[test]
fn missing_command_is_a_spawn_error() {
    let outcome = run_test(HarnessConfig::new("/nonexistent/shell"), |c| {
        c.test_success()?;
        Ok(())
    });
    assert_eq!(outcome.verdict, Verdict::Errored);
    let error = outcome.error.unwrap_or_default();
    assert!(
        error.contains("command not found") || error.contains("PTY"),
        "{error}"
    );
}

#[test]
fn missing_working_dir_is_a_spawn_error() {
    let err = setup_tests(sh().working_dir("/nonexistent/dir")).unwrap_err();
    assert!(matches!(
        err,
        HarnessError::Spawn(SpawnError::InvalidWorkingDir { .. })
    ));
}

#[test]
fn empty_command_is_a_config_error() {
    let err = setup_tests(HarnessConfig::default()).unwrap_err();
    assert!(matches!(err, HarnessError::Config { .. }));
}
