//! The verdict of one test run and how it is reported.
//!
//! A batch runner learns the result two ways: the process exit code (0
//! passed, 1 failed, 2 errored) and, when `HARNESS_OUTCOME_FILE` is set, a
//! JSON object written to that path.

use std::fmt;
use std::io::{self, Write};
use std::process::{ExitCode, Termination};

use serde::Serialize;

use crate::error::HarnessError;

/// Environment variable naming a file to receive the outcome as JSON.
pub const OUTCOME_FILE_ENV: &str = "HARNESS_OUTCOME_FILE";

/// Final verdict of a test run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// The script reached `test_success`.
    Passed,
    /// The shell did not produce the expected output.
    Failed,
    /// The harness or the script broke before a verdict was reached.
    Errored,
}

impl Verdict {
    /// Process exit code for this verdict.
    #[must_use]
    pub const fn exit_code(self) -> u8 {
        match self {
            Self::Passed => 0,
            Self::Failed => 1,
            Self::Errored => 2,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Passed => "PASSED",
            Self::Failed => "FAILED",
            Self::Errored => "ERRORED",
        })
    }
}

/// The outcome of one test run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestOutcome {
    /// Pass, fail or error.
    pub verdict: Verdict,
    /// The test author's message for the failed step.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// The pattern that was being waited for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    /// Output that had not been matched when the run ended.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unmatched: Option<String>,
    /// Full error text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Process id of the shell, for process accounting.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
}

impl TestOutcome {
    /// A passing outcome.
    #[must_use]
    pub const fn passed(pid: Option<u32>) -> Self {
        Self {
            verdict: Verdict::Passed,
            message: None,
            expected: None,
            unmatched: None,
            error: None,
            pid,
        }
    }

    /// A failure reported explicitly by the script.
    #[must_use]
    pub fn failed(message: impl Into<String>, pid: Option<u32>) -> Self {
        Self {
            verdict: Verdict::Failed,
            message: Some(message.into()),
            ..Self::passed(pid)
        }
    }

    /// An error that was not an expectation failure.
    #[must_use]
    pub fn errored(error: impl Into<String>, pid: Option<u32>) -> Self {
        Self {
            verdict: Verdict::Errored,
            error: Some(error.into()),
            ..Self::passed(pid)
        }
    }

    /// Classify `err`: timeouts and early exits fail the test, anything
    /// else is an error in the harness or the script.
    #[must_use]
    pub fn from_error(err: &HarnessError, pid: Option<u32>) -> Self {
        let verdict = if err.is_expectation_failure() {
            Verdict::Failed
        } else {
            Verdict::Errored
        };
        Self {
            verdict,
            message: err.message().map(str::to_string),
            expected: err.pattern().map(str::to_string),
            unmatched: err.buffer().map(str::to_string),
            error: Some(err.to_string()),
            pid,
        }
    }

    /// Whether the run passed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.verdict == Verdict::Passed
    }

    /// Process exit code for this outcome.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.verdict.exit_code()
    }

    /// The outcome as a JSON object.
    ///
    /// # Errors
    ///
    /// Only if serialization itself fails.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Print a human-readable summary to stderr.
    pub fn report(&self) {
        let _ = self.write_report(&mut io::stderr().lock());
    }

    /// Write a human-readable summary to `out`.
    ///
    /// # Errors
    ///
    /// Any error from `out`.
    pub fn write_report<W: Write>(&self, out: &mut W) -> io::Result<()> {
        match (&self.error, &self.message) {
            (Some(error), _) => writeln!(out, "{}: {error}", self.verdict),
            (None, Some(message)) => writeln!(out, "{}: {message}", self.verdict),
            (None, None) => writeln!(out, "{}", self.verdict),
        }
    }

    fn write_outcome_file(&self) {
        let Some(path) = std::env::var_os(OUTCOME_FILE_ENV) else {
            return;
        };
        let written = self
            .to_json()
            .map_err(io::Error::other)
            .and_then(|json| std::fs::write(&path, json));
        if let Err(e) = written {
            tracing::warn!(path = %path.to_string_lossy(), error = %e, "failed to write outcome file");
        }
    }
}

impl fmt::Display for TestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.message, &self.expected) {
            (Some(message), _) => write!(f, "{}: {message}", self.verdict),
            (None, Some(expected)) => write!(f, "{}: expected '{expected}'", self.verdict),
            (None, None) => match &self.error {
                Some(error) if self.verdict != Verdict::Passed => {
                    write!(f, "{}: {}", self.verdict, error.lines().next().unwrap_or(""))
                }
                _ => write!(f, "{}", self.verdict),
            },
        }
    }
}

impl Termination for TestOutcome {
    fn report(self) -> ExitCode {
        let _ = self.write_report(&mut io::stderr().lock());
        self.write_outcome_file();
        ExitCode::from(self.exit_code())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn exit_codes() {
        assert_eq!(TestOutcome::passed(None).exit_code(), 0);
        assert_eq!(TestOutcome::failed("nope", None).exit_code(), 1);
        assert_eq!(TestOutcome::errored("broken", None).exit_code(), 2);
    }

    #[test]
    fn timeout_is_a_failure_with_diagnostics() {
        let err = HarnessError::timeout(Duration::from_secs(1), "cd-test-d", "cush> pwd\r\n")
            .with_message("pwd should print the new directory");
        let outcome = TestOutcome::from_error(&err, Some(42));

        assert_eq!(outcome.verdict, Verdict::Failed);
        assert_eq!(outcome.expected.as_deref(), Some("cd-test-d"));
        assert_eq!(outcome.unmatched.as_deref(), Some("cush> pwd\r\n"));
        assert_eq!(
            outcome.to_string(),
            "FAILED: pwd should print the new directory"
        );
    }

    #[test]
    fn other_errors_are_errored() {
        let outcome = TestOutcome::from_error(&HarnessError::invalid_pattern("empty"), None);
        assert_eq!(outcome.verdict, Verdict::Errored);
        assert!(outcome.expected.is_none());
        assert_eq!(outcome.to_string(), "ERRORED: invalid pattern: empty");
    }

    #[test]
    fn json_shape() {
        let json = TestOutcome::passed(Some(7)).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["verdict"], "passed");
        assert_eq!(value["pid"], 7);
        assert!(value.get("error").is_none());

        let json = TestOutcome::failed("bad", None).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["verdict"], "failed");
        assert_eq!(value["message"], "bad");
    }

    #[test]
    fn human_report() {
        let mut out = Vec::new();
        TestOutcome::passed(None).write_report(&mut out).unwrap();
        assert_eq!(out, b"PASSED\n");

        let mut out = Vec::new();
        TestOutcome::failed("history numbering", None)
            .write_report(&mut out)
            .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "FAILED: history numbering\n");
    }
}
