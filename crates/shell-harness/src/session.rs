//! The async expectation engine.
//!
//! A [`Session`] owns one [`Transport`] and the [`Matcher`] fed from it.
//! Every `expect*` call runs the same loop: search the unmatched output,
//! and if the pattern is not there yet, wait for more bytes until the
//! call's deadline.

use std::time::Duration;

use harness_pty::{DEFAULT_READ_CHUNK, ExitStatus, PtyError, PtyProcess, read_available};
use tokio::io::AsyncWriteExt;

use crate::config::{HarnessConfig, LineEnding};
use crate::error::{HarnessError, Result, SpawnError};
use crate::matcher::Matcher;
use crate::pattern::Pattern;
use crate::transport::Transport;
use crate::types::{Match, SessionState};
use crate::util::{Deadline, to_visible_string};

/// How long to wait for a child that closed its terminal to be reaped.
const REAP_WAIT: Duration = Duration::from_millis(100);

/// A session driving one program over a [`Transport`].
pub struct Session<T: Transport> {
    transport: T,
    matcher: Matcher,
    line_ending: LineEnding,
    default_timeout: Duration,
    state: SessionState,
    read_buf: Box<[u8]>,
}

impl Session<PtyProcess> {
    /// Spawn the configured shell on a fresh pseudo-terminal.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Config`] for an unusable configuration and
    /// [`HarnessError::Spawn`] if the shell cannot be started.
    pub async fn spawn(config: &HarnessConfig) -> Result<Self> {
        config.validate()?;
        if let Some(dir) = &config.working_dir {
            if !dir.is_dir() {
                return Err(SpawnError::InvalidWorkingDir {
                    path: dir.display().to_string(),
                }
                .into());
            }
        }

        let process = PtyProcess::spawn(&config.command, &config.args, &config.to_pty_config())
            .await
            .map_err(SpawnError::from)?;
        tracing::debug!(
            pid = process.pid(),
            command = %config.command,
            args = ?config.args,
            "spawned shell"
        );
        Ok(Self::new(process, config))
    }
}

impl<T: Transport> Session<T> {
    /// Wrap an already-connected transport.
    pub fn new(transport: T, config: &HarnessConfig) -> Self {
        Self {
            transport,
            matcher: Matcher::new(config.max_buffer),
            line_ending: config.line_ending,
            default_timeout: config.timeout,
            state: SessionState::Running,
            read_buf: vec![0u8; DEFAULT_READ_CHUNK].into_boxed_slice(),
        }
    }

    /// Process id of the child, if the transport has one.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.transport.pid()
    }

    /// Current state of the byte stream.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// The matcher and the output it has buffered.
    #[must_use]
    pub const fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// The timeout used when a call does not give its own.
    #[must_use]
    pub const fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Change the default timeout.
    pub fn set_default_timeout(&mut self, timeout: Duration) {
        self.default_timeout = timeout;
    }

    /// Direct access to the transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Send raw bytes to the child.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::SessionClosed`] if the child is gone and
    /// [`HarnessError::Io`] if the write fails for another reason.
    pub async fn send(&mut self, data: &[u8]) -> Result<()> {
        if !self.state.is_usable() || !self.transport.is_alive() {
            return Err(HarnessError::SessionClosed);
        }

        let written = match self.transport.write_all(data).await {
            Ok(()) => self.transport.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            if harness_pty::is_hangup(&e) {
                return Err(HarnessError::SessionClosed);
            }
            return Err(HarnessError::io_context("writing to child", e));
        }

        tracing::debug!(
            pid = self.pid(),
            data = %to_visible_string(data),
            "sent"
        );
        Ok(())
    }

    /// Send `line` followed by the configured line ending.
    ///
    /// # Errors
    ///
    /// Same as [`send`](Self::send).
    pub async fn send_line(&mut self, line: &str) -> Result<()> {
        let mut data = Vec::with_capacity(line.len() + 2);
        data.extend_from_slice(line.as_bytes());
        data.extend_from_slice(self.line_ending.as_bytes());
        self.send(&data).await
    }

    /// Wait for `pattern` using the default timeout.
    ///
    /// # Errors
    ///
    /// See [`expect_timeout`](Self::expect_timeout).
    pub async fn expect(&mut self, pattern: &Pattern) -> Result<Match> {
        self.expect_timeout(pattern, self.default_timeout).await
    }

    /// Wait for the literal text `literal`.
    ///
    /// # Errors
    ///
    /// [`HarnessError::InvalidPattern`] for an empty literal, otherwise see
    /// [`expect_timeout`](Self::expect_timeout).
    pub async fn expect_exact(&mut self, literal: &str) -> Result<Match> {
        let pattern = Pattern::exact(literal)?;
        self.expect(&pattern).await
    }

    /// Wait for the regular expression `pattern`.
    ///
    /// # Errors
    ///
    /// [`HarnessError::InvalidPattern`] or [`HarnessError::Regex`] for an
    /// unusable pattern, otherwise see [`expect_timeout`](Self::expect_timeout).
    pub async fn expect_regex(&mut self, pattern: &str) -> Result<Match> {
        let pattern = Pattern::regex(pattern)?;
        self.expect(&pattern).await
    }

    /// Wait up to `timeout` for `pattern` to appear after the cursor.
    ///
    /// The first occurrence wins and the cursor moves past it. On failure
    /// the cursor is left where it was.
    ///
    /// # Errors
    ///
    /// - [`HarnessError::Timeout`] if the pattern did not appear in time.
    /// - [`HarnessError::Eof`] if the child closed its terminal first.
    /// - [`HarnessError::SessionClosed`] if the session was closed.
    /// - [`HarnessError::Io`] if reading failed.
    pub async fn expect_timeout(&mut self, pattern: &Pattern, timeout: Duration) -> Result<Match> {
        if self.state == SessionState::Closed {
            return Err(HarnessError::SessionClosed);
        }

        let deadline = Deadline::from_now(timeout);
        let mut last_read = false;

        loop {
            if let Some(m) = self.matcher.match_and_consume(pattern) {
                tracing::debug!(
                    pid = self.pid(),
                    %pattern,
                    matched = %to_visible_string(m.matched.as_bytes()),
                    "pattern matched"
                );
                return Ok(m);
            }

            if self.state == SessionState::Eof {
                let status = self.reap_status().await;
                tracing::warn!(pid = self.pid(), %pattern, ?status, "child exited before pattern appeared");
                return Err(HarnessError::eof(
                    pattern.as_str(),
                    status,
                    self.matcher.unmatched_str(),
                ));
            }

            // Once the deadline has passed, drain what is already buffered
            // once more and then give up.
            let remaining = deadline.remaining();
            if remaining.is_zero() {
                if last_read {
                    return Err(self.timeout_error(pattern, timeout));
                }
                last_read = true;
            }

            match read_available(&mut self.transport, &mut self.read_buf, remaining).await {
                Ok(n) => {
                    tracing::trace!(
                        pid = self.transport.pid(),
                        bytes = n,
                        data = %to_visible_string(&self.read_buf[..n]),
                        "received"
                    );
                    self.matcher.append(&self.read_buf[..n]);
                }
                Err(PtyError::Timeout) => return Err(self.timeout_error(pattern, timeout)),
                Err(PtyError::Eof) => {
                    tracing::debug!(pid = self.pid(), "child closed its terminal");
                    self.state = SessionState::Eof;
                }
                Err(PtyError::Io(e)) => {
                    return Err(HarnessError::io_context("reading from child", e));
                }
                Err(other) => {
                    return Err(HarnessError::io_context(
                        "reading from child",
                        std::io::Error::other(other),
                    ));
                }
            }
        }
    }

    fn timeout_error(&self, pattern: &Pattern, timeout: Duration) -> HarnessError {
        tracing::warn!(pid = self.pid(), %pattern, ?timeout, "expectation timed out");
        HarnessError::timeout(timeout, pattern.as_str(), self.matcher.unmatched_str())
    }

    async fn reap_status(&mut self) -> Option<ExitStatus> {
        let deadline = Deadline::from_now(REAP_WAIT);
        loop {
            if let Some(status) = self.transport.exit_status() {
                return Some(status);
            }
            if deadline.is_expired() || self.transport.pid().is_none() {
                return None;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// Terminate the child and close the session. Idempotent.
    pub async fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.transport.terminate().await;
        self.state = SessionState::Closed;
        tracing::debug!(pid = self.pid(), "session closed");
    }
}

impl<T: Transport> std::fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("pid", &self.transport.pid())
            .field("state", &self.state)
            .field("buffer", self.matcher.buffer())
            .field("default_timeout", &self.default_timeout)
            .finish_non_exhaustive()
    }
}
