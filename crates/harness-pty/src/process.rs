//! A child process attached to a pseudo-terminal.
//!
//! [`PtyProcess`] pairs the master side of a PTY with the child running on
//! its slave side and owns both for its whole lifetime: dropping it (or
//! awaiting [`PtyProcess::terminate`]) guarantees the child and its process
//! group are gone.

use std::ffi::OsStr;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};

use crate::config::{PtyConfig, PtySignal, WindowSize};
use crate::error::{PtyError, Result};
use crate::io::{DEFAULT_READ_CHUNK, is_hangup, read_available};
use crate::status::ExitStatus;
use crate::unix::{UnixPtyChild, UnixPtyMaster, open_slave, spawn_child};

/// An interactive program running on a pseudo-terminal.
#[derive(Debug)]
pub struct PtyProcess {
    master: UnixPtyMaster,
    child: UnixPtyChild,
    grace_period: Duration,
    terminated: bool,
    read_buf: Box<[u8]>,
}

impl PtyProcess {
    /// Allocate a PTY and start `program` on it.
    ///
    /// # Errors
    ///
    /// - [`PtyError::CommandNotFound`] if `program` cannot be found.
    /// - [`PtyError::Create`] if no PTY can be allocated.
    /// - [`PtyError::Spawn`] for any other failure to start the child.
    pub async fn spawn<S, I>(program: S, args: I, config: &PtyConfig) -> Result<Self>
    where
        S: AsRef<OsStr>,
        I: IntoIterator,
        I::Item: AsRef<OsStr>,
    {
        let (master, slave_path) = UnixPtyMaster::open()?;
        master.set_window_size(config.window_size.into())?;

        // Our copy of the slave is closed when this scope ends, leaving the
        // child's stdio as the only slave descriptors.
        let slave_fd = open_slave(&slave_path)?;
        let child = spawn_child(&slave_fd, program, args, config)?;
        drop(slave_fd);

        Ok(Self {
            master,
            child,
            grace_period: config.grace_period,
            terminated: false,
            read_buf: vec![0u8; DEFAULT_READ_CHUNK].into_boxed_slice(),
        })
    }

    /// The child's process id.
    #[must_use]
    pub const fn pid(&self) -> u32 {
        self.child.pid()
    }

    /// Whether the child is still running.
    pub fn is_alive(&mut self) -> bool {
        !self.terminated && self.child.is_running()
    }

    /// The child's exit status, once it has been reaped.
    pub fn exit_status(&mut self) -> Option<ExitStatus> {
        self.child.try_wait().ok().flatten()
    }

    /// Deliver `bytes` to the child as if typed at its terminal.
    ///
    /// # Errors
    ///
    /// [`PtyError::Closed`] if the child is no longer alive.
    pub async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        if !self.is_alive() {
            return Err(PtyError::Closed);
        }
        match self.master.write_all(bytes).await {
            Ok(()) => {}
            Err(e) if is_hangup(&e) => return Err(PtyError::Closed),
            Err(e) => return Err(PtyError::Io(e)),
        }
        self.master.flush().await?;
        tracing::trace!(pid = self.pid(), bytes = bytes.len(), "wrote to terminal");
        Ok(())
    }

    /// Wait up to `timeout` for output from the child.
    ///
    /// Returns at least one byte, or [`PtyError::Timeout`] if nothing
    /// arrived, or [`PtyError::Eof`] once the child has closed its terminal.
    pub async fn read_available(&mut self, timeout: Duration) -> Result<Vec<u8>> {
        let n = read_available(&mut self.master, &mut self.read_buf, timeout).await?;
        Ok(self.read_buf[..n].to_vec())
    }

    /// Send a signal to the child.
    pub fn signal(&self, signal: PtySignal) -> Result<()> {
        self.child.signal(signal)
    }

    /// Resize the terminal; the child receives SIGWINCH.
    pub fn resize(&self, size: WindowSize) -> Result<()> {
        self.master.set_window_size(size)
    }

    /// End the child and everything in its process group.
    ///
    /// Sends SIGHUP (what a shell gets when its terminal closes), waits up
    /// to the grace period, then SIGKILLs and reaps. Calling it again is a
    /// no-op; failures are logged, never returned.
    pub async fn terminate(&mut self) {
        if self.terminated {
            return;
        }
        self.terminated = true;
        let pid = self.pid();

        if let Ok(Some(status)) = self.child.try_wait() {
            tracing::debug!(pid, %status, "child already exited");
        } else {
            let _ = self.child.signal_group(PtySignal::Hangup);
            match tokio::time::timeout(self.grace_period, self.child.wait()).await {
                Ok(Ok(status)) => tracing::debug!(pid, %status, "child exited after SIGHUP"),
                _ => {
                    tracing::warn!(pid, grace = ?self.grace_period, "child ignored SIGHUP, killing");
                    let _ = self.child.signal_group(PtySignal::Kill);
                    if let Err(e) = self.child.kill() {
                        tracing::trace!(pid, error = %e, "direct kill failed");
                    }
                    match tokio::time::timeout(self.grace_period, self.child.wait()).await {
                        Ok(Ok(status)) => tracing::debug!(pid, %status, "child reaped"),
                        Ok(Err(e)) => tracing::warn!(pid, error = %e, "failed to reap child"),
                        Err(_) => tracing::warn!(pid, "child did not exit after SIGKILL"),
                    }
                }
            }
        }

        // Stragglers (background jobs) may outlive the leader.
        let _ = self.child.signal_group(PtySignal::Kill);
    }

    /// Whether [`terminate`](Self::terminate) has run.
    #[must_use]
    pub const fn is_terminated(&self) -> bool {
        self.terminated
    }
}

impl Drop for PtyProcess {
    fn drop(&mut self) {
        if self.terminated {
            return;
        }
        let pid = self.pid();
        tracing::debug!(pid, "dropping live PTY session, killing process group");
        let _ = self.child.signal_group(PtySignal::Kill);
        let _ = self.child.try_wait();
    }
}

impl AsyncRead for PtyProcess {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.master).poll_read(cx, buf)
    }
}

impl AsyncWrite for PtyProcess {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.master).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.master).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.master).poll_shutdown(cx)
    }
}
