//! Unix child process management for PTY sessions.
//!
//! The child is spawned through `tokio::process` with the PTY slave as its
//! stdio, in a fresh session whose controlling terminal is that slave. The
//! child's pid therefore doubles as its process-group id, which lets us
//! signal the shell together with anything it started.

use std::ffi::OsStr;
use std::io;
use std::os::unix::io::OwnedFd;
use std::process::Stdio;

use rustix::process::{Pid, Signal, kill_process, kill_process_group};
use tokio::process::{Child as TokioChild, Command};

use crate::config::{PtyConfig, PtySignal};
use crate::error::{PtyError, Result};
use crate::status::ExitStatus;

/// Handle for a child process running on a PTY slave.
pub struct UnixPtyChild {
    child: TokioChild,
    pid: u32,
    status: Option<ExitStatus>,
}

impl std::fmt::Debug for UnixPtyChild {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnixPtyChild")
            .field("pid", &self.pid)
            .field("status", &self.status)
            .finish()
    }
}

impl UnixPtyChild {
    fn new(child: TokioChild) -> Result<Self> {
        let pid = child.id().ok_or_else(|| {
            PtyError::Spawn(io::Error::other("child exited before its pid was observed"))
        })?;
        Ok(Self {
            child,
            pid,
            status: None,
        })
    }

    /// Get the process ID.
    #[must_use]
    pub const fn pid(&self) -> u32 {
        self.pid
    }

    /// The exit status, if the child has already been reaped.
    #[must_use]
    pub const fn exit_status(&self) -> Option<ExitStatus> {
        self.status
    }

    /// Check whether the child has exited, without blocking.
    pub fn try_wait(&mut self) -> Result<Option<ExitStatus>> {
        if let Some(status) = self.status {
            return Ok(Some(status));
        }
        let status = self.child.try_wait().map_err(PtyError::Wait)?;
        self.status = status.map(ExitStatus::from);
        Ok(self.status)
    }

    /// Whether the child is still running.
    pub fn is_running(&mut self) -> bool {
        matches!(self.try_wait(), Ok(None))
    }

    /// Wait for the child process to exit.
    pub async fn wait(&mut self) -> Result<ExitStatus> {
        if let Some(status) = self.status {
            return Ok(status);
        }
        let status = ExitStatus::from(self.child.wait().await.map_err(PtyError::Wait)?);
        self.status = Some(status);
        Ok(status)
    }

    fn raw_pid(&self) -> Result<Pid> {
        Pid::from_raw(self.pid as i32).ok_or_else(|| {
            PtyError::Signal(io::Error::new(io::ErrorKind::InvalidInput, "invalid pid"))
        })
    }

    fn raw_signal(signal: PtySignal) -> Result<Signal> {
        Signal::from_named_raw(signal.as_unix_signal()).ok_or_else(|| {
            PtyError::Signal(io::Error::new(
                io::ErrorKind::InvalidInput,
                "invalid signal",
            ))
        })
    }

    /// Send a signal to the child process only.
    pub fn signal(&self, signal: PtySignal) -> Result<()> {
        if self.status.is_some() {
            return Err(PtyError::Closed);
        }
        kill_process(self.raw_pid()?, Self::raw_signal(signal)?)
            .map_err(|e| PtyError::Signal(io::Error::from_raw_os_error(e.raw_os_error())))
    }

    /// Send a signal to the child's whole process group.
    ///
    /// This still works after the leader has been reaped, as long as any
    /// member of the group (a backgrounded `sleep`, say) is alive.
    pub fn signal_group(&self, signal: PtySignal) -> Result<()> {
        kill_process_group(self.raw_pid()?, Self::raw_signal(signal)?)
            .map_err(|e| PtyError::Signal(io::Error::from_raw_os_error(e.raw_os_error())))
    }

    /// Kill the child process (SIGKILL).
    pub fn kill(&self) -> Result<()> {
        self.signal(PtySignal::Kill)
    }
}

/// Spawn `program` with the given PTY slave as stdin, stdout and stderr.
///
/// The child gets a new session (and process group) and, when
/// `config.controlling_terminal` is set, the slave as its controlling
/// terminal.
pub fn spawn_child<S, I>(
    slave_fd: &OwnedFd,
    program: S,
    args: I,
    config: &PtyConfig,
) -> Result<UnixPtyChild>
where
    S: AsRef<OsStr>,
    I: IntoIterator,
    I::Item: AsRef<OsStr>,
{
    let program = program.as_ref();

    if let Some(dir) = &config.working_directory {
        if !dir.is_dir() {
            return Err(PtyError::Spawn(io::Error::new(
                io::ErrorKind::NotFound,
                format!("working directory {} does not exist", dir.display()),
            )));
        }
    }

    let mut cmd = Command::new(program);
    cmd.args(args);
    cmd.env_clear();
    cmd.envs(config.effective_env());
    cmd.kill_on_drop(true);

    if let Some(dir) = &config.working_directory {
        cmd.current_dir(dir);
    }

    cmd.stdin(Stdio::from(slave_fd.try_clone().map_err(PtyError::Spawn)?));
    cmd.stdout(Stdio::from(slave_fd.try_clone().map_err(PtyError::Spawn)?));
    cmd.stderr(Stdio::from(slave_fd.try_clone().map_err(PtyError::Spawn)?));

    if config.controlling_terminal {
        // SAFETY: setsid and ioctl are async-signal-safe. The closure runs
        // after stdio has been redirected, so fd 0 is the PTY slave.
        #[allow(unsafe_code)]
        unsafe {
            cmd.pre_exec(|| {
                if libc::setsid() == -1 {
                    return Err(io::Error::last_os_error());
                }
                if libc::ioctl(0, libc::TIOCSCTTY, 0) == -1 {
                    return Err(io::Error::last_os_error());
                }
                Ok(())
            });
        }
    } else {
        cmd.process_group(0);
    }

    let child = cmd.spawn().map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            PtyError::CommandNotFound {
                command: program.to_string_lossy().into_owned(),
            }
        } else {
            PtyError::Spawn(e)
        }
    })?;

    let child = UnixPtyChild::new(child)?;
    tracing::debug!(pid = child.pid(), program = %program.to_string_lossy(), "spawned child on PTY");
    Ok(child)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unix::{UnixPtyMaster, open_slave};

    fn slave() -> Option<(UnixPtyMaster, OwnedFd)> {
        let (master, path) = UnixPtyMaster::open().ok()?;
        let fd = open_slave(&path).ok()?;
        Some((master, fd))
    }

    #[tokio::test]
    async fn missing_program_is_command_not_found() {
        let Some((_master, fd)) = slave() else {
            eprintln!("skipping: PTY allocation unavailable");
            return;
        };
        let err = spawn_child(
            &fd,
            "/definitely/not/a/program",
            std::iter::empty::<&str>(),
            &PtyConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, PtyError::CommandNotFound { .. }));
    }

    #[tokio::test]
    async fn missing_workdir_is_spawn_error() {
        let Some((_master, fd)) = slave() else {
            eprintln!("skipping: PTY allocation unavailable");
            return;
        };
        let config = PtyConfig::builder()
            .working_directory("/definitely/not/a/dir")
            .build();
        let err = spawn_child(&fd, "/bin/sh", std::iter::empty::<&str>(), &config).unwrap_err();
        assert!(matches!(err, PtyError::Spawn(_)));
    }

    #[tokio::test]
    async fn wait_reports_exit_code() {
        let Some((_master, fd)) = slave() else {
            eprintln!("skipping: PTY allocation unavailable");
            return;
        };
        let mut child = spawn_child(&fd, "/bin/sh", ["-c", "exit 3"], &PtyConfig::default())
            .unwrap();
        let status = child.wait().await.unwrap();
        assert_eq!(status.code(), Some(3));
        assert!(!child.is_running());
        assert!(matches!(child.kill(), Err(PtyError::Closed)));
    }
}
