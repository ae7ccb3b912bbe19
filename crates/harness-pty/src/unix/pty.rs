//! Unix PTY allocation and the async master side.

use std::io;
use std::os::unix::io::{AsRawFd, OwnedFd, RawFd};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};

use rustix::fs::{Mode, OFlags, fcntl_setfl, open};
use rustix::io::{FdFlags, fcntl_setfd};
use rustix::pty::{OpenptFlags, grantpt, openpt, ptsname, unlockpt};
use rustix::termios::{Winsize, tcgetwinsize, tcsetwinsize};
use tokio::io::unix::AsyncFd;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::config::WindowSize;
use crate::error::{PtyError, Result};

fn create_error(errno: rustix::io::Errno) -> PtyError {
    PtyError::Create(io::Error::from_raw_os_error(errno.raw_os_error()))
}

/// The master side of a Unix pseudo-terminal.
///
/// Reads yield whatever the child wrote to its terminal (including the
/// terminal's echo of our own input); writes are delivered to the child as
/// if typed. Once every slave descriptor is closed, reads report
/// end-of-stream.
pub struct UnixPtyMaster {
    async_fd: AsyncFd<OwnedFd>,
}

impl std::fmt::Debug for UnixPtyMaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnixPtyMaster")
            .field("fd", &self.async_fd.as_raw_fd())
            .finish()
    }
}

impl UnixPtyMaster {
    /// Allocate a new PTY pair and return the master with the slave's path.
    ///
    /// The master descriptor is non-blocking and close-on-exec, so the
    /// child never inherits it.
    ///
    /// # Errors
    ///
    /// Returns [`PtyError::Create`] if allocation fails.
    pub fn open() -> Result<(Self, PathBuf)> {
        let master_fd = openpt(OpenptFlags::RDWR | OpenptFlags::NOCTTY).map_err(create_error)?;

        grantpt(&master_fd).map_err(create_error)?;
        unlockpt(&master_fd).map_err(create_error)?;

        let slave_name = ptsname(&master_fd, Vec::new()).map_err(create_error)?;
        let slave_path = slave_name
            .to_str()
            .map(PathBuf::from)
            .map_err(|_| {
                PtyError::Create(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "invalid slave path encoding",
                ))
            })?;

        fcntl_setfd(&master_fd, FdFlags::CLOEXEC).map_err(create_error)?;
        fcntl_setfl(&master_fd, OFlags::NONBLOCK).map_err(create_error)?;

        let async_fd = AsyncFd::new(master_fd).map_err(PtyError::Create)?;

        Ok((Self { async_fd }, slave_path))
    }

    /// Set the window size.
    pub fn set_window_size(&self, size: WindowSize) -> Result<()> {
        let winsize = Winsize {
            ws_col: size.cols,
            ws_row: size.rows,
            ws_xpixel: 0,
            ws_ypixel: 0,
        };

        tcsetwinsize(self.async_fd.get_ref(), winsize)
            .map_err(|e| PtyError::Resize(io::Error::from_raw_os_error(e.raw_os_error())))
    }

    /// Get the current window size.
    pub fn window_size(&self) -> Result<WindowSize> {
        let winsize = tcgetwinsize(self.async_fd.get_ref())?;
        Ok(WindowSize::new(winsize.ws_col, winsize.ws_row))
    }
}

impl AsRawFd for UnixPtyMaster {
    fn as_raw_fd(&self) -> RawFd {
        self.async_fd.as_raw_fd()
    }
}

impl AsyncRead for UnixPtyMaster {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        loop {
            let mut guard = match self.async_fd.poll_read_ready(cx) {
                Poll::Ready(Ok(guard)) => guard,
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                Poll::Pending => return Poll::Pending,
            };

            let unfilled = buf.initialize_unfilled();
            match rustix::io::read(self.async_fd.get_ref(), unfilled) {
                Ok(n) => {
                    buf.advance(n);
                    return Poll::Ready(Ok(()));
                }
                Err(rustix::io::Errno::AGAIN) => {
                    guard.clear_ready();
                }
                Err(rustix::io::Errno::INTR) => {}
                // Linux reports a hung-up master as EIO rather than a 0-byte read.
                Err(rustix::io::Errno::IO) => return Poll::Ready(Ok(())),
                Err(e) => {
                    return Poll::Ready(Err(io::Error::from_raw_os_error(e.raw_os_error())));
                }
            }
        }
    }
}

impl AsyncWrite for UnixPtyMaster {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        loop {
            let mut guard = match self.async_fd.poll_write_ready(cx) {
                Poll::Ready(Ok(guard)) => guard,
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                Poll::Pending => return Poll::Pending,
            };

            match rustix::io::write(self.async_fd.get_ref(), buf) {
                Ok(n) => return Poll::Ready(Ok(n)),
                Err(rustix::io::Errno::AGAIN) => {
                    guard.clear_ready();
                }
                Err(rustix::io::Errno::INTR) => {}
                Err(e) => {
                    return Poll::Ready(Err(io::Error::from_raw_os_error(e.raw_os_error())));
                }
            }
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Open the slave side of a PTY (read/write, close-on-exec, not yet our
/// controlling terminal).
pub fn open_slave(path: &Path) -> Result<OwnedFd> {
    open(
        path,
        OFlags::RDWR | OFlags::NOCTTY | OFlags::CLOEXEC,
        Mode::empty(),
    )
    .map_err(create_error)
}
