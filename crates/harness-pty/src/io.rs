//! Timed reads over any async byte stream.
//!
//! [`read_available`] is the single place that turns "wait up to `timeout`
//! for output" into one of three outcomes: some bytes, [`PtyError::Timeout`],
//! or [`PtyError::Eof`]. The PTY session uses it for the master side and the
//! in-memory transports used in tests go through it too, so both report
//! exactly the same outcomes.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{PtyError, Result};

/// Size of a single read from the master side.
pub const DEFAULT_READ_CHUNK: usize = 4096;

/// Wait up to `timeout` for bytes from `reader`, filling `buf`.
///
/// Returns the number of bytes read (always non-zero). A zero-length read
/// and `EIO` (what Linux reports on a master whose slaves are all closed)
/// both become [`PtyError::Eof`]. A zero `timeout` still picks up data that
/// is already buffered.
pub async fn read_available<R>(reader: &mut R, buf: &mut [u8], timeout: Duration) -> Result<usize>
where
    R: AsyncRead + Unpin + ?Sized,
{
    loop {
        match tokio::time::timeout(timeout, reader.read(buf)).await {
            Err(_) => return Err(PtyError::Timeout),
            Ok(Ok(0)) => return Err(PtyError::Eof),
            Ok(Ok(n)) => {
                tracing::trace!(bytes = n, "read from terminal");
                return Ok(n);
            }
            Ok(Err(e)) if e.kind() == io::ErrorKind::Interrupted => {}
            Ok(Err(e)) if is_hangup(&e) => return Err(PtyError::Eof),
            Ok(Err(e)) => return Err(PtyError::Io(e)),
        }
    }
}

/// Whether an I/O error means the other side of the terminal is gone.
#[must_use]
pub fn is_hangup(err: &io::Error) -> bool {
    err.raw_os_error() == Some(libc::EIO)
        || matches!(
            err.kind(),
            io::ErrorKind::BrokenPipe | io::ErrorKind::UnexpectedEof
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn returns_available_bytes() {
        let (mut peer, mut reader) = tokio::io::duplex(64);
        peer.write_all(b"hello").await.unwrap();

        let mut buf = [0u8; 16];
        let n = read_available(&mut reader, &mut buf, Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(&buf[..n], b"hello");
    }

    #[tokio::test]
    async fn times_out_when_silent() {
        let (_peer, mut reader) = tokio::io::duplex(64);
        let mut buf = [0u8; 16];
        let err = read_available(&mut reader, &mut buf, Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, PtyError::Timeout));
    }

    #[tokio::test]
    async fn closed_peer_is_eof() {
        let (peer, mut reader) = tokio::io::duplex(64);
        drop(peer);
        let mut buf = [0u8; 16];
        let err = read_available(&mut reader, &mut buf, Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, PtyError::Eof));
    }

    #[tokio::test]
    async fn zero_timeout_sees_buffered_data() {
        let (mut peer, mut reader) = tokio::io::duplex(64);
        peer.write_all(b"x").await.unwrap();
        let mut buf = [0u8; 4];
        let n = read_available(&mut reader, &mut buf, Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(n, 1);
    }

    #[test]
    fn eio_is_hangup() {
        assert!(is_hangup(&io::Error::from_raw_os_error(libc::EIO)));
        assert!(!is_hangup(&io::Error::from_raw_os_error(libc::EAGAIN)));
    }
}
