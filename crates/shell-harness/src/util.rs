//! Small helpers shared by the session and the driver.

use std::fmt::Write as _;
use std::time::Duration;

/// A deadline tracker for operations that read in several steps.
///
/// One `expect` may need many reads; the deadline is fixed when the
/// expectation starts so the total wait never exceeds its timeout.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    deadline: tokio::time::Instant,
}

impl Deadline {
    /// Create a new deadline from now.
    #[must_use]
    pub fn from_now(duration: Duration) -> Self {
        let now = tokio::time::Instant::now();
        Self {
            deadline: now.checked_add(duration).unwrap_or_else(|| far_future(now)),
        }
    }

    /// Check if the deadline has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        tokio::time::Instant::now() >= self.deadline
    }

    /// Get the remaining time until the deadline.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.deadline
            .saturating_duration_since(tokio::time::Instant::now())
    }
}

fn far_future(now: tokio::time::Instant) -> tokio::time::Instant {
    // roughly 30 years, the same horizon tokio uses for "never"
    now + Duration::from_secs(86_400 * 365 * 30)
}

/// Render terminal bytes with control characters made visible, for logs.
///
/// `\r` becomes `^M`, ESC becomes `^[`; newlines and tabs are kept.
#[must_use]
pub fn to_visible_string(data: &[u8]) -> String {
    let s = String::from_utf8_lossy(data);
    let mut result = String::with_capacity(s.len());

    for c in s.chars() {
        if c.is_control() && c != '\n' && c != '\t' {
            let code = u32::from(c);
            if code < 0x20 {
                result.push('^');
                result.push(char::from(b'@' + code as u8));
            } else {
                let _ = write!(result, "\\x{code:02x}");
            }
        } else {
            result.push(c);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn deadline_remaining() {
        let deadline = Deadline::from_now(Duration::from_secs(10));
        assert!(!deadline.is_expired());
        assert!(deadline.remaining() > Duration::from_secs(9));
    }

    #[tokio::test]
    async fn zero_deadline_is_expired() {
        let deadline = Deadline::from_now(Duration::ZERO);
        assert!(deadline.is_expired());
        assert_eq!(deadline.remaining(), Duration::ZERO);
    }

    #[tokio::test]
    async fn huge_deadline_does_not_overflow() {
        let deadline = Deadline::from_now(Duration::MAX);
        assert!(!deadline.is_expired());
    }

    #[test]
    fn visible_control_characters() {
        assert_eq!(to_visible_string(b"pwd\r\n"), "pwd^M\n");
        assert_eq!(to_visible_string(b"\x1b[0m"), "^[[0m");
        assert_eq!(to_visible_string(b"\x7f"), "\\x7f");
    }
}
