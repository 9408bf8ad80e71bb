use std::fmt;
use std::fmt::Display;

use chrono::Duration;

use crate::runtime_error::{RuntimeError, RuntimeResult};
use crate::types::{now_ms, Timestamp};

/// Keeps millisecond deadlines well inside i64.
pub const MAX_DURATION_MSECS: i64 = 100 * 365 * 24 * 3600 * 1000;

/// Point in time after which a query is abandoned, with the timeout it was derived from for
/// error messages.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Deadline {
    /// unix milliseconds
    pub deadline: Timestamp,
    pub timeout: Duration,
}

impl Deadline {
    /// A deadline `timeout` from now.
    pub fn new(timeout: Duration) -> RuntimeResult<Self> {
        Deadline::with_start_time(now_ms(), timeout)
    }

    pub fn with_start_time(start_time: Timestamp, timeout: Duration) -> RuntimeResult<Self> {
        let millis = timeout.num_milliseconds();
        if millis > MAX_DURATION_MSECS {
            return Err(RuntimeError::ArgumentError(format!(
                "timeout value too large: {timeout}"
            )));
        }
        if millis < 0 {
            return Err(RuntimeError::ArgumentError(format!(
                "negative timeouts are not supported; got {timeout}"
            )));
        }
        Ok(Deadline {
            deadline: start_time + millis,
            timeout,
        })
    }

    pub fn exceeded(&self) -> bool {
        now_ms() > self.deadline
    }

    /// Time left before the deadline, zero once exceeded.
    pub fn remaining(&self) -> std::time::Duration {
        let left = (self.deadline - now_ms()).max(0);
        std::time::Duration::from_millis(left as u64)
    }

    pub(crate) fn check(&self) -> RuntimeResult<()> {
        if self.exceeded() {
            return Err(RuntimeError::DeadlineExceeded(format!(
                "query timed out after {self}"
            )));
        }
        Ok(())
    }
}

impl TryFrom<Duration> for Deadline {
    type Error = RuntimeError;

    fn try_from(timeout: Duration) -> Result<Self, Self::Error> {
        Deadline::new(timeout)
    }
}

impl Display for Deadline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.timeout.num_milliseconds() as f64 / 1e3;
        write!(f, "{secs:.3} seconds")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_negative_and_huge_timeouts() {
        assert!(Deadline::new(Duration::milliseconds(-1)).is_err());
        assert!(Deadline::new(Duration::days(365 * 200)).is_err());
    }

    #[test]
    fn exceeded_deadline() {
        let d = Deadline::with_start_time(now_ms() - 10_000, Duration::seconds(1)).unwrap();
        assert!(d.exceeded());
        assert_eq!(d.remaining(), std::time::Duration::ZERO);
        assert!(matches!(d.check(), Err(RuntimeError::DeadlineExceeded(_))));

        let d = Deadline::new(Duration::minutes(1)).unwrap();
        assert!(!d.exceeded());
        assert!(d.check().is_ok());
    }

    #[test]
    fn display() {
        let d = Deadline::new(Duration::milliseconds(1500)).unwrap();
        assert_eq!(d.to_string(), "1.500 seconds");
    }
}
