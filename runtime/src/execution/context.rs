use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{span_enabled, Level};

use crate::provider::Deadline;
use crate::runtime_error::{RuntimeError, RuntimeResult};

/// Per-query state shared with the caller: the deadline and a cancellation flag.
///
/// Clones share the flag, so a caller can keep one clone and call [`QueryContext::cancel`] while
/// the engine runs with another. Both are checked before every series fetch; evaluation itself is
/// bounded by the sample budget instead.
#[derive(Debug, Clone)]
pub struct QueryContext {
    pub deadline: Deadline,
    cancelled: Arc<AtomicBool>,
    trace_enabled: bool,
}

impl QueryContext {
    pub fn new(deadline: Deadline) -> Self {
        Self {
            deadline,
            cancelled: Arc::new(AtomicBool::new(false)),
            trace_enabled: false,
        }
    }

    pub fn with_trace_enabled(mut self, trace_enabled: bool) -> Self {
        self.trace_enabled = trace_enabled;
        self
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Fails if the query was cancelled or ran past its deadline.
    pub fn check(&self) -> RuntimeResult<()> {
        if self.is_cancelled() {
            return Err(RuntimeError::Cancelled);
        }
        self.deadline.check()
    }

    #[inline]
    pub fn trace_enabled(&self) -> bool {
        self.trace_enabled && span_enabled!(Level::TRACE)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn cancellation_is_shared_by_clones() {
        let ctx = QueryContext::new(Deadline::new(Duration::minutes(1)).unwrap());
        let handle = ctx.clone();
        assert!(ctx.check().is_ok());
        handle.cancel();
        assert!(ctx.is_cancelled());
        assert_eq!(ctx.check(), Err(RuntimeError::Cancelled));
    }
}
