use crate::runtime_error::{RuntimeError, RuntimeResult};
use crate::types::Timestamp;

/// Evaluation window of one query. Instant queries have `start == end`.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalConfig {
    pub start: Timestamp,
    pub end: Timestamp,
    /// milliseconds between steps
    pub step: i64,
    /// maximum age of a sample usable by an instant selector, in milliseconds
    pub lookback_delta: i64,
    pub max_samples: usize,
}

pub const DEFAULT_LOOKBACK_DELTA: i64 = 5 * 60 * 1000;
pub const DEFAULT_MAX_SAMPLES: usize = 50_000_000;

impl EvalConfig {
    pub fn new(start: Timestamp, end: Timestamp, step: i64) -> Self {
        EvalConfig {
            start,
            end,
            step,
            ..Default::default()
        }
    }

    pub fn instant(time: Timestamp) -> Self {
        EvalConfig::new(time, time, 1)
    }

    pub fn with_lookback_delta(mut self, lookback_delta: i64) -> Self {
        self.lookback_delta = lookback_delta;
        self
    }

    pub fn with_max_samples(mut self, max_samples: usize) -> Self {
        self.max_samples = max_samples;
        self
    }

    pub fn is_instant(&self) -> bool {
        self.start == self.end
    }

    pub fn validate(&self) -> RuntimeResult<()> {
        if self.start > self.end {
            let msg = format!(
                "start cannot exceed end; got {} vs {}",
                self.start, self.end
            );
            return Err(RuntimeError::ArgumentError(msg));
        }
        if self.step <= 0 {
            let msg = format!("step must be greater than 0; got {}", self.step);
            return Err(RuntimeError::ArgumentError(msg));
        }
        if self.lookback_delta <= 0 {
            let msg = format!(
                "lookback delta must be greater than 0; got {}",
                self.lookback_delta
            );
            return Err(RuntimeError::ArgumentError(msg));
        }
        Ok(())
    }

    pub fn num_steps(&self) -> usize {
        if self.is_instant() {
            return 1;
        }
        ((self.end - self.start) / self.step) as usize + 1
    }

    /// Evaluation timestamps from `start` to `end` inclusive.
    pub fn timestamps(&self) -> impl Iterator<Item = Timestamp> {
        let (start, step) = (self.start, self.step.max(1));
        (0..self.num_steps() as i64).map(move |i| start + i * step)
    }
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            start: 0,
            end: 0,
            step: 1,
            lookback_delta: DEFAULT_LOOKBACK_DELTA,
            max_samples: DEFAULT_MAX_SAMPLES,
        }
    }
}
