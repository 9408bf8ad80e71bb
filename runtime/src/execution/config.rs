use chrono::Duration;

use crate::execution::eval::{DEFAULT_LOOKBACK_DELTA, DEFAULT_MAX_SAMPLES};
use crate::runtime_error::{RuntimeError, RuntimeResult};

const DEFAULT_INTERVAL_MSECS: i64 = 60 * 1000;
const DEFAULT_FETCH_TIMEOUT_SECS: i64 = 30;

/// Engine wide query settings.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    /// The maximum age of a sample an instant vector selector still returns.
    pub lookback_delta: Duration,

    /// Evaluation interval used by range queries that pass a step of 0.
    pub default_interval: Duration,

    /// The maximum number of samples a single query may hold in memory. Queries exceeding it are
    /// aborted.
    pub max_samples: usize,

    /// The maximum duration of a query, series fetches included.
    pub timeout: Duration,

    /// Whether query tracing is enabled.
    pub trace_enabled: bool,
}

impl EngineConfig {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_lookback_delta(mut self, lookback_delta: Duration) -> Self {
        self.lookback_delta = lookback_delta;
        self
    }

    pub fn with_default_interval(mut self, interval: Duration) -> Self {
        self.default_interval = interval;
        self
    }

    pub fn with_max_samples(mut self, max_samples: usize) -> Self {
        self.max_samples = max_samples;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_trace_enabled(mut self, trace_enabled: bool) -> Self {
        self.trace_enabled = trace_enabled;
        self
    }

    pub fn validate(&self) -> RuntimeResult<()> {
        let durations = [
            ("lookback_delta", self.lookback_delta),
            ("default_interval", self.default_interval),
            ("timeout", self.timeout),
        ];
        for (name, value) in durations {
            if value <= Duration::zero() {
                return Err(RuntimeError::ArgumentError(format!(
                    "{name} must be positive; got {value}"
                )));
            }
        }
        if self.max_samples == 0 {
            return Err(RuntimeError::ArgumentError(
                "max_samples must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            lookback_delta: Duration::milliseconds(DEFAULT_LOOKBACK_DELTA),
            default_interval: Duration::milliseconds(DEFAULT_INTERVAL_MSECS),
            max_samples: DEFAULT_MAX_SAMPLES,
            timeout: Duration::seconds(DEFAULT_FETCH_TIMEOUT_SECS),
            trace_enabled: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.lookback_delta, Duration::minutes(5));
        assert_eq!(config.default_interval, Duration::minutes(1));
        assert_eq!(config.max_samples, 50_000_000);
        assert_eq!(config.timeout, Duration::seconds(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_non_positive_values() {
        let config = EngineConfig::new().with_lookback_delta(Duration::zero());
        assert!(config.validate().is_err());
        let config = EngineConfig::new().with_default_interval(Duration::seconds(-1));
        assert!(config.validate().is_err());
        let config = EngineConfig::new().with_max_samples(0);
        assert!(config.validate().is_err());
    }
}
