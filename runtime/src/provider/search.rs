use async_trait::async_trait;

use crate::runtime_error::RuntimeResult;
use crate::types::{LabelMatcher, Series, Timestamp};

/// Source of raw series for selectors.
///
/// Implementations return every series matching all `matchers`, restricted to points with
/// `start <= t <= end` (milliseconds). Points must be in ascending time order; series with no
/// points in range may be omitted.
#[async_trait]
pub trait SeriesReader: Sync + Send {
    async fn get_series(
        &self,
        matchers: &[LabelMatcher],
        start: Timestamp,
        end: Timestamp,
    ) -> RuntimeResult<Vec<Series>>;
}

/// A reader without any data.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSeriesReader;

#[async_trait]
impl SeriesReader for NullSeriesReader {
    async fn get_series(
        &self,
        _matchers: &[LabelMatcher],
        _start: Timestamp,
        _end: Timestamp,
    ) -> RuntimeResult<Vec<Series>> {
        Ok(vec![])
    }
}
