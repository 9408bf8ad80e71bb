use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use promql_common::hash::Signature;
use promql_common::label::Labels;

use crate::provider::SeriesReader;
use crate::runtime_error::{RuntimeError, RuntimeResult};
use crate::types::{matches_all, LabelMatcher, Point, Series, Timestamp};

#[derive(Debug, Clone)]
struct StoredSeries {
    metric: Arc<Labels>,
    points: Vec<Point>,
    need_sort: bool,
}

/// In-memory implementation of [`SeriesReader`], primarily for tests.
#[derive(Default, Debug)]
pub struct MemorySeriesReader {
    inner: RwLock<BTreeMap<Signature, StoredSeries>>,
}

fn poisoned<T>(_: T) -> RuntimeError {
    RuntimeError::Reader("series storage lock poisoned".to_string())
}

impl MemorySeriesReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one point to the series identified by `labels`.
    pub fn append(&self, labels: Labels, t: Timestamp, v: f64) -> RuntimeResult<()> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        match inner.entry(labels.signature()) {
            Entry::Vacant(e) => {
                e.insert(StoredSeries {
                    metric: Arc::new(labels),
                    points: vec![Point::new(t, v)],
                    need_sort: false,
                });
            }
            Entry::Occupied(mut e) => {
                let series = e.get_mut();
                if series.points.last().is_some_and(|p| p.t > t) {
                    series.need_sort = true;
                }
                series.points.push(Point::new(t, v));
            }
        }
        Ok(())
    }

    /// Adds `values` to the series identified by `labels` at `start`, `start + step`, ...
    pub fn append_values(
        &self,
        labels: Labels,
        start: Timestamp,
        step: i64,
        values: &[f64],
    ) -> RuntimeResult<()> {
        for (i, v) in values.iter().enumerate() {
            self.append(labels.clone(), start + i as i64 * step, *v)?;
        }
        Ok(())
    }

    pub fn series_count(&self) -> usize {
        self.inner.read().map(|inner| inner.len()).unwrap_or_default()
    }

    pub fn clear(&self) -> RuntimeResult<()> {
        self.inner.write().map_err(poisoned)?.clear();
        Ok(())
    }

    fn sort_pending(&self) -> RuntimeResult<()> {
        let needs_sort = self
            .inner
            .read()
            .map_err(poisoned)?
            .values()
            .any(|s| s.need_sort);
        if !needs_sort {
            return Ok(());
        }
        let mut inner = self.inner.write().map_err(poisoned)?;
        for series in inner.values_mut().filter(|s| s.need_sort) {
            series.points.sort_by_key(|p| p.t);
            series.need_sort = false;
        }
        Ok(())
    }

    pub fn search(
        &self,
        matchers: &[LabelMatcher],
        start: Timestamp,
        end: Timestamp,
    ) -> RuntimeResult<Vec<Series>> {
        self.sort_pending()?;
        let inner = self.inner.read().map_err(poisoned)?;
        let result = inner
            .values()
            .filter(|s| matches_all(matchers, &s.metric))
            .filter_map(|s| {
                let lo = s.points.partition_point(|p| p.t < start);
                let hi = s.points.partition_point(|p| p.t <= end);
                if lo >= hi {
                    return None;
                }
                Some(Series {
                    metric: Arc::clone(&s.metric),
                    points: s.points[lo..hi].to_vec(),
                })
            })
            .collect();
        Ok(result)
    }
}

#[async_trait]
impl SeriesReader for MemorySeriesReader {
    async fn get_series(
        &self,
        matchers: &[LabelMatcher],
        start: Timestamp,
        end: Timestamp,
    ) -> RuntimeResult<Vec<Series>> {
        self.search(matchers, start, end)
    }
}
