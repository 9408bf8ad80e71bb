use std::sync::Arc;

use serde::{Deserialize, Serialize};

use promql_common::hash::Signature;
use promql_common::label::Labels;

/// Unix time in milliseconds.
pub type Timestamp = i64;

/// Current wall clock time in milliseconds.
pub fn now_ms() -> Timestamp {
    chrono::Utc::now().timestamp_millis()
}

/// Bit pattern Prometheus writes to mark a series as stale.
pub const STALE_NAN_BITS: u64 = 0x7ff0000000000002;

#[inline]
pub fn is_stale_nan(v: f64) -> bool {
    v.to_bits() == STALE_NAN_BITS
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub t: Timestamp,
    pub v: f64,
}

impl Point {
    pub fn new(t: Timestamp, v: f64) -> Self {
        Self { t, v }
    }
}

/// A single value of an instant vector.
///
/// Label sets are reference counted: a selector's series identity is shared by every sample it
/// produces during evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub metric: Arc<Labels>,
    pub point: Point,
}

impl Sample {
    pub fn new(metric: Arc<Labels>, t: Timestamp, v: f64) -> Self {
        Self {
            metric,
            point: Point { t, v },
        }
    }

    #[inline]
    pub fn value(&self) -> f64 {
        self.point.v
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub metric: Arc<Labels>,
    /// Points in ascending time order.
    pub points: Vec<Point>,
}

impl Series {
    pub fn new(metric: Labels, points: Vec<Point>) -> Self {
        Self {
            metric: Arc::new(metric),
            points,
        }
    }

    pub fn signature(&self) -> Signature {
        self.metric.signature()
    }
}

/// An instant vector: at most one sample per distinct label set.
pub type Vector = Vec<Sample>;

/// A range vector: at most one series per distinct label set.
pub type Matrix = Vec<Series>;

/// Returns the first label set occurring more than once, if any.
pub(crate) fn find_duplicate_labels<'a, I>(labels: I) -> Option<&'a Labels>
where
    I: IntoIterator<Item = &'a Arc<Labels>>,
{
    let mut seen = ahash::AHashSet::new();
    labels
        .into_iter()
        .find(|m| !seen.insert(m.signature()))
        .map(|m| m.as_ref())
}

pub(crate) fn total_points(matrix: &[Series]) -> usize {
    matrix.iter().map(|s| s.points.len()).sum()
}
