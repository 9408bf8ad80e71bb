use std::sync::Arc;

use ahash::AHashMap;
use lockfree_object_pool::{LinearObjectPool, LinearReusable};

use promql_common::hash::Signature;
use promql_common::label::Labels;

use crate::ast::LabelSelector;
use crate::types::{Sample, Timestamp};

/// Scratch buffers for one query. Buffers are checked out with [`EvalPool::vector`] and return
/// to the pool when the guard is dropped.
pub struct EvalPool {
    samples: LinearObjectPool<Vec<Sample>>,
}

impl EvalPool {
    pub fn new() -> Self {
        Self {
            samples: LinearObjectPool::new(Vec::new, |v| v.clear()),
        }
    }

    pub fn vector(&self) -> LinearReusable<'_, Vec<Sample>> {
        self.samples.pull()
    }
}

impl Default for EvalPool {
    fn default() -> Self {
        Self::new()
    }
}

/// Identity of a label set allocation, used as a cache key.
///
/// Keys are only taken from operand label sets, which stay alive for as long as the helper.
#[inline]
fn key(labels: &Arc<Labels>) -> usize {
    Arc::as_ptr(labels) as usize
}

/// Per-node state carried across the steps of one range evaluation.
pub struct EvalNodeHelper<'p> {
    /// Evaluation timestamp of the current step.
    pub ts: Timestamp,
    /// Output of the current step.
    pub out: LinearReusable<'p, Vec<Sample>>,
    empty: Arc<Labels>,
    dropped_names: AHashMap<usize, Arc<Labels>>,
    signatures: AHashMap<usize, Signature>,
    result_metrics: AHashMap<(usize, usize), Arc<Labels>>,
}

impl<'p> EvalNodeHelper<'p> {
    pub fn new(out: LinearReusable<'p, Vec<Sample>>) -> Self {
        Self {
            ts: 0,
            out,
            empty: Arc::new(Labels::new()),
            dropped_names: AHashMap::new(),
            signatures: AHashMap::new(),
            result_metrics: AHashMap::new(),
        }
    }

    pub fn empty_labels(&self) -> Arc<Labels> {
        Arc::clone(&self.empty)
    }

    /// `metric` without its `__name__` label.
    pub fn drop_metric_name(&mut self, metric: &Arc<Labels>) -> Arc<Labels> {
        if metric.metric_name().is_none() {
            return Arc::clone(metric);
        }
        Arc::clone(
            self.dropped_names
                .entry(key(metric))
                .or_insert_with(|| Arc::new(metric.without_metric_name())),
        )
    }

    /// Matching signature of `metric`. A helper serves a single node, so `selector` is the same
    /// on every call.
    pub fn signature(&mut self, selector: &LabelSelector, metric: &Arc<Labels>) -> Signature {
        *self
            .signatures
            .entry(key(metric))
            .or_insert_with(|| selector.signature(metric))
    }

    /// Memoized result labels for a pair of operand label sets.
    pub fn result_metric<F>(&mut self, lhs: &Arc<Labels>, rhs: &Arc<Labels>, f: F) -> Arc<Labels>
    where
        F: FnOnce() -> Labels,
    {
        Arc::clone(
            self.result_metrics
                .entry((key(lhs), key(rhs)))
                .or_insert_with(|| Arc::new(f())),
        )
    }

    pub fn push(&mut self, metric: Arc<Labels>, v: f64) {
        let ts = self.ts;
        self.out.push(Sample::new(metric, ts, v));
    }
}
