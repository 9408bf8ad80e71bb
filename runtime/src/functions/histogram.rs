use std::sync::Arc;

use ahash::AHashMap;

use promql_common::hash::Signature;
use promql_common::label::Labels;

use crate::ast::Expr;
use crate::eval::EvalNodeHelper;
use crate::runtime_error::RuntimeResult;
use crate::types::Sample;

/// Label holding a bucket's upper bound.
pub const BUCKET_LABEL: &str = "le";

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Bucket {
    pub upper_bound: f64,
    pub count: f64,
}

struct MetricWithBuckets {
    metric: Labels,
    buckets: Vec<Bucket>,
}

fn parse_bound(s: &str) -> Option<f64> {
    match s {
        "+Inf" | "Inf" | "inf" | "+inf" => Some(f64::INFINITY),
        "-Inf" | "-inf" => Some(f64::NEG_INFINITY),
        _ => s.parse::<f64>().ok(),
    }
}

pub(super) fn histogram_quantile(
    args: &[&[Sample]],
    _call_args: &[Expr],
    enh: &mut EvalNodeHelper,
) -> RuntimeResult<()> {
    let q = args[0].first().map(|s| s.point.v).unwrap_or(f64::NAN);
    let excluded = [BUCKET_LABEL.to_string()];

    let mut order: Vec<Signature> = Vec::new();
    let mut groups: AHashMap<Signature, MetricWithBuckets> = AHashMap::new();
    for el in args[1] {
        let upper_bound = match el.metric.get(BUCKET_LABEL).and_then(parse_bound) {
            Some(b) => b,
            None => continue,
        };
        let sig = el.metric.signature_excluding(&excluded);
        let group = groups.entry(sig).or_insert_with(|| {
            order.push(sig);
            let mut metric = el.metric.as_ref().clone();
            metric.remove(BUCKET_LABEL);
            metric.remove_metric_name();
            MetricWithBuckets {
                metric,
                buckets: Vec::with_capacity(8),
            }
        });
        group.buckets.push(Bucket {
            upper_bound,
            count: el.point.v,
        });
    }

    let ts = enh.ts;
    for sig in order {
        if let Some(mut group) = groups.remove(&sig) {
            let v = bucket_quantile(q, &mut group.buckets);
            enh.out.push(Sample::new(Arc::new(group.metric), ts, v));
        }
    }
    Ok(())
}

/// Estimates the q-quantile from cumulative histogram buckets.
///
/// Buckets are sorted and coalesced in place. The highest bucket must have an upper bound of
/// +Inf, otherwise NaN is returned. If the rank falls into the +Inf bucket, the upper bound of
/// the second highest bucket is returned. If the rank falls into the lowest bucket and its upper
/// bound is not positive, that bound is returned. Otherwise the lower bound of the lowest bucket
/// is assumed to be 0 and the value is interpolated linearly within the matching bucket.
pub(crate) fn bucket_quantile(q: f64, buckets: &mut Vec<Bucket>) -> f64 {
    if q.is_nan() {
        return f64::NAN;
    }
    if q < 0.0 {
        return f64::NEG_INFINITY;
    }
    if q > 1.0 {
        return f64::INFINITY;
    }
    buckets.sort_by(|a, b| a.upper_bound.total_cmp(&b.upper_bound));
    match buckets.last() {
        Some(last) if last.upper_bound == f64::INFINITY => {}
        _ => return f64::NAN,
    }

    coalesce_buckets(buckets);
    ensure_monotonic(buckets);

    if buckets.len() < 2 {
        return f64::NAN;
    }
    let observations = buckets[buckets.len() - 1].count;
    if observations == 0.0 {
        return f64::NAN;
    }
    let mut rank = q * observations;
    let b = buckets[..buckets.len() - 1]
        .iter()
        .position(|bucket| bucket.count >= rank)
        .unwrap_or(buckets.len() - 1);

    if b == buckets.len() - 1 {
        return buckets[buckets.len() - 2].upper_bound;
    }
    if b == 0 && buckets[0].upper_bound <= 0.0 {
        return buckets[0].upper_bound;
    }

    let mut bucket_start = 0.0;
    let bucket_end = buckets[b].upper_bound;
    let mut count = buckets[b].count;
    if b > 0 {
        bucket_start = buckets[b - 1].upper_bound;
        count -= buckets[b - 1].count;
        rank -= buckets[b - 1].count;
    }
    bucket_start + (bucket_end - bucket_start) * (rank / count)
}

/// Merges buckets with the same upper bound by summing their counts. Expects sorted input.
fn coalesce_buckets(buckets: &mut Vec<Bucket>) {
    buckets.dedup_by(|cur, prev| {
        if cur.upper_bound == prev.upper_bound {
            prev.count += cur.count;
            true
        } else {
            false
        }
    });
}

/// Raises any count lower than a preceding one, so counts never decrease with the bound.
/// Scrapes are not atomic across buckets, which can make a cumulative histogram momentarily
/// non-monotonic.
fn ensure_monotonic(buckets: &mut [Bucket]) {
    let mut max = f64::NEG_INFINITY;
    for b in buckets.iter_mut() {
        if b.count > max {
            max = b.count;
        } else if b.count < max {
            b.count = max;
        }
    }
}
