use std::cmp::Ordering;
use std::sync::Arc;

use ahash::AHashMap;

use promql_common::hash::Signature;
use promql_common::label::Labels;

use crate::ast::{AggregateOp, LabelSelector};
use crate::eval::EvalNodeHelper;
use crate::functions::quantile;
use crate::runtime_error::{RuntimeError, RuntimeResult};
use crate::types::Sample;

/// The evaluated parameter of an aggregation at one step.
#[derive(Debug, Clone, Copy)]
pub(super) enum AggrParam<'a> {
    None,
    Scalar(f64),
    Label(&'a str),
}

impl AggrParam<'_> {
    fn scalar(&self, op: AggregateOp) -> RuntimeResult<f64> {
        match self {
            AggrParam::Scalar(v) => Ok(*v),
            _ => Err(RuntimeError::ArgumentError(format!(
                "{op}() expects a scalar parameter"
            ))),
        }
    }
}

struct Group<'s> {
    labels: Labels,
    samples: Vec<&'s Sample>,
}

/// Label names must match `[a-zA-Z_][a-zA-Z0-9_]*`.
pub(crate) fn is_valid_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Formats a sample value the way it is exposed as a label value.
pub(crate) fn format_value(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v == f64::INFINITY {
        "+Inf".to_string()
    } else if v == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        v.to_string()
    }
}

/// NaN sorts after every number, whatever the direction.
fn cmp_nan_last(a: f64, b: f64, descending: bool) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => {
            let ord = a.partial_cmp(&b).unwrap_or(Ordering::Equal);
            if descending {
                ord.reverse()
            } else {
                ord
            }
        }
    }
}

fn parse_k(op: AggregateOp, param: f64) -> RuntimeResult<i64> {
    if param.is_nan() || param >= i64::MAX as f64 || param <= i64::MIN as f64 {
        return Err(RuntimeError::ArgumentError(format!(
            "{op}(): scalar value {param} overflows int64"
        )));
    }
    Ok(param as i64)
}

/// Aggregates `vector` into `enh.out`, one sample per group in first-seen order (or the selected
/// elements for topk/bottomk).
pub(super) fn aggregate(
    op: AggregateOp,
    grouping: &LabelSelector,
    param: AggrParam<'_>,
    vector: &[Sample],
    enh: &mut EvalNodeHelper,
) -> RuntimeResult<()> {
    let mut k = 0_usize;
    if matches!(op, AggregateOp::Topk | AggregateOp::Bottomk) {
        let requested = parse_k(op, param.scalar(op)?)?;
        if requested < 1 {
            return Ok(());
        }
        k = usize::try_from(requested).unwrap_or(usize::MAX);
    }

    let mut q = 0.0;
    if op == AggregateOp::Quantile {
        q = param.scalar(op)?;
        if !(0.0..=1.0).contains(&q) {
            return Err(RuntimeError::ArgumentError(format!(
                "quantile value should be between 0 and 1, got {q}"
            )));
        }
    }

    if op == AggregateOp::CountValues {
        let AggrParam::Label(label) = param else {
            return Err(RuntimeError::ArgumentError(
                "count_values() expects a string parameter".to_string(),
            ));
        };
        return count_values(grouping, label, vector, enh);
    }

    let mut index: AHashMap<Signature, usize> = AHashMap::new();
    let mut groups: Vec<Group> = Vec::new();
    for sample in vector {
        let sig = enh.signature(grouping, &sample.metric);
        match index.get(&sig) {
            Some(&i) => groups[i].samples.push(sample),
            None => {
                index.insert(sig, groups.len());
                groups.push(Group {
                    labels: grouping.project(&sample.metric),
                    samples: vec![sample],
                });
            }
        }
    }

    for group in groups {
        let values = || group.samples.iter().map(|s| s.point.v);
        let value = match op {
            AggregateOp::Sum => values().sum(),
            AggregateOp::Count | AggregateOp::CountValues => group.samples.len() as f64,
            AggregateOp::Group => 1.0,
            AggregateOp::Avg => mean(values()),
            AggregateOp::Max => values()
                .filter(|v| !v.is_nan())
                .reduce(f64::max)
                .unwrap_or(f64::NAN),
            AggregateOp::Min => values()
                .filter(|v| !v.is_nan())
                .reduce(f64::min)
                .unwrap_or(f64::NAN),
            AggregateOp::Stdvar => variance(values()),
            AggregateOp::Stddev => variance(values()).sqrt(),
            AggregateOp::Quantile => {
                let mut buf: Vec<f64> = values().collect();
                quantile(q, &mut buf)
            }
            AggregateOp::Topk | AggregateOp::Bottomk => {
                let descending = op == AggregateOp::Topk;
                let mut selected = group.samples;
                selected.sort_by(|a, b| cmp_nan_last(a.point.v, b.point.v, descending));
                for s in selected.into_iter().take(k) {
                    enh.push(Arc::clone(&s.metric), s.point.v);
                }
                continue;
            }
        };
        enh.push(Arc::new(group.labels), value);
    }
    Ok(())
}

/// Incremental mean.
fn mean<I: Iterator<Item = f64>>(values: I) -> f64 {
    let mut mean: f64 = 0.0;
    let mut count = 0.0;
    for v in values {
        count += 1.0;
        if mean.is_infinite() {
            if v.is_infinite() && (mean > 0.0) == (v > 0.0) {
                continue;
            }
            if !v.is_infinite() && !v.is_nan() {
                continue;
            }
        }
        mean += v / count - mean / count;
    }
    if count == 0.0 {
        f64::NAN
    } else {
        mean
    }
}

/// Population variance of the non-NaN values (Welford).
fn variance<I: Iterator<Item = f64>>(values: I) -> f64 {
    let mut count = 0.0;
    let mut mean = 0.0;
    let mut m2 = 0.0;
    for v in values.filter(|v| !v.is_nan()) {
        count += 1.0;
        let delta = v - mean;
        mean += delta / count;
        m2 += delta * (v - mean);
    }
    if count == 0.0 {
        f64::NAN
    } else {
        m2 / count
    }
}

fn count_values(
    grouping: &LabelSelector,
    label: &str,
    vector: &[Sample],
    enh: &mut EvalNodeHelper,
) -> RuntimeResult<()> {
    if !is_valid_label_name(label) {
        return Err(RuntimeError::ArgumentError(format!(
            "invalid label name {label:?}"
        )));
    }
    // `by` keeps the value label in the output
    let selector = if grouping.include {
        let mut names = grouping.names.clone();
        names.push(label.to_string());
        LabelSelector::including(names)
    } else {
        grouping.clone()
    };

    let mut index: AHashMap<Signature, usize> = AHashMap::new();
    let mut groups: Vec<(Labels, usize)> = Vec::new();
    for sample in vector {
        let mut metric = sample.metric.as_ref().clone();
        metric.set(label, format_value(sample.point.v));
        let sig = selector.signature(&metric);
        match index.get(&sig) {
            Some(&i) => groups[i].1 += 1,
            None => {
                index.insert(sig, groups.len());
                groups.push((selector.project(&metric), 1));
            }
        }
    }
    for (labels, count) in groups {
        enh.push(Arc::new(labels), count as f64);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(1.0, "1")]
    #[test_case(0.5, "0.5")]
    #[test_case(-2.25, "-2.25")]
    #[test_case(f64::INFINITY, "+Inf")]
    #[test_case(f64::NEG_INFINITY, "-Inf")]
    #[test_case(f64::NAN, "NaN")]
    fn formats_label_values(v: f64, expected: &str) {
        assert_eq!(format_value(v), expected);
    }

    #[test_case("value", true)]
    #[test_case("_v1", true)]
    #[test_case("1v", false)]
    #[test_case("a-b", false)]
    #[test_case("", false)]
    fn label_name_validity(name: &str, expected: bool) {
        assert_eq!(is_valid_label_name(name), expected);
    }

    #[test]
    fn variance_ignores_nan() {
        let v = variance([2.0, f64::NAN, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0].into_iter());
        assert_eq!(v, 4.0);
        assert!(variance([f64::NAN].into_iter()).is_nan());
    }

    #[test]
    fn mean_of_infinities() {
        assert_eq!(mean([f64::INFINITY, 1.0].into_iter()), f64::INFINITY);
        assert!(mean([f64::INFINITY, f64::NEG_INFINITY].into_iter()).is_nan());
        assert_eq!(mean([1.0, 2.0, 3.0].into_iter()), 2.0);
    }

    #[test]
    fn k_must_fit_an_integer() {
        assert!(parse_k(AggregateOp::Topk, f64::NAN).is_err());
        assert!(parse_k(AggregateOp::Topk, 1e300).is_err());
        assert_eq!(parse_k(AggregateOp::Topk, 2.7).unwrap(), 2);
    }

    #[test]
    fn nan_sorts_last_in_both_directions() {
        assert_eq!(cmp_nan_last(f64::NAN, 1.0, true), Ordering::Greater);
        assert_eq!(cmp_nan_last(f64::NAN, 1.0, false), Ordering::Greater);
        assert_eq!(cmp_nan_last(2.0, 1.0, true), Ordering::Less);
        assert_eq!(cmp_nan_last(2.0, 1.0, false), Ordering::Greater);
    }
}
