use std::sync::Arc;

use ahash::{AHashMap, AHashSet};

use promql_common::hash::Signature;
use promql_common::label::Labels;

use crate::ast::{BinaryOpKind, Operator, VectorMatchCardinality, VectorMatching};
use crate::eval::EvalNodeHelper;
use crate::runtime_error::{AmbiguousMatchError, MatchKind, RuntimeError, RuntimeResult};
use crate::types::Sample;

fn should_drop_metric_name(op: Operator) -> bool {
    op.kind() == BinaryOpKind::Arithmetic
}

fn bool_value(keep: bool) -> f64 {
    if keep {
        1.0
    } else {
        0.0
    }
}

/// Scalar op scalar. A comparison without `bool` filters the step out when false.
pub(super) fn scalar_binop(
    op: Operator,
    return_bool: bool,
    lhs: &[Sample],
    rhs: &[Sample],
    enh: &mut EvalNodeHelper,
) -> RuntimeResult<()> {
    let (Some(l), Some(r)) = (lhs.first(), rhs.first()) else {
        return Ok(());
    };
    let (value, keep) = op.apply(l.point.v, r.point.v)?;
    if return_bool {
        let metric = enh.empty_labels();
        enh.push(metric, bool_value(keep));
    } else if keep {
        let metric = enh.empty_labels();
        enh.push(metric, value);
    }
    Ok(())
}

/// Applies `op` between every vector element and a scalar. `swap` is set when the scalar is the
/// left operand.
pub(super) fn vector_scalar_binop(
    op: Operator,
    return_bool: bool,
    vector: &[Sample],
    scalar: &[Sample],
    swap: bool,
    enh: &mut EvalNodeHelper,
) -> RuntimeResult<()> {
    let Some(scalar) = scalar.first().map(|s| s.point.v) else {
        return Ok(());
    };
    for sample in vector {
        let (mut lv, mut rv) = (sample.point.v, scalar);
        if swap {
            std::mem::swap(&mut lv, &mut rv);
        }
        let (mut value, mut keep) = op.apply(lv, rv)?;
        // a comparison keeps the vector element's value even with the scalar on the left
        if op.is_comparison() && swap {
            value = rv;
        }
        if return_bool {
            value = bool_value(keep);
            keep = true;
        }
        if keep {
            let metric = if should_drop_metric_name(op) || return_bool {
                enh.drop_metric_name(&sample.metric)
            } else {
                Arc::clone(&sample.metric)
            };
            enh.push(metric, value);
        }
    }
    Ok(())
}

fn result_metric(
    lhs: &Labels,
    rhs: &Labels,
    op: Operator,
    matching: &VectorMatching,
) -> Labels {
    let mut labels = lhs.clone();
    if should_drop_metric_name(op) {
        labels.remove_metric_name();
    }
    if matching.card == VectorMatchCardinality::OneToOne {
        if matching.matching.include {
            labels.retain(|l| matching.matching.contains(&l.name));
        } else {
            labels.retain(|l| !matching.matching.contains(&l.name));
        }
    }
    // labels named by group_x(...) come from the "one" side
    for name in &matching.include {
        match rhs.get(name) {
            Some(v) => labels.set(name.as_str(), v),
            None => {
                labels.remove(name);
            }
        }
    }
    labels
}

fn ambiguous(kind: MatchKind, signature: Labels, detail: String) -> RuntimeError {
    RuntimeError::AmbiguousMatch(AmbiguousMatchError {
        kind,
        signature: signature.to_string(),
        detail,
    })
}

/// Arithmetic and comparison between two instant vectors, for one-to-one, many-to-one and
/// one-to-many matching.
pub(super) fn vector_binop(
    op: Operator,
    matching: &VectorMatching,
    return_bool: bool,
    lhs: &[Sample],
    rhs: &[Sample],
    enh: &mut EvalNodeHelper,
) -> RuntimeResult<()> {
    let kind = match matching.card {
        VectorMatchCardinality::OneToOne => MatchKind::OneToOne,
        VectorMatchCardinality::ManyToOne => MatchKind::ManyToOne,
        VectorMatchCardinality::OneToMany => MatchKind::OneToMany,
        VectorMatchCardinality::ManyToMany => {
            return Err(RuntimeError::InvariantViolation(
                "many-to-many only allowed for set operators".to_string(),
            ))
        }
    };
    let selector = &matching.matching;

    // the control flow below handles one-to-one and many-to-one; swap sides for one-to-many
    let (lhs, rhs) = if kind == MatchKind::OneToMany {
        (rhs, lhs)
    } else {
        (lhs, rhs)
    };

    // rhs is the "one" side: every signature must be unique
    let mut right_sigs: AHashMap<Signature, &Sample> = AHashMap::with_capacity(rhs.len());
    for rs in rhs {
        let sig = enh.signature(selector, &rs.metric);
        if let Some(dupe) = right_sigs.insert(sig, rs) {
            let one_side = if kind == MatchKind::OneToMany {
                "left"
            } else {
                "right"
            };
            let detail = format!(
                "found duplicate series on the {one_side} hand-side of the operation: [{}, {}]; \
                 many-to-many matching not allowed: matching labels must be unique on one side",
                rs.metric, dupe.metric
            );
            return Err(ambiguous(kind, selector.project(&rs.metric), detail));
        }
    }

    // one-to-one: seen signatures; many-to-one: result label sets per signature
    let mut matched_sigs: AHashMap<Signature, AHashSet<Signature>> = AHashMap::new();

    for ls in lhs {
        let sig = enh.signature(selector, &ls.metric);
        let Some(rs) = right_sigs.get(&sig) else {
            continue;
        };

        let (mut vl, mut vr) = (ls.point.v, rs.point.v);
        if kind == MatchKind::OneToMany {
            std::mem::swap(&mut vl, &mut vr);
        }
        let (mut value, keep) = op.apply(vl, vr)?;
        if return_bool {
            value = bool_value(keep);
        } else if !keep {
            continue;
        }

        let mut metric = enh.result_metric(&ls.metric, &rs.metric, || {
            result_metric(&ls.metric, &rs.metric, op, matching)
        });
        if return_bool {
            metric = Arc::new(metric.without_metric_name());
        }

        if kind == MatchKind::OneToOne {
            if matched_sigs.insert(sig, AHashSet::new()).is_some() {
                return Err(ambiguous(
                    kind,
                    selector.project(&ls.metric),
                    "multiple matches for labels: many-to-one matching must be explicit \
                     (group_left/group_right)"
                        .to_string(),
                ));
            }
        } else {
            // the grouping labels must keep result label sets unique
            let inserted = matched_sigs.entry(sig).or_default();
            if !inserted.insert(metric.signature()) {
                return Err(ambiguous(
                    kind,
                    selector.project(&ls.metric),
                    "multiple matches for labels: grouping labels must ensure unique matches"
                        .to_string(),
                ));
            }
        }

        enh.push(metric, value);
    }
    Ok(())
}

pub(super) fn vector_and(
    matching: &VectorMatching,
    lhs: &[Sample],
    rhs: &[Sample],
    enh: &mut EvalNodeHelper,
) -> RuntimeResult<()> {
    let selector = &matching.matching;
    let right_sigs: AHashSet<Signature> = rhs
        .iter()
        .map(|rs| enh.signature(selector, &rs.metric))
        .collect();
    for ls in lhs {
        if right_sigs.contains(&enh.signature(selector, &ls.metric)) {
            enh.out.push(ls.clone());
        }
    }
    Ok(())
}

pub(super) fn vector_or(
    matching: &VectorMatching,
    lhs: &[Sample],
    rhs: &[Sample],
    enh: &mut EvalNodeHelper,
) -> RuntimeResult<()> {
    let selector = &matching.matching;
    let mut left_sigs: AHashSet<Signature> = AHashSet::with_capacity(lhs.len());
    for ls in lhs {
        left_sigs.insert(enh.signature(selector, &ls.metric));
        enh.out.push(ls.clone());
    }
    for rs in rhs {
        if !left_sigs.contains(&enh.signature(selector, &rs.metric)) {
            enh.out.push(rs.clone());
        }
    }
    Ok(())
}

pub(super) fn vector_unless(
    matching: &VectorMatching,
    lhs: &[Sample],
    rhs: &[Sample],
    enh: &mut EvalNodeHelper,
) -> RuntimeResult<()> {
    let selector = &matching.matching;
    let right_sigs: AHashSet<Signature> = rhs
        .iter()
        .map(|rs| enh.signature(selector, &rs.metric))
        .collect();
    for ls in lhs {
        if !right_sigs.contains(&enh.signature(selector, &ls.metric)) {
            enh.out.push(ls.clone());
        }
    }
    Ok(())
}
