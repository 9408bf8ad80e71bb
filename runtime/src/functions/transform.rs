use std::sync::Arc;

use promql_common::label::{Labels, METRIC_NAME_LABEL};

use crate::ast::Expr;
use crate::eval::EvalNodeHelper;
use crate::functions::over_time::cmp_nan_first;
use crate::runtime_error::RuntimeResult;
use crate::types::{MatchOp, Sample};

fn simple_func(
    args: &[&[Sample]],
    enh: &mut EvalNodeHelper,
    f: fn(f64) -> f64,
) -> RuntimeResult<()> {
    for el in args[0] {
        let metric = enh.drop_metric_name(&el.metric);
        enh.out.push(Sample::new(metric, el.point.t, f(el.point.v)));
    }
    Ok(())
}

macro_rules! math_func {
    ($name: ident, $f: expr) => {
        pub(super) fn $name(
            args: &[&[Sample]],
            _call_args: &[Expr],
            enh: &mut EvalNodeHelper,
        ) -> RuntimeResult<()> {
            simple_func(args, enh, $f)
        }
    };
}

math_func!(abs, f64::abs);
math_func!(ceil, f64::ceil);
math_func!(floor, f64::floor);
math_func!(exp, f64::exp);
math_func!(ln, f64::ln);
math_func!(log2, f64::log2);
math_func!(log10, f64::log10);
math_func!(sqrt, f64::sqrt);
math_func!(sgn, |v: f64| {
    if v < 0.0 {
        -1.0
    } else if v > 0.0 {
        1.0
    } else {
        v
    }
});

/// Labels for the series reported by `absent`: every label fixed by exactly one equality matcher
/// of a selector argument, `__name__` excluded.
pub(crate) fn absent_labels(arg: &Expr) -> Labels {
    let matchers = match arg.unwrap_parens() {
        Expr::VectorSelector(vs) => &vs.matchers,
        Expr::MatrixSelector(ms) => &ms.selector.matchers,
        _ => return Labels::new(),
    };
    let mut labels = Labels::new();
    let mut ambiguous = Vec::new();
    for m in matchers {
        if m.name == METRIC_NAME_LABEL {
            continue;
        }
        if m.op == MatchOp::Equal && !labels.contains(&m.name) {
            labels.set(m.name.as_str(), m.value.as_str());
        } else {
            ambiguous.push(m.name.as_str());
        }
    }
    for name in ambiguous {
        labels.remove(name);
    }
    labels
}

pub(super) fn absent(
    args: &[&[Sample]],
    call_args: &[Expr],
    enh: &mut EvalNodeHelper,
) -> RuntimeResult<()> {
    if !args[0].is_empty() {
        return Ok(());
    }
    let labels = call_args.first().map(absent_labels).unwrap_or_default();
    let ts = enh.ts;
    enh.out.push(Sample::new(Arc::new(labels), ts, 1.0));
    Ok(())
}

pub(super) fn scalar(
    args: &[&[Sample]],
    _call_args: &[Expr],
    enh: &mut EvalNodeHelper,
) -> RuntimeResult<()> {
    let v = match args[0] {
        [single] => single.point.v,
        _ => f64::NAN,
    };
    let (metric, ts) = (enh.empty_labels(), enh.ts);
    enh.out.push(Sample::new(metric, ts, v));
    Ok(())
}

pub(super) fn vector(
    args: &[&[Sample]],
    _call_args: &[Expr],
    enh: &mut EvalNodeHelper,
) -> RuntimeResult<()> {
    let v = args[0].first().map(|s| s.point.v).unwrap_or(f64::NAN);
    let (metric, ts) = (enh.empty_labels(), enh.ts);
    enh.out.push(Sample::new(metric, ts, v));
    Ok(())
}

pub(super) fn time(
    _args: &[&[Sample]],
    _call_args: &[Expr],
    enh: &mut EvalNodeHelper,
) -> RuntimeResult<()> {
    let (metric, ts) = (enh.empty_labels(), enh.ts);
    enh.out.push(Sample::new(metric, ts, ts as f64 / 1e3));
    Ok(())
}

pub(super) fn sort(
    args: &[&[Sample]],
    _call_args: &[Expr],
    enh: &mut EvalNodeHelper,
) -> RuntimeResult<()> {
    enh.out.extend_from_slice(args[0]);
    enh.out
        .sort_by(|a, b| cmp_nan_first(&a.point.v, &b.point.v));
    Ok(())
}

pub(super) fn sort_desc(
    args: &[&[Sample]],
    _call_args: &[Expr],
    enh: &mut EvalNodeHelper,
) -> RuntimeResult<()> {
    enh.out.extend_from_slice(args[0]);
    enh.out
        .sort_by(|a, b| cmp_nan_first(&b.point.v, &a.point.v));
    Ok(())
}
