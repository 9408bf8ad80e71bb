use std::borrow::Cow;
use std::sync::Arc;

use ahash::{AHashMap, AHashSet};
use tracing::{field, trace_span, Span};

use promql_common::hash::Signature;

use crate::ast::{
    AggregateExpr, BinaryExpr, Call, Expr, MatrixSelector, Operator, UnaryOp, VectorSelector,
};
use crate::eval::aggregate::{aggregate, AggrParam};
use crate::eval::binary::{
    scalar_binop, vector_and, vector_binop, vector_or, vector_scalar_binop, vector_unless,
};
use crate::eval::{EvalNodeHelper, EvalPool, PopulatedExpr};
use crate::execution::EvalConfig;
use crate::functions::{absent_labels, FunctionImpl, RangeFn, RangeWindow};
use crate::runtime_error::{RuntimeError, RuntimeResult};
use crate::types::{
    find_duplicate_labels, is_stale_nan, total_points, Matrix, Point, Sample, Series, Timestamp,
    ValueType,
};

fn node_name(expr: &Expr) -> &'static str {
    match expr {
        Expr::NumberLiteral(_) => "number",
        Expr::StringLiteral(_) => "string",
        Expr::VectorSelector(_) => "vector selector",
        Expr::MatrixSelector(_) => "matrix selector",
        Expr::Unary(_) => "unary",
        Expr::Binary(_) => "binary op",
        Expr::Aggregate(_) => "aggregate",
        Expr::Call(_) => "call",
        Expr::Parens(_) => "parens",
    }
}

fn duplicate_error(matrix: &Matrix) -> RuntimeResult<()> {
    match find_duplicate_labels(matrix.iter().map(|s| &s.metric)) {
        Some(labels) => Err(RuntimeError::InvariantViolation(format!(
            "vector cannot contain metrics with the same labelset: {labels}"
        ))),
        None => Ok(()),
    }
}

/// Evaluates one populated expression over a grid of timestamps.
///
/// Every node evaluates to a [`Matrix`] holding one point per step at which it has a value;
/// scalars are a single series with empty labels. The evaluator keeps a running count of samples
/// held in memory and aborts with [`RuntimeError::TooManySamples`] once it exceeds
/// `max_samples`.
pub struct Evaluator<'a> {
    populated: &'a PopulatedExpr,
    start: Timestamp,
    end: Timestamp,
    interval: i64,
    lookback_delta: i64,
    max_samples: usize,
    current_samples: usize,
    trace_enabled: bool,
    pool: Arc<EvalPool>,
}

impl<'a> Evaluator<'a> {
    pub fn new(populated: &'a PopulatedExpr, config: &EvalConfig) -> Self {
        Self {
            populated,
            start: config.start,
            end: config.end,
            interval: config.step.max(1),
            lookback_delta: config.lookback_delta,
            max_samples: config.max_samples,
            current_samples: 0,
            trace_enabled: false,
            pool: Arc::new(EvalPool::new()),
        }
    }

    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.trace_enabled = enabled;
        self
    }

    /// Samples currently accounted for.
    pub fn current_samples(&self) -> usize {
        self.current_samples
    }

    /// Evaluates the root expression. A string root cannot be evaluated as a matrix and is an
    /// error here; callers handle it before evaluation.
    pub fn run(&mut self) -> RuntimeResult<Matrix> {
        let populated = self.populated;
        self.current_samples = 0;
        self.eval(populated.expr())
    }

    fn is_instant(&self) -> bool {
        self.start == self.end
    }

    fn num_steps(&self) -> usize {
        if self.is_instant() {
            return 1;
        }
        ((self.end - self.start) / self.interval) as usize + 1
    }

    #[inline]
    fn step_time(&self, step: usize) -> Timestamp {
        self.start + step as i64 * self.interval
    }

    fn too_many_samples(&self) -> RuntimeError {
        RuntimeError::TooManySamples(self.max_samples)
    }

    fn eval(&mut self, expr: &'a Expr) -> RuntimeResult<Matrix> {
        let span = if self.trace_enabled {
            trace_span!("eval", node = node_name(expr), series = field::Empty)
        } else {
            Span::none()
        }
        .entered();

        let result = match expr {
            Expr::NumberLiteral(n) => {
                let n = *n;
                self.range_eval(&[], |_, enh| {
                    let metric = enh.empty_labels();
                    enh.push(metric, n);
                    Ok(())
                })
            }
            Expr::StringLiteral(_) => Err(RuntimeError::Unsupported(
                "string literal cannot be evaluated as a vector".to_string(),
            )),
            Expr::VectorSelector(vs) => self.eval_vector_selector(vs),
            Expr::MatrixSelector(ms) => self.eval_matrix_selector(ms),
            Expr::Parens(inner) => self.eval(inner),
            Expr::Unary(ue) => {
                let mut matrix = self.eval(&ue.expr)?;
                if ue.op == UnaryOp::Neg {
                    for series in matrix.iter_mut() {
                        series.metric = Arc::new(series.metric.without_metric_name());
                        series.points.iter_mut().for_each(|p| p.v = -p.v);
                    }
                    duplicate_error(&matrix)?;
                }
                Ok(matrix)
            }
            Expr::Binary(be) => self.eval_binary(be),
            Expr::Aggregate(ae) => self.eval_aggregate(ae),
            Expr::Call(call) => self.eval_call(call),
        }?;

        span.record("series", result.len());
        Ok(result)
    }

    /// Evaluates `exprs` in full, then calls `f` once per step with the operands' instant vectors
    /// at that step, assembling the outputs into a matrix.
    fn range_eval<F>(&mut self, exprs: &[&'a Expr], mut f: F) -> RuntimeResult<Matrix>
    where
        F: FnMut(&[&[Sample]], &mut EvalNodeHelper<'_>) -> RuntimeResult<()>,
    {
        let original_samples = self.current_samples;

        let mut matrices = Vec::with_capacity(exprs.len());
        for expr in exprs {
            matrices.push(self.eval(expr)?);
        }
        // operands stay in memory for the whole evaluation
        let mut temp_samples = self.current_samples;

        let pool = Arc::clone(&self.pool);
        let mut inputs: Vec<_> = matrices.iter().map(|_| pool.vector()).collect();
        let mut cursors: Vec<Vec<usize>> = matrices.iter().map(|m| vec![0; m.len()]).collect();
        let mut enh = EvalNodeHelper::new(pool.vector());

        let num_steps = self.num_steps();
        let mut index: AHashMap<Signature, usize> = AHashMap::new();
        let mut result: Matrix = Vec::new();

        for step in 0..num_steps {
            let ts = self.step_time(step);
            self.current_samples = temp_samples;

            for ((matrix, input), series_cursors) in matrices
                .iter()
                .zip(inputs.iter_mut())
                .zip(cursors.iter_mut())
            {
                input.clear();
                for (series, cursor) in matrix.iter().zip(series_cursors.iter_mut()) {
                    let points = &series.points;
                    while *cursor < points.len() && points[*cursor].t < ts {
                        *cursor += 1;
                    }
                    let Some(point) = points.get(*cursor).filter(|p| p.t == ts) else {
                        continue;
                    };
                    if self.current_samples >= self.max_samples {
                        return Err(self.too_many_samples());
                    }
                    input.push(Sample {
                        metric: Arc::clone(&series.metric),
                        point: *point,
                    });
                    self.current_samples += 1;
                    *cursor += 1;
                }
            }

            let args: Vec<&[Sample]> = inputs.iter().map(|v| v.as_slice()).collect();
            enh.ts = ts;
            enh.out.clear();
            f(&args, &mut enh)?;

            if let Some(labels) = find_duplicate_labels(enh.out.iter().map(|s| &s.metric)) {
                return Err(RuntimeError::InvariantViolation(format!(
                    "vector cannot contain metrics with the same labelset: {labels}"
                )));
            }

            let produced = enh.out.len();
            self.current_samples += produced;
            // outputs of earlier steps are still held once the inputs are released
            temp_samples += produced;
            if self.current_samples > self.max_samples {
                return Err(self.too_many_samples());
            }

            // an instant evaluation keeps the function's output order
            if self.is_instant() {
                let matrix: Matrix = enh
                    .out
                    .drain(..)
                    .map(|s| Series {
                        metric: s.metric,
                        points: vec![Point::new(ts, s.point.v)],
                    })
                    .collect();
                self.current_samples = original_samples + matrix.len();
                return Ok(matrix);
            }

            for sample in enh.out.drain(..) {
                let point = Point::new(ts, sample.point.v);
                let sig = sample.metric.signature();
                match index.get(&sig) {
                    Some(&i) => result[i].points.push(point),
                    None => {
                        index.insert(sig, result.len());
                        let mut points = Vec::with_capacity(num_steps - step);
                        points.push(point);
                        result.push(Series {
                            metric: sample.metric,
                            points,
                        });
                    }
                }
            }
        }

        self.current_samples = original_samples + total_points(&result);
        Ok(result)
    }

    fn eval_vector_selector(&mut self, vs: &VectorSelector) -> RuntimeResult<Matrix> {
        let series = self.populated.series(vs);
        let num_steps = self.num_steps();
        let mut matrix = Matrix::with_capacity(series.len());

        for s in series {
            let mut points = Vec::with_capacity(num_steps.min(s.points.len()));
            // index of the first point newer than the current reference time
            let mut cursor = 0;
            for step in 0..num_steps {
                let ts = self.step_time(step);
                let ref_time = ts - vs.offset;
                while cursor < s.points.len() && s.points[cursor].t <= ref_time {
                    cursor += 1;
                }
                let Some(p) = cursor.checked_sub(1).and_then(|i| s.points.get(i)) else {
                    continue;
                };
                if p.t < ref_time - self.lookback_delta || is_stale_nan(p.v) {
                    continue;
                }
                if self.current_samples >= self.max_samples {
                    return Err(self.too_many_samples());
                }
                points.push(Point::new(ts, p.v));
                self.current_samples += 1;
            }
            if !points.is_empty() {
                matrix.push(Series {
                    metric: Arc::clone(&s.metric),
                    points,
                });
            }
        }
        Ok(matrix)
    }

    fn eval_matrix_selector(&mut self, ms: &MatrixSelector) -> RuntimeResult<Matrix> {
        if !self.is_instant() {
            return Err(RuntimeError::Unsupported(
                "cannot do range evaluation of matrix selector".to_string(),
            ));
        }
        let max_t = self.start - ms.selector.offset;
        let min_t = max_t - ms.range;
        let series = self.populated.series(&ms.selector);
        let mut matrix = Matrix::with_capacity(series.len());

        for s in series {
            let lo = s.points.partition_point(|p| p.t <= min_t);
            let hi = s.points.partition_point(|p| p.t <= max_t);
            let mut points = Vec::with_capacity(hi.saturating_sub(lo));
            for p in s.points[lo..hi.max(lo)].iter().filter(|p| !is_stale_nan(p.v)) {
                if self.current_samples >= self.max_samples {
                    return Err(self.too_many_samples());
                }
                points.push(*p);
                self.current_samples += 1;
            }
            if !points.is_empty() {
                matrix.push(Series {
                    metric: Arc::clone(&s.metric),
                    points,
                });
            }
        }
        Ok(matrix)
    }

    fn eval_binary(&mut self, be: &'a BinaryExpr) -> RuntimeResult<Matrix> {
        let op = be.op;
        let return_bool = be.return_bool;
        let (lhs, rhs) = (be.lhs.as_ref(), be.rhs.as_ref());

        match (lhs.value_type(), rhs.value_type()) {
            (ValueType::Scalar, ValueType::Scalar) => self.range_eval(&[lhs, rhs], |v, enh| {
                scalar_binop(op, return_bool, v[0], v[1], enh)
            }),
            (ValueType::Vector, ValueType::Vector) => {
                let Some(matching) = be.matching.as_ref() else {
                    return Err(RuntimeError::InvariantViolation(format!(
                        "missing vector matching for {op}"
                    )));
                };
                match op {
                    Operator::And => self.range_eval(&[lhs, rhs], |v, enh| {
                        vector_and(matching, v[0], v[1], enh)
                    }),
                    Operator::Or => self.range_eval(&[lhs, rhs], |v, enh| {
                        vector_or(matching, v[0], v[1], enh)
                    }),
                    Operator::Unless => self.range_eval(&[lhs, rhs], |v, enh| {
                        vector_unless(matching, v[0], v[1], enh)
                    }),
                    _ => self.range_eval(&[lhs, rhs], |v, enh| {
                        vector_binop(op, matching, return_bool, v[0], v[1], enh)
                    }),
                }
            }
            (ValueType::Vector, ValueType::Scalar) => self.range_eval(&[lhs, rhs], |v, enh| {
                vector_scalar_binop(op, return_bool, v[0], v[1], false, enh)
            }),
            (ValueType::Scalar, ValueType::Vector) => self.range_eval(&[lhs, rhs], |v, enh| {
                vector_scalar_binop(op, return_bool, v[1], v[0], true, enh)
            }),
            (l, r) => Err(RuntimeError::Unsupported(format!(
                "binary operator {op} between {l} and {r}"
            ))),
        }
    }

    fn eval_aggregate(&mut self, ae: &'a AggregateExpr) -> RuntimeResult<Matrix> {
        let op = ae.op;
        let grouping = &ae.grouping;
        let expr = ae.expr.as_ref();

        match ae.param.as_deref().map(Expr::unwrap_parens) {
            Some(Expr::StringLiteral(label)) => self.range_eval(&[expr], |v, enh| {
                aggregate(op, grouping, AggrParam::Label(label), v[0], enh)
            }),
            Some(param) => self.range_eval(&[param, expr], |v, enh| {
                let p = v[0].first().map_or(f64::NAN, |s| s.point.v);
                aggregate(op, grouping, AggrParam::Scalar(p), v[1], enh)
            }),
            None => self.range_eval(&[expr], |v, enh| {
                aggregate(op, grouping, AggrParam::None, v[0], enh)
            }),
        }
    }

    fn eval_call(&mut self, call: &'a Call) -> RuntimeResult<Matrix> {
        match call.func.implementation {
            FunctionImpl::Instant(f) => {
                let args: Vec<&'a Expr> = call
                    .args
                    .iter()
                    .filter(|a| a.value_type() != ValueType::String)
                    .collect();
                let call_args = call.args.as_slice();
                self.range_eval(&args, |v, enh| f(v, call_args, enh))
            }
            FunctionImpl::Range(f) => {
                let matrix = self.eval_range_call(call, f)?;
                duplicate_error(&matrix)?;
                Ok(matrix)
            }
            FunctionImpl::AbsentOverTime => self.eval_absent_over_time(call),
        }
    }

    /// Values of a scalar operand indexed by step; NaN where it has no value.
    fn values_per_step(&self, matrix: &Matrix) -> Vec<f64> {
        let mut values = vec![f64::NAN; self.num_steps()];
        if let Some(series) = matrix.first() {
            for p in &series.points {
                let step = ((p.t - self.start) / self.interval) as usize;
                if let Some(slot) = values.get_mut(step) {
                    *slot = p.v;
                }
            }
        }
        values
    }

    /// Applies a range function to the window of every series of the call's matrix argument, one
    /// window per step.
    fn eval_range_call(&mut self, call: &'a Call, f: RangeFn) -> RuntimeResult<Matrix> {
        let Some(matrix_index) = call.matrix_arg_index() else {
            return Err(RuntimeError::InvariantViolation(format!(
                "{} has no range vector argument",
                call.func.name
            )));
        };
        let Some(Expr::MatrixSelector(ms)) = call.args.get(matrix_index).map(Expr::unwrap_parens)
        else {
            return Err(RuntimeError::Unsupported(format!(
                "{} expects a matrix selector argument",
                call.func.name
            )));
        };

        let mut scalar_args = Vec::with_capacity(call.args.len() - 1);
        for (i, arg) in call.args.iter().enumerate() {
            if i == matrix_index {
                continue;
            }
            let matrix = self.eval(arg)?;
            scalar_args.push(self.values_per_step(&matrix));
        }

        // last_over_time behaves like an offset and keeps the metric name
        let keep_name = call.func.name == "last_over_time";
        let offset = ms.selector.offset;
        let range = ms.range;
        let num_steps = self.num_steps();
        let series = self.populated.series(&ms.selector);
        let mut scalars = vec![0.0; scalar_args.len()];
        let mut matrix = Matrix::with_capacity(series.len());

        for s in series {
            let points: Cow<[Point]> = if s.points.iter().any(|p| is_stale_nan(p.v)) {
                Cow::Owned(
                    s.points
                        .iter()
                        .filter(|p| !is_stale_nan(p.v))
                        .copied()
                        .collect(),
                )
            } else {
                Cow::Borrowed(s.points.as_slice())
            };

            let (mut lo, mut hi) = (0, 0);
            let mut out = Vec::new();
            for step in 0..num_steps {
                let ts = self.step_time(step);
                let max_t = ts - offset;
                let min_t = max_t - range;

                let (prev_lo, prev_hi) = (lo, hi);
                while hi < points.len() && points[hi].t <= max_t {
                    hi += 1;
                }
                while lo < hi && points[lo].t <= min_t {
                    lo += 1;
                }

                // samples held by the window: release what slid out, count what slid in
                let retained = prev_hi.saturating_sub(lo).min(prev_hi - prev_lo);
                self.current_samples -= (prev_hi - prev_lo) - retained;
                let added = (hi - lo) - retained;
                if self.current_samples + added > self.max_samples {
                    return Err(self.too_many_samples());
                }
                self.current_samples += added;

                if lo == hi {
                    continue;
                }
                for (slot, values) in scalars.iter_mut().zip(scalar_args.iter()) {
                    *slot = values[step];
                }
                let window = RangeWindow {
                    points: &points[lo..hi],
                    ts,
                    range,
                    offset,
                    scalars: &scalars,
                };
                if let Some(v) = f(&window) {
                    out.push(Point::new(ts, v));
                }
            }
            self.current_samples -= hi - lo;

            if out.is_empty() {
                continue;
            }
            if self.current_samples + out.len() > self.max_samples {
                return Err(self.too_many_samples());
            }
            self.current_samples += out.len();
            let metric = if keep_name {
                Arc::clone(&s.metric)
            } else {
                Arc::new(s.metric.without_metric_name())
            };
            matrix.push(Series {
                metric,
                points: out,
            });
        }
        Ok(matrix)
    }

    /// 1 at every step where the matrix argument has no sample at all.
    fn eval_absent_over_time(&mut self, call: &'a Call) -> RuntimeResult<Matrix> {
        let before = self.current_samples;
        let present = self.eval_range_call(call, |_| Some(1.0))?;

        let num_steps = self.num_steps();
        if present.iter().any(|s| s.points.len() == num_steps) {
            self.current_samples = before;
            return Ok(vec![]);
        }
        let found: AHashSet<Timestamp> = present
            .iter()
            .flat_map(|s| s.points.iter().map(|p| p.t))
            .collect();
        let points: Vec<Point> = (0..num_steps)
            .map(|step| self.step_time(step))
            .filter(|ts| !found.contains(ts))
            .map(|ts| Point::new(ts, 1.0))
            .collect();

        self.current_samples = before + points.len();
        if points.is_empty() {
            return Ok(vec![]);
        }
        let labels = call.args.first().map(absent_labels).unwrap_or_default();
        Ok(vec![Series::new(labels, points)])
    }
}
