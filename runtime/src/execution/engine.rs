use std::sync::Arc;

use tracing::{debug, info_span, warn};

use crate::ast::{parse_expr, AggregateOp, Expr, VectorSelector};
use crate::eval::{Evaluator, PopulatedExpr};
use crate::execution::{EngineConfig, EvalConfig, QueryContext};
use crate::provider::{Deadline, SeriesReader};
use crate::runtime_error::{RuntimeError, RuntimeResult};
use crate::types::{Matrix, QueryValue, Sample, Scalar, StringValue, Timestamp, ValueType};

/// Parses, populates and evaluates PromQL queries against a [`SeriesReader`].
pub struct Engine {
    reader: Arc<dyn SeriesReader>,
    config: EngineConfig,
}

impl Engine {
    pub fn new(reader: Arc<dyn SeriesReader>, config: EngineConfig) -> RuntimeResult<Self> {
        config.validate()?;
        Ok(Self { reader, config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// A context whose deadline is the configured timeout from now.
    pub fn new_context(&self) -> RuntimeResult<QueryContext> {
        let deadline = Deadline::new(self.config.timeout)?;
        Ok(QueryContext::new(deadline).with_trace_enabled(self.config.trace_enabled))
    }

    /// Evaluates `query` at `time`. A `limit` of 0 returns every series.
    pub async fn query_instant(
        &self,
        query: &str,
        time: Timestamp,
        limit: usize,
    ) -> RuntimeResult<QueryValue> {
        let ctx = self.new_context()?;
        self.query_instant_with_context(&ctx, query, time, limit)
            .await
    }

    pub async fn query_instant_with_context(
        &self,
        ctx: &QueryContext,
        query: &str,
        time: Timestamp,
        limit: usize,
    ) -> RuntimeResult<QueryValue> {
        let expr = parse_expr(query)?;
        if let Expr::StringLiteral(s) = expr.unwrap_parens() {
            return Ok(QueryValue::String(StringValue {
                t: time,
                v: s.clone(),
            }));
        }

        let ec = self.eval_config(time, time, 1);
        let keep_order = preserves_order(&expr);
        let value_type = expr.value_type();
        let matrix = self.execute(ctx, query, expr, &ec).await?;

        let value = match value_type {
            ValueType::Scalar => {
                let v = matrix
                    .first()
                    .and_then(|s| s.points.first())
                    .map_or(f64::NAN, |p| p.v);
                QueryValue::Scalar(Scalar { t: time, v })
            }
            ValueType::Matrix => QueryValue::Matrix(sort_and_limit(matrix, limit)),
            _ => {
                let mut vector: Vec<Sample> = matrix
                    .into_iter()
                    .filter_map(|s| {
                        let point = s.points.last().copied()?;
                        Some(Sample {
                            metric: s.metric,
                            point,
                        })
                    })
                    .collect();
                if !keep_order {
                    vector.sort_by(|a, b| a.metric.cmp(&b.metric));
                }
                if limit > 0 {
                    vector.truncate(limit);
                }
                QueryValue::Vector(vector)
            }
        };
        Ok(value)
    }

    /// Evaluates `query` at every `step` from `start` to `end` inclusive. A `step` of 0 uses the
    /// configured default interval.
    pub async fn query_range(
        &self,
        query: &str,
        start: Timestamp,
        end: Timestamp,
        step: i64,
        limit: usize,
    ) -> RuntimeResult<Matrix> {
        let ctx = self.new_context()?;
        self.query_range_with_context(&ctx, query, start, end, step, limit)
            .await
    }

    pub async fn query_range_with_context(
        &self,
        ctx: &QueryContext,
        query: &str,
        start: Timestamp,
        end: Timestamp,
        step: i64,
        limit: usize,
    ) -> RuntimeResult<Matrix> {
        let expr = parse_expr(query)?;
        let value_type = expr.value_type();
        if !matches!(value_type, ValueType::Vector | ValueType::Scalar) {
            return Err(RuntimeError::illegal(
                format!(
                    "invalid expression type {value_type} for range query, must be scalar or instant vector"
                ),
                query,
            ));
        }
        let step = if step == 0 {
            self.config.default_interval.num_milliseconds()
        } else {
            step
        };

        let ec = self.eval_config(start, end, step);
        ec.validate()?;
        let matrix = self.execute(ctx, query, expr, &ec).await?;
        Ok(sort_and_limit(matrix, limit))
    }

    fn eval_config(&self, start: Timestamp, end: Timestamp, step: i64) -> EvalConfig {
        EvalConfig::new(start, end, step)
            .with_lookback_delta(self.config.lookback_delta.num_milliseconds())
            .with_max_samples(self.config.max_samples)
    }

    async fn execute(
        &self,
        ctx: &QueryContext,
        query: &str,
        expr: Expr,
        ec: &EvalConfig,
    ) -> RuntimeResult<Matrix> {
        let expr = Arc::new(expr);
        let series = self.populate(ctx, &expr, ec).await?;
        let populated = PopulatedExpr::new(expr, series)?;

        let _span = info_span!("eval", query, start = ec.start, end = ec.end, step = ec.step)
            .entered();
        let mut evaluator = Evaluator::new(&populated, ec).with_tracing(ctx.trace_enabled());
        match evaluator.run() {
            Ok(matrix) => {
                debug!(series = matrix.len(), "query evaluated");
                Ok(matrix)
            }
            Err(err) => {
                warn!(query, %err, "query evaluation failed");
                Err(err)
            }
        }
    }

    /// Fetches the series of every selector, in selector id order.
    async fn populate(
        &self,
        ctx: &QueryContext,
        expr: &Expr,
        ec: &EvalConfig,
    ) -> RuntimeResult<Vec<Matrix>> {
        let lookback = self.config.lookback_delta.num_milliseconds();
        let selectors = expr.selectors();
        let mut series = Vec::with_capacity(selectors.len());
        for (selector, range) in selectors {
            let window = if range > 0 { range } else { lookback };
            let start = ec.start - selector.offset - window;
            let end = ec.end - selector.offset;
            series.push(self.fetch(ctx, selector, start, end).await?);
        }
        Ok(series)
    }

    async fn fetch(
        &self,
        ctx: &QueryContext,
        selector: &VectorSelector,
        start: Timestamp,
        end: Timestamp,
    ) -> RuntimeResult<Matrix> {
        ctx.check()?;
        let fetch = self.reader.get_series(&selector.matchers, start, end);
        let series = match tokio::time::timeout(ctx.deadline.remaining(), fetch).await {
            Ok(res) => res?,
            Err(_) => {
                return Err(RuntimeError::DeadlineExceeded(format!(
                    "fetching series for {selector} timed out after {}",
                    ctx.deadline
                )))
            }
        };
        debug!(
            selector = %selector,
            start,
            end,
            series = series.len(),
            points = series.iter().map(|s| s.points.len()).sum::<usize>(),
            "series fetched"
        );
        Ok(series)
    }
}

/// Whether the root of the query decides the order of its result.
fn preserves_order(expr: &Expr) -> bool {
    match expr.unwrap_parens() {
        Expr::Call(call) => matches!(call.func.name, "sort" | "sort_desc"),
        Expr::Aggregate(ae) => matches!(ae.op, AggregateOp::Topk | AggregateOp::Bottomk),
        _ => false,
    }
}

fn sort_and_limit(mut matrix: Matrix, limit: usize) -> Matrix {
    matrix.sort_by(|a, b| a.metric.cmp(&b.metric));
    if limit > 0 {
        matrix.truncate(limit);
    }
    matrix
}

