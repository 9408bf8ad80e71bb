use std::sync::Arc;

use crate::ast::{Expr, VectorSelector};
use crate::runtime_error::{RuntimeError, RuntimeResult};
use crate::types::{Matrix, Series};

/// An expression paired with the series fetched for each of its selectors.
///
/// `series[i]` belongs to the selector with id `i`. The expression itself is never mutated, so the
/// same populated expression can be evaluated any number of times.
#[derive(Debug, Clone)]
pub struct PopulatedExpr {
    expr: Arc<Expr>,
    series: Vec<Matrix>,
}

impl PopulatedExpr {
    pub fn new(expr: Arc<Expr>, mut series: Vec<Matrix>) -> RuntimeResult<Self> {
        let selector_count = expr.selectors().len();
        if series.len() != selector_count {
            return Err(RuntimeError::InvariantViolation(format!(
                "expected series for {selector_count} selectors, got {}",
                series.len()
            )));
        }
        for matrix in series.iter_mut() {
            matrix.iter_mut().for_each(sort_points);
        }
        Ok(Self { expr, series })
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Series bound to `selector`; empty for selectors of another expression.
    pub fn series(&self, selector: &VectorSelector) -> &[Series] {
        self.series
            .get(selector.id)
            .map(|m| m.as_slice())
            .unwrap_or_default()
    }
}

fn sort_points(series: &mut Series) {
    if series.points.windows(2).any(|w| w[0].t > w[1].t) {
        series.points.sort_by_key(|p| p.t);
    }
}
