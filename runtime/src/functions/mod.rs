//! Built-in PromQL functions.
//!
//! Functions come in two shapes. Range functions receive the raw points of one series inside the
//! window `(t - offset - range, t - offset]` and yield at most one value per step. Instant
//! functions receive one input vector per argument at each step and write their result into the
//! node helper's output vector.
use std::fmt;

use itertools::Itertools;

use crate::ast::Expr;
use crate::eval::EvalNodeHelper;
use crate::runtime_error::RuntimeResult;
use crate::types::{Point, Sample, Timestamp, ValueType};

pub use registry::*;

mod histogram;
mod over_time;
mod rate;
mod registry;
mod transform;

pub(crate) use over_time::quantile;
pub(crate) use transform::absent_labels;

pub type InstantFn =
    fn(args: &[&[Sample]], call_args: &[Expr], enh: &mut EvalNodeHelper<'_>) -> RuntimeResult<()>;

pub type RangeFn = fn(window: &RangeWindow<'_>) -> Option<f64>;

/// The points of one series visible to a range function at one evaluation step.
#[derive(Debug, Clone, Copy)]
pub struct RangeWindow<'a> {
    pub points: &'a [Point],
    /// Evaluation timestamp.
    pub ts: Timestamp,
    pub range: i64,
    pub offset: i64,
    /// Values of the scalar arguments at this step, in argument order.
    pub scalars: &'a [f64],
}

impl RangeWindow<'_> {
    pub fn range_start(&self) -> Timestamp {
        self.ts - self.offset - self.range
    }

    pub fn range_end(&self) -> Timestamp {
        self.ts - self.offset
    }
}

#[derive(Clone, Copy)]
pub enum FunctionImpl {
    Instant(InstantFn),
    Range(RangeFn),
    /// Yields 1 at every step where no series has a point in the window.
    AbsentOverTime,
}

/// Signature and implementation of a built-in function.
#[derive(Clone, Copy)]
pub struct Function {
    pub name: &'static str,
    pub arg_types: &'static [ValueType],
    pub return_type: ValueType,
    pub implementation: FunctionImpl,
}

impl Function {
    pub fn signature(&self) -> String {
        format!(
            "{}({}) {}",
            self.name,
            self.arg_types.iter().join(", "),
            self.return_type
        )
    }
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("arg_types", &self.arg_types)
            .field("return_type", &self.return_type)
            .finish()
    }
}
