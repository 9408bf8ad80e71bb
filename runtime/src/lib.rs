#![forbid(unsafe_code)]
extern crate chrono;
extern crate lockfree_object_pool;
extern crate phf;

pub mod ast;
pub mod eval;
pub mod execution;
pub mod functions;
pub mod provider;
mod runtime_error;
pub mod types;

pub use execution::{Engine, EngineConfig, EvalConfig, QueryContext};
pub use runtime_error::*;

pub mod prelude {
    pub use crate::ast::{parse_expr, Expr};
    pub use crate::eval::{Evaluator, PopulatedExpr};
    pub use crate::execution::*;
    pub use crate::provider::*;
    pub use crate::runtime_error::*;
    pub use crate::types::*;
}
