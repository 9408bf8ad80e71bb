pub use matcher::*;
pub use query_value::*;
pub use sample::*;

mod matcher;
mod query_value;
mod sample;

pub use promql_common::label::{Label, Labels, METRIC_NAME_LABEL};
