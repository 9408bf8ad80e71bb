use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString, IntoStaticStr};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum AggregateOp {
    Avg,
    Bottomk,
    Count,
    CountValues,
    Group,
    Max,
    Min,
    Quantile,
    Stddev,
    Stdvar,
    Sum,
    Topk,
}

impl AggregateOp {
    /// Operators taking a parameter before the vector argument.
    pub fn has_param(&self) -> bool {
        matches!(
            self,
            AggregateOp::Bottomk | AggregateOp::CountValues | AggregateOp::Quantile | AggregateOp::Topk
        )
    }

    /// topk/bottomk keep the input samples untouched, including the metric name.
    pub fn keeps_samples(&self) -> bool {
        matches!(self, AggregateOp::Bottomk | AggregateOp::Topk)
    }
}
