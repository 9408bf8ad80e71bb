use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use strum_macros::{Display as StrumDisplay, EnumString};

use crate::types::{Matrix, Timestamp, Vector};

/// Static result type of an expression.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, StrumDisplay, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
pub enum ValueType {
    Scalar,
    #[strum(serialize = "instant vector")]
    Vector,
    #[strum(serialize = "range vector")]
    Matrix,
    String,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scalar {
    pub t: Timestamp,
    pub v: f64,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct StringValue {
    pub t: Timestamp,
    pub v: String,
}

/// Typed result of a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryValue {
    Vector(Vector),
    Scalar(Scalar),
    Matrix(Matrix),
    String(StringValue),
}

impl QueryValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            QueryValue::Vector(_) => ValueType::Vector,
            QueryValue::Scalar(_) => ValueType::Scalar,
            QueryValue::Matrix(_) => ValueType::Matrix,
            QueryValue::String(_) => ValueType::String,
        }
    }

    pub fn as_vector(&self) -> Option<&Vector> {
        match self {
            QueryValue::Vector(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_matrix(&self) -> Option<&Matrix> {
        match self {
            QueryValue::Matrix(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            QueryValue::Scalar(s) => Some(s.v),
            _ => None,
        }
    }

    /// Number of series (or 1 for scalars and strings).
    pub fn len(&self) -> usize {
        match self {
            QueryValue::Vector(v) => v.len(),
            QueryValue::Matrix(m) => m.len(),
            QueryValue::Scalar(_) | QueryValue::String(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Display for QueryValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryValue::Vector(vector) => {
                for s in vector {
                    writeln!(f, "{} => {} @{}", s.metric, s.point.v, s.point.t)?;
                }
                Ok(())
            }
            QueryValue::Matrix(matrix) => {
                for series in matrix {
                    write!(f, "{} =>", series.metric)?;
                    for p in &series.points {
                        write!(f, " {} @{}", p.v, p.t)?;
                    }
                    writeln!(f)?;
                }
                Ok(())
            }
            QueryValue::Scalar(s) => write!(f, "scalar: {} @{}", s.v, s.t),
            QueryValue::String(s) => write!(f, "string: {:?} @{}", s.v, s.t),
        }
    }
}
