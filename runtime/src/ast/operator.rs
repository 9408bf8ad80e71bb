use std::fmt;

use phf::phf_map;
use serde::{Deserialize, Serialize};

use promql_parser::prelude::Token;

use crate::runtime_error::{RuntimeError, RuntimeResult};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    Add,
    And,
    Div,
    Eql,
    Mod,
    Mul,
    Pow,
    Sub,
    Gt,
    Gte,
    Lt,
    Lte,
    NotEq,
    Or,
    Unless,
}

pub static BINARY_OPS_MAP: phf::Map<&'static str, Operator> = phf_map! {
    "+" => Operator::Add,
    "-" => Operator::Sub,
    "*" => Operator::Mul,
    "/" => Operator::Div,
    "%" => Operator::Mod,
    "^" => Operator::Pow,

    // cmp ops
    "==" => Operator::Eql,
    "!=" => Operator::NotEq,
    "<" => Operator::Lt,
    ">" => Operator::Gt,
    "<=" => Operator::Lte,
    ">=" => Operator::Gte,

    // logic set ops
    "and" => Operator::And,
    "or" => Operator::Or,
    "unless" => Operator::Unless,
};

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum BinaryOpKind {
    Arithmetic,
    Comparison,
    Logical,
}

impl Operator {
    #[inline]
    pub fn kind(self) -> BinaryOpKind {
        use BinaryOpKind::*;
        use Operator::*;

        match self {
            Add | Sub | Mul | Div | Mod | Pow => Arithmetic,
            Eql | Gte | Gt | Lt | Lte | NotEq => Comparison,
            And | Unless | Or => Logical,
        }
    }

    pub fn is_comparison(&self) -> bool {
        self.kind() == BinaryOpKind::Comparison
    }

    #[inline]
    pub fn is_set_operator(&self) -> bool {
        self.kind() == BinaryOpKind::Logical
    }

    pub fn as_str(&self) -> &'static str {
        use Operator::*;
        match self {
            Add => "+",
            And => "and",
            Div => "/",
            Eql => "==",
            Gt => ">",
            Gte => ">=",
            Mod => "%",
            Mul => "*",
            Lt => "<",
            Lte => "<=",
            NotEq => "!=",
            Or => "or",
            Pow => "^",
            Sub => "-",
            Unless => "unless",
        }
    }

    /// Applies an arithmetic or comparison operator to two values.
    ///
    /// Comparisons return `(value, keep)`: the left value and whether the pair passes the
    /// filter. Arithmetic always keeps the computed value.
    pub fn apply(&self, lhs: f64, rhs: f64) -> RuntimeResult<(f64, bool)> {
        use Operator::*;
        let res = match self {
            Add => (lhs + rhs, true),
            Sub => (lhs - rhs, true),
            Mul => (lhs * rhs, true),
            Div => (lhs / rhs, true),
            Pow => (lhs.powf(rhs), true),
            Mod => (lhs % rhs, true),
            Eql => (lhs, lhs == rhs),
            NotEq => (lhs, lhs != rhs),
            Gt => (lhs, lhs > rhs),
            Lt => (lhs, lhs < rhs),
            Gte => (lhs, lhs >= rhs),
            Lte => (lhs, lhs <= rhs),
            And | Or | Unless => {
                return Err(RuntimeError::Unsupported(format!(
                    "operator {self} not allowed between scalar values"
                )))
            }
        };
        Ok(res)
    }
}

impl TryFrom<&str> for Operator {
    type Error = RuntimeError;

    fn try_from(op: &str) -> Result<Self, Self::Error> {
        match BINARY_OPS_MAP.get(op.to_lowercase().as_str()) {
            Some(op) => Ok(*op),
            None => Err(RuntimeError::illegal("unknown binary operator", op)),
        }
    }
}

impl TryFrom<Token> for Operator {
    type Error = RuntimeError;

    fn try_from(token: Token) -> Result<Self, Self::Error> {
        match token {
            Token::OpAnd => Ok(Operator::And),
            Token::OpDiv => Ok(Operator::Div),
            Token::OpEqual => Ok(Operator::Eql),
            Token::OpGreaterThan => Ok(Operator::Gt),
            Token::OpGreaterThanOrEqual => Ok(Operator::Gte),
            Token::OpMod => Ok(Operator::Mod),
            Token::OpMul => Ok(Operator::Mul),
            Token::OpMinus => Ok(Operator::Sub),
            Token::OpLessThan => Ok(Operator::Lt),
            Token::OpLessThanOrEqual => Ok(Operator::Lte),
            Token::OpNotEqual => Ok(Operator::NotEq),
            Token::OpOr => Ok(Operator::Or),
            Token::OpPow => Ok(Operator::Pow),
            Token::OpUnless => Ok(Operator::Unless),
            Token::OpPlus => Ok(Operator::Add),
            _ => Err(RuntimeError::illegal(
                "not a binary operator",
                token.to_string(),
            )),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Plus,
    Neg,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            UnaryOp::Plus => f.write_str("+"),
            UnaryOp::Neg => f.write_str("-"),
        }
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(Operator::Add, 3.0, 2.0, 5.0)]
    #[test_case(Operator::Sub, 3.0, 2.0, 1.0)]
    #[test_case(Operator::Mul, 3.0, 2.0, 6.0)]
    #[test_case(Operator::Div, 3.0, 2.0, 1.5)]
    #[test_case(Operator::Mod, 7.0, 4.0, 3.0)]
    #[test_case(Operator::Pow, 2.0, 10.0, 1024.0)]
    fn arithmetic(op: Operator, lhs: f64, rhs: f64, expected: f64) {
        assert_eq!(op.apply(lhs, rhs).unwrap(), (expected, true));
    }

    #[test_case(Operator::Eql, 1.0, 1.0, true)]
    #[test_case(Operator::NotEq, 1.0, 1.0, false)]
    #[test_case(Operator::Gt, 2.0, 1.0, true)]
    #[test_case(Operator::Lte, 2.0, 1.0, false)]
    #[test_case(Operator::Eql, f64::NAN, f64::NAN, false; "nan is never equal")]
    #[test_case(Operator::NotEq, f64::NAN, f64::NAN, true; "nan is always unequal")]
    fn comparison(op: Operator, lhs: f64, rhs: f64, keep: bool) {
        let (_, kept) = op.apply(lhs, rhs).unwrap();
        assert_eq!(kept, keep);
    }

    #[test]
    fn set_operators_reject_scalars() {
        assert!(Operator::And.apply(1.0, 1.0).is_err());
    }

    #[test]
    fn from_str_is_case_insensitive() {
        assert_eq!(Operator::try_from("UNLESS").unwrap(), Operator::Unless);
        assert!(Operator::try_from("atan2").is_err());
    }
}
