use std::fmt;
use std::fmt::{Display, Formatter};

use itertools::Itertools;

use promql_common::duration::DurationMs;

use crate::ast::{
    AggregateOp, LabelSelector, Operator, UnaryOp, VectorMatchCardinality, VectorMatching,
};
use crate::functions::Function;
use crate::types::{LabelMatcher, MatchOp, ValueType, METRIC_NAME_LABEL};

/// Instant vector selector. `id` indexes the series fetched for it.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorSelector {
    pub id: usize,
    pub name: Option<String>,
    pub matchers: Vec<LabelMatcher>,
    /// milliseconds
    pub offset: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatrixSelector {
    pub selector: VectorSelector,
    /// milliseconds
    pub range: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnaryExpr {
    pub op: UnaryOp,
    pub expr: Box<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinaryExpr {
    pub op: Operator,
    pub lhs: Box<Expr>,
    pub rhs: Box<Expr>,
    /// Set only when both operands are instant vectors.
    pub matching: Option<VectorMatching>,
    pub return_bool: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregateExpr {
    pub op: AggregateOp,
    pub expr: Box<Expr>,
    pub param: Option<Box<Expr>>,
    pub grouping: LabelSelector,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub func: &'static Function,
    pub args: Vec<Expr>,
}

impl Call {
    /// Index of the range vector argument, if the function takes one.
    pub fn matrix_arg_index(&self) -> Option<usize> {
        self.func
            .arg_types
            .iter()
            .position(|t| *t == ValueType::Matrix)
    }
}

/// A typed, immutable PromQL expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    NumberLiteral(f64),
    StringLiteral(String),
    VectorSelector(VectorSelector),
    MatrixSelector(MatrixSelector),
    Unary(UnaryExpr),
    Binary(BinaryExpr),
    Aggregate(AggregateExpr),
    Call(Call),
    Parens(Box<Expr>),
}

impl Expr {
    pub fn value_type(&self) -> ValueType {
        match self {
            Expr::NumberLiteral(_) => ValueType::Scalar,
            Expr::StringLiteral(_) => ValueType::String,
            Expr::VectorSelector(_) => ValueType::Vector,
            Expr::MatrixSelector(_) => ValueType::Matrix,
            Expr::Unary(u) => u.expr.value_type(),
            Expr::Binary(be) => {
                if be.lhs.value_type() == ValueType::Scalar && be.rhs.value_type() == ValueType::Scalar
                {
                    ValueType::Scalar
                } else {
                    ValueType::Vector
                }
            }
            Expr::Aggregate(_) => ValueType::Vector,
            Expr::Call(call) => call.func.return_type,
            Expr::Parens(e) => e.value_type(),
        }
    }

    /// Strips any enclosing parentheses.
    pub fn unwrap_parens(&self) -> &Expr {
        let mut expr = self;
        while let Expr::Parens(inner) = expr {
            expr = inner;
        }
        expr
    }

    /// Visits every node in pre-order.
    pub fn walk<'a, F>(&'a self, f: &mut F)
    where
        F: FnMut(&'a Expr),
    {
        f(self);
        match self {
            Expr::NumberLiteral(_)
            | Expr::StringLiteral(_)
            | Expr::VectorSelector(_)
            | Expr::MatrixSelector(_) => {}
            Expr::Unary(u) => u.expr.walk(f),
            Expr::Binary(be) => {
                be.lhs.walk(f);
                be.rhs.walk(f);
            }
            Expr::Aggregate(ae) => {
                if let Some(param) = &ae.param {
                    param.walk(f);
                }
                ae.expr.walk(f);
            }
            Expr::Call(call) => {
                for arg in &call.args {
                    arg.walk(f);
                }
            }
            Expr::Parens(e) => e.walk(f),
        }
    }

    /// Every selector with the range it reads (0 for instant selectors), ordered by id.
    pub fn selectors(&self) -> Vec<(&VectorSelector, i64)> {
        let mut res = Vec::new();
        self.walk(&mut |e| match e {
            Expr::VectorSelector(vs) => res.push((vs, 0)),
            Expr::MatrixSelector(ms) => res.push((&ms.selector, ms.range)),
            _ => {}
        });
        res.sort_by_key(|(vs, _)| vs.id);
        res
    }
}

impl Display for VectorSelector {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let matchers = self
            .matchers
            .iter()
            .filter(|m| {
                !(m.name == METRIC_NAME_LABEL
                    && m.op == MatchOp::Equal
                    && Some(&m.value) == self.name.as_ref())
            })
            .join(", ");
        if let Some(name) = &self.name {
            write!(f, "{name}")?;
        }
        if !matchers.is_empty() || self.name.is_none() {
            write!(f, "{{{matchers}}}")?;
        }
        Ok(())
    }
}

fn write_offset(f: &mut Formatter<'_>, offset: i64) -> fmt::Result {
    if offset != 0 {
        write!(f, " offset {}", DurationMs(offset))?;
    }
    Ok(())
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Expr::NumberLiteral(n) => write!(f, "{n}"),
            Expr::StringLiteral(s) => write!(f, "{s:?}"),
            Expr::VectorSelector(vs) => {
                write!(f, "{vs}")?;
                write_offset(f, vs.offset)
            }
            Expr::MatrixSelector(ms) => {
                write!(f, "{}[{}]", ms.selector, DurationMs(ms.range))?;
                write_offset(f, ms.selector.offset)
            }
            Expr::Unary(u) => write!(f, "{}{}", u.op, u.expr),
            Expr::Binary(be) => {
                write!(f, "{} {}", be.lhs, be.op)?;
                if be.return_bool {
                    write!(f, " bool")?;
                }
                if let Some(matching) = &be.matching {
                    let explicit = matching.matching.include
                        || !matching.matching.names.is_empty()
                        || matches!(
                            matching.card,
                            VectorMatchCardinality::ManyToOne | VectorMatchCardinality::OneToMany
                        );
                    if explicit {
                        write!(f, " {matching}")?;
                    }
                }
                write!(f, " {}", be.rhs)
            }
            Expr::Aggregate(ae) => {
                write!(f, "{}", ae.op)?;
                if !ae.grouping.include || !ae.grouping.names.is_empty() {
                    let keyword = if ae.grouping.include { "by" } else { "without" };
                    write!(f, " {keyword} {}", ae.grouping)?;
                }
                write!(f, " (")?;
                if let Some(param) = &ae.param {
                    write!(f, "{param}, ")?;
                }
                write!(f, "{})", ae.expr)
            }
            Expr::Call(call) => {
                write!(f, "{}({})", call.func.name, call.args.iter().join(", "))
            }
            Expr::Parens(e) => write!(f, "({e})"),
        }
    }
}
