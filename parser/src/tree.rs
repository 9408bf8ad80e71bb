//! Concrete parse tree.
//!
//! Rule nodes mirror the productions of the PromQL grammar (`vectorOperation`, `compareOp`,
//! `instantSelector`, ...) and keep every token, so consumers can recover the exact source
//! fragment of any node.
use std::fmt;
use std::fmt::{Display, Formatter};

use serde::Serialize;
use strum_macros::{Display as StrumDisplay, IntoStaticStr};

use crate::parser::tokens::Token;

/// Byte range of a node in the source text.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn cover(&self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl Display for Span {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

impl From<std::ops::Range<usize>> for Span {
    fn from(range: std::ops::Range<usize>) -> Self {
        Span::new(range.start, range.end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, StrumDisplay, IntoStaticStr, Serialize)]
#[strum(serialize_all = "camelCase")]
pub enum RuleKind {
    Expression,
    VectorOperation,
    UnaryOp,
    PowOp,
    MultOp,
    AddOp,
    CompareOp,
    AndUnlessOp,
    OrOp,
    Vector,
    Parens,
    InstantSelector,
    LabelMatcherList,
    LabelMatcher,
    LabelMatcherOperator,
    MatrixSelector,
    Offset,
    Function,
    Parameter,
    ParameterList,
    Aggregation,
    By,
    Without,
    Grouping,
    On,
    Ignoring,
    GroupLeft,
    GroupRight,
    LabelName,
    LabelNameList,
    Literal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TerminalNode {
    pub token: Token,
    pub text: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuleNode {
    pub kind: RuleKind,
    pub children: Vec<ParseNode>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParseNode {
    Rule(RuleNode),
    Terminal(TerminalNode),
}

impl ParseNode {
    pub fn span(&self) -> Span {
        match self {
            ParseNode::Rule(r) => r.span,
            ParseNode::Terminal(t) => t.span,
        }
    }

    pub fn as_rule(&self) -> Option<&RuleNode> {
        match self {
            ParseNode::Rule(r) => Some(r),
            ParseNode::Terminal(_) => None,
        }
    }

    pub fn as_terminal(&self) -> Option<&TerminalNode> {
        match self {
            ParseNode::Terminal(t) => Some(t),
            ParseNode::Rule(_) => None,
        }
    }
}

impl RuleNode {
    pub(crate) fn new(kind: RuleKind, children: Vec<ParseNode>) -> Self {
        let span = children
            .iter()
            .map(|c| c.span())
            .reduce(|a, b| a.cover(b))
            .unwrap_or_default();
        Self {
            kind,
            children,
            span,
        }
    }

    /// Child rule nodes, in source order.
    pub fn rules(&self) -> impl Iterator<Item = &RuleNode> {
        self.children.iter().filter_map(|c| c.as_rule())
    }

    /// Child terminals, in source order.
    pub fn terminals(&self) -> impl Iterator<Item = &TerminalNode> {
        self.children.iter().filter_map(|c| c.as_terminal())
    }

    pub fn rule(&self, kind: RuleKind) -> Option<&RuleNode> {
        self.rules().find(|r| r.kind == kind)
    }

    pub fn rules_of(&self, kind: RuleKind) -> impl Iterator<Item = &RuleNode> {
        self.rules().filter(move |r| r.kind == kind)
    }

    pub fn terminal(&self, token: Token) -> Option<&TerminalNode> {
        self.terminals().find(|t| t.token == token)
    }

    pub fn first_terminal(&self) -> Option<&TerminalNode> {
        self.terminals().next()
    }
}

/// The result of parsing one query: the root `expression` rule plus the source it spans.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseTree {
    pub source: String,
    pub root: RuleNode,
}

impl ParseTree {
    /// Source text covered by `span`.
    pub fn text(&self, span: Span) -> &str {
        self.source.get(span.start..span.end).unwrap_or_default()
    }
}

impl Display for RuleNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "({}", self.kind)?;
        for child in &self.children {
            write!(f, " {child}")?;
        }
        write!(f, ")")
    }
}

impl Display for ParseNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ParseNode::Rule(r) => write!(f, "{r}"),
            ParseNode::Terminal(t) => write!(f, "{}", t.text),
        }
    }
}

impl Display for ParseTree {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root)
    }
}
