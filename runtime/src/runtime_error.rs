use std::error::Error;

use thiserror::Error;

use promql_parser::ParseError;

pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[derive(Debug, PartialEq, Clone, Error)]
pub enum RuntimeError {
    /// The query is well formed but cannot be turned into a valid expression tree.
    #[error("illegal expression: {msg} in `{fragment}`")]
    IllegalExpression { msg: String, fragment: String },
    #[error("query processing would load too many samples into memory (limit {0})")]
    TooManySamples(usize),
    #[error("{0}")]
    AmbiguousMatch(AmbiguousMatchError),
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
    #[error("argument error: {0}")]
    ArgumentError(String),
    #[error(transparent)]
    Parse(ParseError),
    #[error("error reading series: {0}")]
    Reader(String),
    #[error("query cancelled")]
    Cancelled,
    #[error("deadline exceeded: {0}")]
    DeadlineExceeded(String),
    #[error("{0}")]
    General(String),
}

impl RuntimeError {
    pub fn illegal<S: Into<String>, F: Into<String>>(msg: S, fragment: F) -> Self {
        RuntimeError::IllegalExpression {
            msg: msg.into(),
            fragment: fragment.into(),
        }
    }

    /// Errors caused by the query text rather than by the engine or the data source.
    pub fn is_bad_request(&self) -> bool {
        matches!(
            self,
            RuntimeError::IllegalExpression { .. }
                | RuntimeError::AmbiguousMatch(_)
                | RuntimeError::ArgumentError(_)
                | RuntimeError::Parse(_)
        )
    }
}

impl From<ParseError> for RuntimeError {
    fn from(err: ParseError) -> Self {
        RuntimeError::Parse(err)
    }
}

impl From<&str> for RuntimeError {
    fn from(message: &str) -> Self {
        RuntimeError::General(String::from(message))
    }
}

impl From<String> for RuntimeError {
    fn from(message: String) -> Self {
        RuntimeError::General(message)
    }
}

impl<E: Error + 'static> From<(&str, E)> for RuntimeError {
    fn from((message, err): (&str, E)) -> Self {
        RuntimeError::General(format!("{message}: {err}"))
    }
}

/// Vector matching cardinality as named in error messages.
#[derive(Debug, PartialEq, Eq, Clone, Copy, strum_macros::Display)]
pub enum MatchKind {
    #[strum(serialize = "one-to-one")]
    OneToOne,
    #[strum(serialize = "many-to-one")]
    ManyToOne,
    #[strum(serialize = "one-to-many")]
    OneToMany,
}

/// Raised when vector matching cannot pair elements unambiguously.
#[derive(Debug, PartialEq, Clone, Error)]
#[error("ambiguous {kind} match for label signature {signature}: {detail}")]
pub struct AmbiguousMatchError {
    pub kind: MatchKind,
    /// The matching labels that more than one element shares.
    pub signature: String,
    pub detail: String,
}
