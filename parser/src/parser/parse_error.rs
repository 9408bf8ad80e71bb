use std::fmt;
use std::fmt::{Display, Formatter};

use thiserror::Error;

use crate::parser::tokens::Token;
use crate::tree::Span;

pub type ParseResult<T> = Result<T, ParseError>;

#[derive(Debug, PartialEq, Eq, Clone, Error)]
pub enum ParseError {
    #[error(transparent)]
    InvalidToken(InvalidTokenError),
    #[error("unrecognized input `{text}` at {span}")]
    UnrecognizedInput { text: String, span: Span },
    #[error("Unexpected end of text")]
    UnexpectedEOF,
    #[error("Syntax Error: {0}")]
    SyntaxError(String),
    #[error("invalid string literal {0}")]
    InvalidString(String),
    #[error("{0}")]
    Unsupported(String),
}

/// A token was found where a different one was expected.
#[derive(Debug, PartialEq, Eq, Clone, Error)]
pub struct InvalidTokenError {
    pub expected: Vec<Token>,
    pub found: Option<Token>,
    pub text: String,
    pub span: Span,
    pub context: String,
}

impl InvalidTokenError {
    pub fn new(expected: &[Token], found: Option<Token>, text: &str, span: Span) -> Self {
        Self {
            expected: Vec::from(expected),
            found,
            text: text.to_string(),
            span,
            context: String::new(),
        }
    }

    pub fn with_context(mut self, context: &str) -> Self {
        self.context = context.to_string();
        self
    }
}

impl Display for InvalidTokenError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if !self.context.is_empty() {
            write!(f, "{}: ", self.context)?;
        }
        match self.found {
            None | Some(Token::Eof) => write!(f, "unexpected end of input")?,
            Some(_) => write!(f, "unexpected `{}` at {}", self.text, self.span)?,
        }

        let num_expected = self.expected.len();
        if num_expected == 0 {
            return Ok(());
        }
        write!(f, ", expected ")?;
        for (i, kind) in self.expected.iter().enumerate() {
            if i > 0 {
                if i == num_expected - 1 {
                    write!(f, " or ")?;
                } else {
                    write!(f, ", ")?;
                }
            }
            write!(f, "{kind}")?;
        }
        Ok(())
    }
}

pub(crate) fn syntax_error(msg: &str, span: Span) -> ParseError {
    ParseError::SyntaxError(format!("{msg} at {span}"))
}
