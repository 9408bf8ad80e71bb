mod aggregation;
mod expr;
mod function;
mod parse_error;
#[allow(clippy::module_inception)]
mod parser;
mod selector;
pub mod tokens;

#[cfg(test)]
mod parser_test;

pub use aggregation::is_aggregation_op;
pub use parse_error::*;
pub use parser::{parse, Parser};

/// Returns the value of a quoted string literal (`"..."`, `'...'` or `` `...` ``).
pub fn extract_string_value(token: &str) -> ParseResult<String> {
    if token.len() < 2 {
        return Err(ParseError::InvalidString(token.to_string()));
    }
    // raw strings have no escapes
    if token.starts_with('`') {
        if !token.ends_with('`') {
            return Err(ParseError::InvalidString(token.to_string()));
        }
        return Ok(token[1..token.len() - 1].to_string());
    }
    enquote::unquote(token).map_err(|_| ParseError::InvalidString(token.to_string()))
}
