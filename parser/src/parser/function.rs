use crate::parser::expr::parse_parameter;
use crate::parser::parse_error::ParseResult;
use crate::parser::tokens::Token;
use crate::parser::Parser;
use crate::tree::{RuleKind, RuleNode};

/// function: FUNCTION '(' (parameter (',' parameter)*)? ')'
///
/// Names are not validated here; unknown functions are rejected when the expression tree is built.
pub(super) fn parse_function(p: &mut Parser) -> ParseResult<RuleNode> {
    let name = p.expect(Token::Identifier)?;
    let mut children = vec![name];
    let args = p.parse_delimited(Token::LeftParen, Token::RightParen, parse_parameter)?;
    children.extend(args);
    Ok(RuleNode::new(RuleKind::Function, children))
}
