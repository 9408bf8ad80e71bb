use crate::parser::parse_error::ParseResult;
use crate::parser::tokens::Token;
use crate::parser::Parser;
use crate::tree::{ParseNode, RuleKind, RuleNode};

/// instantSelector: METRIC_NAME ('{' labelMatcherList? '}')? | '{' labelMatcherList '}'
pub(crate) fn parse_instant_selector(p: &mut Parser) -> ParseResult<RuleNode> {
    let mut children = Vec::with_capacity(4);
    if p.at(Token::Identifier) {
        children.push(p.take_terminal()?);
        if !p.at(Token::LeftBrace) {
            return Ok(RuleNode::new(RuleKind::InstantSelector, children));
        }
    }

    children.push(p.expect(Token::LeftBrace)?);
    if !p.at(Token::RightBrace) {
        children.push(ParseNode::Rule(parse_label_matcher_list(p)?));
    }
    children.push(p.expect(Token::RightBrace)?);

    Ok(RuleNode::new(RuleKind::InstantSelector, children))
}

/// Wraps an instant selector in the optional `[range]` and `offset <duration>` suffixes.
pub(crate) fn parse_selector_suffix(p: &mut Parser, selector: RuleNode) -> ParseResult<RuleNode> {
    let mut node = selector;
    if p.at(Token::LeftBracket) {
        let open = p.take_terminal()?;
        let range = p.expect(Token::Duration)?;
        let close = p.expect(Token::RightBracket)?;
        node = RuleNode::new(
            RuleKind::MatrixSelector,
            vec![ParseNode::Rule(node), open, range, close],
        );
    }
    if p.at(Token::Offset) {
        let keyword = p.take_terminal()?;
        let duration = p.expect(Token::Duration)?;
        node = RuleNode::new(
            RuleKind::Offset,
            vec![ParseNode::Rule(node), keyword, duration],
        );
    }
    Ok(node)
}

fn parse_label_matcher_list(p: &mut Parser) -> ParseResult<RuleNode> {
    let mut children = Vec::with_capacity(4);
    loop {
        children.push(ParseNode::Rule(parse_label_matcher(p)?));
        if !p.at(Token::Comma) {
            break;
        }
        children.push(p.take_terminal()?);
        // trailing comma
        if p.at(Token::RightBrace) {
            break;
        }
    }
    Ok(RuleNode::new(RuleKind::LabelMatcherList, children))
}

/// labelMatcher: labelName labelMatcherOperator STRING
fn parse_label_matcher(p: &mut Parser) -> ParseResult<RuleNode> {
    let name = parse_label_name(p)?;
    if !p.peek_kind().is_label_matcher_op() {
        return Err(p.token_error(&[
            Token::Equal,
            Token::OpNotEqual,
            Token::RegexEqual,
            Token::RegexNotEqual,
        ]));
    }
    let op = RuleNode::new(RuleKind::LabelMatcherOperator, vec![p.take_terminal()?]);
    let value = p.expect(Token::StringLiteral)?;
    Ok(RuleNode::new(
        RuleKind::LabelMatcher,
        vec![name, ParseNode::Rule(op), value],
    ))
}

/// labelName: keyword | METRIC_NAME | LABEL_NAME
pub(crate) fn parse_label_name(p: &mut Parser) -> ParseResult<ParseNode> {
    let kind = p.peek_kind();
    if kind == Token::Identifier || kind.is_keyword() {
        let tok = p.take_terminal()?;
        return Ok(ParseNode::Rule(RuleNode::new(RuleKind::LabelName, vec![tok])));
    }
    Err(p.token_error(&[Token::Identifier]))
}

/// labelNameList: '(' (labelName (',' labelName)*)? ')'
pub(crate) fn parse_label_name_list(p: &mut Parser) -> ParseResult<RuleNode> {
    let children = p.parse_delimited(Token::LeftParen, Token::RightParen, parse_label_name)?;
    Ok(RuleNode::new(RuleKind::LabelNameList, children))
}
