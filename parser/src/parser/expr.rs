use crate::parser::aggregation::{is_aggregation_op, parse_aggregation};
use crate::parser::function::parse_function;
use crate::parser::parse_error::{syntax_error, ParseError, ParseResult};
use crate::parser::selector::{parse_instant_selector, parse_label_name_list, parse_selector_suffix};
use crate::parser::tokens::Token;
use crate::parser::Parser;
use crate::tree::{ParseNode, RuleKind, RuleNode};

/// Binary operator levels, loosest binding first.
const BINARY_LEVELS: [RuleKind; 5] = [
    RuleKind::OrOp,
    RuleKind::AndUnlessOp,
    RuleKind::CompareOp,
    RuleKind::AddOp,
    RuleKind::MultOp,
];

fn is_level_op(kind: RuleKind, token: Token) -> bool {
    match kind {
        RuleKind::OrOp => token == Token::OpOr,
        RuleKind::AndUnlessOp => token.is_and_unless_op(),
        RuleKind::CompareOp => token.is_comparison_op(),
        RuleKind::AddOp => token.is_add_op(),
        RuleKind::MultOp => token.is_mult_op(),
        RuleKind::PowOp => token == Token::OpPow,
        _ => false,
    }
}

/// vectorOperation: the full operator-precedence expression.
pub(crate) fn parse_vector_operation(p: &mut Parser) -> ParseResult<RuleNode> {
    parse_binary_level(p, 0)
}

fn parse_binary_level(p: &mut Parser, level: usize) -> ParseResult<RuleNode> {
    if level >= BINARY_LEVELS.len() {
        return parse_unary(p);
    }
    let kind = BINARY_LEVELS[level];
    let mut left = parse_binary_level(p, level + 1)?;
    while is_level_op(kind, p.peek_kind()) {
        let op = parse_binary_op(p, kind)?;
        let right = parse_binary_level(p, level + 1)?;
        left = binary_node(left, op, right);
    }
    Ok(left)
}

fn binary_node(left: RuleNode, op: RuleNode, right: RuleNode) -> RuleNode {
    RuleNode::new(
        RuleKind::VectorOperation,
        vec![
            ParseNode::Rule(left),
            ParseNode::Rule(op),
            ParseNode::Rule(right),
        ],
    )
}

/// Operator node: the operator token, `bool` for comparisons, then an optional grouping.
fn parse_binary_op(p: &mut Parser, kind: RuleKind) -> ParseResult<RuleNode> {
    let mut children = vec![p.take_terminal()?];

    // `bool` is only meaningful right after a comparison operator.
    if p.at(Token::Bool) {
        if kind != RuleKind::CompareOp {
            return Err(syntax_error(
                "bool modifier can only be used on comparison operators",
                p.current_span(),
            ));
        }
        children.push(p.take_terminal()?);
    }

    if p.peek_kind().is_group_modifier() {
        children.push(ParseNode::Rule(parse_grouping(p)?));
    }

    Ok(RuleNode::new(kind, children))
}

/// grouping: (on | ignoring) (group_left | group_right)?
fn parse_grouping(p: &mut Parser) -> ParseResult<RuleNode> {
    let matching_kind = if p.at(Token::On) {
        RuleKind::On
    } else {
        RuleKind::Ignoring
    };
    let keyword = p.expect_one_of(&[Token::On, Token::Ignoring])?;
    let labels = parse_label_name_list(p)?;
    let matching = RuleNode::new(matching_kind, vec![keyword, ParseNode::Rule(labels)]);

    let mut children = vec![ParseNode::Rule(matching)];
    if p.peek_kind().is_join_modifier() {
        let join_kind = if p.at(Token::GroupLeft) {
            RuleKind::GroupLeft
        } else {
            RuleKind::GroupRight
        };
        let mut join = vec![p.take_terminal()?];
        // the include list is optional
        if p.at(Token::LeftParen) {
            join.push(ParseNode::Rule(parse_label_name_list(p)?));
        }
        children.push(ParseNode::Rule(RuleNode::new(join_kind, join)));
    }
    Ok(RuleNode::new(RuleKind::Grouping, children))
}

fn parse_unary(p: &mut Parser) -> ParseResult<RuleNode> {
    if p.peek_kind().is_add_op() {
        let op = RuleNode::new(RuleKind::UnaryOp, vec![p.take_terminal()?]);
        let operand = parse_unary(p)?;
        return Ok(RuleNode::new(
            RuleKind::VectorOperation,
            vec![ParseNode::Rule(op), ParseNode::Rule(operand)],
        ));
    }
    parse_pow(p)
}

/// `^` is right associative and binds tighter than unary minus: `-a ^ b` is `-(a ^ b)`.
fn parse_pow(p: &mut Parser) -> ParseResult<RuleNode> {
    let left = parse_vector(p)?;
    let left = RuleNode::new(RuleKind::VectorOperation, vec![ParseNode::Rule(left)]);
    if is_level_op(RuleKind::PowOp, p.peek_kind()) {
        let op = parse_binary_op(p, RuleKind::PowOp)?;
        let right = parse_unary(p)?;
        return Ok(binary_node(left, op, right));
    }
    Ok(left)
}

/// vector: function | aggregation | instantSelector | matrixSelector | offset | literal | parens
fn parse_vector(p: &mut Parser) -> ParseResult<RuleNode> {
    use Token::*;

    let inner = match p.peek_kind() {
        LeftParen => parse_parens(p)?,
        Number | StringLiteral => RuleNode::new(RuleKind::Literal, vec![p.take_terminal()?]),
        LeftBrace => {
            let selector = parse_instant_selector(p)?;
            parse_selector_suffix(p, selector)?
        }
        Identifier => {
            let name = p.current()?.text;
            let next = p.look_ahead(1);
            if is_aggregation_op(name) && (next == LeftParen || next.is_aggregate_modifier()) {
                parse_aggregation(p)?
            } else if next == LeftParen {
                parse_function(p)?
            } else {
                let selector = parse_instant_selector(p)?;
                parse_selector_suffix(p, selector)?
            }
        }
        At => {
            return Err(ParseError::Unsupported(
                "@ modifier is not supported".to_string(),
            ))
        }
        Eof => return Err(ParseError::UnexpectedEOF),
        _ => {
            return Err(p.token_error(&[
                LeftParen,
                Number,
                StringLiteral,
                LeftBrace,
                Identifier,
            ]))
        }
    };

    if p.at(LeftBracket) {
        return Err(ParseError::Unsupported(format!(
            "subqueries are not supported (at {})",
            p.current_span()
        )));
    }
    if p.at(Offset) {
        return Err(syntax_error(
            "offset modifier must be preceded by an instant or range selector",
            p.current_span(),
        ));
    }

    Ok(RuleNode::new(RuleKind::Vector, vec![ParseNode::Rule(inner)]))
}

fn parse_parens(p: &mut Parser) -> ParseResult<RuleNode> {
    let open = p.expect(Token::LeftParen)?;
    let inner = parse_vector_operation(p)?;
    let close = p.expect(Token::RightParen)?;
    Ok(RuleNode::new(
        RuleKind::Parens,
        vec![open, ParseNode::Rule(inner), close],
    ))
}

/// parameter: a single function or aggregation argument.
pub(crate) fn parse_parameter(p: &mut Parser) -> ParseResult<ParseNode> {
    let op = parse_vector_operation(p)?;
    Ok(ParseNode::Rule(RuleNode::new(
        RuleKind::Parameter,
        vec![ParseNode::Rule(op)],
    )))
}
