use crate::parser::expr::parse_parameter;
use crate::parser::parse_error::{syntax_error, ParseResult};
use crate::parser::selector::parse_label_name_list;
use crate::parser::tokens::Token;
use crate::parser::Parser;
use crate::tree::{ParseNode, RuleKind, RuleNode};

/// Operator names the grammar treats as aggregations rather than function calls.
const AGGREGATION_OPERATORS: [&str; 12] = [
    "avg",
    "bottomk",
    "count",
    "count_values",
    "group",
    "max",
    "min",
    "quantile",
    "stddev",
    "stdvar",
    "sum",
    "topk",
];

pub fn is_aggregation_op(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    AGGREGATION_OPERATORS.contains(&lower.as_str())
}

/// parse_aggregation parses an aggregation.
///
///    <aggr_op> (<params>) [by|without <labels>]
///    <aggr_op> [by|without <labels>] (<params>)
///
pub(super) fn parse_aggregation(p: &mut Parser) -> ParseResult<RuleNode> {
    let mut children = vec![p.expect(Token::Identifier)?];

    let prefix_modifier = p.peek_kind().is_aggregate_modifier();
    if prefix_modifier {
        children.push(ParseNode::Rule(parse_aggregate_modifier(p)?));
    }

    let params = p.parse_delimited(Token::LeftParen, Token::RightParen, parse_parameter)?;
    children.push(ParseNode::Rule(RuleNode::new(RuleKind::ParameterList, params)));

    if p.peek_kind().is_aggregate_modifier() {
        if prefix_modifier {
            return Err(syntax_error(
                "aggregation may not have both a prefix and a suffix grouping clause",
                p.current_span(),
            ));
        }
        children.push(ParseNode::Rule(parse_aggregate_modifier(p)?));
    }

    Ok(RuleNode::new(RuleKind::Aggregation, children))
}

fn parse_aggregate_modifier(p: &mut Parser) -> ParseResult<RuleNode> {
    let kind = if p.at(Token::By) {
        RuleKind::By
    } else {
        RuleKind::Without
    };
    let keyword = p.expect_one_of(&[Token::By, Token::Without])?;
    let labels = parse_label_name_list(p)?;
    Ok(RuleNode::new(kind, vec![keyword, ParseNode::Rule(labels)]))
}
