//! Turns a concrete parse tree into a typed [`Expr`].
//!
//! The builder assigns every selector a dense id in visit order and performs all static checks:
//! operand and argument types, vector matching modifiers, durations and selector matchers.
use std::str::FromStr;

use promql_common::duration::parse_duration;
use promql_parser::prelude::{extract_string_value, ParseTree, RuleKind, RuleNode, Span, Token};

use crate::ast::{
    AggregateExpr, AggregateOp, BinaryExpr, Call, Expr, LabelSelector, MatrixSelector, Operator,
    UnaryExpr, UnaryOp, VectorMatchCardinality, VectorMatching, VectorSelector,
};
use crate::functions::get_function;
use crate::runtime_error::{RuntimeError, RuntimeResult};
use crate::types::{LabelMatcher, MatchOp, ValueType, METRIC_NAME_LABEL};

/// Builds the expression for a parsed query.
pub fn build_expr(tree: &ParseTree) -> RuntimeResult<Expr> {
    let mut builder = ExprBuilder { tree, next_id: 0 };
    let root = builder.child(&tree.root, RuleKind::VectorOperation)?;
    builder.vector_operation(root)
}

/// Parses and builds `query` in one go.
pub fn parse_expr(query: &str) -> RuntimeResult<Expr> {
    let tree = promql_parser::parse(query)?;
    build_expr(&tree)
}

struct ExprBuilder<'t> {
    tree: &'t ParseTree,
    next_id: usize,
}

fn parse_number(text: &str) -> Option<f64> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16).ok().map(|v| v as f64);
    }
    match text.to_ascii_lowercase().as_str() {
        "nan" => Some(f64::NAN),
        "inf" => Some(f64::INFINITY),
        _ => text.parse::<f64>().ok(),
    }
}

fn match_op(token: Token) -> Option<MatchOp> {
    match token {
        Token::Equal => Some(MatchOp::Equal),
        Token::OpNotEqual => Some(MatchOp::NotEqual),
        Token::RegexEqual => Some(MatchOp::RegexMatch),
        Token::RegexNotEqual => Some(MatchOp::RegexNotMatch),
        _ => None,
    }
}

impl<'t> ExprBuilder<'t> {
    fn illegal<S: Into<String>>(&self, msg: S, span: Span) -> RuntimeError {
        RuntimeError::illegal(msg, self.tree.text(span))
    }

    fn malformed(&self, node: &RuleNode) -> RuntimeError {
        RuntimeError::InvariantViolation(format!(
            "malformed {} node in `{}`",
            node.kind,
            self.tree.text(node.span)
        ))
    }

    fn child<'n>(&self, node: &'n RuleNode, kind: RuleKind) -> RuntimeResult<&'n RuleNode> {
        node.rule(kind).ok_or_else(|| self.malformed(node))
    }

    fn terminal_text<'n>(&self, node: &'n RuleNode) -> RuntimeResult<&'n str> {
        node.first_terminal()
            .map(|t| t.text.as_str())
            .ok_or_else(|| self.malformed(node))
    }

    fn next_selector_id(&mut self) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn duration(&self, node: &RuleNode) -> RuntimeResult<i64> {
        let token = node
            .terminal(Token::Duration)
            .ok_or_else(|| self.malformed(node))?;
        parse_duration(&token.text).map_err(|e| self.illegal(e.to_string(), token.span))
    }

    fn vector_operation(&mut self, node: &RuleNode) -> RuntimeResult<Expr> {
        let rules: Vec<&RuleNode> = node.rules().collect();
        match rules.as_slice() {
            [vector] if vector.kind == RuleKind::Vector => self.vector(vector),
            [op, operand] if op.kind == RuleKind::UnaryOp => self.unary(node, op, operand),
            [lhs, op, rhs] => self.binary(node, lhs, op, rhs),
            _ => Err(self.malformed(node)),
        }
    }

    fn unary(&mut self, node: &RuleNode, op: &RuleNode, operand: &RuleNode) -> RuntimeResult<Expr> {
        let op = match op.first_terminal().map(|t| t.token) {
            Some(Token::OpMinus) => UnaryOp::Neg,
            Some(Token::OpPlus) => UnaryOp::Plus,
            _ => return Err(self.malformed(op)),
        };
        let expr = self.vector_operation(operand)?;
        match expr.value_type() {
            ValueType::Scalar | ValueType::Vector => Ok(Expr::Unary(UnaryExpr {
                op,
                expr: Box::new(expr),
            })),
            other => Err(self.illegal(
                format!("unary expression only allowed on scalar or instant vector, got {other}"),
                node.span,
            )),
        }
    }

    fn binary(
        &mut self,
        node: &RuleNode,
        lhs: &RuleNode,
        op_node: &RuleNode,
        rhs: &RuleNode,
    ) -> RuntimeResult<Expr> {
        let op_token = op_node
            .first_terminal()
            .ok_or_else(|| self.malformed(op_node))?;
        let op = Operator::try_from(op_token.token)?;
        let return_bool = op_node.terminal(Token::Bool).is_some();
        let grouping = op_node.rule(RuleKind::Grouping);

        let lhs = self.vector_operation(lhs)?;
        let rhs = self.vector_operation(rhs)?;
        let (lt, rt) = (lhs.value_type(), rhs.value_type());

        for t in [lt, rt] {
            if !matches!(t, ValueType::Scalar | ValueType::Vector) {
                return Err(self.illegal(
                    format!("binary expression must contain only scalar and instant vector types, got {t}"),
                    node.span,
                ));
            }
        }
        if return_bool && !op.is_comparison() {
            return Err(self.illegal(
                "bool modifier can only be used on comparison operators",
                op_node.span,
            ));
        }
        let both_vectors = lt == ValueType::Vector && rt == ValueType::Vector;
        if op.is_set_operator() && !both_vectors {
            return Err(self.illegal(
                format!("set operator {op} not allowed in binary scalar expression"),
                node.span,
            ));
        }
        if grouping.is_some() && !both_vectors {
            return Err(self.illegal(
                "vector matching only allowed between instant vectors",
                op_node.span,
            ));
        }

        let matching = if both_vectors {
            Some(self.vector_matching(op, grouping)?)
        } else {
            None
        };

        Ok(Expr::Binary(BinaryExpr {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            matching,
            return_bool,
        }))
    }

    fn vector_matching(
        &self,
        op: Operator,
        grouping: Option<&RuleNode>,
    ) -> RuntimeResult<VectorMatching> {
        let default_card = if op.is_set_operator() {
            VectorMatchCardinality::ManyToMany
        } else {
            VectorMatchCardinality::OneToOne
        };
        let mut matching = VectorMatching::new(default_card);
        let Some(grouping) = grouping else {
            return Ok(matching);
        };

        if let Some(on) = grouping.rule(RuleKind::On) {
            matching.matching = LabelSelector::including(self.label_names(on)?);
        } else if let Some(ignoring) = grouping.rule(RuleKind::Ignoring) {
            matching.matching = LabelSelector::excluding(self.label_names(ignoring)?);
        }

        let join = grouping
            .rule(RuleKind::GroupLeft)
            .map(|n| (n, VectorMatchCardinality::ManyToOne))
            .or_else(|| {
                grouping
                    .rule(RuleKind::GroupRight)
                    .map(|n| (n, VectorMatchCardinality::OneToMany))
            });
        if let Some((join, card)) = join {
            if op.is_set_operator() {
                return Err(self.illegal(
                    format!("no grouping allowed for \"{op}\" operation"),
                    grouping.span,
                ));
            }
            matching.card = card;
            matching.include = self.label_names(join)?;
        }

        if matching.matching.include {
            if let Some(name) = matching
                .include
                .iter()
                .find(|name| matching.matching.contains(name))
            {
                return Err(self.illegal(
                    format!("label {name:?} must not occur in ON and GROUP clause at once"),
                    grouping.span,
                ));
            }
        }
        Ok(matching)
    }

    /// Names in the optional label name list under `node`.
    fn label_names(&self, node: &RuleNode) -> RuntimeResult<Vec<String>> {
        let Some(list) = node.rule(RuleKind::LabelNameList) else {
            return Ok(vec![]);
        };
        list.rules_of(RuleKind::LabelName)
            .map(|n| self.terminal_text(n).map(str::to_string))
            .collect()
    }

    fn vector(&mut self, node: &RuleNode) -> RuntimeResult<Expr> {
        let inner = node.rules().next().ok_or_else(|| self.malformed(node))?;
        match inner.kind {
            RuleKind::Parens => {
                let op = self.child(inner, RuleKind::VectorOperation)?;
                Ok(Expr::Parens(Box::new(self.vector_operation(op)?)))
            }
            RuleKind::Literal => self.literal(inner),
            RuleKind::InstantSelector => {
                Ok(Expr::VectorSelector(self.instant_selector(inner, 0)?))
            }
            RuleKind::MatrixSelector => self.matrix_selector(inner, 0),
            RuleKind::Offset => {
                let offset = self.duration(inner)?;
                let selector = inner.rules().next().ok_or_else(|| self.malformed(inner))?;
                match selector.kind {
                    RuleKind::InstantSelector => Ok(Expr::VectorSelector(
                        self.instant_selector(selector, offset)?,
                    )),
                    RuleKind::MatrixSelector => self.matrix_selector(selector, offset),
                    _ => Err(self.malformed(inner)),
                }
            }
            RuleKind::Function => self.function(inner),
            RuleKind::Aggregation => self.aggregation(inner),
            _ => Err(self.malformed(node)),
        }
    }

    fn literal(&self, node: &RuleNode) -> RuntimeResult<Expr> {
        let token = node.first_terminal().ok_or_else(|| self.malformed(node))?;
        match token.token {
            Token::Number => parse_number(&token.text)
                .map(Expr::NumberLiteral)
                .ok_or_else(|| self.illegal("invalid number", token.span)),
            Token::StringLiteral => Ok(Expr::StringLiteral(extract_string_value(&token.text)?)),
            _ => Err(self.malformed(node)),
        }
    }

    fn instant_selector(&mut self, node: &RuleNode, offset: i64) -> RuntimeResult<VectorSelector> {
        let name = node.terminal(Token::Identifier).map(|t| t.text.clone());

        let mut matchers = Vec::new();
        if let Some(list) = node.rule(RuleKind::LabelMatcherList) {
            for m in list.rules_of(RuleKind::LabelMatcher) {
                matchers.push(self.label_matcher(m)?);
            }
        }

        if let Some(name) = &name {
            if matchers.iter().any(|m| m.name == METRIC_NAME_LABEL) {
                return Err(self.illegal(
                    format!("metric name must not be set twice: {name:?}"),
                    node.span,
                ));
            }
            matchers.push(LabelMatcher::equal(METRIC_NAME_LABEL, name.as_str()));
        }

        if !matchers.iter().any(|m| !m.matches("")) {
            return Err(self.illegal(
                "vector selector must contain at least one non-empty matcher",
                node.span,
            ));
        }

        Ok(VectorSelector {
            id: self.next_selector_id(),
            name,
            matchers,
            offset,
        })
    }

    fn label_matcher(&self, node: &RuleNode) -> RuntimeResult<LabelMatcher> {
        let name = self.terminal_text(self.child(node, RuleKind::LabelName)?)?;
        let op_node = self.child(node, RuleKind::LabelMatcherOperator)?;
        let op = op_node
            .first_terminal()
            .and_then(|t| match_op(t.token))
            .ok_or_else(|| self.malformed(op_node))?;
        let value = node
            .terminal(Token::StringLiteral)
            .ok_or_else(|| self.malformed(node))?;
        let value = extract_string_value(&value.text)?;
        LabelMatcher::new(op, name, value)
    }

    fn matrix_selector(&mut self, node: &RuleNode, offset: i64) -> RuntimeResult<Expr> {
        let range = self.duration(node)?;
        if range <= 0 {
            return Err(self.illegal("range must be positive", node.span));
        }
        let selector = self.child(node, RuleKind::InstantSelector)?;
        let selector = self.instant_selector(selector, offset)?;
        Ok(Expr::MatrixSelector(MatrixSelector { selector, range }))
    }

    fn parameters(&mut self, node: &RuleNode) -> RuntimeResult<Vec<Expr>> {
        let mut args = Vec::new();
        for param in node.rules_of(RuleKind::Parameter) {
            let op = self.child(param, RuleKind::VectorOperation)?;
            args.push(self.vector_operation(op)?);
        }
        Ok(args)
    }

    fn function(&mut self, node: &RuleNode) -> RuntimeResult<Expr> {
        let name = self.terminal_text(node)?;
        let func = get_function(name).ok_or_else(|| {
            self.illegal(format!("unknown function with name {name:?}"), node.span)
        })?;

        let args = self.parameters(node)?;
        if args.len() != func.arg_types.len() {
            return Err(self.illegal(
                format!(
                    "expected {} argument(s) in call to {name:?}, got {}",
                    func.arg_types.len(),
                    args.len()
                ),
                node.span,
            ));
        }
        for (arg, expected) in args.iter().zip(func.arg_types) {
            let actual = arg.value_type();
            if actual != *expected {
                return Err(self.illegal(
                    format!(
                        "expected type {expected} in call to function {name:?}, got {actual}"
                    ),
                    node.span,
                ));
            }
        }
        Ok(Expr::Call(Call { func, args }))
    }

    fn aggregation(&mut self, node: &RuleNode) -> RuntimeResult<Expr> {
        let name = self.terminal_text(node)?;
        let op = AggregateOp::from_str(name).map_err(|_| {
            self.illegal(format!("unknown aggregation operator {name:?}"), node.span)
        })?;

        let grouping = if let Some(by) = node.rule(RuleKind::By) {
            LabelSelector::including(self.label_names(by)?)
        } else if let Some(without) = node.rule(RuleKind::Without) {
            LabelSelector::excluding(self.label_names(without)?)
        } else {
            LabelSelector::including(vec![])
        };

        let params = self.child(node, RuleKind::ParameterList)?;
        let mut args = self.parameters(params)?;
        let expected = if op.has_param() { 2 } else { 1 };
        if args.len() != expected {
            return Err(self.illegal(
                format!(
                    "wrong number of arguments for aggregate expression provided, expected {expected}, got {}",
                    args.len()
                ),
                node.span,
            ));
        }

        let expr = args.pop().ok_or_else(|| self.malformed(node))?;
        if expr.value_type() != ValueType::Vector {
            return Err(self.illegal(
                format!(
                    "expected type instant vector in aggregation expression, got {}",
                    expr.value_type()
                ),
                node.span,
            ));
        }
        let param = args.pop();
        if let Some(param) = &param {
            let expected = if op == AggregateOp::CountValues {
                ValueType::String
            } else {
                ValueType::Scalar
            };
            if param.value_type() != expected {
                return Err(self.illegal(
                    format!(
                        "expected type {expected} in aggregation parameter, got {}",
                        param.value_type()
                    ),
                    node.span,
                ));
            }
        }

        Ok(Expr::Aggregate(AggregateExpr {
            op,
            expr: Box::new(expr),
            param: param.map(Box::new),
            grouping,
        }))
    }
}
