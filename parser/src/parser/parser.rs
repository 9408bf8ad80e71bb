use logos::Logos;

use crate::parser::expr::parse_vector_operation;
use crate::parser::parse_error::{InvalidTokenError, ParseError, ParseResult};
use crate::parser::tokens::Token;
use crate::tree::{ParseNode, ParseTree, RuleKind, RuleNode, Span, TerminalNode};

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Lexeme<'a> {
    pub kind: Token,
    pub text: &'a str,
    pub span: Span,
}

/// Splits `input` into tokens, failing on the first unrecognized character sequence.
pub(crate) fn tokenize(input: &str) -> ParseResult<Vec<Lexeme<'_>>> {
    let mut lexer = Token::lexer(input);
    let mut tokens = Vec::with_capacity(input.len() / 4 + 1);
    while let Some(tok) = lexer.next() {
        let span = Span::from(lexer.span());
        match tok {
            Ok(kind) => tokens.push(Lexeme {
                kind,
                text: lexer.slice(),
                span,
            }),
            Err(_) => {
                return Err(ParseError::UnrecognizedInput {
                    text: lexer.slice().to_string(),
                    span,
                })
            }
        }
    }
    Ok(tokens)
}

/// Recursive-descent parser producing a concrete parse tree.
///
/// preconditions for all parse* funcs:
/// - the cursor points at the first token of the production.
///
/// post-conditions for all parse* funcs:
/// - the cursor points at the token after the production.
pub struct Parser<'a> {
    tokens: Vec<Lexeme<'a>>,
    cursor: usize,
    source: &'a str,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str) -> ParseResult<Self> {
        let tokens = tokenize(input)?;
        Ok(Self {
            tokens,
            cursor: 0,
            source: input,
        })
    }

    /// Parses the whole input as a single `expression`.
    pub fn parse(mut self) -> ParseResult<ParseTree> {
        if self.tokens.is_empty() {
            return Err(ParseError::UnexpectedEOF);
        }
        let op = parse_vector_operation(&mut self)?;
        if !self.is_eof() {
            return Err(self.token_error(&[Token::Eof]));
        }
        Ok(ParseTree {
            source: self.source.to_string(),
            root: RuleNode::new(RuleKind::Expression, vec![ParseNode::Rule(op)]),
        })
    }

    pub(crate) fn is_eof(&self) -> bool {
        self.cursor >= self.tokens.len()
    }

    pub(crate) fn peek_kind(&self) -> Token {
        self.tokens
            .get(self.cursor)
            .map(|t| t.kind)
            .unwrap_or(Token::Eof)
    }

    /// Kind of the token `n` positions after the cursor.
    pub(crate) fn look_ahead(&self, n: usize) -> Token {
        self.tokens
            .get(self.cursor + n)
            .map(|t| t.kind)
            .unwrap_or(Token::Eof)
    }

    pub(crate) fn current(&self) -> ParseResult<&Lexeme<'a>> {
        self.tokens.get(self.cursor).ok_or(ParseError::UnexpectedEOF)
    }

    pub(crate) fn at(&self, kind: Token) -> bool {
        self.peek_kind() == kind
    }

    pub(crate) fn at_set(&self, set: &[Token]) -> bool {
        set.contains(&self.peek_kind())
    }

    pub(crate) fn bump(&mut self) {
        if self.cursor < self.tokens.len() {
            self.cursor += 1;
        }
    }

    /// Consumes the current token and returns it as a terminal node.
    pub(crate) fn take_terminal(&mut self) -> ParseResult<ParseNode> {
        let lexeme = *self.current()?;
        self.bump();
        Ok(ParseNode::Terminal(TerminalNode {
            token: lexeme.kind,
            text: lexeme.text.to_string(),
            span: lexeme.span,
        }))
    }

    pub(crate) fn expect(&mut self, kind: Token) -> ParseResult<ParseNode> {
        if self.at(kind) {
            self.take_terminal()
        } else {
            Err(self.token_error(&[kind]))
        }
    }

    pub(crate) fn expect_one_of(&mut self, kinds: &[Token]) -> ParseResult<ParseNode> {
        if self.at_set(kinds) {
            self.take_terminal()
        } else {
            Err(self.token_error(kinds))
        }
    }

    pub(crate) fn token_error(&self, expected: &[Token]) -> ParseError {
        let inner = match self.tokens.get(self.cursor) {
            Some(lexeme) => {
                InvalidTokenError::new(expected, Some(lexeme.kind), lexeme.text, lexeme.span)
            }
            None => {
                let end = self.source.len();
                InvalidTokenError::new(expected, None, "", Span::new(end, end))
            }
        };
        ParseError::InvalidToken(inner)
    }

    pub(crate) fn current_span(&self) -> Span {
        match self.tokens.get(self.cursor) {
            Some(lexeme) => lexeme.span,
            None => Span::new(self.source.len(), self.source.len()),
        }
    }

    /// Parses a comma-separated list enclosed by `open` and `close`. Tokens are kept in the
    /// returned children; a trailing comma is accepted.
    pub(crate) fn parse_delimited<F>(
        &mut self,
        open: Token,
        close: Token,
        mut f: F,
    ) -> ParseResult<Vec<ParseNode>>
    where
        F: FnMut(&mut Parser<'a>) -> ParseResult<ParseNode>,
    {
        let mut children = Vec::with_capacity(4);
        children.push(self.expect(open)?);
        loop {
            if self.at(close) {
                children.push(self.take_terminal()?);
                break;
            }
            children.push(f(self)?);
            match self.peek_kind() {
                Token::Comma => children.push(self.take_terminal()?),
                kind if kind == close => {
                    children.push(self.take_terminal()?);
                    break;
                }
                _ => return Err(self.token_error(&[Token::Comma, close])),
            }
        }
        Ok(children)
    }
}

/// Parses `input` into a concrete parse tree.
pub fn parse(input: &str) -> ParseResult<ParseTree> {
    Parser::new(input)?.parse()
}
