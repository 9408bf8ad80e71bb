use std::fmt::{Display, Formatter};

use logos::Logos;

#[derive(Logos, Debug, PartialEq, Eq, Hash, Clone, Copy)]
#[logos(subpattern unit = r"(ms|s|m|h|d|w|y)")]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"#[^\r\n]*")] // single line comment
pub enum Token {
    #[token("and", ignore(ascii_case))]
    OpAnd,

    #[token("bool", ignore(ascii_case))]
    Bool,

    #[token("by", ignore(ascii_case))]
    By,

    #[token("group_left", ignore(ascii_case))]
    GroupLeft,

    #[token("group_right", ignore(ascii_case))]
    GroupRight,

    #[token("ignoring", ignore(ascii_case))]
    Ignoring,

    #[token("offset", ignore(ascii_case))]
    Offset,

    #[token("on", ignore(ascii_case))]
    On,

    #[token("or", ignore(ascii_case))]
    OpOr,

    #[token("unless", ignore(ascii_case))]
    OpUnless,

    #[token("without", ignore(ascii_case))]
    Without,

    #[regex("([0-9]+(?&unit))+", priority = 5)]
    Duration,

    #[regex(r"[0-9]+(\.[0-9]*)?([eE][+-]?[0-9]+)?")]
    #[regex(r"\.[0-9]+([eE][+-]?[0-9]+)?")]
    #[regex(r"0[xX][0-9a-fA-F]+")]
    #[regex("[Nn][Aa][Nn]", priority = 10)]
    #[regex("[Ii][Nn][Ff]", priority = 10)]
    Number,

    #[regex(r"[a-zA-Z_:][a-zA-Z0-9_:]*")]
    Identifier,

    #[regex("'(?s:[^'\\\\]|\\\\.)*'")]
    #[regex("`[^`]*`")]
    #[regex("\"(?s:[^\"\\\\]|\\\\.)*\"")]
    StringLiteral,

    #[token("@")]
    At,

    #[token("{")]
    LeftBrace,

    #[token("}")]
    RightBrace,

    #[token("[")]
    LeftBracket,

    #[token("]")]
    RightBracket,

    #[token(",")]
    Comma,

    #[token("(")]
    LeftParen,

    #[token(")")]
    RightParen,

    #[token("=")]
    Equal,

    #[token("==")]
    OpEqual,

    #[token("!=")]
    OpNotEqual,

    #[token("<")]
    OpLessThan,

    #[token("<=")]
    OpLessThanOrEqual,

    #[token(">")]
    OpGreaterThan,

    #[token(">=")]
    OpGreaterThanOrEqual,

    #[token("+")]
    OpPlus,

    #[token("-")]
    OpMinus,

    #[token("/")]
    OpDiv,

    #[token("*")]
    OpMul,

    #[token("^")]
    OpPow,

    #[token("%")]
    OpMod,

    #[token("=~")]
    RegexEqual,

    #[token("!~")]
    RegexNotEqual,

    /// Marker for end of stream.
    Eof,
}

impl Token {
    #[inline]
    pub fn is_comparison_op(&self) -> bool {
        use Token::*;
        matches!(
            self,
            OpEqual
                | OpNotEqual
                | OpGreaterThanOrEqual
                | OpGreaterThan
                | OpLessThanOrEqual
                | OpLessThan
        )
    }

    #[inline]
    pub fn is_add_op(&self) -> bool {
        matches!(self, Token::OpPlus | Token::OpMinus)
    }

    #[inline]
    pub fn is_mult_op(&self) -> bool {
        matches!(self, Token::OpMul | Token::OpDiv | Token::OpMod)
    }

    #[inline]
    pub fn is_and_unless_op(&self) -> bool {
        matches!(self, Token::OpAnd | Token::OpUnless)
    }

    #[inline]
    pub fn is_group_modifier(&self) -> bool {
        matches!(self, Token::On | Token::Ignoring)
    }

    #[inline]
    pub fn is_join_modifier(&self) -> bool {
        matches!(self, Token::GroupLeft | Token::GroupRight)
    }

    #[inline]
    pub fn is_aggregate_modifier(&self) -> bool {
        matches!(self, Token::By | Token::Without)
    }

    #[inline]
    pub fn is_label_matcher_op(&self) -> bool {
        use Token::*;
        matches!(self, Equal | OpNotEqual | RegexEqual | RegexNotEqual)
    }

    /// Keywords may be used wherever a label name is expected.
    pub fn is_keyword(&self) -> bool {
        use Token::*;
        matches!(
            self,
            OpAnd
                | Bool
                | By
                | GroupLeft
                | GroupRight
                | Ignoring
                | Offset
                | On
                | OpOr
                | OpUnless
                | Without
        )
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            // keywords
            Self::OpAnd => "and",
            Self::Bool => "bool",
            Self::By => "by",
            Self::GroupLeft => "group_left",
            Self::GroupRight => "group_right",
            Self::Ignoring => "ignoring",
            Self::Offset => "offset",
            Self::On => "on",
            Self::OpOr => "or",
            Self::OpUnless => "unless",
            Self::Without => "without",

            Self::Duration => "<duration>",
            Self::Number => "<number>",
            Self::Identifier => "<identifier>",
            Self::StringLiteral => "<string literal>",

            // symbols
            Self::At => "@",
            Self::LeftBrace => "{",
            Self::RightBrace => "}",
            Self::LeftBracket => "[",
            Self::RightBracket => "]",
            Self::Comma => ",",
            Self::LeftParen => "(",
            Self::RightParen => ")",
            Self::Equal => "=",

            // operators
            Self::OpEqual => "==",
            Self::OpNotEqual => "!=",
            Self::OpLessThan => "<",
            Self::OpLessThanOrEqual => "<=",
            Self::OpGreaterThan => ">",
            Self::OpGreaterThanOrEqual => ">=",
            Self::OpPlus => "+",
            Self::OpMinus => "-",
            Self::OpDiv => "/",
            Self::OpMul => "*",
            Self::OpPow => "^",
            Self::OpMod => "%",
            Self::RegexEqual => "=~",
            Self::RegexNotEqual => "!~",

            Self::Eof => "<eof>",
        })
    }
}
