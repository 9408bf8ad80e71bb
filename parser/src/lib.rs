#![forbid(unsafe_code)]
extern crate enquote;
extern crate logos;
extern crate serde;
extern crate strum_macros;
extern crate thiserror;

pub mod parser;
pub mod tree;

pub use parser::{parse, ParseError, ParseResult};

pub mod prelude {
    pub use crate::parser::tokens::Token;
    pub use crate::parser::*;
    pub use crate::tree::*;
}
