//! Lexical analysis: source text to tokens.

mod cursor;
#[allow(clippy::module_inception)]
mod lexer;
mod token;

pub use lexer::{tokenize, Lexer};
pub use token::{lookup_keyword, Token, TokenKind};
