//! Abstract Syntax Tree (AST) for Abra.
//!
//! This module provides:
//! - AST node definitions for all Abra constructs
//! - Parser for transforming tokens into AST
//! - Error types and reporting
//!
//! # Example
//!
//! ```
//! use abra_parser::Parser;
//! use bumpalo::Bump;
//!
//! let arena = Bump::new();
//! let source = r#"
//!     func fib(n: Int): Int = if n < 2 n else fib(n - 1) + fib(n - 2)
//!     println(fib(10))
//! "#;
//!
//! match Parser::parse(source, &arena) {
//!     Ok(script) => println!("Parsed successfully: {} items", script.items().len()),
//!     Err(errors) => eprintln!("Parse errors: {}", errors),
//! }
//! ```

// Core types
pub mod node;
pub mod ops;

mod parser;
mod type_parser;
pub mod types;

pub mod expr;
mod expr_parser;

pub mod stmt;
mod stmt_parser;

// Re-export error types from core
pub use abra_core::{ParseError, ParseErrorKind, ParseErrors};

pub use expr::*;
pub use node::*;
pub use ops::*;
pub use parser::{MAX_NESTING_DEPTH, Parser};
pub use stmt::*;
pub use types::*;

use abra_core::Span;
use bumpalo::Bump;
use crate::lexer::TokenKind;

/// A parsed Abra module.
///
/// The script borrows from an arena allocator. All AST nodes are allocated
/// in the arena and remain valid for the lifetime of the arena.
#[derive(Debug)]
pub struct Script<'ast> {
    items: &'ast [Stmt<'ast>],
    span: Span,
}

impl<'ast> Script<'ast> {
    /// Create a new script from parsed items.
    pub(crate) fn new(items: &'ast [Stmt<'ast>], span: Span) -> Self {
        Self { items, span }
    }

    /// Get the top-level items in this script.
    pub fn items(&self) -> &'ast [Stmt<'ast>] {
        self.items
    }

    /// Get the source location span of this script.
    pub fn span(&self) -> Span {
        self.span
    }
}

impl<'ast> Parser<'ast> {
    /// Parse a complete module.
    ///
    /// Returns every error found, in source order; recovery continues at the
    /// next statement after an ordinary error and stops at a fatal one.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn parse(source: &str, arena: &'ast Bump) -> Result<Script<'ast>, ParseErrors> {
        let (script, errors) = Self::parse_lenient(source, arena);
        if errors.is_empty() {
            log::debug!("parsed {} top-level items", script.items().len());
            Ok(script)
        } else {
            log::debug!("parse failed with {} errors", errors.len());
            Err(errors)
        }
    }

    /// Parse a module, returning the partial AST alongside any errors.
    pub fn parse_lenient(source: &str, arena: &'ast Bump) -> (Script<'ast>, ParseErrors) {
        let mut parser = Parser::new(source, arena);
        let script = parser.parse_script();
        (script, parser.take_errors())
    }

    /// Parse a single expression; used by tests and tooling.
    pub fn expression(source: &str, arena: &'ast Bump) -> Result<&'ast Expr<'ast>, ParseErrors> {
        let mut parser = Parser::new(source, arena);
        let result = parser.parse_expr(0).and_then(|expr| {
            if parser.is_eof() {
                Ok(expr)
            } else {
                let token = *parser.peek();
                Err(ParseError::new(
                    ParseErrorKind::UnexpectedToken,
                    token.span,
                    format!("unexpected {} after expression", token.kind),
                ))
            }
        });
        match result {
            Ok(expr) if !parser.has_errors() => Ok(expr),
            Ok(_) => Err(parser.take_errors()),
            Err(error) => {
                parser.record(error);
                Err(parser.take_errors())
            }
        }
    }

    /// Parse a single type annotation.
    pub fn type_expr(source: &str, arena: &'ast Bump) -> Result<TypeExpr<'ast>, ParseErrors> {
        let mut parser = Parser::new(source, arena);
        let result = parser.parse_type().and_then(|ty| {
            if parser.is_eof() {
                Ok(ty)
            } else {
                Err(ParseError::expected_token(
                    parser.peek().span,
                    "end of type",
                    parser.peek().kind.description(),
                ))
            }
        });
        match result {
            Ok(ty) if !parser.has_errors() => Ok(ty),
            Ok(_) => Err(parser.take_errors()),
            Err(error) => {
                parser.record(error);
                Err(parser.take_errors())
            }
        }
    }

    fn parse_script(&mut self) -> Script<'ast> {
        let start = self.peek().span;
        let mut items = Vec::new();

        while !self.is_eof() && !self.fatal {
            if self.eat(TokenKind::Semicolon).is_some() {
                continue;
            }
            if self.check(TokenKind::RightBrace) {
                let token = self.advance();
                self.record(ParseError::new(
                    ParseErrorKind::MismatchedDelimiter,
                    token.span,
                    "unmatched '}'",
                ));
                continue;
            }

            let result = self
                .parse_statement()
                .and_then(|stmt| self.expect_terminator().map(|()| stmt));
            match result {
                Ok(stmt) => items.push(stmt),
                Err(error) => {
                    self.record(error);
                    self.synchronize();
                }
            }
        }

        let items: &'ast [Stmt<'ast>] = self.arena.alloc_slice_copy(&items);
        Script::new(items, self.span_from(start))
    }
}
