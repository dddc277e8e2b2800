//! Abra Parser crate.
//!
//! This crate provides the lexer and parser for Abra source code.
//! It includes:
//! - Lexical analysis (tokenization), including string interpolation
//! - Abstract Syntax Tree (AST) definitions
//! - Parser for transforming tokens into AST, with statement-level recovery
//!
//! # Example
//!
//! ```
//! use abra_parser::Parser;
//! use bumpalo::Bump;
//!
//! let arena = Bump::new();
//! let source = r#"
//!     type Person {
//!         name: String
//!         func greet(self): String = "Hello, " + self.name
//!     }
//! "#;
//!
//! match Parser::parse(source, &arena) {
//!     Ok(script) => println!("Parsed successfully: {} items", script.items().len()),
//!     Err(errors) => eprintln!("Parse errors: {}", errors),
//! }
//! ```

// Lexer module
pub mod lexer;

// AST module
pub mod ast;

// Re-export commonly used types at crate root
pub use abra_core::Span;
pub use ast::{Parser, Script};
pub use lexer::{Lexer, Token, TokenKind};
