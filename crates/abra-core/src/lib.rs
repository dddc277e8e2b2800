//! Shared building blocks for the Abra toolchain.
//!
//! - [`Span`]: source ranges for diagnostics
//! - [`error`]: the error taxonomy of every stage
//! - [`types`]: the static type model

pub mod error;
pub mod span;
pub mod types;

pub use error::{
    AbraError, CompileError, LexError, ParseError, ParseErrorKind, ParseErrors, RuntimeError,
    TypecheckError, TypecheckErrorKind,
};
pub use span::Span;
pub use types::{FunctionType, NamedType, ParamType, Type, TypeId};
