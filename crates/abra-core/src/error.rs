//! Error types for every stage of the Abra toolchain.
//!
//! ## Error Hierarchy
//!
//! ```text
//! AbraError (top-level wrapper)
//! ├── LexError        - tokenization errors
//! ├── ParseErrors     - ordered grammar errors (ParseError with ParseErrorKind)
//! ├── TypecheckError  - static semantic errors
//! ├── CompileError    - bytecode generation and linking failures
//! └── RuntimeError    - faults raised while the VM executes
//! ```
//!
//! Lex, parse and typecheck errors carry a [`Span`] so the host can point at
//! the offending source. Compile errors signal broken invariants and runtime
//! errors carry only a message.

use thiserror::Error;

use crate::Span;

// ============================================================================
// Lexer Errors
// ============================================================================

/// Errors that occur during tokenization.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LexError {
    /// A character that cannot start any token.
    #[error("unexpected character '{ch}' at {span}")]
    UnexpectedChar { ch: char, span: Span },

    /// A string literal reached end of input without a closing quote.
    #[error("unterminated string at {span}")]
    UnterminatedString { span: Span },

    /// A block comment reached end of input without `*/`.
    #[error("unterminated comment at {span}")]
    UnterminatedComment { span: Span },

    /// A backslash followed by a character that is not a known escape.
    #[error("invalid escape sequence '\\{ch}' at {span}")]
    InvalidEscape { ch: char, span: Span },

    /// A `\u` escape not followed by exactly four hex digits.
    #[error("invalid unicode escape at {span}")]
    InvalidUnicodeEscape { span: Span },

    /// A numeric literal that does not fit its type.
    #[error("invalid number at {span}: {detail}")]
    InvalidNumber { span: Span, detail: String },
}

impl LexError {
    /// Get the span where this error occurred.
    pub fn span(&self) -> Span {
        match self {
            LexError::UnexpectedChar { span, .. } => *span,
            LexError::UnterminatedString { span } => *span,
            LexError::UnterminatedComment { span } => *span,
            LexError::InvalidEscape { span, .. } => *span,
            LexError::InvalidUnicodeEscape { span } => *span,
            LexError::InvalidNumber { span, .. } => *span,
        }
    }
}

// ============================================================================
// Parse Errors
// ============================================================================

/// Categories of parse errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParseErrorKind {
    /// A specific token was expected but not found.
    ExpectedToken,
    /// An unexpected token was encountered.
    UnexpectedToken,
    /// Input ended inside a construct.
    UnexpectedEof,
    /// An expression was expected.
    ExpectedExpression,
    /// A type was expected.
    ExpectedType,
    /// An identifier was expected.
    ExpectedIdentifier,
    /// A `{` block was expected.
    ExpectedBlock,
    /// A statement did not end at a newline, `;` or `}`.
    MissingTerminator,
    /// The left side of an assignment is not assignable.
    InvalidAssignmentTarget,
    /// A declaration is malformed (misplaced `self`, stray modifier, ...).
    InvalidDeclaration,
    /// A closing delimiter does not match the opening one.
    MismatchedDelimiter,
    /// A literal could not be converted to a value.
    InvalidLiteral,
    /// The lexer rejected the input.
    Lexical,
    /// Expressions, blocks or types nest past the parser's depth limit.
    NestingTooDeep,
}

impl ParseErrorKind {
    /// Returns a human-readable name for this error kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ParseErrorKind::ExpectedToken => "expected token",
            ParseErrorKind::UnexpectedToken => "unexpected token",
            ParseErrorKind::UnexpectedEof => "unexpected end of file",
            ParseErrorKind::ExpectedExpression => "expected expression",
            ParseErrorKind::ExpectedType => "expected type",
            ParseErrorKind::ExpectedIdentifier => "expected identifier",
            ParseErrorKind::ExpectedBlock => "expected block",
            ParseErrorKind::MissingTerminator => "missing statement terminator",
            ParseErrorKind::InvalidAssignmentTarget => "invalid assignment target",
            ParseErrorKind::InvalidDeclaration => "invalid declaration",
            ParseErrorKind::MismatchedDelimiter => "mismatched delimiter",
            ParseErrorKind::InvalidLiteral => "invalid literal",
            ParseErrorKind::Lexical => "lexical error",
            ParseErrorKind::NestingTooDeep => "nesting too deep",
        }
    }

    /// Structural errors after which recovery would only produce noise.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ParseErrorKind::UnexpectedEof
                | ParseErrorKind::MismatchedDelimiter
                | ParseErrorKind::Lexical
                | ParseErrorKind::NestingTooDeep
        )
    }
}

impl std::fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A parse error with location and context.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind} at {span}: {message}")]
pub struct ParseError {
    /// The category of this error.
    pub kind: ParseErrorKind,
    /// The source location where the error occurred.
    pub span: Span,
    /// A detailed error message.
    pub message: String,
}

impl ParseError {
    /// Create a new parse error.
    pub fn new(kind: ParseErrorKind, span: Span, message: impl Into<String>) -> Self {
        Self {
            kind,
            span,
            message: message.into(),
        }
    }

    /// Create an "expected token" error.
    pub fn expected_token(span: Span, expected: &str, found: &str) -> Self {
        Self::new(
            ParseErrorKind::ExpectedToken,
            span,
            format!("expected {expected}, found {found}"),
        )
    }

    /// Create an "unexpected EOF" error.
    pub fn unexpected_eof(span: Span) -> Self {
        Self::new(ParseErrorKind::UnexpectedEof, span, "unexpected end of file")
    }

    /// Create an "expected expression" error.
    pub fn expected_expression(span: Span, found: &str) -> Self {
        Self::new(
            ParseErrorKind::ExpectedExpression,
            span,
            format!("expected expression, found {found}"),
        )
    }

    /// Create an "expected type" error.
    pub fn expected_type(span: Span, found: &str) -> Self {
        Self::new(
            ParseErrorKind::ExpectedType,
            span,
            format!("expected type, found {found}"),
        )
    }

    /// Format the error with the offending source line and a caret marker.
    pub fn display_with_source(&self, source: &str) -> String {
        render_with_source(&self.kind.to_string(), &self.message, self.span, source)
    }
}

impl From<LexError> for ParseError {
    fn from(error: LexError) -> Self {
        ParseError::new(ParseErrorKind::Lexical, error.span(), error.to_string())
    }
}

/// A collection of parse errors in source order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParseErrors {
    errors: Vec<ParseError>,
}

impl ParseErrors {
    /// Create a new empty error collection.
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    /// Add an error to the collection.
    pub fn push(&mut self, error: ParseError) {
        self.errors.push(error);
    }

    /// Check if there are any errors.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Get the number of errors.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// The first error reported, if any.
    pub fn first(&self) -> Option<&ParseError> {
        self.errors.first()
    }

    /// Iterate over the errors.
    pub fn iter(&self) -> impl Iterator<Item = &ParseError> {
        self.errors.iter()
    }

    /// Convert to a Vec of errors.
    pub fn into_vec(self) -> Vec<ParseError> {
        self.errors
    }
}

impl IntoIterator for ParseErrors {
    type Item = ParseError;
    type IntoIter = std::vec::IntoIter<ParseError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl<'a> IntoIterator for &'a ParseErrors {
    type Item = &'a ParseError;
    type IntoIter = std::slice::Iter<'a, ParseError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

impl From<ParseError> for ParseErrors {
    fn from(error: ParseError) -> Self {
        Self {
            errors: vec![error],
        }
    }
}

impl std::fmt::Display for ParseErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseErrors {}

// ============================================================================
// Typecheck Errors
// ============================================================================

/// Categories of static semantic errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypecheckErrorKind {
    /// A value's type does not match what its context requires.
    TypeMismatch,
    /// A name that is not in scope.
    UnknownIdentifier,
    /// A type name that is not declared.
    UnknownType,
    /// A field or method that the receiver type does not have.
    UnknownMember,
    /// Assignment to a `val`, parameter, function or type.
    ImmutableAssignment,
    /// A function is referenced before its inferred return type is known.
    MissingReturnType,
    /// A required parameter follows a parameter with a default.
    InvalidParameterOrder,
    /// Wrong number of arguments.
    ArgumentCount,
    /// Named and positional arguments mixed in one call.
    MixedArguments,
    /// A named argument that matches no parameter, or one given twice.
    InvalidArgument,
    /// A call on something that is not a function.
    NotCallable,
    /// A type or builtin used where a value is required.
    NotAValue,
    /// A name declared twice in the same scope.
    DuplicateDeclaration,
    /// A non-unit expression statement without an explicit discard.
    UnusedValue,
    /// An operator applied to unsupported operand types.
    InvalidOperator,
    /// `?:` or `?.` applied to a non-Option value.
    NotOptional,
    /// `.` used on an Option value.
    OptionalAccess,
    /// A type that cannot be inferred from context.
    CannotInfer,
    /// `break`/`continue` outside a loop.
    InvalidLoopControl,
    /// A declaration in a position where it is not allowed.
    InvalidDeclaration,
    /// An imported name the target module does not export.
    UnresolvedImport,
    /// The resolver has no module with the requested name.
    ModuleNotFound,
    /// Modules import each other in a cycle.
    CyclicImport,
    /// An expression nests past the checker's depth limit.
    NestingTooDeep,
}

/// A static semantic error with the range of the offending sub-expression.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} at {span}")]
pub struct TypecheckError {
    /// The category of this error.
    pub kind: TypecheckErrorKind,
    /// The offending source range.
    pub span: Span,
    /// A detailed error message.
    pub message: String,
    /// The module the error occurred in, when it is not the entry module.
    pub module: Option<String>,
}

impl TypecheckError {
    /// Create a new typecheck error in the current module.
    pub fn new(kind: TypecheckErrorKind, span: Span, message: impl Into<String>) -> Self {
        Self {
            kind,
            span,
            message: message.into(),
            module: None,
        }
    }

    /// Create a type-mismatch error.
    pub fn mismatch(span: Span, expected: impl std::fmt::Display, found: impl std::fmt::Display) -> Self {
        Self::new(
            TypecheckErrorKind::TypeMismatch,
            span,
            format!("Type mismatch: expected {expected}, found {found}"),
        )
    }

    /// Attribute this error to a named module.
    pub fn in_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    /// Format the error with the offending source line and a caret marker.
    pub fn display_with_source(&self, source: &str) -> String {
        render_with_source("type error", &self.message, self.span, source)
    }
}

// ============================================================================
// Compile Errors
// ============================================================================

/// Failures while emitting or linking bytecode.
///
/// These indicate an internal inconsistency or an exceeded limit; a program
/// that typechecks is expected to compile.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    /// A cross-module reference that no module exports.
    #[error("unresolved symbol '{symbol}' in module '{module}'")]
    UnresolvedSymbol { module: String, symbol: String },

    /// The constant pool of a module is full.
    #[error("too many constants in module '{module}'")]
    TooManyConstants { module: String },

    /// A function needs more local slots than an operand can address.
    #[error("too many locals in function '{function}'")]
    TooManyLocals { function: String },

    /// A jump distance does not fit its operand.
    #[error("jump offset {offset} out of range")]
    JumpTooFar { offset: usize },

    /// A call passes more arguments than an operand can encode.
    #[error("too many arguments in call ({count})")]
    TooManyArguments { count: usize },

    /// Anything else that should be impossible after typechecking.
    #[error("internal compiler error: {0}")]
    Internal(String),
}

// ============================================================================
// Runtime Errors
// ============================================================================

/// Errors raised while the VM executes a program.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    /// Integer division or modulo by zero.
    #[error("division by zero")]
    DivisionByZero,

    /// The frame stack exceeded its configured depth.
    #[error("stack overflow (call depth exceeded {depth})")]
    StackOverflow { depth: usize },

    /// An internal invariant was violated by the bytecode.
    #[error("trap: {message}")]
    Trap { message: String },

    /// The VM already halted or faulted and cannot run again.
    #[error("the virtual machine cannot be reused after it has stopped")]
    VmNotReusable,
}

impl RuntimeError {
    /// Create a trap error.
    pub fn trap(message: impl Into<String>) -> Self {
        RuntimeError::Trap {
            message: message.into(),
        }
    }
}

// ============================================================================
// Unified Error Type
// ============================================================================

/// The unified error type for the whole pipeline.
///
/// Each variant uses `#[from]` so stage functions compose with `?`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AbraError {
    /// A lexer error.
    #[error(transparent)]
    Lex(#[from] LexError),

    /// One or more parse errors.
    #[error(transparent)]
    Parse(#[from] ParseErrors),

    /// A typecheck error.
    #[error(transparent)]
    Typecheck(#[from] TypecheckError),

    /// A compile or link error.
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// A runtime error.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl AbraError {
    /// The source range of the error, when the stage provides one.
    pub fn span(&self) -> Option<Span> {
        match self {
            AbraError::Lex(e) => Some(e.span()),
            AbraError::Parse(e) => e.first().map(|e| e.span),
            AbraError::Typecheck(e) => Some(e.span),
            AbraError::Compile(_) | AbraError::Runtime(_) => None,
        }
    }

    /// A message suitable for showing to a user, without the position suffix.
    pub fn message(&self) -> String {
        match self {
            AbraError::Parse(e) => e
                .first()
                .map(|e| e.message.clone())
                .unwrap_or_else(|| e.to_string()),
            AbraError::Typecheck(e) => match &e.module {
                Some(module) => format!("{} (in module '{module}')", e.message),
                None => e.message.clone(),
            },
            other => other.to_string(),
        }
    }

    /// Check if this is a lexer error.
    pub fn is_lex(&self) -> bool {
        matches!(self, AbraError::Lex(_))
    }

    /// Check if this is a parse error.
    pub fn is_parse(&self) -> bool {
        matches!(self, AbraError::Parse(_))
    }

    /// Check if this is a typecheck error.
    pub fn is_typecheck(&self) -> bool {
        matches!(self, AbraError::Typecheck(_))
    }

    /// Check if this is a compile error.
    pub fn is_compile(&self) -> bool {
        matches!(self, AbraError::Compile(_))
    }

    /// Check if this is a runtime error.
    pub fn is_runtime(&self) -> bool {
        matches!(self, AbraError::Runtime(_))
    }
}

fn render_with_source(header: &str, message: &str, span: Span, source: &str) -> String {
    let mut output = format!("Error at {}:{}: {}\n", span.line, span.col, header);
    if !message.is_empty() {
        output.push_str(&format!("  {message}\n"));
    }

    let Some(line_text) = source.lines().nth(span.line.saturating_sub(1) as usize) else {
        return output;
    };
    output.push_str("  |\n");
    output.push_str(&format!("{:>3} | {}\n", span.line, line_text));

    let indent = " ".repeat(span.col.saturating_sub(1) as usize);
    let width = if span.end_line == span.line {
        span.end_col.saturating_sub(span.col).max(1)
    } else {
        (line_text.len() as u32 + 1).saturating_sub(span.col).max(1)
    };
    let pointer = "^".to_string() + &"~".repeat(width as usize - 1);
    output.push_str(&format!("  | {indent}{pointer}\n"));
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lex_error_span() {
        let err = LexError::InvalidEscape {
            ch: 'q',
            span: Span::new(2, 4, 2),
        };
        assert_eq!(err.span(), Span::new(2, 4, 2));
        assert_eq!(err.to_string(), "invalid escape sequence '\\q' at 2:4");
    }

    #[test]
    fn lex_error_converts_to_fatal_parse_error() {
        let err: ParseError = LexError::UnexpectedChar {
            ch: '#',
            span: Span::new(1, 1, 1),
        }
        .into();
        assert_eq!(err.kind, ParseErrorKind::Lexical);
        assert!(err.kind.is_fatal());
    }

    #[test]
    fn parse_errors_display_in_order() {
        let mut errors = ParseErrors::new();
        errors.push(ParseError::expected_expression(Span::new(1, 3, 1), "')'"));
        errors.push(ParseError::unexpected_eof(Span::point(4, 1)));
        assert_eq!(errors.len(), 2);
        let text = errors.to_string();
        assert!(text.starts_with("expected expression at 1:3"));
        assert!(text.ends_with("unexpected end of file at 4:1: unexpected end of file"));
    }

    #[test]
    fn display_with_source_marks_range() {
        let err = TypecheckError::new(
            TypecheckErrorKind::ImmutableAssignment,
            Span::new(2, 1, 5),
            "Cannot assign to 'a'",
        );
        let rendered = err.display_with_source("val a = 1\na = 2");
        assert!(rendered.contains("  2 | a = 2"));
        assert!(rendered.contains("^~~~~"));
    }

    #[test]
    fn abra_error_message_and_span() {
        let err: AbraError = TypecheckError::mismatch(Span::new(1, 9, 3), "Int", "String").into();
        assert!(err.is_typecheck());
        assert_eq!(err.span(), Some(Span::new(1, 9, 3)));
        assert_eq!(err.message(), "Type mismatch: expected Int, found String");

        let runtime: AbraError = RuntimeError::DivisionByZero.into();
        assert!(runtime.is_runtime());
        assert_eq!(runtime.span(), None);
        assert_eq!(runtime.message(), "division by zero");
    }

    #[test]
    fn module_attribution() {
        let err = TypecheckError::new(
            TypecheckErrorKind::UnknownIdentifier,
            Span::new(1, 1, 1),
            "Unknown identifier 'x'",
        )
        .in_module("./util");
        let wrapped: AbraError = err.into();
        assert_eq!(wrapped.message(), "Unknown identifier 'x' (in module './util')");
    }
}
