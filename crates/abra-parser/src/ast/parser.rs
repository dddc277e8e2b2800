//! Parser infrastructure for Abra.
//!
//! Provides the main [`Parser`] struct with token navigation, error
//! recording and statement-boundary recovery.

use crate::ast::{ParseError, ParseErrorKind, ParseErrors};
use crate::lexer::{tokenize, Token, TokenKind};
use abra_core::Span;
use bumpalo::Bump;

/// How deeply expressions, blocks and types may nest before parsing fails
/// with [`ParseErrorKind::NestingTooDeep`]. Later stages recurse over the
/// tree, so this also bounds their stack use.
pub const MAX_NESTING_DEPTH: u32 = 64;

/// The main parser for Abra source code.
///
/// The parser tokenizes eagerly into a buffer (comments dropped) so it can
/// look ahead arbitrarily, which lambda and type-argument detection need.
///
/// The `'ast` lifetime refers to the arena where AST nodes and token
/// lexemes are allocated.
pub struct Parser<'ast> {
    /// Buffered tokens, always ending in EOF
    pub(super) buffer: Vec<Token<'ast>>,
    /// Current position in the buffer
    pub(super) position: usize,
    /// Accumulated parse errors
    pub(super) errors: ParseErrors,
    /// Whether we're in panic mode (skipping to synchronization point)
    pub(super) panic_mode: bool,
    /// A fatal error stopped recovery
    pub(super) fatal: bool,
    /// Open `(`/`[`/`${` regions in the current block; line breaks do not
    /// end expressions inside them
    pub(super) nesting: u32,
    /// Syntactic depth of the node being parsed
    depth: u32,
    /// The lexer error that truncated the token stream, reported last
    lex_error: Option<ParseError>,
    /// Arena allocator for AST nodes
    pub(super) arena: &'ast Bump,
}

impl<'ast> Parser<'ast> {
    /// Create a new parser for the given source code.
    ///
    /// A lexer error truncates the buffer at the failing token; the error is
    /// reported after any grammar errors found before it.
    pub fn new(source: &str, arena: &'ast Bump) -> Self {
        let mut lexer = tokenize(source, arena);
        let mut buffer = Vec::with_capacity(source.len() / 4 + 1);
        let mut lex_error = None;

        loop {
            match lexer.next_token() {
                Ok(token) if token.kind == TokenKind::Comment => continue,
                Ok(token) => {
                    let is_eof = token.kind == TokenKind::Eof;
                    buffer.push(token);
                    if is_eof {
                        break;
                    }
                }
                Err(error) => {
                    lex_error = Some(ParseError::from(error));
                    buffer.push(lexer.next_token().unwrap_or_else(|_| {
                        Token::new(TokenKind::Eof, "", Span::default(), false)
                    }));
                    break;
                }
            }
        }

        Self {
            buffer,
            position: 0,
            errors: ParseErrors::new(),
            panic_mode: false,
            fatal: false,
            nesting: 0,
            depth: 0,
            lex_error,
            arena,
        }
    }

    /// Check if there are any errors.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty() || self.lex_error.is_some()
    }

    /// Take the errors, leaving an empty error collection.
    pub fn take_errors(&mut self) -> ParseErrors {
        let mut errors = std::mem::take(&mut self.errors);
        if let Some(lex_error) = self.lex_error.take() {
            errors.push(lex_error);
        }
        errors
    }

    // ========================================================================
    // Token Navigation
    // ========================================================================

    /// Peek at the current token without consuming it.
    pub fn peek(&self) -> &Token<'ast> {
        self.peek_nth(0)
    }

    /// Peek ahead n tokens without consuming; past the end this is EOF.
    pub fn peek_nth(&self, n: usize) -> &Token<'ast> {
        let last = self.buffer.len() - 1;
        &self.buffer[(self.position + n).min(last)]
    }

    /// The most recently consumed token.
    pub fn previous(&self) -> &Token<'ast> {
        &self.buffer[self.position.saturating_sub(1)]
    }

    /// Get the current token and advance to the next.
    pub fn advance(&mut self) -> Token<'ast> {
        let token = *self.peek();
        if token.kind != TokenKind::Eof {
            self.position += 1;
        }
        token
    }

    /// Check if the current token matches the given kind.
    pub fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    /// Check if the current token is EOF.
    pub fn is_eof(&self) -> bool {
        self.check(TokenKind::Eof)
    }

    /// If the current token matches the given kind, consume it and return Some.
    pub fn eat(&mut self, kind: TokenKind) -> Option<Token<'ast>> {
        if self.check(kind) {
            Some(self.advance())
        } else {
            None
        }
    }

    /// Expect the current token to be of the given kind.
    pub fn expect(&mut self, kind: TokenKind) -> Result<Token<'ast>, ParseError> {
        if self.check(kind) {
            return Ok(self.advance());
        }
        let token = *self.peek();
        if kind.is_close_delimiter() {
            return Err(self.unclosed(kind, token));
        }
        if token.kind == TokenKind::Eof {
            return Err(ParseError::new(
                ParseErrorKind::UnexpectedEof,
                token.span,
                format!("expected {kind}, found end of file"),
            ));
        }
        Err(ParseError::expected_token(
            token.span,
            kind.description(),
            token.kind.description(),
        ))
    }

    /// Expect an identifier and return its text and span.
    pub fn expect_ident(&mut self) -> Result<Token<'ast>, ParseError> {
        if self.check(TokenKind::Identifier) {
            return Ok(self.advance());
        }
        let token = *self.peek();
        let kind = if token.kind == TokenKind::Eof {
            ParseErrorKind::UnexpectedEof
        } else {
            ParseErrorKind::ExpectedIdentifier
        };
        Err(ParseError::new(
            kind,
            token.span,
            format!("expected identifier, found {}", token.kind),
        ))
    }

    /// Classify a missing closing delimiter.
    ///
    /// Reaching EOF or a different closing delimiter means the brackets are
    /// unbalanced, which is fatal; anything else is an ordinary mistake.
    fn unclosed(&self, expected: TokenKind, found: Token<'ast>) -> ParseError {
        let kind = if found.kind == TokenKind::Eof {
            ParseErrorKind::UnexpectedEof
        } else if found.kind.is_close_delimiter() {
            ParseErrorKind::MismatchedDelimiter
        } else {
            ParseErrorKind::ExpectedToken
        };
        ParseError::new(
            kind,
            found.span,
            format!("expected {expected}, found {}", found.kind),
        )
    }

    /// Span from `start` to the end of the most recently consumed token.
    pub(super) fn span_from(&self, start: Span) -> Span {
        start.merge(self.previous().span)
    }

    /// Run `f` with line breaks ignored, as inside brackets.
    pub(super) fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        self.nesting += 1;
        let result = f(self);
        self.nesting -= 1;
        result
    }

    /// Count one more level of nesting at `span`.
    pub(super) fn descend(&mut self, span: Span) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            return Err(ParseError::new(
                ParseErrorKind::NestingTooDeep,
                span,
                format!("nesting exceeds the limit of {MAX_NESTING_DEPTH} levels"),
            ));
        }
        Ok(())
    }

    /// Run `f` one level deeper; levels `f` adds are released when it returns.
    pub(super) fn deeper<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        let entered = self.depth;
        let span = self.peek().span;
        let result = self.descend(span).and_then(|()| f(self));
        self.depth = entered;
        result
    }

    /// Run `f` with line breaks significant again, as inside a block.
    pub(super) fn unnested<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        let saved = std::mem::replace(&mut self.nesting, 0);
        let result = f(self);
        self.nesting = saved;
        result
    }

    // ========================================================================
    // Error Handling
    // ========================================================================

    /// Record a parse error.
    ///
    /// Errors after a fatal error, and errors at the end of a stream that a
    /// lexer error truncated, are consequences of that error and are dropped.
    pub fn record(&mut self, error: ParseError) {
        self.panic_mode = true;
        if self.fatal {
            return;
        }
        if error.kind.is_fatal() {
            self.fatal = true;
        }
        if self.lex_error.is_some() && self.is_eof() {
            return;
        }
        log::trace!("parse error: {error}");
        self.errors.push(error);
    }

    /// Synchronize after an error by skipping to the next statement boundary.
    ///
    /// Boundaries are a token on a new line, a `;` (consumed), a keyword that
    /// starts a declaration or loop, and the `}` closing the enclosing block
    /// (not consumed). Bracketed groups are skipped as a whole.
    pub fn synchronize(&mut self) {
        self.panic_mode = false;

        // Always advance at least once so the caller cannot fail on the same
        // token forever.
        let start_pos = self.position;
        let mut depth = 0usize;

        while !self.is_eof() {
            let token = *self.peek();

            if depth == 0 && token.kind == TokenKind::RightBrace {
                return;
            }
            if depth == 0 && self.position > start_pos {
                let starts_statement = matches!(
                    token.kind,
                    TokenKind::Func
                        | TokenKind::Val
                        | TokenKind::Var
                        | TokenKind::Type
                        | TokenKind::Enum
                        | TokenKind::Import
                        | TokenKind::Export
                        | TokenKind::While
                        | TokenKind::For
                );
                if token.newline_before || starts_statement {
                    return;
                }
            }

            match token.kind {
                kind if kind.is_open_delimiter() => depth += 1,
                kind if kind.is_close_delimiter() => depth = depth.saturating_sub(1),
                TokenKind::Semicolon if depth == 0 => {
                    self.advance();
                    return;
                }
                _ => {}
            }
            self.advance();
        }
    }

    /// Require the end of a statement: `;`, a line break, `}` or EOF.
    pub(super) fn expect_terminator(&mut self) -> Result<(), ParseError> {
        if self.eat(TokenKind::Semicolon).is_some() {
            while self.eat(TokenKind::Semicolon).is_some() {}
            return Ok(());
        }
        let token = *self.peek();
        if token.newline_before || matches!(token.kind, TokenKind::RightBrace | TokenKind::Eof) {
            return Ok(());
        }
        Err(ParseError::new(
            ParseErrorKind::MissingTerminator,
            token.span,
            format!("expected a line break or ';' before {}", token.kind),
        ))
    }

    // ========================================================================
    // Lookahead Helpers
    // ========================================================================

    /// Whether a `(` at the current position opens a lambda parameter list,
    /// i.e. its matching `)` is followed by `=>`.
    pub(super) fn is_lambda_start(&self) -> bool {
        let mut depth = 0usize;
        let mut index = self.position;
        while let Some(token) = self.buffer.get(index) {
            match token.kind {
                TokenKind::LeftParen | TokenKind::LeftBracket | TokenKind::LeftBrace => depth += 1,
                TokenKind::RightParen | TokenKind::RightBracket | TokenKind::RightBrace => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return self
                            .buffer
                            .get(index + 1)
                            .is_some_and(|next| next.kind == TokenKind::Arrow);
                    }
                }
                TokenKind::Eof => return false,
                _ => {}
            }
            index += 1;
        }
        false
    }
}
