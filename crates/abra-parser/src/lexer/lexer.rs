//! Main lexer implementation for Abra.
//!
//! The [`Lexer`] converts source text into a lazy stream of [`Token`]s,
//! dispatching on the first character of each token.
//!
//! String interpolation is handled with a mode stack: entering `${` pushes an
//! interpolation mode that counts nested braces, and the matching `}` drops
//! the lexer back into the string body. Because modes nest, a string literal
//! inside an interpolation may itself be interpolated.
//!
//! All lexemes are copied into the arena, so the source string may be freed
//! once lexing completes.

use bumpalo::Bump;

use super::cursor::{is_ident_continue, is_ident_start, Cursor};
use super::token::{lookup_keyword, Token, TokenKind};
use abra_core::{LexError, Span};

/// What the lexer is in the middle of, beyond ordinary code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Inside `${ ... }`; counts the unmatched `{` opened within it.
    Interpolation { depth: u32 },
    /// Between an interpolation and the closing quote.
    StringBody,
    /// Right after `$` in a string, before the interpolated identifier.
    InterpolatedIdent,
}

/// Create a lexer over `source` whose lexemes live in `arena`.
///
/// The lexer is lazy and holds no state beyond this one pass; tokenizing the
/// same source again always produces the same sequence.
pub fn tokenize<'src, 'ast>(source: &'src str, arena: &'ast Bump) -> Lexer<'src, 'ast> {
    Lexer::new(source, arena)
}

/// Lexer for Abra source code.
///
/// The `'src` lifetime is the source string being lexed (temporary).
/// The `'ast` lifetime is the arena where token lexemes are allocated (persists).
pub struct Lexer<'src, 'ast> {
    /// Low-level character cursor.
    cursor: Cursor<'src>,
    /// Arena for allocating token lexemes.
    arena: &'ast Bump,
    /// Open string/interpolation contexts, innermost last.
    modes: Vec<Mode>,
    /// A line break was skipped since the last non-comment token.
    pending_newline: bool,
    /// EOF was produced or an error ended the stream.
    finished: bool,
}

impl<'src, 'ast> Lexer<'src, 'ast> {
    /// Create a new lexer for the given source text.
    pub fn new(source: &'src str, arena: &'ast Bump) -> Self {
        Self {
            cursor: Cursor::new(source),
            arena,
            modes: Vec::new(),
            pending_newline: false,
            finished: false,
        }
    }

    /// Consume and return the next token.
    ///
    /// After EOF or an error every further call returns an EOF token.
    pub fn next_token(&mut self) -> Result<Token<'ast>, LexError> {
        if self.finished {
            return Ok(self.make_eof());
        }
        let result = self.scan_token();
        match &result {
            Ok(token) if token.kind == TokenKind::Eof => self.finished = true,
            Ok(token) => log::trace!("token {token:?}"),
            Err(_) => self.finished = true,
        }
        result
    }

    // =========================================
    // Internal: Token scanning
    // =========================================

    fn location(&self) -> (u32, u32, u32) {
        (self.cursor.line(), self.cursor.column(), self.cursor.offset())
    }

    /// Scan the next token from source.
    fn scan_token(&mut self) -> Result<Token<'ast>, LexError> {
        match self.modes.last() {
            Some(Mode::StringBody) => {
                let (line, col, _) = self.location();
                return self.scan_string_segment(false, line, col);
            }
            Some(Mode::InterpolatedIdent) => {
                self.modes.pop();
                self.modes.push(Mode::StringBody);
                let (line, col, offset) = self.location();
                return Ok(self.scan_identifier(line, col, offset));
            }
            _ => {}
        }

        self.skip_whitespace();

        let (start_line, start_col, start_offset) = self.location();
        let Some(first) = self.cursor.peek() else {
            if !self.modes.is_empty() {
                return Err(LexError::UnterminatedString {
                    span: Span::point(start_line, start_col),
                });
            }
            return Ok(self.make_eof());
        };

        match first {
            '/' => self.scan_slash(start_line, start_col, start_offset),
            '"' => self.scan_string_segment(true, start_line, start_col),
            c if c.is_ascii_digit() => Ok(self.scan_number(start_line, start_col, start_offset)),
            c if is_ident_start(c) => Ok(self.scan_identifier(start_line, start_col, start_offset)),
            '}' if self.modes.last() == Some(&Mode::Interpolation { depth: 0 }) => {
                self.cursor.advance();
                self.modes.pop();
                self.modes.push(Mode::StringBody);
                let (line, col, _) = self.location();
                self.scan_string_segment(false, line, col)
            }
            _ => self.scan_operator(start_line, start_col, start_offset),
        }
    }

    /// Skip whitespace and BOM, remembering whether a line ended.
    fn skip_whitespace(&mut self) {
        if self.cursor.check_str("\u{FEFF}") {
            self.cursor.advance_bytes(3);
        }

        while let Some(c) = self.cursor.peek() {
            if !c.is_whitespace() {
                break;
            }
            if c == '\n' {
                self.pending_newline = true;
            }
            self.cursor.advance();
        }
    }

    fn span_from(&self, start_line: u32, start_col: u32) -> Span {
        Span::range(
            (start_line, start_col),
            (self.cursor.line(), self.cursor.column()),
        )
    }

    /// Create an EOF token.
    fn make_eof(&mut self) -> Token<'ast> {
        let span = Span::point(self.cursor.line(), self.cursor.column());
        let newline_before = std::mem::take(&mut self.pending_newline);
        Token::new(TokenKind::Eof, "", span, newline_before)
    }

    /// Create a token from start position to current position.
    /// Copies the source slice into the arena.
    fn make_token(&mut self, kind: TokenKind, start_line: u32, start_col: u32, start_offset: u32) -> Token<'ast> {
        let lexeme = self.arena.alloc_str(self.cursor.slice_from(start_offset));
        self.finish_token(kind, lexeme, start_line, start_col)
    }

    /// Create a token whose lexeme is processed text rather than source.
    fn make_text_token(&mut self, kind: TokenKind, text: &str, start_line: u32, start_col: u32) -> Token<'ast> {
        let lexeme = self.arena.alloc_str(text);
        self.finish_token(kind, lexeme, start_line, start_col)
    }

    fn finish_token(&mut self, kind: TokenKind, lexeme: &'ast str, start_line: u32, start_col: u32) -> Token<'ast> {
        let span = self.span_from(start_line, start_col);
        // Comments are invisible to statement termination.
        let newline_before = if kind == TokenKind::Comment {
            self.pending_newline
        } else {
            std::mem::take(&mut self.pending_newline)
        };
        Token::new(kind, lexeme, span, newline_before)
    }

    // =========================================
    // Scanning: Comments and slash
    // =========================================

    /// Scan a slash, which could be `/`, `//`, `/*`, `/=`.
    fn scan_slash(&mut self, start_line: u32, start_col: u32, start_offset: u32) -> Result<Token<'ast>, LexError> {
        self.cursor.advance(); // consume '/'

        let kind = match self.cursor.peek() {
            Some('/') => {
                self.cursor.eat_while(|c| c != '\n');
                TokenKind::Comment
            }
            Some('*') => {
                self.cursor.advance();
                return self.scan_block_comment(start_line, start_col, start_offset);
            }
            Some('=') => {
                self.cursor.advance();
                TokenKind::SlashEqual
            }
            _ => TokenKind::Slash,
        };
        Ok(self.make_token(kind, start_line, start_col, start_offset))
    }

    /// Scan a block comment `/* ... */`.
    fn scan_block_comment(&mut self, start_line: u32, start_col: u32, start_offset: u32) -> Result<Token<'ast>, LexError> {
        loop {
            match self.cursor.advance() {
                None => {
                    return Err(LexError::UnterminatedComment {
                        span: self.span_from(start_line, start_col),
                    });
                }
                Some('*') if self.cursor.eat('/') => break,
                Some(_) => {}
            }
        }
        let token = self.make_token(TokenKind::Comment, start_line, start_col, start_offset);
        if self.cursor.line() > start_line {
            self.pending_newline = true;
        }
        Ok(token)
    }

    // =========================================
    // Scanning: Strings
    // =========================================

    /// Scan string text up to the closing quote or the next interpolation.
    ///
    /// `opening` is true when the cursor sits on the opening quote; otherwise
    /// the lexer is resuming a string body after an interpolation.
    fn scan_string_segment(&mut self, opening: bool, start_line: u32, start_col: u32) -> Result<Token<'ast>, LexError> {
        if opening {
            self.cursor.advance(); // consume opening quote
        }

        let mut text = String::new();
        loop {
            match self.cursor.peek() {
                None => {
                    return Err(LexError::UnterminatedString {
                        span: self.span_from(start_line, start_col),
                    });
                }
                Some('"') => {
                    self.cursor.advance();
                    let kind = if opening {
                        TokenKind::StringLiteral
                    } else {
                        self.modes.pop();
                        TokenKind::StringEnd
                    };
                    return Ok(self.make_text_token(kind, &text, start_line, start_col));
                }
                Some('\\') => text.push(self.scan_escape()?),
                Some('$') if self.cursor.peek_nth(1) == Some('{') => {
                    self.cursor.advance_bytes(2);
                    let kind = self.enter_interpolation(opening, Mode::Interpolation { depth: 0 });
                    return Ok(self.make_text_token(kind, &text, start_line, start_col));
                }
                Some('$') if self.cursor.peek_nth(1).is_some_and(is_ident_start) => {
                    self.cursor.advance();
                    let kind = self.enter_interpolation(opening, Mode::InterpolatedIdent);
                    return Ok(self.make_text_token(kind, &text, start_line, start_col));
                }
                Some(c) => {
                    self.cursor.advance();
                    text.push(c);
                }
            }
        }
    }

    fn enter_interpolation(&mut self, opening: bool, mode: Mode) -> TokenKind {
        if opening {
            self.modes.push(mode);
            TokenKind::StringStart
        } else {
            self.modes.pop(); // leave the string body
            self.modes.push(mode);
            TokenKind::StringPart
        }
    }

    /// Scan a backslash escape, returning the character it denotes.
    fn scan_escape(&mut self) -> Result<char, LexError> {
        let (line, col) = (self.cursor.line(), self.cursor.column());
        self.cursor.advance(); // consume '\'

        let Some(ch) = self.cursor.advance() else {
            return Err(LexError::UnterminatedString {
                span: Span::point(line, col),
            });
        };
        let escaped = match ch {
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            '\\' => '\\',
            '\'' => '\'',
            '"' => '"',
            '$' => '$',
            'u' => return self.scan_unicode_escape(line, col),
            other => {
                return Err(LexError::InvalidEscape {
                    ch: other,
                    span: self.span_from(line, col),
                });
            }
        };
        Ok(escaped)
    }

    /// Scan the four hex digits of a `\uXXXX` escape.
    fn scan_unicode_escape(&mut self, line: u32, col: u32) -> Result<char, LexError> {
        let mut value = 0u32;
        for _ in 0..4 {
            let Some(digit) = self.cursor.peek().and_then(|c| c.to_digit(16)) else {
                return Err(LexError::InvalidUnicodeEscape {
                    span: self.span_from(line, col),
                });
            };
            self.cursor.advance();
            value = value * 16 + digit;
        }
        char::from_u32(value).ok_or_else(|| LexError::InvalidUnicodeEscape {
            span: self.span_from(line, col),
        })
    }

    // =========================================
    // Scanning: Numbers
    // =========================================

    /// Scan a decimal number (integer or floating-point).
    fn scan_number(&mut self, start_line: u32, start_col: u32, start_offset: u32) -> Token<'ast> {
        self.consume_decimal_digits();

        let mut is_float = false;

        // Fractional part; `1.foo` stays an integer followed by a dot
        if self.cursor.peek() == Some('.') && self.cursor.peek_nth(1).is_some_and(|c| c.is_ascii_digit()) {
            self.cursor.advance();
            self.consume_decimal_digits();
            is_float = true;
        }

        // Exponent part
        if matches!(self.cursor.peek(), Some('e' | 'E')) {
            let digit_at = if matches!(self.cursor.peek_nth(1), Some('+' | '-')) { 2 } else { 1 };
            if self.cursor.peek_nth(digit_at).is_some_and(|c| c.is_ascii_digit()) {
                for _ in 0..digit_at {
                    self.cursor.advance();
                }
                self.consume_decimal_digits();
                is_float = true;
            }
        }

        let kind = if is_float {
            TokenKind::FloatLiteral
        } else {
            TokenKind::IntLiteral
        };
        self.make_token(kind, start_line, start_col, start_offset)
    }

    /// Consume decimal digits (including underscores as separators).
    fn consume_decimal_digits(&mut self) {
        self.cursor.eat_while(|c| c.is_ascii_digit() || c == '_');
    }

    // =========================================
    // Scanning: Identifiers and keywords
    // =========================================

    /// Scan an identifier or keyword.
    fn scan_identifier(&mut self, start_line: u32, start_col: u32, start_offset: u32) -> Token<'ast> {
        self.cursor.eat_while(is_ident_continue);
        let lexeme = self.cursor.slice_from(start_offset);
        let kind = lookup_keyword(lexeme).unwrap_or(TokenKind::Identifier);
        self.make_token(kind, start_line, start_col, start_offset)
    }

    // =========================================
    // Scanning: Operators
    // =========================================

    /// Scan an operator or punctuation token.
    fn scan_operator(&mut self, start_line: u32, start_col: u32, start_offset: u32) -> Result<Token<'ast>, LexError> {
        let Some(c) = self.cursor.advance() else {
            return Ok(self.make_eof());
        };
        let next = self.cursor.peek();

        let kind = match (c, next) {
            ('(', _) => TokenKind::LeftParen,
            (')', _) => TokenKind::RightParen,
            ('[', _) => TokenKind::LeftBracket,
            (']', _) => TokenKind::RightBracket,
            ('{', _) => {
                if let Some(Mode::Interpolation { depth }) = self.modes.last_mut() {
                    *depth += 1;
                }
                TokenKind::LeftBrace
            }
            ('}', _) => {
                if let Some(Mode::Interpolation { depth }) = self.modes.last_mut() {
                    *depth = depth.saturating_sub(1);
                }
                TokenKind::RightBrace
            }
            (',', _) => TokenKind::Comma,
            (':', _) => TokenKind::Colon,
            (';', _) => TokenKind::Semicolon,
            ('.', _) => TokenKind::Dot,

            ('?', Some('.')) => { self.cursor.advance(); TokenKind::QuestionDot }
            ('?', Some(':')) => { self.cursor.advance(); TokenKind::QuestionColon }
            ('?', _) => TokenKind::Question,

            ('+', Some('=')) => { self.cursor.advance(); TokenKind::PlusEqual }
            ('+', _) => TokenKind::Plus,
            ('-', Some('=')) => { self.cursor.advance(); TokenKind::MinusEqual }
            ('-', _) => TokenKind::Minus,
            ('*', Some('=')) => { self.cursor.advance(); TokenKind::StarEqual }
            ('*', _) => TokenKind::Star,
            ('%', _) => TokenKind::Percent,

            ('=', Some('=')) => { self.cursor.advance(); TokenKind::EqualEqual }
            ('=', Some('>')) => { self.cursor.advance(); TokenKind::Arrow }
            ('=', _) => TokenKind::Equal,
            ('!', Some('=')) => { self.cursor.advance(); TokenKind::BangEqual }
            ('!', _) => TokenKind::Bang,
            ('<', Some('=')) => { self.cursor.advance(); TokenKind::LessEqual }
            ('<', _) => TokenKind::Less,
            ('>', Some('=')) => { self.cursor.advance(); TokenKind::GreaterEqual }
            ('>', _) => TokenKind::Greater,

            ('&', Some('&')) => { self.cursor.advance(); TokenKind::AmpAmp }
            ('|', Some('|')) => { self.cursor.advance(); TokenKind::PipePipe }
            ('|', _) => TokenKind::Pipe,

            _ => {
                return Err(LexError::UnexpectedChar {
                    ch: c,
                    span: self.span_from(start_line, start_col),
                });
            }
        };

        Ok(self.make_token(kind, start_line, start_col, start_offset))
    }
}

/// Tokens up to (not including) EOF; an error is yielded once and ends the
/// stream.
impl<'src, 'ast> Iterator for Lexer<'src, 'ast> {
    type Item = Result<Token<'ast>, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.next_token() {
            Ok(token) if token.kind == TokenKind::Eof => None,
            other => Some(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Helper to collect all tokens from source, panicking on errors.
    fn lex(source: &str) -> Vec<(TokenKind, String)> {
        let arena = Bump::new();
        tokenize(source, &arena)
            .map(|t| {
                let t = t.unwrap();
                (t.kind, t.lexeme.to_string())
            })
            .collect()
    }

    /// Helper to get token kinds only.
    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source).into_iter().map(|(k, _)| k).collect()
    }

    fn first_error(source: &str) -> LexError {
        let arena = Bump::new();
        tokenize(source, &arena)
            .find_map(Result::err)
            .expect("expected a lex error")
    }

    // =========================================
    // Basic tokens
    // =========================================

    #[test]
    fn empty_source() {
        let arena = Bump::new();
        let mut lexer = Lexer::new("", &arena);
        assert_eq!(lexer.next_token().unwrap().kind, TokenKind::Eof);
        assert!(lexer.next().is_none());
    }

    #[test]
    fn bom_and_whitespace() {
        assert_eq!(lex("\u{FEFF}  hello \t\r\n"), vec![(TokenKind::Identifier, "hello".to_string())]);
    }

    #[test]
    fn keywords_and_identifiers() {
        assert_eq!(
            kinds("func val var funcs None none self"),
            vec![
                TokenKind::Func,
                TokenKind::Val,
                TokenKind::Var,
                TokenKind::Identifier,
                TokenKind::None,
                TokenKind::Identifier,
                TokenKind::SelfKw,
            ]
        );
    }

    #[test]
    fn numbers() {
        assert_eq!(
            lex("42 1_000 3.14 1e3 2.5e-2 7.length"),
            vec![
                (TokenKind::IntLiteral, "42".to_string()),
                (TokenKind::IntLiteral, "1_000".to_string()),
                (TokenKind::FloatLiteral, "3.14".to_string()),
                (TokenKind::FloatLiteral, "1e3".to_string()),
                (TokenKind::FloatLiteral, "2.5e-2".to_string()),
                (TokenKind::IntLiteral, "7".to_string()),
                (TokenKind::Dot, ".".to_string()),
                (TokenKind::Identifier, "length".to_string()),
            ]
        );
    }

    #[test]
    fn operators() {
        assert_eq!(
            kinds("?. ?: ? => == = != ! <= < >= > && || | += -= *= /= / %"),
            vec![
                TokenKind::QuestionDot,
                TokenKind::QuestionColon,
                TokenKind::Question,
                TokenKind::Arrow,
                TokenKind::EqualEqual,
                TokenKind::Equal,
                TokenKind::BangEqual,
                TokenKind::Bang,
                TokenKind::LessEqual,
                TokenKind::Less,
                TokenKind::GreaterEqual,
                TokenKind::Greater,
                TokenKind::AmpAmp,
                TokenKind::PipePipe,
                TokenKind::Pipe,
                TokenKind::PlusEqual,
                TokenKind::MinusEqual,
                TokenKind::StarEqual,
                TokenKind::SlashEqual,
                TokenKind::Slash,
                TokenKind::Percent,
            ]
        );
    }

    #[test]
    fn comments_are_tokens() {
        assert_eq!(
            kinds("a // line\n/* block */ b"),
            vec![
                TokenKind::Identifier,
                TokenKind::Comment,
                TokenKind::Comment,
                TokenKind::Identifier,
            ]
        );
    }

    #[test]
    fn newline_flag_survives_comments() {
        let arena = Bump::new();
        let tokens: Vec<_> = tokenize("a /* x\n y */ b\nc", &arena).map(Result::unwrap).collect();
        let idents: Vec<_> = tokens.iter().filter(|t| t.kind == TokenKind::Identifier).collect();
        assert!(!idents[0].newline_before);
        assert!(idents[1].newline_before);
        assert!(idents[2].newline_before);
    }

    #[test]
    fn spans_are_ranges() {
        let arena = Bump::new();
        let tokens: Vec<_> = tokenize("val abc\n  = 1", &arena).map(Result::unwrap).collect();
        assert_eq!(tokens[1].span, Span::new(1, 5, 3));
        assert_eq!(tokens[2].span, Span::new(2, 3, 1));
    }

    // =========================================
    // Strings
    // =========================================

    #[test]
    fn plain_string_with_escapes() {
        assert_eq!(
            lex(r#""a\tb\n\"q\" \$5 A""#),
            vec![(TokenKind::StringLiteral, "a\tb\n\"q\" $5 A".to_string())]
        );
    }

    #[test]
    fn identifier_interpolation() {
        assert_eq!(
            lex(r#""Hello, $name!""#),
            vec![
                (TokenKind::StringStart, "Hello, ".to_string()),
                (TokenKind::Identifier, "name".to_string()),
                (TokenKind::StringEnd, "!".to_string()),
            ]
        );
    }

    #[test]
    fn interpolated_identifiers_keep_their_location() {
        let arena = Bump::new();
        let tokens: Vec<_> = tokenize("\"a $bc d\"", &arena).map(Result::unwrap).collect();
        assert_eq!(tokens[0].kind, TokenKind::StringStart);
        assert_eq!(tokens[1].kind, TokenKind::Identifier);
        assert_eq!(tokens[1].span, Span::new(1, 5, 2));
        assert_eq!(tokens[2].kind, TokenKind::StringEnd);
    }

    #[test]
    fn expression_interpolation_with_braces() {
        assert_eq!(
            kinds(r#""a ${ {x} } b $c""#),
            vec![
                TokenKind::StringStart,
                TokenKind::LeftBrace,
                TokenKind::Identifier,
                TokenKind::RightBrace,
                TokenKind::StringPart,
                TokenKind::Identifier,
                TokenKind::StringEnd,
            ]
        );
    }

    #[test]
    fn nested_string_inside_interpolation() {
        assert_eq!(
            lex(r#""x${"in$y"}z""#),
            vec![
                (TokenKind::StringStart, "x".to_string()),
                (TokenKind::StringStart, "in".to_string()),
                (TokenKind::Identifier, "y".to_string()),
                (TokenKind::StringEnd, "".to_string()),
                (TokenKind::StringEnd, "z".to_string()),
            ]
        );
    }

    #[test]
    fn lone_dollar_is_literal() {
        assert_eq!(lex(r#""costs $ 5""#), vec![(TokenKind::StringLiteral, "costs $ 5".to_string())]);
    }

    #[test]
    fn code_resumes_after_string() {
        assert_eq!(
            kinds(r#"println("$a") + 1"#),
            vec![
                TokenKind::Identifier,
                TokenKind::LeftParen,
                TokenKind::StringStart,
                TokenKind::Identifier,
                TokenKind::StringEnd,
                TokenKind::RightParen,
                TokenKind::Plus,
                TokenKind::IntLiteral,
            ]
        );
    }

    // =========================================
    // Errors
    // =========================================

    #[test]
    fn unexpected_character_stops_stream() {
        let arena = Bump::new();
        let results: Vec<_> = tokenize("a # b", &arena).collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert_eq!(
            results[1],
            Err(LexError::UnexpectedChar {
                ch: '#',
                span: Span::new(1, 3, 1)
            })
        );
    }

    #[test]
    fn invalid_escape() {
        assert!(matches!(first_error(r#""\q""#), LexError::InvalidEscape { ch: 'q', .. }));
        assert!(matches!(first_error(r#""\u12G4""#), LexError::InvalidUnicodeEscape { .. }));
    }

    #[test]
    fn unterminated_constructs() {
        assert!(matches!(first_error("\"abc"), LexError::UnterminatedString { .. }));
        assert!(matches!(first_error("\"a ${b"), LexError::UnterminatedString { .. }));
        assert!(matches!(first_error("/* abc"), LexError::UnterminatedComment { .. }));
    }

    #[test]
    fn single_ampersand_is_rejected() {
        assert!(matches!(first_error("a & b"), LexError::UnexpectedChar { ch: '&', .. }));
    }

    #[test]
    fn relexing_is_deterministic() {
        let source = "func f(a: Int) = \"v: ${a + 1}\"";
        assert_eq!(lex(source), lex(source));
    }
}
