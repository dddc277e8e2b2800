//! Token types and definitions for the Abra lexer.

use abra_core::Span;
use std::fmt;

/// A token from the source code.
///
/// The `'ast` lifetime refers to the arena where the lexeme string is allocated.
/// For string tokens the lexeme holds the unescaped text rather than the
/// raw source slice.
#[derive(Clone, Copy, PartialEq)]
pub struct Token<'ast> {
    /// The type of token.
    pub kind: TokenKind,
    /// The text of this token (allocated in arena).
    pub lexeme: &'ast str,
    /// Location in source.
    pub span: Span,
    /// A line break separates this token from the previous one.
    pub newline_before: bool,
}

impl<'ast> Token<'ast> {
    /// Create a new token.
    #[inline]
    pub fn new(kind: TokenKind, lexeme: &'ast str, span: Span, newline_before: bool) -> Self {
        Self {
            kind,
            lexeme,
            span,
            newline_before,
        }
    }
}

impl fmt::Debug for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({:?} @ {:?})", self.kind, self.lexeme, self.span)
    }
}

/// All token types in Abra.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // =========================================
    // Literals
    // =========================================
    /// Integer literal: `42`, `1_000`
    IntLiteral,
    /// Float literal: `3.14`, `1e10`
    FloatLiteral,
    /// String without interpolation: `"hello"`
    StringLiteral,
    /// Text before the first interpolation: `"hello ` in `"hello $name!"`
    StringStart,
    /// Text between two interpolations
    StringPart,
    /// Text after the last interpolation, up to the closing quote
    StringEnd,

    // =========================================
    // Identifiers
    // =========================================
    /// User-defined identifier
    Identifier,

    // =========================================
    // Keywords
    // =========================================
    /// `func`
    Func,
    /// `val`
    Val,
    /// `var`
    Var,
    /// `type`
    Type,
    /// `enum`
    Enum,
    /// `if`
    If,
    /// `else`
    Else,
    /// `while`
    While,
    /// `for`
    For,
    /// `in`
    In,
    /// `break`
    Break,
    /// `continue`
    Continue,
    /// `true`
    True,
    /// `false`
    False,
    /// `None`
    None,
    /// `import`
    Import,
    /// `export`
    Export,
    /// `from`
    From,
    /// `self`
    SelfKw,

    // =========================================
    // Delimiters
    // =========================================
    /// `(`
    LeftParen,
    /// `)`
    RightParen,
    /// `[`
    LeftBracket,
    /// `]`
    RightBracket,
    /// `{`
    LeftBrace,
    /// `}`
    RightBrace,
    /// `,`
    Comma,
    /// `:`
    Colon,
    /// `;`
    Semicolon,

    // =========================================
    // Operators
    // =========================================
    /// `.`
    Dot,
    /// `?.`
    QuestionDot,
    /// `?:`
    QuestionColon,
    /// `?`
    Question,
    /// `=>`
    Arrow,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `%`
    Percent,
    /// `+=`
    PlusEqual,
    /// `-=`
    MinusEqual,
    /// `*=`
    StarEqual,
    /// `/=`
    SlashEqual,
    /// `=`
    Equal,
    /// `==`
    EqualEqual,
    /// `!=`
    BangEqual,
    /// `!`
    Bang,
    /// `<`
    Less,
    /// `<=`
    LessEqual,
    /// `>`
    Greater,
    /// `>=`
    GreaterEqual,
    /// `&&`
    AmpAmp,
    /// `||`
    PipePipe,
    /// `|`
    Pipe,

    // =========================================
    // Trivia
    // =========================================
    /// `// line` or `/* block */` comment
    Comment,
    /// End of input
    Eof,
}

impl TokenKind {
    /// Check if this token is a keyword.
    pub fn is_keyword(self) -> bool {
        matches!(
            self,
            TokenKind::Func
                | TokenKind::Val
                | TokenKind::Var
                | TokenKind::Type
                | TokenKind::Enum
                | TokenKind::If
                | TokenKind::Else
                | TokenKind::While
                | TokenKind::For
                | TokenKind::In
                | TokenKind::Break
                | TokenKind::Continue
                | TokenKind::True
                | TokenKind::False
                | TokenKind::None
                | TokenKind::Import
                | TokenKind::Export
                | TokenKind::From
                | TokenKind::SelfKw
        )
    }

    /// Check if this token starts or continues a string literal.
    pub fn is_string_piece(self) -> bool {
        matches!(
            self,
            TokenKind::StringLiteral | TokenKind::StringStart | TokenKind::StringPart | TokenKind::StringEnd
        )
    }

    /// Check if this token opens a bracketed region.
    pub fn is_open_delimiter(self) -> bool {
        matches!(self, TokenKind::LeftParen | TokenKind::LeftBracket | TokenKind::LeftBrace)
    }

    /// Check if this token closes a bracketed region.
    pub fn is_close_delimiter(self) -> bool {
        matches!(self, TokenKind::RightParen | TokenKind::RightBracket | TokenKind::RightBrace)
    }

    /// The closing delimiter that matches this opening one.
    pub fn matching_close(self) -> Option<TokenKind> {
        match self {
            TokenKind::LeftParen => Some(TokenKind::RightParen),
            TokenKind::LeftBracket => Some(TokenKind::RightBracket),
            TokenKind::LeftBrace => Some(TokenKind::RightBrace),
            _ => None,
        }
    }

    /// Get a human-readable description of this token kind.
    pub fn description(self) -> &'static str {
        match self {
            TokenKind::IntLiteral => "integer literal",
            TokenKind::FloatLiteral => "float literal",
            TokenKind::StringLiteral => "string literal",
            TokenKind::StringStart => "string literal",
            TokenKind::StringPart => "string segment",
            TokenKind::StringEnd => "end of string",
            TokenKind::Identifier => "identifier",
            TokenKind::Func => "'func'",
            TokenKind::Val => "'val'",
            TokenKind::Var => "'var'",
            TokenKind::Type => "'type'",
            TokenKind::Enum => "'enum'",
            TokenKind::If => "'if'",
            TokenKind::Else => "'else'",
            TokenKind::While => "'while'",
            TokenKind::For => "'for'",
            TokenKind::In => "'in'",
            TokenKind::Break => "'break'",
            TokenKind::Continue => "'continue'",
            TokenKind::True => "'true'",
            TokenKind::False => "'false'",
            TokenKind::None => "'None'",
            TokenKind::Import => "'import'",
            TokenKind::Export => "'export'",
            TokenKind::From => "'from'",
            TokenKind::SelfKw => "'self'",
            TokenKind::LeftParen => "'('",
            TokenKind::RightParen => "')'",
            TokenKind::LeftBracket => "'['",
            TokenKind::RightBracket => "']'",
            TokenKind::LeftBrace => "'{'",
            TokenKind::RightBrace => "'}'",
            TokenKind::Comma => "','",
            TokenKind::Colon => "':'",
            TokenKind::Semicolon => "';'",
            TokenKind::Dot => "'.'",
            TokenKind::QuestionDot => "'?.'",
            TokenKind::QuestionColon => "'?:'",
            TokenKind::Question => "'?'",
            TokenKind::Arrow => "'=>'",
            TokenKind::Plus => "'+'",
            TokenKind::Minus => "'-'",
            TokenKind::Star => "'*'",
            TokenKind::Slash => "'/'",
            TokenKind::Percent => "'%'",
            TokenKind::PlusEqual => "'+='",
            TokenKind::MinusEqual => "'-='",
            TokenKind::StarEqual => "'*='",
            TokenKind::SlashEqual => "'/='",
            TokenKind::Equal => "'='",
            TokenKind::EqualEqual => "'=='",
            TokenKind::BangEqual => "'!='",
            TokenKind::Bang => "'!'",
            TokenKind::Less => "'<'",
            TokenKind::LessEqual => "'<='",
            TokenKind::Greater => "'>'",
            TokenKind::GreaterEqual => "'>='",
            TokenKind::AmpAmp => "'&&'",
            TokenKind::PipePipe => "'||'",
            TokenKind::Pipe => "'|'",
            TokenKind::Comment => "comment",
            TokenKind::Eof => "end of file",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Look up a keyword by its text.
pub fn lookup_keyword(ident: &str) -> Option<TokenKind> {
    let kind = match ident {
        "func" => TokenKind::Func,
        "val" => TokenKind::Val,
        "var" => TokenKind::Var,
        "type" => TokenKind::Type,
        "enum" => TokenKind::Enum,
        "if" => TokenKind::If,
        "else" => TokenKind::Else,
        "while" => TokenKind::While,
        "for" => TokenKind::For,
        "in" => TokenKind::In,
        "break" => TokenKind::Break,
        "continue" => TokenKind::Continue,
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        "None" => TokenKind::None,
        "import" => TokenKind::Import,
        "export" => TokenKind::Export,
        "from" => TokenKind::From,
        "self" => TokenKind::SelfKw,
        _ => return None,
    };
    Some(kind)
}
