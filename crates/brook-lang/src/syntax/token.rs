#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    /// Everything after `=` on a declaration line, trimmed.
    Raw(String),

    // Keywords
    Import,
    Space,
    Class,
    Interface,
    Delegate,
    Coroutine,
    Native,
    Const,

    // Visibility keywords (`space` doubles as one)
    Public,
    Internal,
    Protected,
    Private,

    // Punctuation
    Colon,    // :
    Comma,    // ,
    Dot,      // .
    LParen,   // (
    RParen,   // )
    LBracket, // [
    RBracket, // ]
    Eq,       // =

    Eol,
}

impl TokenKind {
    pub fn is_visibility(&self) -> bool {
        matches!(self, Self::Public | Self::Internal | Self::Space | Self::Protected | Self::Private)
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Ident(s)  => format!("`{s}`"),
            Self::Raw(_)    => "initializer".into(),
            Self::Import    => "`import`".into(),
            Self::Space     => "`space`".into(),
            Self::Class     => "`class`".into(),
            Self::Interface => "`interface`".into(),
            Self::Delegate  => "`delegate`".into(),
            Self::Coroutine => "`coroutine`".into(),
            Self::Native    => "`native`".into(),
            Self::Const     => "`const`".into(),
            Self::Public    => "`public`".into(),
            Self::Internal  => "`internal`".into(),
            Self::Protected => "`protected`".into(),
            Self::Private   => "`private`".into(),
            Self::Colon     => "`:`".into(),
            Self::Comma     => "`,`".into(),
            Self::Dot       => "`.`".into(),
            Self::LParen    => "`(`".into(),
            Self::RParen    => "`)`".into(),
            Self::LBracket  => "`[`".into(),
            Self::RBracket  => "`]`".into(),
            Self::Eq        => "`=`".into(),
            Self::Eol       => "end of line".into(),
        }
    }
}

/// Maps an identifier string to its keyword token, or returns `Ident`.
pub fn keyword_or_ident(s: String) -> TokenKind {
    match s.as_str() {
        "import"    => TokenKind::Import,
        "space"     => TokenKind::Space,
        "class"     => TokenKind::Class,
        "interface" => TokenKind::Interface,
        "delegate"  => TokenKind::Delegate,
        "coroutine" => TokenKind::Coroutine,
        "native"    => TokenKind::Native,
        "const"     => TokenKind::Const,
        "public"    => TokenKind::Public,
        "internal"  => TokenKind::Internal,
        "protected" => TokenKind::Protected,
        "private"   => TokenKind::Private,
        _           => TokenKind::Ident(s),
    }
}

// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
    /// Column one past the token's last character.
    pub end: usize,
}

impl Token {
    pub fn new(kind: TokenKind, line: usize, column: usize, end: usize) -> Self {
        Self { kind, line, column, end }
    }
}
