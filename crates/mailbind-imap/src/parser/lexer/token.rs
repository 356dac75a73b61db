//! IMAP token types.

/// Token types produced by the lexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    /// Atom, including flag atoms such as `\Seen` and `\*`.
    Atom(&'a str),
    /// Quoted string with escapes removed.
    Quoted(String),
    /// Literal payload, borrowed from the input.
    Literal(&'a [u8]),
    /// Number that fits in 32 bits.
    Number(u32),
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// Single space.
    Space,
    /// `*` (untagged prefix).
    Asterisk,
    /// `+` (continuation prefix).
    Plus,
    /// `NIL`, any case.
    Nil,
    /// CRLF line ending.
    Crlf,
    /// End of input.
    Eof,
}

impl Token<'_> {
    /// Short name used in parse error messages.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Atom(_) => "atom",
            Self::Quoted(_) => "quoted string",
            Self::Literal(_) => "literal",
            Self::Number(_) => "number",
            Self::LParen => "'('",
            Self::RParen => "')'",
            Self::LBracket => "'['",
            Self::RBracket => "']'",
            Self::Space => "space",
            Self::Asterisk => "'*'",
            Self::Plus => "'+'",
            Self::Nil => "NIL",
            Self::Crlf => "CRLF",
            Self::Eof => "end of input",
        }
    }
}
