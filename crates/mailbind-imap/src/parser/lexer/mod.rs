//! Tokenizer for server responses.
//!
//! Works on one complete response (as delivered by the framed reader), so
//! literals are always fully present in the input.

#![allow(clippy::missing_errors_doc)]

mod token;

pub use token::Token;

use crate::{Error, Result};

/// Byte-level lexer over one response.
pub struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    /// Creates a lexer over `input`.
    #[must_use]
    pub const fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    /// Current byte offset.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Unconsumed input.
    #[must_use]
    pub fn remaining(&self) -> &'a [u8] {
        &self.input[self.pos.min(self.input.len())..]
    }

    /// True once all input is consumed.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    /// Peeks at the current byte.
    #[must_use]
    pub fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.input.get(self.pos + offset).copied()
    }

    /// Consumes one byte.
    pub fn advance(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        Some(byte)
    }

    fn skip(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.input.len());
    }

    /// Consumes a space if one is next. Returns whether it did.
    pub fn eat_space(&mut self) -> bool {
        if self.peek() == Some(b' ') {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Reads the next token.
    pub fn next_token(&mut self) -> Result<Token<'a>> {
        let Some(byte) = self.peek() else {
            return Ok(Token::Eof);
        };

        match byte {
            b'\r' if self.peek_at(1) == Some(b'\n') => {
                self.skip(2);
                Ok(Token::Crlf)
            }
            // Some servers end lines with a bare LF.
            b'\n' => {
                self.skip(1);
                Ok(Token::Crlf)
            }
            b' ' => self.single(Token::Space),
            b'(' => self.single(Token::LParen),
            b')' => self.single(Token::RParen),
            b'[' => self.single(Token::LBracket),
            b']' => self.single(Token::RBracket),
            b'*' => self.single(Token::Asterisk),
            b'+' => self.single(Token::Plus),
            b'\\' if self.peek_at(1) == Some(b'*') => {
                self.skip(2);
                Ok(Token::Atom("\\*"))
            }
            b'"' => self.read_quoted(),
            b'{' => self.read_literal(),
            _ if is_atom_char(byte) => self.read_atom(),
            _ => Err(self.error(format!("unexpected byte {byte:#04x}"))),
        }
    }

    fn single(&mut self, token: Token<'a>) -> Result<Token<'a>> {
        self.pos += 1;
        Ok(token)
    }

    fn read_quoted(&mut self) -> Result<Token<'a>> {
        self.pos += 1;
        let mut out = Vec::new();

        loop {
            match self.advance() {
                Some(b'"') => break,
                Some(b'\\') => match self.advance() {
                    Some(c @ (b'"' | b'\\')) => out.push(c),
                    Some(c) => return Err(self.error(format!("invalid escape \\{}", c as char))),
                    None => return Err(self.error("unterminated quoted string")),
                },
                Some(b'\r' | b'\n') | None => {
                    return Err(self.error("unterminated quoted string"));
                }
                Some(c) => out.push(c),
            }
        }

        Ok(Token::Quoted(String::from_utf8_lossy(&out).into_owned()))
    }

    fn read_literal(&mut self) -> Result<Token<'a>> {
        let input = self.input;
        self.pos += 1;
        let start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
        }
        let digits = &input[start..self.pos];
        // Non-synchronizing marker, only seen from servers echoing LITERAL+.
        if self.peek() == Some(b'+') {
            self.pos += 1;
        }
        if digits.is_empty() || self.advance() != Some(b'}') {
            return Err(self.error("malformed literal header"));
        }
        if self.advance() != Some(b'\r') || self.advance() != Some(b'\n') {
            return Err(self.error("expected CRLF after literal header"));
        }

        let size: usize = std::str::from_utf8(digits)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| self.error("literal size out of range"))?;

        let end = self
            .pos
            .checked_add(size)
            .filter(|&end| end <= self.input.len())
            .ok_or_else(|| self.error(format!("incomplete literal of {size} bytes")))?;

        let data = &input[self.pos..end];
        self.pos = end;
        Ok(Token::Literal(data))
    }

    fn read_atom(&mut self) -> Result<Token<'a>> {
        let input = self.input;
        let start = self.pos;
        while self.peek().is_some_and(is_atom_char) {
            self.pos += 1;
        }

        let s = std::str::from_utf8(&input[start..self.pos])
            .map_err(|_| self.error("atom is not valid UTF-8"))?;

        if s.bytes().all(|b| b.is_ascii_digit()) {
            // 64-bit values (MODSEQ and friends) stay atoms.
            return Ok(s.parse().map_or(Token::Atom(s), Token::Number));
        }
        if s.eq_ignore_ascii_case("NIL") {
            return Ok(Token::Nil);
        }
        Ok(Token::Atom(s))
    }

    /// Builds a parse error at the current position.
    pub fn error(&self, message: impl Into<String>) -> Error {
        Error::Parse {
            position: self.pos,
            message: message.into(),
        }
    }

    /// Consumes a token of the same kind as `expected`.
    #[allow(clippy::needless_pass_by_value)]
    pub fn expect(&mut self, expected: Token<'_>) -> Result<()> {
        let token = self.next_token()?;
        if std::mem::discriminant(&token) == std::mem::discriminant(&expected) {
            Ok(())
        } else {
            Err(self.error(format!("expected {}, got {}", expected.kind(), token.kind())))
        }
    }

    /// Consumes a space.
    pub fn expect_space(&mut self) -> Result<()> {
        self.expect(Token::Space)
    }

    /// Reads an astring (atom, number, quoted string or literal).
    pub fn read_astring(&mut self) -> Result<String> {
        match self.next_token()? {
            Token::Atom(s) => Ok(s.to_string()),
            Token::Number(n) => Ok(n.to_string()),
            Token::Nil => Ok("NIL".to_string()),
            Token::Quoted(s) => Ok(s),
            Token::Literal(data) => Ok(String::from_utf8_lossy(data).into_owned()),
            token => Err(self.error(format!("expected astring, got {}", token.kind()))),
        }
    }

    /// Reads an nstring as raw bytes; `NIL` yields `None`.
    pub fn read_nstring(&mut self) -> Result<Option<Vec<u8>>> {
        match self.next_token()? {
            Token::Nil => Ok(None),
            Token::Quoted(s) => Ok(Some(s.into_bytes())),
            Token::Literal(data) => Ok(Some(data.to_vec())),
            token => Err(self.error(format!("expected nstring, got {}", token.kind()))),
        }
    }

    /// Reads a number.
    pub fn read_number(&mut self) -> Result<u32> {
        match self.next_token()? {
            Token::Number(n) => Ok(n),
            token => Err(self.error(format!("expected number, got {}", token.kind()))),
        }
    }

    /// Reads an atom.
    pub fn read_atom_str(&mut self) -> Result<&'a str> {
        match self.next_token()? {
            Token::Atom(s) => Ok(s),
            token => Err(self.error(format!("expected atom, got {}", token.kind()))),
        }
    }

    /// Consumes and returns everything up to the line end, then the line
    /// end itself.
    pub fn read_text(&mut self) -> String {
        let rest = self.remaining();
        let end = rest
            .iter()
            .position(|&b| b == b'\r' || b == b'\n')
            .unwrap_or(rest.len());
        let text = String::from_utf8_lossy(&rest[..end]).into_owned();

        self.skip(end);
        if self.peek() == Some(b'\r') {
            self.skip(1);
        }
        if self.peek() == Some(b'\n') {
            self.skip(1);
        }
        text
    }
}

/// Returns true for bytes that may appear inside an atom.
///
/// `\` is accepted so that flags lex as one token; bytes above 0x7F are
/// accepted for servers that send UTF-8 mailbox names unquoted.
#[must_use]
pub const fn is_atom_char(b: u8) -> bool {
    match b {
        b'(' | b')' | b'{' | b' ' | b'%' | b'*' | b'"' | b'[' | b']' => false,
        0x21..=0x7E | 0x80..=0xFF => true,
        _ => false,
    }
}
