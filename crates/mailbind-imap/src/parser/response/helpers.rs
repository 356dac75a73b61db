//! Parsers for the smaller response grammar pieces.

use crate::Result;
use crate::parser::lexer::{Lexer, Token};
use crate::types::{
    Capability, Flag, Flags, ListResponse, Mailbox, MailboxAttribute, ResponseCode, SeqNum, Uid,
    UidValidity,
};

/// Parses `[code]`; the lexer must be positioned on `[`.
pub fn parse_response_code(lexer: &mut Lexer<'_>) -> Result<ResponseCode> {
    lexer.expect(Token::LBracket)?;
    let atom = lexer.read_atom_str()?;

    let code = match atom.to_ascii_uppercase().as_str() {
        "ALERT" => ResponseCode::Alert,
        "AUTHENTICATIONFAILED" => ResponseCode::AuthenticationFailed,
        "NONEXISTENT" => ResponseCode::NonExistent,
        "READ-ONLY" => ResponseCode::ReadOnly,
        "READ-WRITE" => ResponseCode::ReadWrite,
        "TRYCREATE" => ResponseCode::TryCreate,
        "CAPABILITY" => ResponseCode::Capability(parse_capability_data(lexer)?),
        "PERMANENTFLAGS" => {
            lexer.expect_space()?;
            ResponseCode::PermanentFlags(parse_flag_list(lexer)?)
        }
        "UIDNEXT" => {
            lexer.expect_space()?;
            let n = lexer.read_number()?;
            ResponseCode::UidNext(Uid::new(n).ok_or_else(|| lexer.error("UIDNEXT 0"))?)
        }
        "UIDVALIDITY" => {
            lexer.expect_space()?;
            let n = lexer.read_number()?;
            ResponseCode::UidValidity(
                UidValidity::new(n).ok_or_else(|| lexer.error("UIDVALIDITY 0"))?,
            )
        }
        "UNSEEN" => {
            lexer.expect_space()?;
            let n = lexer.read_number()?;
            ResponseCode::Unseen(SeqNum::new(n).ok_or_else(|| lexer.error("UNSEEN 0"))?)
        }
        other => ResponseCode::Other(other.to_string()),
    };

    // Unknown codes may carry arguments; skip to the bracket.
    while lexer.peek().is_some_and(|b| b != b']' && b != b'\r' && b != b'\n') {
        lexer.advance();
    }
    lexer.expect(Token::RBracket)?;
    Ok(code)
}

/// Parses the space-separated capability atoms that follow `CAPABILITY`.
pub fn parse_capability_data(lexer: &mut Lexer<'_>) -> Result<Vec<Capability>> {
    let mut caps = Vec::new();
    while lexer.eat_space() {
        match lexer.next_token()? {
            Token::Atom(s) => caps.push(Capability::parse(s)),
            Token::Number(n) => caps.push(Capability::parse(&n.to_string())),
            _ => break,
        }
    }
    Ok(caps)
}

/// Parses `(flag flag ...)`.
pub fn parse_flag_list(lexer: &mut Lexer<'_>) -> Result<Flags> {
    lexer.expect(Token::LParen)?;
    let mut flags = Flags::new();
    loop {
        match lexer.next_token()? {
            Token::RParen => return Ok(flags),
            Token::Space => {}
            Token::Atom(s) => flags.insert(Flag::parse(s)),
            token => {
                return Err(lexer.error(format!("unexpected {} in flag list", token.kind())));
            }
        }
    }
}

/// Parses the body of a LIST response: `(attrs) delimiter name`.
pub fn parse_list_response(lexer: &mut Lexer<'_>) -> Result<ListResponse> {
    lexer.expect(Token::LParen)?;
    let mut attributes = Vec::new();
    loop {
        match lexer.next_token()? {
            Token::RParen => break,
            Token::Space => {}
            Token::Atom(s) => attributes.push(MailboxAttribute::parse(s)),
            token => {
                return Err(lexer.error(format!("unexpected {} in LIST attributes", token.kind())));
            }
        }
    }

    lexer.expect_space()?;
    let delimiter = match lexer.next_token()? {
        Token::Nil => None,
        Token::Quoted(s) => s.chars().next(),
        token => return Err(lexer.error(format!("expected delimiter, got {}", token.kind()))),
    };

    lexer.expect_space()?;
    let name = lexer.read_astring()?;

    Ok(ListResponse {
        attributes,
        delimiter,
        mailbox: Mailbox::new(name),
    })
}

/// Parses the numbers after `SEARCH`. Trailing extension data such as
/// `(MODSEQ n)` is ignored.
pub fn parse_search_response(lexer: &mut Lexer<'_>) -> Result<Vec<u32>> {
    let mut nums = Vec::new();
    while lexer.eat_space() {
        match lexer.next_token()? {
            Token::Number(n) if n > 0 => nums.push(n),
            Token::Number(_) => return Err(lexer.error("SEARCH result 0")),
            _ => break,
        }
    }
    Ok(nums)
}
