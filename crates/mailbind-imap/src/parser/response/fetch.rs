//! FETCH response parsing.

use crate::Result;
use crate::parser::lexer::{Lexer, Token};
use crate::types::Uid;

use super::helpers::parse_flag_list;
use super::types::FetchItem;

/// Parses the parenthesized item list of a FETCH response.
pub fn parse_fetch_response(lexer: &mut Lexer<'_>) -> Result<Vec<FetchItem>> {
    lexer.expect(Token::LParen)?;
    let mut items = Vec::new();

    loop {
        let name = match lexer.next_token()? {
            Token::RParen => return Ok(items),
            Token::Space => continue,
            Token::Atom(name) => name,
            token => {
                return Err(lexer.error(format!("unexpected {} in FETCH data", token.kind())));
            }
        };

        match name.to_ascii_uppercase().as_str() {
            "UID" => {
                lexer.expect_space()?;
                let n = lexer.read_number()?;
                let uid = Uid::new(n).ok_or_else(|| lexer.error("FETCH UID 0"))?;
                items.push(FetchItem::Uid(uid));
            }
            "FLAGS" => {
                lexer.expect_space()?;
                items.push(FetchItem::Flags(parse_flag_list(lexer)?));
            }
            "RFC822.SIZE" => {
                lexer.expect_space()?;
                items.push(FetchItem::Rfc822Size(lexer.read_number()?));
            }
            "INTERNALDATE" => {
                lexer.expect_space()?;
                items.push(FetchItem::InternalDate(lexer.read_astring()?));
            }
            "BODY" if lexer.peek() == Some(b'[') => {
                let (section, origin) = parse_section_and_origin(lexer)?;
                lexer.expect_space()?;
                let data = lexer.read_nstring()?;
                items.push(FetchItem::Body {
                    section,
                    origin,
                    data,
                });
            }
            upper @ ("RFC822" | "RFC822.HEADER" | "RFC822.TEXT") => {
                lexer.expect_space()?;
                let data = lexer.read_nstring()?;
                let section = match upper {
                    "RFC822.HEADER" => "HEADER",
                    "RFC822.TEXT" => "TEXT",
                    _ => "",
                };
                items.push(FetchItem::Body {
                    section: section.to_string(),
                    origin: None,
                    data,
                });
            }
            _ => skip_fetch_value(lexer)?,
        }
    }
}

/// Parses `[section]` and an optional `<origin>` after `BODY`.
///
/// The section is taken verbatim up to the closing bracket, since header
/// field lists inside it contain parentheses and spaces.
fn parse_section_and_origin(lexer: &mut Lexer<'_>) -> Result<(String, Option<u32>)> {
    lexer.expect(Token::LBracket)?;
    let mut section = Vec::new();
    loop {
        match lexer.advance() {
            Some(b']') => break,
            Some(b'\r' | b'\n') | None => return Err(lexer.error("unterminated BODY section")),
            Some(b) => section.push(b),
        }
    }

    let mut origin = None;
    if lexer.peek() == Some(b'<') {
        lexer.advance();
        let mut value: u32 = 0;
        loop {
            match lexer.advance() {
                Some(b'>') => break,
                Some(d @ b'0'..=b'9') => {
                    value = value
                        .checked_mul(10)
                        .and_then(|v| v.checked_add(u32::from(d - b'0')))
                        .ok_or_else(|| lexer.error("BODY origin out of range"))?;
                }
                _ => return Err(lexer.error("malformed BODY origin")),
            }
        }
        origin = Some(value);
    }

    Ok((String::from_utf8_lossy(&section).into_owned(), origin))
}

/// Skips the value of a FETCH item this parser does not model
/// (ENVELOPE, BODYSTRUCTURE, MODSEQ, ...).
fn skip_fetch_value(lexer: &mut Lexer<'_>) -> Result<()> {
    // `BODY` without a section is the BODYSTRUCTURE-like form.
    if lexer.peek() == Some(b'[') {
        parse_section_and_origin(lexer)?;
    }
    lexer.expect_space()?;

    let mut depth = 0usize;
    loop {
        match lexer.next_token()? {
            Token::LParen => depth += 1,
            Token::RParen if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            }
            Token::RParen => return Err(lexer.error("unbalanced ')' in FETCH data")),
            Token::Crlf | Token::Eof => return Err(lexer.error("truncated FETCH data")),
            _ if depth == 0 => return Ok(()),
            _ => {}
        }
    }
}
