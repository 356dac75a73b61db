//! Response parser.

#![allow(clippy::missing_errors_doc)]

mod fetch;
mod helpers;
mod types;

pub use types::{FetchItem, UntaggedResponse};

use crate::parser::lexer::{Lexer, Token};
use crate::types::{ResponseCode, SeqNum, Status, Tag};
use crate::{Error, Result};

use helpers::{
    parse_capability_data, parse_flag_list, parse_list_response, parse_response_code,
    parse_search_response,
};

/// A parsed server response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Command completion.
    Tagged {
        /// Tag of the completed command.
        tag: Tag,
        /// Completion status.
        status: Status,
        /// Optional bracketed code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// Server data.
    Untagged(UntaggedResponse),
    /// `+` continuation request.
    Continuation {
        /// Text after the `+`; base64 challenge during AUTHENTICATE.
        text: String,
    },
}

/// Stateless parser for one complete response.
pub struct ResponseParser;

impl ResponseParser {
    /// Parses a full response including any literals.
    pub fn parse(input: &[u8]) -> Result<Response> {
        let mut lexer = Lexer::new(input);

        match lexer.next_token()? {
            Token::Asterisk => {
                lexer.expect_space()?;
                Self::parse_untagged(&mut lexer).map(Response::Untagged)
            }
            Token::Plus => {
                lexer.eat_space();
                Ok(Response::Continuation {
                    text: lexer.read_text(),
                })
            }
            Token::Atom(tag) => Self::parse_tagged(&mut lexer, tag),
            Token::Number(n) => Self::parse_tagged(&mut lexer, &n.to_string()),
            token => Err(Error::Parse {
                position: 0,
                message: format!("expected '*', '+' or a tag, got {}", token.kind()),
            }),
        }
    }

    fn parse_tagged(lexer: &mut Lexer<'_>, tag: &str) -> Result<Response> {
        lexer.expect_space()?;
        let status = Self::parse_status(lexer)?;
        let (code, text) = Self::parse_resp_text(lexer)?;
        Ok(Response::Tagged {
            tag: Tag::new(tag),
            status,
            code,
            text,
        })
    }

    fn parse_untagged(lexer: &mut Lexer<'_>) -> Result<UntaggedResponse> {
        match lexer.next_token()? {
            Token::Atom(keyword) => {
                let upper = keyword.to_ascii_uppercase();
                let status = match upper.as_str() {
                    "OK" => Some(Status::Ok),
                    "NO" => Some(Status::No),
                    "BAD" => Some(Status::Bad),
                    "PREAUTH" => Some(Status::PreAuth),
                    "BYE" => Some(Status::Bye),
                    _ => None,
                };
                if let Some(status) = status {
                    let (code, text) = Self::parse_resp_text(lexer)?;
                    return Ok(UntaggedResponse::Status { status, code, text });
                }

                match upper.as_str() {
                    "CAPABILITY" => parse_capability_data(lexer).map(UntaggedResponse::Capability),
                    "FLAGS" => {
                        lexer.expect_space()?;
                        parse_flag_list(lexer).map(UntaggedResponse::Flags)
                    }
                    "LIST" => {
                        lexer.expect_space()?;
                        parse_list_response(lexer).map(UntaggedResponse::List)
                    }
                    "SEARCH" => parse_search_response(lexer).map(UntaggedResponse::Search),
                    _ => Ok(UntaggedResponse::Other(upper)),
                }
            }
            Token::Number(n) => {
                lexer.expect_space()?;
                let keyword = lexer.read_atom_str()?.to_ascii_uppercase();
                match keyword.as_str() {
                    "EXISTS" => Ok(UntaggedResponse::Exists(n)),
                    "RECENT" => Ok(UntaggedResponse::Recent(n)),
                    "EXPUNGE" => {
                        let seq = SeqNum::new(n).ok_or_else(|| lexer.error("EXPUNGE 0"))?;
                        Ok(UntaggedResponse::Expunge(seq))
                    }
                    "FETCH" => {
                        let seq = SeqNum::new(n).ok_or_else(|| lexer.error("FETCH 0"))?;
                        lexer.expect_space()?;
                        let items = fetch::parse_fetch_response(lexer)?;
                        Ok(UntaggedResponse::Fetch { seq, items })
                    }
                    _ => Ok(UntaggedResponse::Other(keyword)),
                }
            }
            token => Err(lexer.error(format!("unexpected {} after '*'", token.kind()))),
        }
    }

    fn parse_status(lexer: &mut Lexer<'_>) -> Result<Status> {
        let atom = lexer.read_atom_str()?;
        match atom.to_ascii_uppercase().as_str() {
            "OK" => Ok(Status::Ok),
            "NO" => Ok(Status::No),
            "BAD" => Ok(Status::Bad),
            "PREAUTH" => Ok(Status::PreAuth),
            "BYE" => Ok(Status::Bye),
            _ => Err(lexer.error(format!("invalid status {atom}"))),
        }
    }

    /// Parses `[SP [code] SP] text`. Servers may omit the text entirely.
    fn parse_resp_text(lexer: &mut Lexer<'_>) -> Result<(Option<ResponseCode>, String)> {
        if !lexer.eat_space() {
            return Ok((None, lexer.read_text()));
        }
        let code = if lexer.peek() == Some(b'[') {
            let code = parse_response_code(lexer)?;
            lexer.eat_space();
            Some(code)
        } else {
            None
        };
        Ok((code, lexer.read_text()))
    }
}
