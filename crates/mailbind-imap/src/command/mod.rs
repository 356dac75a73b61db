//! IMAP command builder.
//!
//! Commands are encoded into [`Encoded`] chunk lists so that arguments
//! needing a synchronizing literal can be sent after the server's `+`
//! continuation.

mod serialize;
mod tag_generator;
mod types;

use crate::error::{Error, Result};
use crate::types::{Mailbox, UidSet};

pub use serialize::Encoded;
pub use tag_generator::TagGenerator;
pub use types::{FetchAttribute, SearchCriteria};

use serialize::Encoder;

/// IMAP command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    // Any state
    /// CAPABILITY command.
    Capability,
    /// NOOP command.
    Noop,
    /// LOGOUT command.
    Logout,

    // Not authenticated
    /// STARTTLS command.
    StartTls,
    /// LOGIN command.
    Login {
        /// Username.
        username: String,
        /// Password.
        password: String,
    },
    /// AUTHENTICATE command. The SASL exchange follows on continuations.
    Authenticate {
        /// SASL mechanism name.
        mechanism: String,
    },

    // Authenticated
    /// SELECT command.
    Select {
        /// Mailbox to open read-write.
        mailbox: Mailbox,
    },
    /// LIST command.
    List {
        /// Reference name, usually empty.
        reference: String,
        /// Mailbox pattern with `*` / `%` wildcards.
        pattern: String,
    },

    // Selected
    /// UID SEARCH command.
    UidSearch {
        /// Search keys.
        criteria: SearchCriteria,
        /// Optional `CHARSET` argument.
        charset: Option<String>,
    },
    /// UID FETCH command.
    UidFetch {
        /// Messages to fetch.
        uids: UidSet,
        /// Data items to request.
        items: Vec<FetchAttribute>,
    },
}

impl Command {
    /// Encodes the command with the given tag, terminated by CRLF.
    #[must_use]
    pub fn encode(&self, tag: &str) -> Encoded {
        let mut enc = Encoder::new();
        enc.raw(tag.as_bytes()).sp();

        match self {
            Self::Capability => {
                enc.raw(b"CAPABILITY");
            }
            Self::Noop => {
                enc.raw(b"NOOP");
            }
            Self::Logout => {
                enc.raw(b"LOGOUT");
            }
            Self::StartTls => {
                enc.raw(b"STARTTLS");
            }
            Self::Login { username, password } => {
                enc.raw(b"LOGIN ").astring(username).sp().astring(password);
            }
            Self::Authenticate { mechanism } => {
                enc.raw(b"AUTHENTICATE ").raw(mechanism.as_bytes());
            }
            Self::Select { mailbox } => {
                enc.raw(b"SELECT ").astring(mailbox.as_str());
            }
            Self::List { reference, pattern } => {
                enc.raw(b"LIST ").string(reference).sp().list_mailbox(pattern);
            }
            Self::UidSearch { criteria, charset } => {
                enc.raw(b"UID SEARCH");
                if let Some(charset) = charset {
                    enc.raw(b" CHARSET ").astring(charset);
                }
                // A top-level conjunction is just a key list.
                match criteria {
                    SearchCriteria::And(keys) if !keys.is_empty() => {
                        for key in keys {
                            enc.sp().search(key);
                        }
                    }
                    other => {
                        enc.sp().search(other);
                    }
                }
            }
            Self::UidFetch { uids, items } => {
                enc.raw(format!("UID FETCH {uids} ").as_bytes())
                    .fetch_attributes(items);
            }
        }

        enc.crlf().finish()
    }

    /// Rejects arguments that are written unquoted and would not survive
    /// on the wire: body sections, search keywords and dates, and the SASL
    /// mechanism name.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] describing the first bad argument.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Authenticate { mechanism } if !serialize::is_atom(mechanism) => {
                Err(Error::InvalidArgument(format!("invalid SASL mechanism {mechanism:?}")))
            }
            Self::UidSearch { criteria, .. } => criteria.validate(),
            Self::UidFetch { items, .. } => items.iter().try_for_each(FetchAttribute::validate),
            _ => Ok(()),
        }
    }

    /// Returns the command name for logging.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Capability => "CAPABILITY",
            Self::Noop => "NOOP",
            Self::Logout => "LOGOUT",
            Self::StartTls => "STARTTLS",
            Self::Login { .. } => "LOGIN",
            Self::Authenticate { .. } => "AUTHENTICATE",
            Self::Select { .. } => "SELECT",
            Self::List { .. } => "LIST",
            Self::UidSearch { .. } => "UID SEARCH",
            Self::UidFetch { .. } => "UID FETCH",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::Uid;

    fn wire(cmd: &Command) -> String {
        String::from_utf8(cmd.encode("A0001").to_bytes()).unwrap()
    }

    #[test]
    fn test_simple_commands() {
        assert_eq!(wire(&Command::Capability), "A0001 CAPABILITY\r\n");
        assert_eq!(wire(&Command::Noop), "A0001 NOOP\r\n");
        assert_eq!(wire(&Command::Logout), "A0001 LOGOUT\r\n");
        assert_eq!(wire(&Command::StartTls), "A0001 STARTTLS\r\n");
    }

    #[test]
    fn test_login_quotes_when_needed() {
        let cmd = Command::Login {
            username: "user@example.com".into(),
            password: "p@ss \"word\"".into(),
        };
        assert_eq!(
            wire(&cmd),
            "A0001 LOGIN user@example.com \"p@ss \\\"word\\\"\"\r\n"
        );
    }

    #[test]
    fn test_login_with_non_ascii_password_uses_literal() {
        let cmd = Command::Login {
            username: "user".into(),
            password: "pässword".into(),
        };
        let encoded = cmd.encode("A0002");
        assert_eq!(encoded.chunks().len(), 2);
        assert_eq!(encoded.chunks()[0], b"A0002 LOGIN user {9}\r\n");
        assert_eq!(encoded.chunks()[1], "pässword\r\n".as_bytes());
    }

    #[test]
    fn test_select_inbox_and_spaced_name() {
        let cmd = Command::Select {
            mailbox: Mailbox::inbox(),
        };
        assert_eq!(wire(&cmd), "A0001 SELECT INBOX\r\n");

        let cmd = Command::Select {
            mailbox: Mailbox::new("Sent Items"),
        };
        assert_eq!(wire(&cmd), "A0001 SELECT \"Sent Items\"\r\n");
    }

    #[test]
    fn test_validate_rejects_unquotable_arguments() {
        let fetch = Command::UidFetch {
            uids: UidSet::single(Uid::new(5).unwrap()),
            items: vec![
                FetchAttribute::Uid,
                FetchAttribute::peek("])\r\nX1 DELETE INBOX\r\nX2 NOOP "),
            ],
        };
        assert!(matches!(fetch.validate(), Err(Error::InvalidArgument(_))));

        let search = Command::UidSearch {
            criteria: SearchCriteria::Keyword("x\r\nX1 DELETE INBOX".into()),
            charset: None,
        };
        assert!(matches!(search.validate(), Err(Error::InvalidArgument(_))));

        let auth = Command::Authenticate {
            mechanism: "PLAIN\r\n".into(),
        };
        assert!(matches!(auth.validate(), Err(Error::InvalidArgument(_))));

        let ok = Command::UidFetch {
            uids: UidSet::single(Uid::new(5).unwrap()),
            items: vec![FetchAttribute::peek("1.2.MIME")],
        };
        assert!(ok.validate().is_ok());
        assert!(Command::Noop.validate().is_ok());
    }

    #[test]
    fn test_list_wildcard_stays_bare() {
        let cmd = Command::List {
            reference: String::new(),
            pattern: "*".into(),
        };
        assert_eq!(wire(&cmd), "A0001 LIST \"\" *\r\n");
    }

    #[test]
    fn test_uid_search_flattens_top_level_and() {
        let cmd = Command::UidSearch {
            criteria: SearchCriteria::And(vec![
                SearchCriteria::Unseen,
                SearchCriteria::From("bob".into()),
            ]),
            charset: None,
        };
        assert_eq!(wire(&cmd), "A0001 UID SEARCH UNSEEN FROM \"bob\"\r\n");
    }

    #[test]
    fn test_uid_search_with_charset() {
        let cmd = Command::UidSearch {
            criteria: SearchCriteria::Subject("Grüße".into()),
            charset: Some("UTF-8".into()),
        };
        let encoded = cmd.encode("A0003");
        assert_eq!(
            encoded.chunks()[0],
            b"A0003 UID SEARCH CHARSET UTF-8 SUBJECT {7}\r\n"
        );
        assert_eq!(encoded.chunks()[1], "Grüße\r\n".as_bytes());
    }

    #[test]
    fn test_uid_fetch() {
        let cmd = Command::UidFetch {
            uids: UidSet::single(Uid::new(42).unwrap()),
            items: vec![FetchAttribute::Uid, FetchAttribute::peek("")],
        };
        assert_eq!(wire(&cmd), "A0001 UID FETCH 42 (UID BODY.PEEK[])\r\n");
    }
}
