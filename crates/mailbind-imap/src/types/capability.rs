//! Completion status and server capabilities.

use std::fmt;

/// Status keyword of a tagged completion or status response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Command succeeded.
    Ok,
    /// Command failed for an operational reason.
    No,
    /// Command was malformed or not valid in this state.
    Bad,
    /// Greeting: the connection is already authenticated.
    PreAuth,
    /// Server is closing the connection.
    Bye,
}

impl Status {
    /// Returns true for OK and PREAUTH.
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok | Self::PreAuth)
    }
}

/// One advertised server capability.
///
/// Only the capabilities the session layer acts on get their own variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Capability {
    /// `IMAP4rev1`
    Imap4Rev1,
    /// `IMAP4rev2`
    Imap4Rev2,
    /// `STARTTLS`
    StartTls,
    /// `LOGINDISABLED`: LOGIN must not be used on this connection.
    LoginDisabled,
    /// `AUTH=<mechanism>`
    Auth(String),
    /// `IDLE`
    Idle,
    /// `LITERAL+`
    LiteralPlus,
    /// `UTF8=ACCEPT`
    Utf8Accept,
    /// Anything else, kept verbatim.
    Other(String),
}

impl Capability {
    /// Parses one capability atom.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let upper = s.to_ascii_uppercase();
        if let Some(mechanism) = upper.strip_prefix("AUTH=") {
            return Self::Auth(mechanism.to_string());
        }
        match upper.as_str() {
            "IMAP4REV1" => Self::Imap4Rev1,
            "IMAP4REV2" => Self::Imap4Rev2,
            "STARTTLS" => Self::StartTls,
            "LOGINDISABLED" => Self::LoginDisabled,
            "IDLE" => Self::Idle,
            "LITERAL+" => Self::LiteralPlus,
            "UTF8=ACCEPT" => Self::Utf8Accept,
            _ => Self::Other(s.to_string()),
        }
    }

    /// Returns true if this advertises the given SASL mechanism.
    #[must_use]
    pub fn is_auth(&self, mechanism: &str) -> bool {
        matches!(self, Self::Auth(m) if m.eq_ignore_ascii_case(mechanism))
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Imap4Rev1 => f.write_str("IMAP4rev1"),
            Self::Imap4Rev2 => f.write_str("IMAP4rev2"),
            Self::StartTls => f.write_str("STARTTLS"),
            Self::LoginDisabled => f.write_str("LOGINDISABLED"),
            Self::Auth(mechanism) => write!(f, "AUTH={mechanism}"),
            Self::Idle => f.write_str("IDLE"),
            Self::LiteralPlus => f.write_str("LITERAL+"),
            Self::Utf8Accept => f.write_str("UTF8=ACCEPT"),
            Self::Other(s) => f.write_str(s),
        }
    }
}
