//! Error taxonomy for connection management.

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by configs, sessions and the registry.
#[derive(Debug, Error)]
pub enum Error {
    /// A connection record failed validation.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The transport could not be established or was lost.
    #[error("Connection error: {0}")]
    Connection(#[source] mailbind_imap::Error),

    /// The server rejected the credentials.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The server sent something the client cannot accept, or rejected a
    /// command as malformed.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The operation needs an authenticated session.
    #[error("Not authenticated: {0} requires an authenticated session")]
    NotAuthenticated(&'static str),

    /// The operation needs a selected mailbox.
    #[error("No mailbox selected: {0} requires a selected mailbox")]
    NoMailboxSelected(&'static str),

    /// SELECT was refused.
    #[error("Mailbox not found: {mailbox} ({reason})")]
    MailboxNotFound {
        /// Requested mailbox.
        mailbox: String,
        /// Server's explanation.
        reason: String,
    },

    /// No message with this UID in the selected mailbox.
    #[error("Message not found: UID {0}")]
    MessageNotFound(u32),

    /// No connection registered under this name.
    #[error("Unknown connection: {0}")]
    UnknownConnection(String),

    /// A connection with this name is already registered.
    #[error("Duplicate connection name: {0}")]
    DuplicateName(String),

    /// A connect or I/O deadline passed.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),
}

impl Error {
    /// True for errors after which the session's transport was dropped.
    #[must_use]
    pub const fn is_disconnect(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Timeout(_))
    }
}

/// Result alias for this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_subject() {
        let err = Error::MailboxNotFound {
            mailbox: "Archive/2019".into(),
            reason: "no such mailbox".into(),
        };
        assert_eq!(
            err.to_string(),
            "Mailbox not found: Archive/2019 (no such mailbox)"
        );
        assert_eq!(
            Error::NotAuthenticated("select_mailbox").to_string(),
            "Not authenticated: select_mailbox requires an authenticated session"
        );
        assert_eq!(Error::MessageNotFound(42).to_string(), "Message not found: UID 42");
    }

    #[test]
    fn test_connection_error_keeps_source() {
        use std::error::Error as _;

        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = Error::Connection(mailbind_imap::Error::Io(io));
        assert!(err.source().is_some());
        assert!(err.is_disconnect());
        assert!(!Error::Protocol("bad".into()).is_disconnect());
    }
}
