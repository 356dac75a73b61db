//! Error types for the IMAP protocol layer.

use std::time::Duration;

use thiserror::Error;

/// Errors produced while talking IMAP to a server.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error on the underlying transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS configuration or handshake error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Hostname cannot be used as a TLS server name.
    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// Server data did not match the response grammar.
    #[error("Parse error at byte {position}: {message}")]
    Parse {
        /// Byte offset into the response line.
        position: usize,
        /// What the parser expected.
        message: String,
    },

    /// Tagged NO completion.
    #[error("Server returned NO: {0}")]
    No(String),

    /// Tagged BAD completion.
    #[error("Server returned BAD: {0}")]
    Bad(String),

    /// Server closed the session with BYE.
    #[error("Server sent BYE: {0}")]
    Bye(String),

    /// An exchange did not complete before its deadline.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// A command argument does not fit the command grammar. Nothing was
    /// sent.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Server behaved in a way the protocol does not allow.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl Error {
    /// Returns true if the transport can no longer be trusted after this error.
    ///
    /// NO and BAD completions leave the connection usable; everything that
    /// happens below the response grammar does not.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Io(_)
                | Self::Tls(_)
                | Self::InvalidDnsName(_)
                | Self::Timeout(_)
                | Self::Bye(_)
                | Self::Parse { .. }
                | Self::Protocol(_)
        )
    }
}

/// Result alias for the protocol layer.
pub type Result<T> = std::result::Result<T, Error>;
