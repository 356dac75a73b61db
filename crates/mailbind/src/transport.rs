//! Transport seam.
//!
//! Sessions never open sockets themselves; they ask a [`Connector`]. The
//! default [`TcpConnector`] uses the protocol crate's TCP/TLS helpers.
//! Tests and embedding applications can substitute any byte stream.

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use crate::config::ConnectionConfig;

/// A bidirectional byte stream a session can drive.
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> Transport for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

/// Type-erased transport owned by a session.
pub type BoxedTransport = Box<dyn Transport>;

/// Opens transports for sessions.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Establishes the transport for `config`.
    ///
    /// For `ssl` the returned stream must already be encrypted; for `tls`
    /// and `none` it is plaintext.
    async fn connect(&self, config: &ConnectionConfig) -> mailbind_imap::Result<BoxedTransport>;

    /// Runs the TLS handshake over a stream after a successful STARTTLS.
    async fn starttls(
        &self,
        stream: BoxedTransport,
        host: &str,
    ) -> mailbind_imap::Result<BoxedTransport>;
}

/// Connects over TCP, with rustls for `ssl` and STARTTLS.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, config: &ConnectionConfig) -> mailbind_imap::Result<BoxedTransport> {
        let stream = mailbind_imap::connection::connect(&config.transport_config()).await?;
        Ok(Box::new(stream))
    }

    async fn starttls(
        &self,
        stream: BoxedTransport,
        host: &str,
    ) -> mailbind_imap::Result<BoxedTransport> {
        let tls = mailbind_imap::connection::starttls(stream, host).await?;
        debug!(host, "STARTTLS handshake complete");
        Ok(Box::new(tls))
    }
}
