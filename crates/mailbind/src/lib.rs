//! # mailbind
//!
//! Named IMAP connections for applications that talk to more than one
//! mailbox.
//!
//! This crate provides:
//! - Validated, immutable connection configs with serde input records
//! - `ImapSession`: connect, STARTTLS, authenticate, select, search, fetch
//! - `ConnectionRegistry`: lazily opened, cached sessions with per-name
//!   locking and a reporting teardown
//!
//! ```no_run
//! use mailbind::{ConnectionConfig, ConnectionRegistry, DuplicatePolicy, SearchCriteria};
//!
//! # async fn run() -> mailbind::Result<()> {
//! let registry = ConnectionRegistry::new(DuplicatePolicy::Strict);
//! registry.register(
//!     ConnectionConfig::builder("primary")
//!         .host("mail.example.com")
//!         .credentials("alice@example.com", "app-password")
//!         .build()?,
//! )?;
//!
//! let mut session = registry.get_session("primary").await?;
//! session.select_default_mailbox().await?;
//! for uid in session.search(&SearchCriteria::Unseen).await? {
//!     println!("unseen: {uid}");
//! }
//! drop(session);
//!
//! let report = registry.close_all().await;
//! assert!(report.is_clean());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod config;
mod error;
pub mod registry;
pub mod session;
pub mod transport;

pub use config::{
    AuthMechanism, ConnectionConfig, ConnectionConfigBuilder, ConnectionSettings,
    ConnectionsConfig, DuplicatePolicy, Encryption,
};
pub use error::{Error, Result};
pub use registry::{CloseReport, ConnectionRegistry, SessionGuard};
pub use session::{FetchPart, FetchedMessage, ImapSession, MessageIds, SessionState};
pub use transport::{BoxedTransport, Connector, TcpConnector, Transport};

pub use mailbind_imap::{
    Capability, Flag, Flags, ListResponse, MailboxStatus, SearchCriteria, Uid,
};
