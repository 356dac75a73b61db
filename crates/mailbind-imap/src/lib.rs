//! # mailbind-imap
//!
//! IMAP protocol layer for `mailbind`: value types, command encoding, a
//! sans-I/O response parser and a small async driver.
//!
//! ```no_run
//! use mailbind_imap::{Client, Config, Mailbox, SearchCriteria, Security};
//!
//! # async fn run() -> mailbind_imap::Result<()> {
//! let config = Config::new("imap.example.com", Security::Implicit);
//! let stream = mailbind_imap::connection::connect(&config).await?;
//! let mut client = Client::new(stream).with_io_timeout(config.io_timeout);
//! client.read_greeting().await?;
//! client.login("user@example.com", "password").await?;
//!
//! let status = client.select(&Mailbox::inbox()).await?;
//! println!("{} messages", status.exists);
//!
//! let unseen = client.uid_search(&SearchCriteria::Unseen, None).await?;
//! println!("unseen: {unseen:?}");
//! client.logout().await
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`types`]: tags, UIDs, flags, capabilities, mailbox data
//! - [`command`]: command model and wire encoding
//! - [`parser`]: response lexer and parser
//! - [`connection`]: transports, framing and the [`Client`] driver

#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod types;

pub use command::{Command, Encoded, FetchAttribute, SearchCriteria, TagGenerator};
pub use connection::{Client, Config, ConfigBuilder, FramedStream, Greeting, ImapStream, Security};
pub use error::{Error, Result};
pub use parser::{FetchItem, Response, ResponseParser, UntaggedResponse};
pub use types::{
    Capability, Flag, Flags, ListResponse, Mailbox, MailboxAttribute, MailboxStatus, ResponseCode,
    SeqNum, Status, Tag, Uid, UidSet, UidValidity,
};
