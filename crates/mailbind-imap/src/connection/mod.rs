//! Connection handling.
//!
//! - [`Config`] / [`Security`]: where to connect and how it is protected
//! - [`connect`] / [`starttls`]: TCP and TLS transport setup
//! - [`FramedStream`]: literal-aware response framing
//! - [`Client`]: runtime protocol driver over any stream

mod client;
mod config;
mod framed;
mod stream;

pub use client::{Client, Greeting};
pub use config::{Config, ConfigBuilder, Security};
pub use framed::{FramedStream, MAX_LINE_LENGTH, MAX_LITERAL_SIZE};
pub use stream::{ImapStream, connect, starttls, tls_connector};
