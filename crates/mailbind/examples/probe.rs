#![allow(clippy::doc_markdown)]
//! Example: probe one mailbox and list its newest unseen messages
//!
//! Reads the connection from environment variables, checks it with
//! `test_connection`, then opens a cached session through the registry.
//!
//! ## Running
//!
//! ```bash
//! IMAP_HOST=imap.example.com IMAP_USER=alice@example.com IMAP_PASSWORD=app-password \
//!     RUST_LOG=mailbind=debug cargo run --package mailbind --example probe
//! ```
//!
//! Optional: `IMAP_PORT`, `IMAP_ENCRYPTION` (`ssl`, `tls` or `none`),
//! `IMAP_MAILBOX`.

use std::env;

use anyhow::{Context, Result};
use mailbind::{
    ConnectionConfig, ConnectionRegistry, DuplicatePolicy, Encryption, FetchPart, SearchCriteria,
};
use tracing_subscriber::EnvFilter;

const SHOWN: usize = 5;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let encryption: Encryption = env::var("IMAP_ENCRYPTION")
        .unwrap_or_else(|_| "ssl".to_string())
        .parse()?;
    let mut builder = ConnectionConfig::builder("probe")
        .host(env::var("IMAP_HOST").context("IMAP_HOST is not set")?)
        .encryption(encryption)
        .credentials(
            env::var("IMAP_USER").context("IMAP_USER is not set")?,
            env::var("IMAP_PASSWORD").context("IMAP_PASSWORD is not set")?,
        );
    if let Ok(port) = env::var("IMAP_PORT") {
        builder = builder.port(port.parse().context("IMAP_PORT is not a port number")?);
    }
    if let Ok(mailbox) = env::var("IMAP_MAILBOX") {
        builder = builder.default_mailbox(mailbox);
    }

    let registry = ConnectionRegistry::new(DuplicatePolicy::Strict);
    registry.register(builder.build()?)?;

    registry.test_connection("probe").await?;
    println!("Connection OK");

    {
        let mut session = registry.get_session("probe").await?;
        let status = session.select_default_mailbox().await?;
        let (exists, recent) = (status.exists, status.recent);
        println!(
            "{}: {exists} messages, {recent} recent",
            session.selected_mailbox().unwrap_or_default()
        );

        let unseen: Vec<_> = session.search(&SearchCriteria::Unseen).await?.collect();
        println!("{} unseen", unseen.len());

        for uid in unseen.iter().rev().take(SHOWN) {
            let message = session.fetch(*uid, &[FetchPart::Size, FetchPart::Header]).await?;
            let subject = message
                .header()
                .map(String::from_utf8_lossy)
                .and_then(|header| {
                    header
                        .lines()
                        .find_map(|line| line.strip_prefix("Subject: ").map(str::to_string))
                })
                .unwrap_or_default();
            println!(
                "  UID {uid:>6}  {:>8} bytes  {subject}",
                message.size.unwrap_or_default()
            );
        }
    }

    let report = registry.close_all().await;
    for (name, error) in &report.failures {
        eprintln!("close {name}: {error}");
    }
    Ok(())
}
