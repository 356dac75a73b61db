#![allow(clippy::expect_used, clippy::doc_markdown)]
//! Example: log in with a username and password and list every mailbox
//!
//! Uses the protocol driver directly, without the connection registry.
//! Many providers require an app password instead of the account password.
//!
//! ## Running
//!
//! ```bash
//! cargo run --package mailbind-imap --example list_mailboxes -- imap.example.com
//! ```

use std::io::{self, Write};

use mailbind_imap::{Client, Config, Security};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let host = std::env::args()
        .nth(1)
        .expect("usage: list_mailboxes <host>");

    print!("Username: ");
    io::stdout().flush()?;
    let mut username = String::new();
    io::stdin().read_line(&mut username)?;
    let username = username.trim();

    print!("Password: ");
    io::stdout().flush()?;
    let mut password = String::new();
    io::stdin().read_line(&mut password)?;
    let password = password.trim();

    let config = Config::new(host, Security::Implicit);
    println!("\nConnecting to {}...", config.address());
    let stream = mailbind_imap::connection::connect(&config).await?;
    let mut client = Client::new(stream).with_io_timeout(config.io_timeout);
    client.read_greeting().await?;
    println!("✓ Connected");

    client.login(username, password).await?;
    println!("✓ Authenticated as {username}\n");

    for entry in client.list("", "*").await? {
        let marker = if entry.is_selectable() { " " } else { "-" };
        println!("  {marker} {}", entry.mailbox);
    }

    client.logout().await?;
    println!("\n✓ Disconnected");
    Ok(())
}
