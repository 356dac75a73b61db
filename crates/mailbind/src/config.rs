//! Connection configuration.
//!
//! [`ConnectionConfig`] is the validated, immutable record a session is
//! built from. [`ConnectionsConfig`] / [`ConnectionSettings`] are the
//! loosely typed input records an application deserializes from whatever
//! format it uses; [`ConnectionsConfig::into_configs`] validates them.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use mailbind_imap::Security;
use secrecy::SecretString;
use serde::Deserialize;

use crate::{Error, Result};

/// Transport protection, as named in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encryption {
    /// `none`: plaintext.
    None,
    /// `ssl`: TLS from the first byte.
    Ssl,
    /// `tls`: plaintext connect upgraded with STARTTLS.
    Tls,
}

impl Encryption {
    /// Conventional port: 993 for `ssl`, 143 otherwise.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        self.security().default_port()
    }

    /// Protocol-layer security mode.
    #[must_use]
    pub const fn security(self) -> Security {
        match self {
            Self::None => Security::None,
            Self::Ssl => Security::Implicit,
            Self::Tls => Security::StartTls,
        }
    }

    /// Configuration spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Ssl => "ssl",
            Self::Tls => "tls",
        }
    }
}

impl FromStr for Encryption {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "ssl" => Ok(Self::Ssl),
            "tls" => Ok(Self::Tls),
            other => Err(Error::InvalidConfig(format!(
                "unknown encryption '{other}' (expected none, ssl or tls)"
            ))),
        }
    }
}

impl fmt::Display for Encryption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the session authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AuthMechanism {
    /// LOGIN, unless the server advertises both LOGINDISABLED and
    /// AUTH=PLAIN; then AUTHENTICATE PLAIN.
    #[default]
    Auto,
    /// Always LOGIN.
    Login,
    /// Always AUTHENTICATE PLAIN.
    Plain,
}

impl AuthMechanism {
    /// Configuration spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Login => "login",
            Self::Plain => "plain",
        }
    }
}

impl FromStr for AuthMechanism {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "login" => Ok(Self::Login),
            "plain" => Ok(Self::Plain),
            other => Err(Error::InvalidConfig(format!(
                "unknown auth mechanism '{other}' (expected auto, login or plain)"
            ))),
        }
    }
}

impl fmt::Display for AuthMechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What `register` does with a name that is already taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Reject with [`Error::DuplicateName`]; the existing entry stays.
    #[default]
    Strict,
    /// Replace the existing entry.
    Overwrite,
}

/// Validated parameters of one named connection.
#[derive(Clone)]
pub struct ConnectionConfig {
    name: String,
    host: String,
    port: u16,
    encryption: Encryption,
    username: String,
    password: SecretString,
    default_mailbox: String,
    auth_mechanism: AuthMechanism,
    search_charset: Option<String>,
    connect_timeout: Duration,
    io_timeout: Duration,
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("encryption", &self.encryption)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("default_mailbox", &self.default_mailbox)
            .field("auth_mechanism", &self.auth_mechanism)
            .field("search_charset", &self.search_charset)
            .field("connect_timeout", &self.connect_timeout)
            .field("io_timeout", &self.io_timeout)
            .finish()
    }
}

impl ConnectionConfig {
    /// Default mailbox when none is configured.
    pub const DEFAULT_MAILBOX: &'static str = "INBOX";

    /// Starts a builder for the connection called `name`.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> ConnectionConfigBuilder {
        ConnectionConfigBuilder::new(name)
    }

    /// Registry key.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Server hostname.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Server port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Transport protection.
    #[must_use]
    pub const fn encryption(&self) -> Encryption {
        self.encryption
    }

    /// Login name.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Password. Use `secrecy::ExposeSecret` to read it.
    #[must_use]
    pub const fn password(&self) -> &SecretString {
        &self.password
    }

    /// Mailbox opened by `select_default_mailbox`.
    #[must_use]
    pub fn default_mailbox(&self) -> &str {
        &self.default_mailbox
    }

    /// Authentication mechanism.
    #[must_use]
    pub const fn auth_mechanism(&self) -> AuthMechanism {
        self.auth_mechanism
    }

    /// CHARSET sent with UID SEARCH, if any.
    #[must_use]
    pub fn search_charset(&self) -> Option<&str> {
        self.search_charset.as_deref()
    }

    /// Deadline for establishing the transport.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Deadline for each command exchange.
    #[must_use]
    pub const fn io_timeout(&self) -> Duration {
        self.io_timeout
    }

    /// Protocol-layer transport config.
    #[must_use]
    pub fn transport_config(&self) -> mailbind_imap::Config {
        mailbind_imap::Config::builder(self.host.clone())
            .port(self.port)
            .security(self.encryption.security())
            .connect_timeout(self.connect_timeout)
            .io_timeout(self.io_timeout)
            .build()
    }
}

/// Builder for [`ConnectionConfig`]; [`build`](Self::build) validates.
#[derive(Debug, Clone)]
pub struct ConnectionConfigBuilder {
    name: String,
    host: String,
    port: Option<u16>,
    encryption: Encryption,
    username: String,
    password: Option<SecretString>,
    default_mailbox: String,
    auth_mechanism: AuthMechanism,
    search_charset: Option<String>,
    connect_timeout: Duration,
    io_timeout: Duration,
}

impl ConnectionConfigBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: String::new(),
            port: None,
            encryption: Encryption::Ssl,
            username: String::new(),
            password: None,
            default_mailbox: ConnectionConfig::DEFAULT_MAILBOX.to_string(),
            auth_mechanism: AuthMechanism::default(),
            search_charset: None,
            connect_timeout: mailbind_imap::Config::DEFAULT_CONNECT_TIMEOUT,
            io_timeout: mailbind_imap::Config::DEFAULT_IO_TIMEOUT,
        }
    }

    /// Server hostname.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Server port; defaults to the encryption's port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Transport protection; defaults to `ssl`.
    #[must_use]
    pub const fn encryption(mut self, encryption: Encryption) -> Self {
        self.encryption = encryption;
        self
    }

    /// Username and password.
    #[must_use]
    pub fn credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<SecretString>,
    ) -> Self {
        self.username = username.into();
        self.password = Some(password.into());
        self
    }

    /// Mailbox for `select_default_mailbox`; defaults to `INBOX`.
    #[must_use]
    pub fn default_mailbox(mut self, mailbox: impl Into<String>) -> Self {
        self.default_mailbox = mailbox.into();
        self
    }

    /// Authentication mechanism; defaults to `auto`.
    #[must_use]
    pub const fn auth_mechanism(mut self, mechanism: AuthMechanism) -> Self {
        self.auth_mechanism = mechanism;
        self
    }

    /// CHARSET for UID SEARCH.
    #[must_use]
    pub fn search_charset(mut self, charset: impl Into<String>) -> Self {
        self.search_charset = Some(charset.into());
        self
    }

    /// Connect deadline.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Per-exchange deadline.
    #[must_use]
    pub const fn io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Validates and builds the config.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidConfig`] if a required field is empty, the port is
    /// 0 or a timeout is zero.
    pub fn build(self) -> Result<ConnectionConfig> {
        let invalid = |what: &str| Err(Error::InvalidConfig(what.to_string()));

        if self.name.trim().is_empty() {
            return invalid("connection name must not be empty");
        }
        if self.host.trim().is_empty() {
            return invalid("host must not be empty");
        }
        if self.port == Some(0) {
            return invalid("port must be in 1..=65535");
        }
        if self.username.is_empty() {
            return invalid("username must not be empty");
        }
        let Some(password) = self.password else {
            return invalid("password must be set");
        };
        if self.default_mailbox.trim().is_empty() {
            return invalid("default mailbox must not be empty");
        }
        if self
            .search_charset
            .as_deref()
            .is_some_and(|c| c.trim().is_empty())
        {
            return invalid("search charset must not be blank");
        }
        if self.connect_timeout.is_zero() || self.io_timeout.is_zero() {
            return invalid("timeouts must be greater than zero");
        }

        Ok(ConnectionConfig {
            port: self.port.unwrap_or_else(|| self.encryption.default_port()),
            name: self.name,
            host: self.host.trim().to_string(),
            encryption: self.encryption,
            username: self.username,
            password,
            default_mailbox: self.default_mailbox,
            auth_mechanism: self.auth_mechanism,
            search_charset: self.search_charset,
            connect_timeout: self.connect_timeout,
            io_timeout: self.io_timeout,
        })
    }
}

/// One connection record as it appears in application configuration.
#[derive(Clone, Deserialize)]
pub struct ConnectionSettings {
    /// Server hostname.
    pub host: String,

    /// Server port; omitted means the encryption's default.
    #[serde(default)]
    pub port: Option<i64>,

    /// `none`, `ssl` or `tls`.
    #[serde(default = "default_encryption")]
    pub encryption: String,

    /// Login name.
    pub username: String,

    /// Password.
    pub password: SecretString,

    /// Mailbox opened by default.
    #[serde(default = "default_mailbox")]
    pub default_mailbox: String,

    /// `auto`, `login` or `plain`.
    #[serde(default)]
    pub auth_mechanism: Option<String>,

    /// CHARSET for UID SEARCH, e.g. `UTF-8`.
    #[serde(default)]
    pub search_charset: Option<String>,

    /// Connect deadline in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Per-exchange deadline in seconds.
    #[serde(default = "default_io_timeout_secs")]
    pub io_timeout_secs: u64,
}

impl fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("encryption", &self.encryption)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("default_mailbox", &self.default_mailbox)
            .field("auth_mechanism", &self.auth_mechanism)
            .field("search_charset", &self.search_charset)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("io_timeout_secs", &self.io_timeout_secs)
            .finish()
    }
}

fn default_encryption() -> String {
    Encryption::Ssl.as_str().to_string()
}

fn default_mailbox() -> String {
    ConnectionConfig::DEFAULT_MAILBOX.to_string()
}

const fn default_connect_timeout_secs() -> u64 {
    30
}

const fn default_io_timeout_secs() -> u64 {
    60
}

impl ConnectionSettings {
    /// Validates the record as the connection called `name`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidConfig`] for any field that fails validation.
    pub fn into_config(self, name: impl Into<String>) -> Result<ConnectionConfig> {
        let encryption: Encryption = self.encryption.parse()?;

        let mut builder = ConnectionConfig::builder(name)
            .host(self.host)
            .encryption(encryption)
            .credentials(self.username, self.password)
            .default_mailbox(self.default_mailbox)
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .io_timeout(Duration::from_secs(self.io_timeout_secs));

        if let Some(port) = self.port {
            let port = u16::try_from(port)
                .ok()
                .filter(|&p| p != 0)
                .ok_or_else(|| {
                    Error::InvalidConfig(format!("port {port} is outside 1..=65535"))
                })?;
            builder = builder.port(port);
        }
        if let Some(mechanism) = self.auth_mechanism {
            builder = builder.auth_mechanism(mechanism.parse()?);
        }
        if let Some(charset) = self.search_charset {
            builder = builder.search_charset(charset);
        }
        builder.build()
    }
}

/// Named connections plus the duplicate policy for the registry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConnectionsConfig {
    /// Connection name to record.
    #[serde(default)]
    pub connections: BTreeMap<String, ConnectionSettings>,

    /// Policy applied when names collide at `register` time.
    #[serde(default)]
    pub duplicates: DuplicatePolicy,
}

impl ConnectionsConfig {
    /// Validates every record, in name order.
    ///
    /// # Errors
    ///
    /// The first [`Error::InvalidConfig`], prefixed with the connection
    /// name.
    pub fn into_configs(self) -> Result<Vec<ConnectionConfig>> {
        self.connections
            .into_iter()
            .map(|(name, settings)| {
                settings.into_config(name.clone()).map_err(|e| match e {
                    Error::InvalidConfig(msg) => {
                        Error::InvalidConfig(format!("connection '{name}': {msg}"))
                    }
                    other => other,
                })
            })
            .collect()
    }
}
