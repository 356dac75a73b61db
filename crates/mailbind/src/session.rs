//! A single IMAP session against one configured server.
//!
//! The session walks `Disconnected → Connected → Authenticated →
//! MailboxSelected`. Operations check the state before touching the
//! network, so calling them too early never costs a round trip. Any
//! transport-level failure drops the connection and puts the session back
//! in `Disconnected`; nothing is retried.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::iter::FusedIterator;
use std::sync::Arc;

use mailbind_imap::{
    Capability, Client, FetchAttribute, FetchItem, Flags, Greeting, ListResponse, Mailbox,
    MailboxStatus, SearchCriteria, SeqNum, Uid, UidSet, UntaggedResponse,
};
use secrecy::ExposeSecret;
use tracing::{debug, info, warn};

use crate::config::{AuthMechanism, ConnectionConfig, Encryption};
use crate::transport::{BoxedTransport, Connector};
use crate::{Error, Result};

/// Protocol state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SessionState {
    /// No transport.
    Disconnected,
    /// Greeted, not yet authenticated. Only held while
    /// [`ImapSession::open`] runs; `open` returns with the session either
    /// authenticated or `Disconnected`.
    Connected,
    /// Logged in, no mailbox selected.
    Authenticated,
    /// A mailbox is selected.
    MailboxSelected,
}

/// Part of a message to fetch. Body parts are fetched with `BODY.PEEK`,
/// so fetching never marks a message `\Seen`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FetchPart {
    /// Flags.
    Flags,
    /// Server arrival date.
    InternalDate,
    /// Size in octets.
    Size,
    /// Header block.
    Header,
    /// Body text without the header.
    Text,
    /// The entire message.
    Full,
    /// An arbitrary section specifier such as `1.2` or `1.MIME`.
    Section(String),
}

impl FetchPart {
    fn attribute(&self) -> FetchAttribute {
        match self {
            Self::Flags => FetchAttribute::Flags,
            Self::InternalDate => FetchAttribute::InternalDate,
            Self::Size => FetchAttribute::Rfc822Size,
            Self::Header => FetchAttribute::peek("HEADER"),
            Self::Text => FetchAttribute::peek("TEXT"),
            Self::Full => FetchAttribute::peek(""),
            Self::Section(section) => FetchAttribute::peek(section.clone()),
        }
    }
}

/// What the server returned for one UID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedMessage {
    /// Message UID.
    pub uid: Uid,
    /// Sequence number at fetch time.
    pub seq: SeqNum,
    /// Flags, if requested.
    pub flags: Option<Flags>,
    /// Internal date as sent by the server, if requested.
    pub internal_date: Option<String>,
    /// Size in octets, if requested.
    pub size: Option<u32>,
    sections: BTreeMap<String, Vec<u8>>,
}

impl FetchedMessage {
    /// Raw bytes of a body section; `""` is the whole message.
    /// Section names compare case-insensitively.
    #[must_use]
    pub fn section(&self, name: &str) -> Option<&[u8]> {
        self.sections
            .get(&name.to_ascii_uppercase())
            .map(Vec::as_slice)
    }

    /// Header block, if fetched.
    #[must_use]
    pub fn header(&self) -> Option<&[u8]> {
        self.section("HEADER")
    }

    /// Body text, if fetched.
    #[must_use]
    pub fn text(&self) -> Option<&[u8]> {
        self.section("TEXT")
    }

    /// Whole message, if fetched.
    #[must_use]
    pub fn full(&self) -> Option<&[u8]> {
        self.section("")
    }

    /// Merges every FETCH response that carries `uid`. `None` when the
    /// server sent nothing for it.
    fn collect(uid: Uid, responses: Vec<(SeqNum, Vec<FetchItem>)>) -> Option<Self> {
        let mut message: Option<Self> = None;
        for (seq, items) in responses {
            if !items.contains(&FetchItem::Uid(uid)) {
                continue;
            }
            let message = message.get_or_insert_with(|| Self {
                uid,
                seq,
                flags: None,
                internal_date: None,
                size: None,
                sections: BTreeMap::new(),
            });
            for item in items {
                match item {
                    FetchItem::Uid(_) => {}
                    FetchItem::Flags(flags) => message.flags = Some(flags),
                    FetchItem::InternalDate(date) => message.internal_date = Some(date),
                    FetchItem::Rfc822Size(size) => message.size = Some(size),
                    FetchItem::Body { section, data, .. } => {
                        message
                            .sections
                            .insert(section.to_ascii_uppercase(), data.unwrap_or_default());
                    }
                }
            }
        }
        message
    }
}

/// UIDs matched by one search, in server order.
#[derive(Debug, Clone)]
pub struct MessageIds {
    inner: std::vec::IntoIter<Uid>,
}

impl MessageIds {
    fn new(uids: Vec<Uid>) -> Self {
        Self {
            inner: uids.into_iter(),
        }
    }
}

impl Iterator for MessageIds {
    type Item = Uid;

    fn next(&mut self) -> Option<Uid> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for MessageIds {}

impl FusedIterator for MessageIds {}

/// One stateful IMAP session.
///
/// Not for concurrent use; the registry hands it out behind a per-name
/// lock.
pub struct ImapSession {
    config: Arc<ConnectionConfig>,
    connector: Arc<dyn Connector>,
    client: Option<Client<BoxedTransport>>,
    state: SessionState,
    selected: Option<Mailbox>,
    status: Option<MailboxStatus>,
}

impl fmt::Debug for ImapSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImapSession")
            .field("name", &self.config.name())
            .field("state", &self.state)
            .field("selected", &self.selected)
            .finish_non_exhaustive()
    }
}

impl ImapSession {
    /// Creates a disconnected session. Performs no I/O.
    #[must_use]
    pub fn new(config: Arc<ConnectionConfig>, connector: Arc<dyn Connector>) -> Self {
        Self {
            config,
            connector,
            client: None,
            state: SessionState::Disconnected,
            selected: None,
            status: None,
        }
    }

    /// Connects, upgrades with STARTTLS when configured, and authenticates.
    ///
    /// Does nothing if the session is already open.
    ///
    /// # Errors
    ///
    /// - [`Error::Connection`] if the server cannot be reached or says BYE
    /// - [`Error::Authentication`] if the credentials are rejected
    /// - [`Error::Protocol`] on malformed or unexpected server data
    /// - [`Error::Timeout`] if a deadline passes
    ///
    /// On error the session stays `Disconnected`.
    pub async fn open(&mut self) -> Result<()> {
        if self.client.is_some() {
            return Ok(());
        }

        let config = Arc::clone(&self.config);
        info!(
            connection = %config.name(),
            host = %config.host(),
            port = config.port(),
            encryption = %config.encryption(),
            "opening session"
        );

        let connector = Arc::clone(&self.connector);
        let result = match Self::connect(&config, connector.as_ref()).await {
            Ok((client, greeting)) => {
                self.state = SessionState::Connected;
                Self::login(client, greeting, &config, connector.as_ref()).await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(client) => {
                self.client = Some(client);
                self.state = SessionState::Authenticated;
                info!(connection = %config.name(), "session authenticated");
                Ok(())
            }
            Err(e) => {
                self.reset();
                warn!(connection = %config.name(), error = %e, "failed to open session");
                Err(e)
            }
        }
    }

    async fn connect(
        config: &ConnectionConfig,
        connector: &dyn Connector,
    ) -> Result<(Client<BoxedTransport>, Greeting)> {
        let stream = with_connect_deadline(config, connector.connect(config)).await?;
        let mut client = Client::new(stream).with_io_timeout(config.io_timeout());

        let greeting = client.read_greeting().await.map_err(classify)?;
        debug!(connection = %config.name(), ?greeting, "server greeted");
        Ok((client, greeting))
    }

    async fn login(
        mut client: Client<BoxedTransport>,
        greeting: Greeting,
        config: &ConnectionConfig,
        connector: &dyn Connector,
    ) -> Result<Client<BoxedTransport>> {
        if greeting == Greeting::PreAuth {
            if config.encryption() == Encryption::Tls {
                return Err(Error::Protocol(
                    "server sent PREAUTH on a connection that requires STARTTLS".to_string(),
                ));
            }
            return Ok(client);
        }

        if config.encryption() == Encryption::Tls {
            client = Self::upgrade(client, config, connector).await?;
        } else if client.capabilities().is_empty() {
            client.capability().await.map_err(classify)?;
        }

        Self::authenticate(&mut client, config).await?;
        Ok(client)
    }

    async fn upgrade(
        mut client: Client<BoxedTransport>,
        config: &ConnectionConfig,
        connector: &dyn Connector,
    ) -> Result<Client<BoxedTransport>> {
        if client.capabilities().is_empty() {
            client.capability().await.map_err(classify)?;
        }
        if !client.has_capability(&Capability::StartTls) {
            return Err(Error::Protocol(format!(
                "{} does not advertise STARTTLS",
                config.host()
            )));
        }

        let (stream, tags) = client.starttls().await.map_err(classify)?;
        let stream =
            with_connect_deadline(config, connector.starttls(stream, config.host())).await?;

        // Pre-TLS capabilities cannot be trusted.
        let mut client = Client::with_tags(stream, tags).with_io_timeout(config.io_timeout());
        client.capability().await.map_err(classify)?;
        debug!(connection = %config.name(), "connection upgraded to TLS");
        Ok(client)
    }

    async fn authenticate(
        client: &mut Client<BoxedTransport>,
        config: &ConnectionConfig,
    ) -> Result<()> {
        let username = config.username();
        let password = config.password().expose_secret();

        let plain = match config.auth_mechanism() {
            AuthMechanism::Login => false,
            AuthMechanism::Plain => true,
            AuthMechanism::Auto => {
                client.has_capability(&Capability::LoginDisabled) && client.supports_auth("PLAIN")
            }
        };

        let result = if plain {
            client.authenticate_plain(username, password).await
        } else {
            client.login(username, password).await
        };

        match result {
            Ok(()) => {
                debug!(
                    connection = %config.name(),
                    mechanism = if plain { "PLAIN" } else { "LOGIN" },
                    "authenticated"
                );
                Ok(())
            }
            Err(mailbind_imap::Error::No(reason)) => Err(Error::Authentication(reason)),
            Err(e) => Err(classify(e)),
        }
    }

    /// Selects `name`.
    ///
    /// # Errors
    ///
    /// - [`Error::NotAuthenticated`] before `open`, without any I/O
    /// - [`Error::MailboxNotFound`] if the server refuses; the session is
    ///   left `Authenticated` with no mailbox selected
    /// - transport errors as for [`open`](Self::open)
    pub async fn select_mailbox(&mut self, name: &str) -> Result<&MailboxStatus> {
        self.ensure(SessionState::Authenticated, "select_mailbox")?;
        let mailbox = Mailbox::new(name);

        let result = self.client_mut("select_mailbox")?.select(&mailbox).await;
        match result {
            Ok(status) => {
                info!(
                    connection = %self.config.name(),
                    mailbox = %mailbox,
                    exists = status.exists,
                    "mailbox selected"
                );
                self.state = SessionState::MailboxSelected;
                self.selected = Some(mailbox);
                let status = self.status.insert(status);
                Ok(&*status)
            }
            Err(mailbind_imap::Error::No(reason)) => {
                self.state = SessionState::Authenticated;
                self.selected = None;
                self.status = None;
                Err(Error::MailboxNotFound {
                    mailbox: mailbox.to_string(),
                    reason,
                })
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Selects the configured default mailbox.
    ///
    /// # Errors
    ///
    /// As [`select_mailbox`](Self::select_mailbox).
    pub async fn select_default_mailbox(&mut self) -> Result<&MailboxStatus> {
        let config = Arc::clone(&self.config);
        self.select_mailbox(config.default_mailbox()).await
    }

    /// Runs `UID SEARCH` in the selected mailbox.
    ///
    /// Every call issues a fresh query. Criteria with non-ASCII text are
    /// sent with `CHARSET UTF-8` unless a charset is configured.
    ///
    /// # Errors
    ///
    /// [`Error::NotAuthenticated`] or [`Error::NoMailboxSelected`] when
    /// called too early. [`Error::Protocol`] without any I/O if a keyword
    /// is not an atom or a date is not `d-Mon-yyyy`. Otherwise protocol and
    /// transport errors.
    pub async fn search(&mut self, criteria: &SearchCriteria) -> Result<MessageIds> {
        self.ensure(SessionState::MailboxSelected, "search")?;

        let config = Arc::clone(&self.config);
        let charset = match config.search_charset() {
            Some(charset) => Some(charset),
            None if criteria.needs_charset() => Some("UTF-8"),
            None => None,
        };

        let result = self.client_mut("search")?.uid_search(criteria, charset).await;
        match result {
            Ok(uids) => {
                debug!(connection = %config.name(), matches = uids.len(), "search complete");
                Ok(MessageIds::new(uids))
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Fetches `parts` of the message with `uid`.
    ///
    /// # Errors
    ///
    /// [`Error::MessageNotFound`] if the server has no such UID in the
    /// selected mailbox. [`Error::Protocol`] without any I/O if a
    /// [`FetchPart::Section`] is not a valid section specifier. State and
    /// transport errors otherwise.
    pub async fn fetch(&mut self, uid: Uid, parts: &[FetchPart]) -> Result<FetchedMessage> {
        self.ensure(SessionState::MailboxSelected, "fetch")?;

        let mut items = vec![FetchAttribute::Uid];
        items.extend(parts.iter().map(FetchPart::attribute));

        let result = self
            .client_mut("fetch")?
            .uid_fetch(&UidSet::single(uid), &items)
            .await;
        let responses = match result {
            Ok(responses) => responses,
            Err(mailbind_imap::Error::No(reason)) => {
                debug!(connection = %self.config.name(), uid = uid.get(), %reason, "fetch refused");
                return Err(Error::MessageNotFound(uid.get()));
            }
            Err(e) => return Err(self.fail(e)),
        };

        FetchedMessage::collect(uid, responses).ok_or(Error::MessageNotFound(uid.get()))
    }

    /// Lists every mailbox visible to the user.
    ///
    /// # Errors
    ///
    /// [`Error::NotAuthenticated`] before `open`; protocol and transport
    /// errors otherwise.
    pub async fn list_mailboxes(&mut self) -> Result<Vec<ListResponse>> {
        self.ensure(SessionState::Authenticated, "list_mailboxes")?;
        let result = self.client_mut("list_mailboxes")?.list("", "*").await;
        result.map_err(|e| self.fail(e))
    }

    /// Keep-alive. Applies any EXISTS/RECENT/EXPUNGE updates the server
    /// sends to the cached mailbox status.
    ///
    /// # Errors
    ///
    /// [`Error::NotAuthenticated`] when disconnected; transport errors
    /// otherwise.
    pub async fn noop(&mut self) -> Result<()> {
        self.ensure(SessionState::Connected, "noop")?;
        let result = self.client_mut("noop")?.noop().await;
        let updates = result.map_err(|e| self.fail(e))?;

        if let Some(status) = self.status.as_mut() {
            for update in updates {
                match update {
                    UntaggedResponse::Exists(n) => status.exists = n,
                    UntaggedResponse::Recent(n) => status.recent = n,
                    UntaggedResponse::Expunge(_) => {
                        status.exists = status.exists.saturating_sub(1);
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    /// Sends LOGOUT and releases the transport.
    ///
    /// The transport is dropped and the session is `Disconnected`
    /// whatever the outcome. A session with no transport returns `Ok`.
    ///
    /// # Errors
    ///
    /// The LOGOUT failure, for callers that want to report it.
    pub async fn logout(&mut self) -> Result<()> {
        let Some(mut client) = self.client.take() else {
            self.reset();
            return Ok(());
        };

        let result = client.logout().await;
        drop(client);
        self.reset();
        info!(connection = %self.config.name(), "session closed");
        result.map_err(classify)
    }

    /// Best-effort LOGOUT, then releases the transport. Never fails and
    /// may be called any number of times.
    pub async fn close(&mut self) {
        if let Err(e) = self.logout().await {
            warn!(connection = %self.config.name(), error = %e, "logout failed, transport released");
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// True while a transport is held.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.client.is_some()
    }

    /// True once logged in.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state >= SessionState::Authenticated
    }

    /// Selected mailbox name.
    #[must_use]
    pub fn selected_mailbox(&self) -> Option<&str> {
        self.selected.as_ref().map(Mailbox::as_str)
    }

    /// Status reported by the last successful SELECT.
    #[must_use]
    pub const fn mailbox_status(&self) -> Option<&MailboxStatus> {
        self.status.as_ref()
    }

    /// Capabilities advertised by the server; empty when disconnected.
    #[must_use]
    pub fn capabilities(&self) -> &[Capability] {
        self.client
            .as_ref()
            .map_or(&[][..], |client| client.capabilities())
    }

    /// Connection config.
    #[must_use]
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Connection name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.config.name()
    }

    fn ensure(&self, required: SessionState, operation: &'static str) -> Result<()> {
        if self.state >= required {
            return Ok(());
        }
        if required == SessionState::MailboxSelected && self.is_authenticated() {
            Err(Error::NoMailboxSelected(operation))
        } else {
            Err(Error::NotAuthenticated(operation))
        }
    }

    fn client_mut(&mut self, operation: &'static str) -> Result<&mut Client<BoxedTransport>> {
        self.client
            .as_mut()
            .ok_or(Error::NotAuthenticated(operation))
    }

    /// Maps a protocol error, dropping the transport if it is unusable.
    fn fail(&mut self, err: mailbind_imap::Error) -> Error {
        if err.is_fatal() {
            warn!(connection = %self.config.name(), error = %err, "transport lost, session disconnected");
            self.client = None;
            self.reset();
        }
        classify(err)
    }

    fn reset(&mut self) {
        self.state = SessionState::Disconnected;
        self.selected = None;
        self.status = None;
    }
}

impl Drop for ImapSession {
    fn drop(&mut self) {
        if self.client.is_some() {
            debug!(connection = %self.config.name(), "session dropped while open");
        }
    }
}

fn classify(err: mailbind_imap::Error) -> Error {
    use mailbind_imap::Error as Imap;

    match err {
        Imap::Timeout(limit) => Error::Timeout(limit),
        err @ (Imap::Io(_) | Imap::Tls(_) | Imap::InvalidDnsName(_) | Imap::Bye(_)) => {
            Error::Connection(err)
        }
        err => Error::Protocol(err.to_string()),
    }
}

async fn with_connect_deadline<T>(
    config: &ConnectionConfig,
    fut: impl Future<Output = mailbind_imap::Result<T>>,
) -> Result<T> {
    let limit = config.connect_timeout();
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(classify),
        Err(_) => Err(Error::Timeout(limit)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use tokio_test::io::{Builder, Mock};

    use super::*;
    use crate::transport::testing::ScriptedConnector;

    fn config(encryption: Encryption) -> ConnectionConfig {
        ConnectionConfig::builder("primary")
            .host("mail.example.com")
            .encryption(encryption)
            .credentials("alice", "secret")
            .build()
            .unwrap()
    }

    fn session_with(
        config: ConnectionConfig,
        scripts: Vec<Mock>,
    ) -> (ImapSession, Arc<ScriptedConnector>) {
        let connector = Arc::new(ScriptedConnector::new(scripts));
        let session = ImapSession::new(Arc::new(config), connector.clone());
        (session, connector)
    }

    fn logged_in() -> Builder {
        let mut builder = Builder::new();
        builder
            .read(b"* OK [CAPABILITY IMAP4rev1 AUTH=PLAIN] ready\r\n")
            .write(b"A0000 LOGIN alice secret\r\n")
            .read(b"A0000 OK Logged in\r\n");
        builder
    }

    fn uid(n: u32) -> Uid {
        Uid::new(n).unwrap()
    }

    #[tokio::test]
    async fn test_close_without_open_is_silent() {
        let (mut session, connector) = session_with(config(Encryption::Ssl), vec![]);
        session.close().await;
        session.close().await;
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(!session.is_open());
        assert_eq!(connector.connects(), 0);
    }

    #[tokio::test]
    async fn test_select_before_open_does_no_io() {
        let (mut session, connector) = session_with(config(Encryption::Ssl), vec![]);
        let err = session.select_mailbox("INBOX").await.unwrap_err();
        assert!(matches!(err, Error::NotAuthenticated("select_mailbox")));
        let err = session.search(&SearchCriteria::All).await.unwrap_err();
        assert!(matches!(err, Error::NotAuthenticated("search")));
        assert_eq!(connector.connects(), 0);
    }

    #[tokio::test]
    async fn test_open_select_search_fetch_close() {
        let mock = logged_in()
            .write(b"A0001 SELECT INBOX\r\n")
            .read(b"* 2 EXISTS\r\n* OK [UIDVALIDITY 7] ok\r\nA0001 OK [READ-WRITE] done\r\n")
            .write(b"A0002 UID SEARCH UNSEEN\r\n")
            .read(b"* SEARCH 5 8\r\nA0002 OK done\r\n")
            .write(b"A0003 UID SEARCH UNSEEN\r\n")
            .read(b"* SEARCH 5\r\nA0003 OK done\r\n")
            .write(b"A0004 UID FETCH 5 (UID FLAGS BODY.PEEK[HEADER])\r\n")
            .read(b"* 1 FETCH (UID 5 FLAGS (\\Seen) BODY[HEADER] {10}\r\nSubject: a)\r\n")
            .read(b"A0004 OK done\r\n")
            .write(b"A0005 LOGOUT\r\n")
            .read(b"* BYE bye\r\nA0005 OK done\r\n")
            .build();
        let (mut session, connector) = session_with(config(Encryption::Ssl), vec![mock]);

        session.open().await.unwrap();
        assert_eq!(session.state(), SessionState::Authenticated);
        assert!(session.capabilities().iter().any(|c| c.is_auth("PLAIN")));

        let status = session.select_default_mailbox().await.unwrap();
        assert_eq!(status.exists, 2);
        assert_eq!(session.state(), SessionState::MailboxSelected);
        assert_eq!(session.selected_mailbox(), Some("INBOX"));

        let first: Vec<u32> = session
            .search(&SearchCriteria::Unseen)
            .await
            .unwrap()
            .map(Uid::get)
            .collect();
        assert_eq!(first, vec![5, 8]);
        let second = session.search(&SearchCriteria::Unseen).await.unwrap();
        assert_eq!(second.len(), 1);

        let message = session
            .fetch(uid(5), &[FetchPart::Flags, FetchPart::Header])
            .await
            .unwrap();
        assert_eq!(message.seq.get(), 1);
        assert!(message.flags.as_ref().unwrap().is_seen());
        assert_eq!(message.header(), Some(&b"Subject: a"[..]));
        assert_eq!(message.text(), None);

        session.close().await;
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(session.capabilities().is_empty());
        assert_eq!(connector.connects(), 1);
    }

    #[tokio::test]
    async fn test_open_is_idempotent() {
        let mock = logged_in().build();
        let (mut session, connector) = session_with(config(Encryption::Ssl), vec![mock]);
        session.open().await.unwrap();
        session.open().await.unwrap();
        assert_eq!(connector.connects(), 1);
    }

    #[tokio::test]
    async fn test_starttls_then_login() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 STARTTLS LOGINDISABLED] ready\r\n")
            .write(b"A0000 STARTTLS\r\n")
            .read(b"A0000 OK begin TLS\r\n")
            .write(b"A0001 CAPABILITY\r\n")
            .read(b"* CAPABILITY IMAP4rev1 AUTH=PLAIN\r\nA0001 OK done\r\n")
            .write(b"A0002 LOGIN alice secret\r\n")
            .read(b"A0002 OK Logged in\r\n")
            .build();
        let (mut session, _) = session_with(config(Encryption::Tls), vec![mock]);
        session.open().await.unwrap();
        assert!(session.is_authenticated());
        assert!(!session.capabilities().contains(&Capability::StartTls));
    }

    #[tokio::test]
    async fn test_starttls_missing_is_protocol_error() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1] ready\r\n")
            .build();
        let (mut session, _) = session_with(config(Encryption::Tls), vec![mock]);
        let err = session.open().await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_auto_uses_plain_when_login_disabled() {
        // base64("\0alice\0secret")
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 LOGINDISABLED AUTH=PLAIN] ready\r\n")
            .write(b"A0000 AUTHENTICATE PLAIN\r\n")
            .read(b"+ \r\n")
            .write(b"AGFsaWNlAHNlY3JldA==\r\n")
            .read(b"A0000 OK authenticated\r\n")
            .build();
        let (mut session, _) = session_with(config(Encryption::Ssl), vec![mock]);
        session.open().await.unwrap();
        assert!(session.is_authenticated());
    }

    #[tokio::test]
    async fn test_capability_requested_when_greeting_has_none() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0000 CAPABILITY\r\n")
            .read(b"* CAPABILITY IMAP4rev1\r\nA0000 OK done\r\n")
            .write(b"A0001 LOGIN alice secret\r\n")
            .read(b"A0001 OK Logged in\r\n")
            .build();
        let (mut session, _) = session_with(config(Encryption::None), vec![mock]);
        session.open().await.unwrap();
    }

    #[tokio::test]
    async fn test_rejected_credentials() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1] ready\r\n")
            .write(b"A0000 LOGIN alice secret\r\n")
            .read(b"A0000 NO [AUTHENTICATIONFAILED] Invalid credentials\r\n")
            .build();
        let (mut session, _) = session_with(config(Encryption::Ssl), vec![mock]);
        let err = session.open().await.unwrap_err();
        assert!(matches!(err, Error::Authentication(ref r) if r == "Invalid credentials"));
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(!session.is_open());
    }

    #[tokio::test]
    async fn test_bye_greeting_is_connection_error() {
        let mock = Builder::new().read(b"* BYE too busy\r\n").build();
        let (mut session, _) = session_with(config(Encryption::Ssl), vec![mock]);
        let err = session.open().await.unwrap_err();
        assert!(matches!(err, Error::Connection(mailbind_imap::Error::Bye(_))));
    }

    #[tokio::test]
    async fn test_unreachable_server() {
        let (mut session, _) = session_with(config(Encryption::Ssl), vec![]);
        let err = session.open().await.unwrap_err();
        assert!(matches!(err, Error::Connection(_)));
        assert!(err.is_disconnect());
    }

    #[tokio::test]
    async fn test_preauth_skips_login() {
        let mock = Builder::new()
            .read(b"* PREAUTH [CAPABILITY IMAP4rev1] welcome\r\n")
            .build();
        let (mut session, _) = session_with(config(Encryption::Ssl), vec![mock]);
        session.open().await.unwrap();
        assert_eq!(session.state(), SessionState::Authenticated);
    }

    #[tokio::test]
    async fn test_failed_select_falls_back_to_authenticated() {
        let mock = logged_in()
            .write(b"A0001 SELECT INBOX\r\n")
            .read(b"* 1 EXISTS\r\nA0001 OK done\r\n")
            .write(b"A0002 SELECT Nope\r\n")
            .read(b"A0002 NO [NONEXISTENT] no such mailbox\r\n")
            .build();
        let (mut session, _) = session_with(config(Encryption::Ssl), vec![mock]);
        session.open().await.unwrap();
        session.select_mailbox("inbox").await.unwrap();

        let err = session.select_mailbox("Nope").await.unwrap_err();
        assert!(matches!(
            err,
            Error::MailboxNotFound { ref mailbox, ref reason }
                if mailbox == "Nope" && reason == "no such mailbox"
        ));
        assert_eq!(session.state(), SessionState::Authenticated);
        assert_eq!(session.selected_mailbox(), None);
        assert!(session.mailbox_status().is_none());

        let err = session.search(&SearchCriteria::All).await.unwrap_err();
        assert!(matches!(err, Error::NoMailboxSelected("search")));
    }

    #[tokio::test]
    async fn test_fetch_unknown_uid() {
        let mock = logged_in()
            .write(b"A0001 SELECT INBOX\r\n")
            .read(b"A0001 OK done\r\n")
            .write(b"A0002 UID FETCH 99 (UID BODY.PEEK[])\r\n")
            .read(b"A0002 OK done\r\n")
            .build();
        let (mut session, _) = session_with(config(Encryption::Ssl), vec![mock]);
        session.open().await.unwrap();
        session.select_mailbox("INBOX").await.unwrap();

        let err = session.fetch(uid(99), &[FetchPart::Full]).await.unwrap_err();
        assert!(matches!(err, Error::MessageNotFound(99)));
        assert_eq!(session.state(), SessionState::MailboxSelected);
    }

    #[tokio::test]
    async fn test_search_sends_configured_charset() {
        let config = ConnectionConfig::builder("primary")
            .host("mail.example.com")
            .credentials("alice", "secret")
            .search_charset("UTF-8")
            .build()
            .unwrap();
        let mock = logged_in()
            .write(b"A0001 SELECT INBOX\r\n")
            .read(b"A0001 OK done\r\n")
            .write(b"A0002 UID SEARCH CHARSET UTF-8 SEEN\r\n")
            .read(b"* SEARCH\r\nA0002 OK done\r\n")
            .build();
        let (mut session, _) = session_with(config, vec![mock]);
        session.open().await.unwrap();
        session.select_mailbox("INBOX").await.unwrap();
        let ids = session.search(&SearchCriteria::Seen).await.unwrap();
        assert_eq!(ids.count(), 0);
    }

    #[tokio::test]
    async fn test_transport_failure_disconnects() {
        let mock = logged_in().write(b"A0001 NOOP\r\n").build();
        let (mut session, _) = session_with(config(Encryption::Ssl), vec![mock]);
        session.open().await.unwrap();

        let err = session.noop().await.unwrap_err();
        assert!(err.is_disconnect());
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(!session.is_open());

        session.close().await;
    }

    #[tokio::test]
    async fn test_noop_updates_status() {
        let mock = logged_in()
            .write(b"A0001 SELECT INBOX\r\n")
            .read(b"* 3 EXISTS\r\nA0001 OK done\r\n")
            .write(b"A0002 NOOP\r\n")
            .read(b"* 2 EXPUNGE\r\n* 1 RECENT\r\nA0002 OK done\r\n")
            .build();
        let (mut session, _) = session_with(config(Encryption::Ssl), vec![mock]);
        session.open().await.unwrap();
        session.select_mailbox("INBOX").await.unwrap();
        session.noop().await.unwrap();

        let status = session.mailbox_status().unwrap();
        assert_eq!(status.exists, 2);
        assert_eq!(status.recent, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_io_deadline() {
        let config = ConnectionConfig::builder("primary")
            .host("mail.example.com")
            .credentials("alice", "secret")
            .io_timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1] ready\r\n")
            .write(b"A0000 LOGIN alice secret\r\n")
            .wait(Duration::from_secs(30))
            .build();
        let (mut session, _) = session_with(config, vec![mock]);
        let err = session.open().await.unwrap_err();
        assert!(matches!(err, Error::Timeout(d) if d == Duration::from_secs(5)));
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    fn with_connect_timeout(encryption: Encryption, limit: Duration) -> ConnectionConfig {
        ConnectionConfig::builder("primary")
            .host("mail.example.com")
            .encryption(encryption)
            .credentials("alice", "secret")
            .connect_timeout(limit)
            .build()
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_deadline() {
        let stall = Duration::from_secs(60);
        let connector = Arc::new(ScriptedConnector::default().with_delay(stall));
        let config = with_connect_timeout(Encryption::Ssl, Duration::from_secs(3));
        let mut session = ImapSession::new(Arc::new(config), connector.clone());

        let err = session.open().await.unwrap_err();
        assert!(matches!(err, Error::Timeout(d) if d == Duration::from_secs(3)));
        assert!(err.is_disconnect());
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(!session.is_open());
        assert_eq!(connector.connects(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_starttls_handshake_deadline() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 STARTTLS] ready\r\n")
            .write(b"A0000 STARTTLS\r\n")
            .read(b"A0000 OK begin TLS\r\n")
            .build();
        let stall = Duration::from_secs(60);
        let connector = Arc::new(ScriptedConnector::new([mock]).with_handshake_delay(stall));
        let config = with_connect_timeout(Encryption::Tls, Duration::from_secs(3));
        let mut session = ImapSession::new(Arc::new(config), connector);

        let err = session.open().await.unwrap_err();
        assert!(matches!(err, Error::Timeout(d) if d == Duration::from_secs(3)));
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(!session.is_open());
    }

    #[tokio::test]
    async fn test_open_ends_authenticated() {
        let mock = logged_in()
            .write(b"A0001 NOOP\r\n")
            .read(b"A0001 OK done\r\n")
            .build();
        let (mut session, _) = session_with(config(Encryption::Ssl), vec![mock]);
        session.open().await.unwrap();
        assert_eq!(session.state(), SessionState::Authenticated);
        assert!(session.selected_mailbox().is_none());
        session.noop().await.unwrap();
        assert_eq!(session.state(), SessionState::Authenticated);
    }

    #[tokio::test]
    async fn test_auto_prefers_login_when_allowed() {
        // AUTH=PLAIN alone does not switch away from LOGIN.
        let mock = logged_in().build();
        let (mut session, _) = session_with(config(Encryption::Ssl), vec![mock]);
        session.open().await.unwrap();
        assert!(session.capabilities().iter().any(|c| c.is_auth("PLAIN")));
    }

    #[tokio::test]
    async fn test_malformed_section_is_rejected_before_sending() {
        let mock = logged_in()
            .write(b"A0001 SELECT INBOX\r\n")
            .read(b"* 1 EXISTS\r\nA0001 OK done\r\n")
            .build();
        let (mut session, _) = session_with(config(Encryption::Ssl), vec![mock]);
        session.open().await.unwrap();
        session.select_mailbox("INBOX").await.unwrap();

        let injected = FetchPart::Section("])\r\nX1 DELETE INBOX\r\nX2 NOOP ".into());
        let err = session.fetch(uid(5), &[injected]).await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
        assert_eq!(session.state(), SessionState::MailboxSelected);
        assert!(session.is_open());
    }

    #[tokio::test]
    async fn test_malformed_keyword_is_rejected_before_sending() {
        let mock = logged_in()
            .write(b"A0001 SELECT INBOX\r\n")
            .read(b"* 1 EXISTS\r\nA0001 OK done\r\n")
            .build();
        let (mut session, _) = session_with(config(Encryption::Ssl), vec![mock]);
        session.open().await.unwrap();
        session.select_mailbox("INBOX").await.unwrap();

        let criteria = SearchCriteria::Keyword("urgent\r\nX1 DELETE INBOX".into());
        let err = session.search(&criteria).await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
        let err = session
            .search(&SearchCriteria::Since("yesterday".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
        assert_eq!(session.state(), SessionState::MailboxSelected);
    }

    #[tokio::test]
    async fn test_logout_failure_still_releases() {
        let mock = logged_in()
            .write(b"A0001 LOGOUT\r\n")
            .read(b"A0001 BAD not now\r\n")
            .build();
        let (mut session, _) = session_with(config(Encryption::Ssl), vec![mock]);
        session.open().await.unwrap();

        let err = session.logout().await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
        assert!(!session.is_open());
        session.logout().await.unwrap();
    }
}
