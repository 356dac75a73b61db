//! Named connections and their cached sessions.
//!
//! The registry maps each connection name to its config and a session
//! slot. The map sits behind a `parking_lot::RwLock` that is only held for
//! lookups. Each slot has its own async mutex; [`ConnectionRegistry::get_session`]
//! holds it while checking, opening and handing out the session, so at most
//! one session is ever built per name and callers take turns using it.

use std::collections::HashMap;
use std::collections::hash_map::Entry as MapEntry;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{Mutex, OwnedMappedMutexGuard, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::config::{ConnectionConfig, ConnectionsConfig, DuplicatePolicy};
use crate::session::ImapSession;
use crate::transport::{Connector, TcpConnector};
use crate::{Error, Result};

type Slot = Arc<Mutex<Option<ImapSession>>>;

struct Entry {
    config: Arc<ConnectionConfig>,
    slot: Slot,
}

/// Registry of named IMAP connections.
pub struct ConnectionRegistry {
    entries: RwLock<HashMap<String, Arc<Entry>>>,
    policy: DuplicatePolicy,
    connector: Arc<dyn Connector>,
}

impl fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("names", &self.names())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new(DuplicatePolicy::default())
    }
}

impl ConnectionRegistry {
    /// Empty registry that connects over TCP.
    #[must_use]
    pub fn new(policy: DuplicatePolicy) -> Self {
        Self::with_connector(policy, Arc::new(TcpConnector))
    }

    /// Empty registry with a custom transport.
    #[must_use]
    pub fn with_connector(policy: DuplicatePolicy, connector: Arc<dyn Connector>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            policy,
            connector,
        }
    }

    /// Registry populated from configuration, using its duplicate policy.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidConfig`] for the first invalid connection record.
    pub fn from_config(config: ConnectionsConfig) -> Result<Self> {
        let registry = Self::new(config.duplicates);
        for connection in config.into_configs()? {
            registry.register(connection)?;
        }
        Ok(registry)
    }

    /// Adds a connection.
    ///
    /// # Errors
    ///
    /// [`Error::DuplicateName`] under [`DuplicatePolicy::Strict`] when the
    /// name is taken; the existing entry is left as it was.
    pub fn register(&self, config: ConnectionConfig) -> Result<()> {
        let name = config.name().to_string();
        let entry = Arc::new(Entry {
            config: Arc::new(config),
            slot: Arc::new(Mutex::new(None)),
        });

        match self.entries.write().entry(name) {
            MapEntry::Occupied(occupied) if self.policy == DuplicatePolicy::Strict => {
                Err(Error::DuplicateName(occupied.key().clone()))
            }
            MapEntry::Occupied(mut occupied) => {
                info!(connection = %occupied.key(), "connection replaced");
                occupied.insert(entry);
                Ok(())
            }
            MapEntry::Vacant(vacant) => {
                debug!(connection = %vacant.key(), "connection registered");
                vacant.insert(entry);
                Ok(())
            }
        }
    }

    /// Returns the session for `name`, opening one if none is cached or
    /// the cached one lost its transport.
    ///
    /// The guard holds the connection's lock; other callers asking for the
    /// same name wait until it is dropped.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownConnection`] if `name` is not registered, otherwise
    /// whatever [`ImapSession::open`] fails with. A failed open leaves
    /// nothing cached.
    pub async fn get_session(&self, name: &str) -> Result<SessionGuard> {
        let entry = self.entry(name)?;
        let mut slot = Arc::clone(&entry.slot).lock_owned().await;

        let session = match slot.take() {
            Some(session) if session.is_open() => session,
            stale => {
                if stale.is_some() {
                    debug!(connection = %name, "cached session lost its transport, reopening");
                }
                let mut session =
                    ImapSession::new(Arc::clone(&entry.config), Arc::clone(&self.connector));
                session.open().await?;
                session
            }
        };

        Ok(SessionGuard {
            inner: OwnedMutexGuard::map(slot, |slot| slot.insert(session)),
        })
    }

    /// Opens and closes a throw-away session to check that `name` is
    /// reachable and its credentials work. The cached session is not
    /// touched.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownConnection`] or the open failure.
    pub async fn test_connection(&self, name: &str) -> Result<()> {
        let entry = self.entry(name)?;
        let mut session = ImapSession::new(Arc::clone(&entry.config), Arc::clone(&self.connector));
        session.open().await?;
        session.close().await;
        info!(connection = %name, "connection test succeeded");
        Ok(())
    }

    /// Closes and evicts the cached session of `name`. Returns whether one
    /// was cached.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownConnection`] if `name` is not registered.
    pub async fn close_session(&self, name: &str) -> Result<bool> {
        let entry = self.entry(name)?;
        let session = entry.slot.lock().await.take();
        match session {
            Some(mut session) => {
                session.close().await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Closes every cached session and empties the cache.
    ///
    /// Every session is released even if some LOGOUTs fail; failures are
    /// collected in the report. Connections stay registered. Waits for
    /// outstanding [`SessionGuard`]s, so do not call it while holding one.
    pub async fn close_all(&self) -> CloseReport {
        let mut entries: Vec<(String, Arc<Entry>)> = self
            .entries
            .read()
            .iter()
            .map(|(name, entry)| (name.clone(), Arc::clone(entry)))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let mut report = CloseReport::default();
        for (name, entry) in entries {
            let session = entry.slot.lock().await.take();
            let Some(mut session) = session else {
                continue;
            };
            match session.logout().await {
                Ok(()) => report.closed.push(name),
                Err(e) => {
                    warn!(connection = %name, error = %e, "failed to close session");
                    report.failures.push((name, e));
                }
            }
        }

        info!(
            closed = report.closed.len(),
            failed = report.failures.len(),
            "all sessions closed"
        );
        report
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// True if `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().contains_key(name)
    }

    /// Config registered under `name`.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownConnection`] if `name` is not registered.
    pub fn config(&self, name: &str) -> Result<Arc<ConnectionConfig>> {
        Ok(Arc::clone(&self.entry(name)?.config))
    }

    /// Number of registered connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// True if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Duplicate policy.
    #[must_use]
    pub const fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    fn entry(&self, name: &str) -> Result<Arc<Entry>> {
        self.entries
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownConnection(name.to_string()))
    }
}

/// Exclusive access to a cached session. Releases the connection's lock
/// on drop; the session stays cached.
pub struct SessionGuard {
    inner: OwnedMappedMutexGuard<Option<ImapSession>, ImapSession>,
}

impl Deref for SessionGuard {
    type Target = ImapSession;

    fn deref(&self) -> &ImapSession {
        &self.inner
    }
}

impl DerefMut for SessionGuard {
    fn deref_mut(&mut self) -> &mut ImapSession {
        &mut self.inner
    }
}

impl fmt::Debug for SessionGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SessionGuard").field(&*self.inner).finish()
    }
}

/// Outcome of [`ConnectionRegistry::close_all`].
#[derive(Debug, Default)]
pub struct CloseReport {
    /// Connections whose session closed cleanly.
    pub closed: Vec<String>,
    /// Connections whose LOGOUT failed. Their transports were released
    /// anyway.
    pub failures: Vec<(String, Error)>,
}

impl CloseReport {
    /// True if no close failed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use tokio_test::io::{Builder, Mock};

    use super::*;
    use crate::config::Encryption;
    use crate::session::SessionState;
    use crate::transport::testing::ScriptedConnector;

    fn primary() -> ConnectionConfig {
        ConnectionConfig::builder("primary")
            .host("mail.example.com")
            .port(993)
            .encryption(Encryption::Ssl)
            .credentials("alice", "secret")
            .build()
            .unwrap()
    }

    fn named(name: &str, host: &str) -> ConnectionConfig {
        ConnectionConfig::builder(name)
            .host(host)
            .credentials("alice", "secret")
            .build()
            .unwrap()
    }

    fn server() -> Builder {
        let mut builder = Builder::new();
        builder
            .read(b"* OK [CAPABILITY IMAP4rev1] ready\r\n")
            .write(b"A0000 LOGIN alice secret\r\n")
            .read(b"A0000 OK Logged in\r\n");
        builder
    }

    fn registry(
        policy: DuplicatePolicy,
        scripts: Vec<Mock>,
    ) -> (ConnectionRegistry, Arc<ScriptedConnector>) {
        let connector = Arc::new(ScriptedConnector::new(scripts));
        (
            ConnectionRegistry::with_connector(policy, connector.clone()),
            connector,
        )
    }

    #[tokio::test]
    async fn test_unknown_connection() {
        let (registry, connector) = registry(DuplicatePolicy::Strict, vec![]);
        registry.register(primary()).unwrap();
        let err = registry.get_session("missing").await.unwrap_err();
        assert!(matches!(err, Error::UnknownConnection(ref n) if n == "missing"));
        assert!(matches!(
            registry.config("missing"),
            Err(Error::UnknownConnection(_))
        ));
        assert_eq!(connector.connects(), 0);
    }

    #[test]
    fn test_strict_rejects_duplicate() {
        let (registry, _) = registry(DuplicatePolicy::Strict, vec![]);
        registry.register(named("primary", "first.example.com")).unwrap();
        let err = registry
            .register(named("primary", "second.example.com"))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateName(ref n) if n == "primary"));
        assert_eq!(registry.config("primary").unwrap().host(), "first.example.com");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_overwrite_replaces() {
        let (registry, _) = registry(DuplicatePolicy::Overwrite, vec![]);
        registry.register(named("primary", "first.example.com")).unwrap();
        registry.register(named("primary", "second.example.com")).unwrap();
        assert_eq!(registry.config("primary").unwrap().host(), "second.example.com");
        assert_eq!(registry.policy(), DuplicatePolicy::Overwrite);
    }

    #[test]
    fn test_introspection() {
        let (registry, _) = registry(DuplicatePolicy::Strict, vec![]);
        assert!(registry.is_empty());
        registry.register(named("work", "imap.work.example")).unwrap();
        registry.register(named("home", "imap.home.example")).unwrap();
        assert_eq!(registry.names(), vec!["home", "work"]);
        assert!(registry.contains("work"));
        assert!(!registry.contains("play"));
    }

    #[tokio::test]
    async fn test_get_session_opens_and_selects() {
        let mock = server()
            .write(b"A0001 SELECT INBOX\r\n")
            .read(b"* 4 EXISTS\r\nA0001 OK [READ-WRITE] done\r\n")
            .build();
        let (registry, _) = registry(DuplicatePolicy::Strict, vec![mock]);
        registry.register(primary()).unwrap();

        let mut session = registry.get_session("primary").await.unwrap();
        assert!(session.is_open());
        assert_eq!(session.state(), SessionState::Authenticated);
        session.select_mailbox("INBOX").await.unwrap();
        assert_eq!(session.state(), SessionState::MailboxSelected);
    }

    #[tokio::test]
    async fn test_session_is_reused() {
        let (registry, connector) = registry(DuplicatePolicy::Strict, vec![server().build()]);
        registry.register(primary()).unwrap();

        drop(registry.get_session("primary").await.unwrap());
        let session = registry.get_session("primary").await.unwrap();
        assert!(session.is_open());
        assert_eq!(connector.connects(), 1);
    }

    async fn open_and_release(registry: &ConnectionRegistry) -> bool {
        let session = registry.get_session("primary").await.unwrap();
        session.is_open()
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_get_session_connects_once() {
        let connector = Arc::new(
            ScriptedConnector::new([server().build()]).with_delay(Duration::from_millis(50)),
        );
        let registry =
            ConnectionRegistry::with_connector(DuplicatePolicy::Strict, connector.clone());
        registry.register(primary()).unwrap();

        let (a, b) = tokio::join!(open_and_release(&registry), open_and_release(&registry));
        assert!(a && b);
        assert_eq!(connector.connects(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_timeout_caches_nothing() {
        let stall = Duration::from_secs(120);
        let connector = Arc::new(ScriptedConnector::default().with_delay(stall));
        let registry =
            ConnectionRegistry::with_connector(DuplicatePolicy::Strict, connector.clone());
        let config = ConnectionConfig::builder("primary")
            .host("mail.example.com")
            .credentials("alice", "secret")
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap();
        registry.register(config).unwrap();

        let err = registry.get_session("primary").await.unwrap_err();
        assert!(matches!(err, Error::Timeout(d) if d == Duration::from_secs(10)));
        assert!(!registry.close_session("primary").await.unwrap());
        assert!(registry.close_all().await.closed.is_empty());
        assert_eq!(connector.connects(), 1);
    }

    #[tokio::test]
    async fn test_failed_open_caches_nothing() {
        let rejected = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1] ready\r\n")
            .write(b"A0000 LOGIN alice secret\r\n")
            .read(b"A0000 NO nope\r\n")
            .build();
        let (registry, connector) =
            registry(DuplicatePolicy::Strict, vec![rejected, server().build()]);
        registry.register(primary()).unwrap();

        let err = registry.get_session("primary").await.unwrap_err();
        assert!(matches!(err, Error::Authentication(_)));

        let session = registry.get_session("primary").await.unwrap();
        assert!(session.is_authenticated());
        assert_eq!(connector.connects(), 2);
    }

    #[tokio::test]
    async fn test_disconnected_session_is_reopened() {
        let dropped = server().write(b"A0001 NOOP\r\n").build();
        let (registry, connector) =
            registry(DuplicatePolicy::Strict, vec![dropped, server().build()]);
        registry.register(primary()).unwrap();

        {
            let mut session = registry.get_session("primary").await.unwrap();
            assert!(session.noop().await.is_err());
            assert!(!session.is_open());
        }
        let session = registry.get_session("primary").await.unwrap();
        assert!(session.is_open());
        assert_eq!(connector.connects(), 2);
    }

    #[tokio::test]
    async fn test_test_connection_leaves_cache_alone() {
        let probe = server()
            .write(b"A0001 LOGOUT\r\n")
            .read(b"* BYE logging out\r\nA0001 OK bye\r\n")
            .build();
        let (registry, connector) = registry(DuplicatePolicy::Strict, vec![probe]);
        registry.register(primary()).unwrap();

        registry.test_connection("primary").await.unwrap();
        assert_eq!(connector.connects(), 1);
        assert!(!registry.close_session("primary").await.unwrap());
    }

    #[tokio::test]
    async fn test_close_all_collects_failures() {
        let clean = server()
            .write(b"A0001 LOGOUT\r\n")
            .read(b"* BYE logging out\r\nA0001 OK bye\r\n")
            .build();
        let refusing = server()
            .write(b"A0001 LOGOUT\r\n")
            .read(b"A0001 BAD not now\r\n")
            .build();
        let (registry, _) = registry(DuplicatePolicy::Strict, vec![clean, refusing]);
        registry.register(named("alpha", "a.example.com")).unwrap();
        registry.register(named("beta", "b.example.com")).unwrap();
        registry.register(named("gamma", "c.example.com")).unwrap();

        drop(registry.get_session("alpha").await.unwrap());
        drop(registry.get_session("beta").await.unwrap());

        let report = registry.close_all().await;
        assert!(!report.is_clean());
        assert_eq!(report.closed, vec!["alpha"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, "beta");

        let again = registry.close_all().await;
        assert!(again.is_clean());
        assert!(again.closed.is_empty());
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_from_config() {
        let json = r#"{"connections": {
            "primary": {"host": "mail.example.com", "port": 993, "encryption": "ssl",
                        "username": "alice", "password": "pw"}
        }}"#;
        let config: ConnectionsConfig = serde_json::from_str(json).unwrap();
        let registry = ConnectionRegistry::from_config(config).unwrap();
        assert_eq!(registry.names(), vec!["primary"]);
        assert_eq!(registry.policy(), DuplicatePolicy::Strict);
    }
}
