//! Session registry for the Streamable HTTP transport.

use super::transport::{Transport, TransportState};
use crate::tools::ToolRegistry;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use uuid::Uuid;

/// Opaque, unguessable session identifier (UUID v4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Only the canonical hyphenated lowercase form is accepted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Malformed session id")]
pub struct InvalidSessionId;

impl FromStr for SessionId {
    type Err = InvalidSessionId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = Uuid::try_parse(s).map_err(|_| InvalidSessionId)?;
        if uuid.hyphenated().to_string() != s {
            return Err(InvalidSessionId);
        }
        Ok(Self(uuid))
    }
}

/// A live MCP session.
pub struct Session {
    pub id: SessionId,
    pub created_at: Instant,
    last_activity: Mutex<Instant>,
    pub transport: Transport,
}

impl Session {
    fn new(id: SessionId, tools: ToolRegistry) -> Self {
        let now = Instant::now();
        Self {
            id,
            created_at: now,
            last_activity: Mutex::new(now),
            transport: Transport::new(id, tools),
        }
    }

    pub fn touch(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_activity.lock().elapsed()
    }
}

/// Thread-safe map of session id to session.
///
/// Locks are only held for map operations, never across an await.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<SessionId, Arc<Session>>>>,
    tools: ToolRegistry,
}

impl SessionStore {
    pub fn new(tools: ToolRegistry) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            tools,
        }
    }

    /// Register a new, uninitialized session under a fresh id.
    pub fn create(&self) -> Arc<Session> {
        let mut sessions = self.sessions.write();
        let mut id = SessionId::new();
        while sessions.contains_key(&id) {
            id = SessionId::new();
        }
        let session = Arc::new(Session::new(id, self.tools.clone()));
        sessions.insert(id, session.clone());
        debug!("MCP: Created session {}", id);
        session
    }

    /// Look up an active session and mark it as used.
    ///
    /// Sessions that never completed the handshake are not visible here.
    pub fn get(&self, id: &SessionId) -> Option<Arc<Session>> {
        let session = self.sessions.read().get(id).cloned()?;
        if session.transport.state() != TransportState::Active {
            return None;
        }
        session.touch();
        Some(session)
    }

    /// Like [`get`](Self::get) but parses the raw header value first.
    pub fn get_str(&self, id: &str) -> Option<Arc<Session>> {
        id.parse().ok().and_then(|id| self.get(&id))
    }

    /// Sessions created but not yet initialized.
    pub fn pending(&self) -> usize {
        self.sessions
            .read()
            .values()
            .filter(|s| s.transport.state() == TransportState::Uninitialized)
            .count()
    }

    /// Remove and terminate a session. Returns false if it was not present.
    pub fn remove(&self, id: &SessionId) -> bool {
        let removed = self.sessions.write().remove(id);
        match removed {
            Some(session) => {
                session.transport.terminate();
                info!("MCP: Terminated session {}", id);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.sessions
            .read()
            .values()
            .filter(|s| s.transport.state() == TransportState::Active)
            .count()
    }

    /// Terminate sessions idle for longer than `max_idle`.
    ///
    /// A session with an open stream is never idle.
    pub fn reap_idle(&self, max_idle: Duration) -> usize {
        let stale: Vec<Arc<Session>> = {
            let mut sessions = self.sessions.write();
            let ids: Vec<SessionId> = sessions
                .iter()
                .filter(|(_, s)| !s.transport.has_stream() && s.idle_for() > max_idle)
                .map(|(id, _)| *id)
                .collect();
            ids.iter().filter_map(|id| sessions.remove(id)).collect()
        };

        for session in &stale {
            session.transport.terminate();
            info!(
                "MCP: Expired idle session {} (alive {:?})",
                session.id,
                session.created_at.elapsed()
            );
        }
        stale.len()
    }

    /// Periodically expire idle sessions in the background.
    pub fn spawn_reaper(&self, max_idle: Duration) -> tokio::task::JoinHandle<()> {
        let store = self.clone();
        let period = (max_idle / 2).max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let reaped = store.reap_idle(max_idle);
                if reaped > 0 {
                    debug!("MCP: Reaped {} idle session(s)", reaped);
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use thais_types::{InitializeParams, RequestId};

    fn store() -> SessionStore {
        SessionStore::new(ToolRegistry::default())
    }

    fn activate(session: &Session) {
        let params: InitializeParams = serde_json::from_value(serde_json::json!({
            "protocolVersion": "2025-06-18",
            "clientInfo": {"name": "test", "version": "0.0.1"}
        }))
        .unwrap();
        session
            .transport
            .initialize(RequestId::Number(1), params)
            .unwrap();
    }

    #[test]
    fn test_session_ids_are_unique() {
        let store = store();
        let ids: HashSet<SessionId> = (0..10_000).map(|_| store.create().id).collect();
        assert_eq!(ids.len(), 10_000);
        assert_eq!(store.len(), 10_000);
    }

    #[test]
    fn test_session_id_round_trip_through_header() {
        let id = SessionId::new();
        assert_eq!(id.to_string().parse::<SessionId>().unwrap(), id);
        assert!("not-a-session".parse::<SessionId>().is_err());
    }

    #[test]
    fn test_session_id_aliases_do_not_resolve() {
        let store = store();
        let session = store.create();
        activate(&session);
        let canonical = session.id.to_string();

        let simple = canonical.replace('-', "");
        let upper = canonical.to_uppercase();
        let braced = format!("{{{}}}", canonical);
        let urn = format!("urn:uuid:{}", canonical);

        assert!(store.get_str(&canonical).is_some());
        for alias in [simple, upper, braced, urn] {
            assert!(store.get_str(&alias).is_none(), "{} resolved", alias);
        }
    }

    #[test]
    fn test_pending_sessions_are_not_routable() {
        let store = store();
        let session = store.create();

        assert!(store.get(&session.id).is_none());
        assert_eq!(store.pending(), 1);
        assert_eq!(store.active_count(), 0);

        activate(&session);

        assert!(store.get(&session.id).is_some());
        assert_eq!(store.pending(), 0);
        assert_eq!(store.active_count(), 1);
    }

    #[test]
    fn test_get_is_stable() {
        let store = store();
        let session = store.create();
        activate(&session);

        let first = store.get(&session.id).unwrap();
        let second = store.get_str(&session.id.to_string()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let store = store();
        let session = store.create();
        activate(&session);

        assert!(store.remove(&session.id));
        assert!(!store.remove(&session.id));
        assert!(store.get(&session.id).is_none());
        assert_eq!(session.transport.state(), TransportState::Terminated);
        assert!(store.is_empty());
    }

    #[test]
    fn test_unknown_ids_resolve_to_nothing() {
        let store = store();
        assert!(store.get(&SessionId::new()).is_none());
        assert!(store.get_str("").is_none());
        assert!(!store.remove(&SessionId::new()));
    }

    #[test]
    fn test_reap_idle_only_removes_stale_sessions() {
        let store = store();
        let stale = store.create();
        activate(&stale);
        std::thread::sleep(Duration::from_millis(30));
        let fresh = store.create();
        activate(&fresh);

        assert_eq!(store.reap_idle(Duration::from_millis(20)), 1);
        assert!(store.get(&stale.id).is_none());
        assert!(store.get(&fresh.id).is_some());
        assert_eq!(stale.transport.state(), TransportState::Terminated);
    }

    #[tokio::test]
    async fn test_reap_idle_spares_sessions_with_open_stream() {
        let store = store();
        let listening = store.create();
        activate(&listening);
        let stream = listening.transport.open_stream().unwrap();
        std::thread::sleep(Duration::from_millis(30));

        assert_eq!(store.reap_idle(Duration::from_millis(20)), 0);
        assert_eq!(listening.transport.state(), TransportState::Active);
        assert!(store.get(&listening.id).is_some());

        // Once the client goes away the session is idle again
        drop(stream);
        assert_eq!(store.reap_idle(Duration::from_millis(20)), 1);
        assert_eq!(listening.transport.state(), TransportState::Terminated);
    }
}
