//! Per-session connection state.
//!
//! The store maps a session id to a [`SessionState`]. There is at most one state
//! per id, and it stays alive until [`SessionStore::close`] removes it. Seed
//! handles are pinged when a session is created; network I/O never happens while
//! the map's write lock is held.

use crate::db::connection::ActiveConnection;
use crate::error::{DbError, DbResult};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Schema used when the server does not report a current database.
pub const DEFAULT_SCHEMA: &str = "public";

/// Session id used by the stdio transport.
pub const DEFAULT_SESSION_ID: &str = "default";

#[derive(Debug)]
pub struct SessionState {
    session_id: String,
    connection: RwLock<Option<Arc<ActiveConnection>>>,
    current_schema: String,
}

impl SessionState {
    fn new(session_id: impl Into<String>, connection: Option<Arc<ActiveConnection>>) -> Self {
        Self {
            session_id: session_id.into(),
            connection: RwLock::new(connection),
            current_schema: DEFAULT_SCHEMA.to_string(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Current connection, if any.
    pub async fn connection(&self) -> Option<Arc<ActiveConnection>> {
        self.connection.read().await.clone()
    }

    /// Current connection, or `NoActiveConnection`.
    pub async fn require_connection(&self) -> DbResult<Arc<ActiveConnection>> {
        self.connection()
            .await
            .ok_or_else(|| DbError::no_active_connection(&self.session_id))
    }

    /// Fallback schema for introspection when the server names none.
    pub fn current_schema(&self) -> &str {
        &self.current_schema
    }

    async fn replace_connection(
        &self,
        connection: Option<Arc<ActiveConnection>>,
    ) -> Option<Arc<ActiveConnection>> {
        std::mem::replace(&mut *self.connection.write().await, connection)
    }
}

/// Thread-safe map of session id to state.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<SessionState>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the session for `session_id`, creating an empty one if needed.
    pub async fn get_or_create(&self, session_id: &str) -> Arc<SessionState> {
        if let Some(state) = self.get(session_id).await {
            return state;
        }

        let mut sessions = self.sessions.write().await;
        Arc::clone(sessions.entry(session_id.to_string()).or_insert_with(|| {
            debug!(session_id, "Created empty session");
            Arc::new(SessionState::new(session_id, None))
        }))
    }

    /// Return the session for `session_id`, creating it bound to `connection`.
    ///
    /// The connection is pinged only when a new session is created. A failed ping
    /// still creates the session, but without a connection.
    pub async fn get_or_create_with(
        &self,
        session_id: &str,
        connection: Arc<ActiveConnection>,
    ) -> Arc<SessionState> {
        if let Some(state) = self.get(session_id).await {
            return state;
        }

        let healthy = match connection.ping().await {
            Ok(()) => Some(connection),
            Err(e) => {
                warn!(session_id, error = %e, "Initial connection failed ping, session starts empty");
                None
            }
        };

        // Re-check after async work; a concurrent caller may have created it
        let mut sessions = self.sessions.write().await;
        if let Some(existing) = sessions.get(session_id) {
            return Arc::clone(existing);
        }
        let state = Arc::new(SessionState::new(session_id, healthy));
        sessions.insert(session_id.to_string(), Arc::clone(&state));
        info!(session_id, "Session created");
        state
    }

    pub async fn get(&self, session_id: &str) -> Option<Arc<SessionState>> {
        self.sessions.read().await.get(session_id).cloned()
    }

    /// Bind `connection` to the session, releasing whatever it held before.
    ///
    /// The connection must already be verified; [`Connector::open`] pings what it returns.
    ///
    /// [`Connector::open`]: crate::db::Connector::open
    pub async fn attach(&self, session_id: &str, connection: Arc<ActiveConnection>) -> Arc<SessionState> {
        let state = self.get_or_create(session_id).await;
        let name = connection.name().to_string();
        let previous = state.replace_connection(Some(connection)).await;
        info!(session_id, connection = %name, "Session connection switched");

        if let Some(old) = previous {
            old.release().await;
        }
        state
    }

    /// Remove the session and release its connection.
    pub async fn close(&self, session_id: &str) {
        let removed = self.sessions.write().await.remove(session_id);
        if let Some(state) = removed {
            if let Some(conn) = state.replace_connection(None).await {
                conn.release().await;
            }
            info!(session_id, "Session closed");
        }
    }

    /// Close every session. Used at shutdown.
    pub async fn close_all(&self) {
        let drained: Vec<_> = self.sessions.write().await.drain().collect();
        for (session_id, state) in drained {
            if let Some(conn) = state.replace_connection(None).await {
                conn.release().await;
            }
            debug!(session_id = %session_id, "Session closed");
        }
        info!("All sessions closed");
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connection::DbConnection;
    use crate::models::RowSet;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct Probe {
        healthy: bool,
        closed: AtomicUsize,
    }

    #[async_trait]
    impl DbConnection for Probe {
        async fn fetch(&self, _sql: &str, _params: &[&str]) -> DbResult<RowSet> {
            Ok(RowSet::default())
        }

        async fn execute(&self, _sql: &str) -> DbResult<u64> {
            Ok(0)
        }

        async fn ping(&self) -> DbResult<()> {
            if self.healthy {
                Ok(())
            } else {
                Err(DbError::connection("connection refused", "start the server"))
            }
        }

        async fn close(&self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn active(name: &str, healthy: bool) -> (Arc<Probe>, Arc<ActiveConnection>) {
        let probe = Arc::new(Probe {
            healthy,
            ..Default::default()
        });
        let conn = Arc::new(ActiveConnection::new(name, probe.clone()));
        (probe, conn)
    }

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let store = SessionStore::new();
        let a = store.get_or_create("s1").await;
        let b = store.get_or_create("s1").await;
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_new_session_has_no_connection_and_public_schema() {
        let store = SessionStore::new();
        let state = store.get_or_create("s1").await;
        assert!(state.connection().await.is_none());
        assert_eq!(state.current_schema(), DEFAULT_SCHEMA);
        let err = state.require_connection().await.unwrap_err();
        assert!(matches!(err, DbError::NoActiveConnection { .. }));
    }

    #[tokio::test]
    async fn test_close_then_recreate_gives_fresh_state() {
        let store = SessionStore::new();
        let (probe, conn) = active("main", true);
        let first = store.get_or_create_with("s1", conn).await;
        assert!(first.connection().await.is_some());

        store.close("s1").await;
        assert_eq!(probe.closed.load(Ordering::SeqCst), 1);

        let second = store.get_or_create("s1").await;
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(second.connection().await.is_none());
    }

    #[tokio::test]
    async fn test_unhealthy_seed_connection_is_not_attached() {
        let store = SessionStore::new();
        let (_, conn) = active("down", false);
        let state = store.get_or_create_with("s1", conn).await;
        assert!(state.connection().await.is_none());
    }

    #[tokio::test]
    async fn test_attach_releases_previous_connection() {
        let store = SessionStore::new();
        let (old_probe, old) = active("old", true);
        let (new_probe, new) = active("new", true);
        store.attach("s1", old).await;
        let state = store.attach("s1", new).await;

        assert_eq!(state.connection().await.unwrap().name(), "new");
        assert_eq!(old_probe.closed.load(Ordering::SeqCst), 1);
        assert_eq!(new_probe.closed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_shared_connection_survives_one_session_closing() {
        let store = SessionStore::new();
        let (probe, conn) = active("shared", true);
        store.get_or_create_with("a", Arc::clone(&conn)).await;
        store.get_or_create_with("b", Arc::clone(&conn)).await;
        drop(conn);

        store.close("a").await;
        assert_eq!(probe.closed.load(Ordering::SeqCst), 0);
        store.close("b").await;
        assert_eq!(probe.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_close_all_empties_the_store() {
        let store = SessionStore::new();
        store.get_or_create("a").await;
        store.get_or_create("b").await;
        store.close_all().await;
        assert!(store.is_empty().await);
    }
}
