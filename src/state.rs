//! Process-wide gateway state shared by every MCP session.

use crate::db::{ActiveConnection, ConnectionRegistry, Connector, SessionState, SessionStore};
use crate::error::{DbError, DbResult};
use crate::models::ConnectionDescriptor;
use std::sync::Arc;
use tracing::info;

/// Everything a tool call needs besides its own session id.
///
/// Cloning is cheap; every transport session holds a clone.
#[derive(Clone)]
pub struct GatewayState {
    sessions: Arc<SessionStore>,
    registry: Arc<ConnectionRegistry>,
    connector: Arc<dyn Connector>,
    read_only: bool,
    /// Connection opened at startup, seeded into every new session.
    bootstrap: Option<Arc<ActiveConnection>>,
}

impl GatewayState {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        connector: Arc<dyn Connector>,
        read_only: bool,
    ) -> Self {
        Self {
            sessions: Arc::new(SessionStore::new()),
            registry,
            connector,
            read_only,
            bootstrap: None,
        }
    }

    /// Seed new sessions with `connection`.
    pub fn with_bootstrap(mut self, connection: Arc<ActiveConnection>) -> Self {
        self.bootstrap = Some(connection);
        self
    }

    /// Resolve the state for `session_id`, creating it on first use.
    pub async fn session(&self, session_id: &str) -> Arc<SessionState> {
        if let Some(state) = self.sessions.get(session_id).await {
            return state;
        }
        match &self.bootstrap {
            Some(conn) => {
                self.sessions
                    .get_or_create_with(session_id, Arc::clone(conn))
                    .await
            }
            None => self.sessions.get_or_create(session_id).await,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn connector(&self) -> &Arc<dyn Connector> {
        &self.connector
    }

    pub fn read_only(&self) -> bool {
        self.read_only
    }

    /// Close every session, then the startup connection.
    pub async fn shutdown(&self) {
        self.sessions.close_all().await;
        if let Some(conn) = &self.bootstrap {
            // Closed unconditionally: in-flight calls may still hold a reference
            conn.handle().close().await;
            info!(connection = %conn.name(), "Startup connection closed");
        }
    }
}

/// Pick the connection to open at startup.
///
/// A raw connection string wins, then an explicitly named connection, then the
/// file's default. `Ok(None)` means the server starts without a connection.
pub fn initial_descriptor(
    conn_string: Option<&str>,
    connection: Option<&str>,
    registry: &ConnectionRegistry,
) -> DbResult<Option<ConnectionDescriptor>> {
    if let Some(url) = conn_string.filter(|s| !s.trim().is_empty()) {
        return ConnectionDescriptor::direct(url).map(Some).ok_or_else(|| {
            DbError::config("connection string must start with postgres://, postgresql:// or mysql://")
        });
    }
    if let Some(name) = connection.filter(|s| !s.trim().is_empty()) {
        return registry
            .lookup(name)
            .cloned()
            .map(Some)
            .ok_or_else(|| DbError::connection_not_found(name));
    }
    Ok(registry.default_descriptor().cloned())
}
