//! Connection management tools.
//!
//! This module implements `list_connections`, `switch_connection` and
//! `test_connection`. Switching replaces the calling session's handle and never
//! touches other sessions.

use crate::db::{ActiveConnection, ConnectionRegistry, Connector, SessionStore};
use crate::error::{DbError, DbResult};
use crate::models::ConnectionDescriptor;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// One configured connection, without its URL.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ConnectionSummary {
    /// Name to pass to switch_connection
    pub name: String,
    pub display_name: String,
    /// "postgres" or "mysql"
    #[serde(rename = "type")]
    pub db_type: String,
    pub description: String,
}

impl From<&ConnectionDescriptor> for ConnectionSummary {
    fn from(descriptor: &ConnectionDescriptor) -> Self {
        Self {
            name: descriptor.name.clone(),
            display_name: descriptor.display_name.clone(),
            db_type: descriptor.db_type.as_str().to_string(),
            description: descriptor.description.clone(),
        }
    }
}

/// Output from the list_connections tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ListConnectionsOutput {
    /// Configured connections ordered by name
    pub connections: Vec<ConnectionSummary>,
    /// Name of the default connection, or empty when none is configured
    pub default_connection: String,
}

/// Input for the switch_connection tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SwitchConnectionInput {
    /// Connection name from list_connections
    pub connection: String,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct SwitchConnectionOutput {
    pub message: String,
    /// Name of the connection now bound to the session
    pub connection: String,
}

/// Input for the test_connection tool.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct TestConnectionInput {
    /// Connection name to test. Omit to test the session's current connection.
    #[serde(default)]
    pub connection: Option<String>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct TestConnectionOutput {
    pub success: bool,
    pub message: String,
    /// Tested connection name, or "current"
    pub connection: String,
}

impl TestConnectionOutput {
    fn passed(connection: String) -> Self {
        Self {
            success: true,
            message: "Connection test successful".to_string(),
            connection,
        }
    }

    fn failed(connection: String, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            connection,
        }
    }
}

pub struct ConnectionToolHandler {
    registry: Arc<ConnectionRegistry>,
    sessions: Arc<SessionStore>,
    connector: Arc<dyn Connector>,
}

impl ConnectionToolHandler {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        sessions: Arc<SessionStore>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        Self {
            registry,
            sessions,
            connector,
        }
    }

    pub fn list_connections(&self) -> ListConnectionsOutput {
        ListConnectionsOutput {
            connections: self
                .registry
                .list_all()
                .into_iter()
                .map(ConnectionSummary::from)
                .collect(),
            default_connection: self.registry.default_name().to_string(),
        }
    }

    /// Open the named connection and bind it to `session_id`.
    ///
    /// On any failure the session keeps its previous connection.
    pub async fn switch_connection(
        &self,
        session_id: &str,
        input: SwitchConnectionInput,
    ) -> DbResult<SwitchConnectionOutput> {
        let name = input.connection;
        let descriptor = self
            .registry
            .lookup(&name)
            .ok_or_else(|| DbError::connection_not_found(&name))?;

        let handle = self
            .connector
            .open(descriptor)
            .await
            .map_err(|e| connect_failure(&name, e))?;
        let conn = Arc::new(ActiveConnection::new(&name, handle));
        self.sessions.attach(session_id, conn).await;

        info!(
            session_id,
            connection = %name,
            url = %descriptor.redacted_url(),
            "Switched connection"
        );
        Ok(SwitchConnectionOutput {
            message: format!("Successfully switched to connection '{}'", name),
            connection: name,
        })
    }

    /// Check connectivity. Failures are reported in the output, never as errors.
    pub async fn test_connection(
        &self,
        session_id: &str,
        input: TestConnectionInput,
    ) -> TestConnectionOutput {
        match input.connection.filter(|n| !n.is_empty()) {
            Some(name) => self.test_named(name).await,
            None => self.test_current(session_id).await,
        }
    }

    async fn test_named(&self, name: String) -> TestConnectionOutput {
        let Some(descriptor) = self.registry.lookup(&name) else {
            return TestConnectionOutput::failed(
                name.clone(),
                format!("Connection '{}' not found", name),
            );
        };

        let handle = match self.connector.open(descriptor).await {
            Ok(handle) => handle,
            Err(e) => {
                warn!(connection = %name, error = %e, "Connection test failed");
                return TestConnectionOutput::failed(name, format!("Connection test failed: {}", e));
            }
        };
        let outcome = handle.ping().await;
        handle.close().await;

        match outcome {
            Ok(()) => TestConnectionOutput::passed(name),
            Err(e) => {
                warn!(connection = %name, error = %e, "Connection test failed");
                TestConnectionOutput::failed(name, format!("Connection test failed: {}", e))
            }
        }
    }

    async fn test_current(&self, session_id: &str) -> TestConnectionOutput {
        let current = "current".to_string();
        let conn = match self.sessions.get(session_id).await {
            Some(state) => state.connection().await,
            None => None,
        };
        let Some(conn) = conn else {
            return TestConnectionOutput::failed(current, "No active connection to test");
        };

        match conn.ping().await {
            Ok(()) => TestConnectionOutput::passed(current),
            Err(e) => {
                warn!(session_id, connection = %conn.name(), error = %e, "Connection test failed");
                TestConnectionOutput::failed(current, format!("Connection test failed: {}", e))
            }
        }
    }
}

fn connect_failure(name: &str, error: DbError) -> DbError {
    match error {
        DbError::Connection {
            message,
            suggestion,
        } => DbError::connection(
            format!("failed to connect to '{}': {}", name, message),
            suggestion,
        ),
        other => DbError::connection(
            format!("failed to connect to '{}': {}", name, other),
            "Check the connection URL and that the server is reachable",
        ),
    }
}
