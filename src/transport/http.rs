//! HTTP transport with Streamable HTTP support for the MCP server.
//!
//! Every MCP session opened over HTTP gets its own `DbService` with a fresh
//! UUID session id, so connection switches stay local to that client.

use crate::error::{DbError, DbResult};
use crate::mcp::DbService;
use crate::state::GatewayState;
use crate::transport::{Transport, wait_for_signal};
use rmcp::transport::streamable_http_server::{
    StreamableHttpService, session::local::LocalSessionManager,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Time allowed for open streams to finish after the first shutdown signal.
const GRACEFUL_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP transport implementation with Streamable HTTP support.
pub struct HttpTransport {
    state: GatewayState,
    host: String,
    port: u16,
    /// MCP endpoint path
    endpoint: String,
}

impl HttpTransport {
    pub fn new(
        state: GatewayState,
        host: impl Into<String>,
        port: u16,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            state,
            host: host.into(),
            port,
            endpoint: endpoint.into(),
        }
    }

    /// Get the bind address.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the MCP endpoint path.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Build a service for a newly opened MCP session.
fn new_session_service(state: &GatewayState) -> DbService {
    let session_id = Uuid::new_v4().to_string();
    debug!(session_id = %session_id, "HTTP session opened");
    DbService::transient(state.clone(), session_id)
}

impl Transport for HttpTransport {
    async fn run(&self) -> DbResult<()> {
        let bind_addr = self.bind_addr();
        info!("Starting MCP server with HTTP transport on {}", bind_addr);

        let state = self.state.clone();
        let service = StreamableHttpService::new(
            move || Ok(new_session_service(&state)),
            LocalSessionManager::default().into(),
            Default::default(),
        );

        // nest_service rejects "/", so the root endpoint uses fallback_service
        let app = if self.endpoint == "/" {
            axum::Router::new().fallback_service(service)
        } else {
            axum::Router::new().nest_service(&self.endpoint, service)
        };

        let listener = TcpListener::bind(&bind_addr).await.map_err(|e| {
            DbError::connection(
                format!("Failed to bind to {}: {}", bind_addr, e),
                "Check that the port is available",
            )
        })?;

        info!(endpoint = %self.endpoint, "MCP endpoint ready");

        let shutdown_notify = Arc::new(tokio::sync::Notify::new());
        let shutdown_notify_clone = shutdown_notify.clone();
        let shutdown_signal = async move {
            wait_for_signal().await;
            shutdown_notify_clone.notify_one();
        };

        let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal);

        // SSE streams may keep the server alive, so shutdown is bounded
        tokio::select! {
            result = server => {
                match result {
                    Ok(()) => info!("HTTP server stopped"),
                    Err(e) => {
                        error!(error = %e, "HTTP server error");
                        self.state.shutdown().await;
                        return Err(DbError::internal(format!("HTTP server error: {}", e)));
                    }
                }
            }
            _ = async {
                shutdown_notify.notified().await;
                info!(
                    timeout_secs = GRACEFUL_TIMEOUT.as_secs(),
                    "Waiting for connections to close (send signal again to force exit)..."
                );
                tokio::select! {
                    _ = tokio::time::sleep(GRACEFUL_TIMEOUT) => {
                        warn!("Graceful shutdown timeout, forcing exit");
                    }
                    _ = wait_for_signal() => {
                        warn!("Received second signal, forcing immediate exit");
                    }
                }
            } => {}
        }

        let sessions = self.state.sessions().len().await;
        info!(sessions, "Closing all sessions");
        self.state.shutdown().await;

        Ok(())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ConnectionRegistry, SqlxConnector};

    fn test_state() -> GatewayState {
        GatewayState::new(
            Arc::new(ConnectionRegistry::empty()),
            Arc::new(SqlxConnector::default()),
            false,
        )
    }

    #[test]
    fn test_http_transport_creation() {
        let transport = HttpTransport::new(test_state(), "127.0.0.1", 8080, "/mcp");
        assert_eq!(transport.name(), "http");
        assert_eq!(transport.bind_addr(), "127.0.0.1:8080");
        assert_eq!(transport.endpoint(), "/mcp");
    }

    #[test]
    fn test_each_http_session_gets_its_own_id() {
        let state = test_state();
        let first = new_session_service(&state);
        let second = new_session_service(&state);
        assert_ne!(first.session_id(), second.session_id());
        assert!(Uuid::parse_str(first.session_id()).is_ok());
    }

    #[tokio::test]
    async fn test_session_is_closed_when_service_drops() {
        let state = test_state();
        let service = new_session_service(&state);
        let copy = service.clone();
        state.session(service.session_id()).await;
        assert_eq!(state.sessions().len().await, 1);

        drop(service);
        tokio::task::yield_now().await;
        assert_eq!(state.sessions().len().await, 1, "a clone still holds the session");

        drop(copy);
        for _ in 0..10 {
            if state.sessions().is_empty().await {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(state.sessions().is_empty().await);
    }
}
