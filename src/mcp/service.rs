//! MCP service implementation using rmcp.
//!
//! This module defines the DbService struct with all gateway tools exposed via
//! the MCP protocol using the rmcp framework's macros. One service instance
//! serves one MCP session; the session id keys its state in the store.

use crate::db::{ActiveConnection, SessionState, SessionStore};
use crate::error::DbResult;
use crate::models::{DbInfo, TableDescription};
use crate::state::GatewayState;
use crate::tools::connection::{
    ConnectionToolHandler, ListConnectionsOutput, SwitchConnectionInput, SwitchConnectionOutput,
    TestConnectionInput, TestConnectionOutput,
};
use crate::tools::explain::{ExplainOutput, ExplainToolHandler};
use crate::tools::query::{ExecuteSelectOutput, QueryInput, QueryOutput, QueryToolHandler};
use crate::tools::schema::{
    AnalyzeTableOutput, ListTablesInput, ListTablesOutput, SchemaToolHandler, TableInput,
};
use crate::tools::write::{ExecuteQueryOutput, WriteToolHandler};
use rmcp::Json;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::{Implementation, ProtocolVersion, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct DbService {
    /// Shared gateway state (sessions, registry, connector)
    state: GatewayState,
    /// Session this service instance answers for
    session_id: String,
    /// Tool router for MCP tool dispatch (auto-generated)
    tool_router: ToolRouter<Self>,
    /// Closes the session when the last clone of a transient service drops
    _guard: Option<Arc<SessionGuard>>,
}

/// Removes a session from the store once its MCP session is gone.
struct SessionGuard {
    sessions: Arc<SessionStore>,
    session_id: String,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let sessions = Arc::clone(&self.sessions);
        let session_id = std::mem::take(&mut self.session_id);
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    sessions.close(&session_id).await;
                });
            }
            // Without a runtime the session is left for shutdown's close_all
            Err(_) => debug!(session_id = %session_id, "No runtime to close session on drop"),
        }
    }
}

impl DbService {
    /// Create a service bound to `session_id`. The session lives until shutdown.
    pub fn new(state: GatewayState, session_id: impl Into<String>) -> Self {
        Self {
            state,
            session_id: session_id.into(),
            tool_router: Self::tool_router(),
            _guard: None,
        }
    }

    /// Create a service whose session is closed when the service is dropped.
    ///
    /// Used for HTTP sessions, where every MCP session has its own id.
    pub fn transient(state: GatewayState, session_id: impl Into<String>) -> Self {
        let session_id = session_id.into();
        let guard = SessionGuard {
            sessions: Arc::clone(state.sessions()),
            session_id: session_id.clone(),
        };
        Self {
            _guard: Some(Arc::new(guard)),
            ..Self::new(state, session_id)
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    async fn session(&self) -> Arc<SessionState> {
        self.state.session(&self.session_id).await
    }

    /// The session's connection, or `NoActiveConnection`.
    async fn connection(&self) -> DbResult<Arc<ActiveConnection>> {
        self.session().await.require_connection().await
    }

    fn connection_tools(&self) -> ConnectionToolHandler {
        ConnectionToolHandler::new(
            Arc::clone(self.state.registry()),
            Arc::clone(self.state.sessions()),
            Arc::clone(self.state.connector()),
        )
    }

    /// Run one tool call, logging its duration and outcome.
    async fn traced<T, F>(&self, tool: &'static str, fut: F) -> Result<Json<T>, McpError>
    where
        F: Future<Output = DbResult<T>>,
    {
        let start = Instant::now();
        let result = fut.await;
        let elapsed_ms = start.elapsed().as_millis() as u64;
        match result {
            Ok(value) => {
                info!(tool, session_id = %self.session_id, elapsed_ms, outcome = "ok", "Tool call completed");
                Ok(Json(value))
            }
            Err(e) => {
                warn!(tool, session_id = %self.session_id, elapsed_ms, outcome = "error", error = %e, "Tool call failed");
                Err(McpError::from(e))
            }
        }
    }
}

#[tool_router]
impl DbService {
    #[tool(
        description = "Execute a SELECT query on the session's database connection.\nOnly statements starting with SELECT are accepted."
    )]
    pub async fn select_query(
        &self,
        Parameters(input): Parameters<QueryInput>,
    ) -> Result<Json<QueryOutput>, McpError> {
        self.traced("select_query", async {
            let conn = self.connection().await?;
            QueryToolHandler::new(self.state.read_only())
                .select_query(&conn, input)
                .await
        })
        .await
    }

    #[tool(
        description = "Execute a SELECT query and return its rows as `results`.\nKept for compatibility; prefer select_query. Runs with a 5 second deadline."
    )]
    pub async fn execute_select(
        &self,
        Parameters(input): Parameters<QueryInput>,
    ) -> Result<Json<ExecuteSelectOutput>, McpError> {
        self.traced("execute_select", async {
            let conn = self.connection().await?;
            QueryToolHandler::new(self.state.read_only())
                .execute_select(&conn, input)
                .await
        })
        .await
    }

    #[tool(
        description = "Execute a SHOW statement (SHOW TABLES, SHOW search_path, ...).\nOnly statements starting with SHOW are accepted."
    )]
    pub async fn show_query(
        &self,
        Parameters(input): Parameters<QueryInput>,
    ) -> Result<Json<QueryOutput>, McpError> {
        self.traced("show_query", async {
            let conn = self.connection().await?;
            QueryToolHandler::new(self.state.read_only())
                .show_query(&conn, input)
                .await
        })
        .await
    }

    #[tool(
        description = "Execute a write statement (INSERT, UPDATE, DELETE) or DDL (CREATE, ALTER, DROP TABLE).\nRejected in read-only mode. DROP DATABASE, DROP SCHEMA and TRUNCATE are always rejected.\nUse execute_select for SELECT queries."
    )]
    pub async fn execute_query(
        &self,
        Parameters(input): Parameters<QueryInput>,
    ) -> Result<Json<ExecuteQueryOutput>, McpError> {
        self.traced("execute_query", async {
            let conn = self.connection().await?;
            WriteToolHandler::new(self.state.read_only())
                .execute_query(&conn, input)
                .await
        })
        .await
    }

    #[tool(
        description = "List tables and views.\nWithout `schema`, lists every non-system schema; with it, lists only that schema."
    )]
    pub async fn list_tables(
        &self,
        Parameters(input): Parameters<ListTablesInput>,
    ) -> Result<Json<ListTablesOutput>, McpError> {
        self.traced("list_tables", async {
            let conn = self.connection().await?;
            SchemaToolHandler::new().list_tables(&conn, input).await
        })
        .await
    }

    #[tool(
        description = "Describe a table's columns and indexes.\n`schema` defaults to the current database (MySQL) or the session schema (PostgreSQL: public)."
    )]
    pub async fn describe_table(
        &self,
        Parameters(input): Parameters<TableInput>,
    ) -> Result<Json<TableDescription>, McpError> {
        self.traced("describe_table", async {
            let session = self.session().await;
            let conn = session.require_connection().await?;
            SchemaToolHandler::new()
                .describe_table(&conn, session.current_schema(), input)
                .await
        })
        .await
    }

    #[tool(
        description = "Analyze a table: exact row count, table/index sizes, last ANALYZE time and column nullability.\nFigures the server cannot report are returned as \"N/A\"."
    )]
    pub async fn analyze_table(
        &self,
        Parameters(input): Parameters<TableInput>,
    ) -> Result<Json<AnalyzeTableOutput>, McpError> {
        self.traced("analyze_table", async {
            let session = self.session().await;
            let conn = session.require_connection().await?;
            SchemaToolHandler::new()
                .analyze_table(&conn, session.current_schema(), input)
                .await
        })
        .await
    }

    #[tool(
        description = "Get database name, server version, user schemas and table count for the current connection."
    )]
    pub async fn get_db_info(&self) -> Result<Json<DbInfo>, McpError> {
        self.traced("get_db_info", async {
            let conn = self.connection().await?;
            SchemaToolHandler::new().get_db_info(&conn).await
        })
        .await
    }

    #[tool(
        description = "Show the execution plan for a query without running it.\nA leading EXPLAIN keyword is optional. JSON plans are pretty-printed."
    )]
    pub async fn explain_query(
        &self,
        Parameters(input): Parameters<QueryInput>,
    ) -> Result<Json<ExplainOutput>, McpError> {
        self.traced("explain_query", async {
            let conn = self.connection().await?;
            ExplainToolHandler::new(self.state.read_only())
                .explain_query(&conn, input)
                .await
        })
        .await
    }

    #[tool(
        description = "List configured database connections and the default connection name.\nConnection URLs are never returned."
    )]
    pub async fn list_connections(&self) -> Json<ListConnectionsOutput> {
        let output = self.connection_tools().list_connections();
        info!(
            tool = "list_connections",
            session_id = %self.session_id,
            count = output.connections.len(),
            "Tool call completed"
        );
        Json(output)
    }

    #[tool(
        description = "Switch this session to a configured connection.\nThe previous connection is released; other sessions are unaffected."
    )]
    pub async fn switch_connection(
        &self,
        Parameters(input): Parameters<SwitchConnectionInput>,
    ) -> Result<Json<SwitchConnectionOutput>, McpError> {
        self.traced("switch_connection", async {
            // Materialize the session first so a new one is seeded before the swap
            self.session().await;
            self.connection_tools()
                .switch_connection(&self.session_id, input)
                .await
        })
        .await
    }

    #[tool(
        description = "Test connectivity to a configured connection, or to the session's current connection when `connection` is omitted.\nAlways returns a result with success true or false."
    )]
    pub async fn test_connection(
        &self,
        Parameters(input): Parameters<TestConnectionInput>,
    ) -> Json<TestConnectionOutput> {
        let start = Instant::now();
        self.session().await;
        let output = self
            .connection_tools()
            .test_connection(&self.session_id, input)
            .await;
        info!(
            tool = "test_connection",
            session_id = %self.session_id,
            elapsed_ms = start.elapsed().as_millis() as u64,
            success = output.success,
            "Tool call completed"
        );
        Json(output)
    }
}

#[tool_handler]
impl ServerHandler for DbService {
    fn get_info(&self) -> ServerInfo {
        let mode = if self.state.read_only() {
            "\n\nThis server runs in read-only mode: only SELECT and SHOW statements are accepted."
        } else {
            ""
        };
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "db-gateway-mcp".to_owned(),
                title: Some("DB Gateway MCP".to_owned()),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                icons: None,
                website_url: None,
            },
            instructions: Some(format!(
                "SQL gateway for PostgreSQL and MySQL databases.\n\
                \n\
                ## Workflow\n\
                1. Call `list_connections` to see the configured connections\n\
                2. Call `switch_connection` to bind one to this session (a startup connection may already be bound)\n\
                3. Explore with `get_db_info`, `list_tables` and `describe_table`\n\
                4. Read with `select_query` or `show_query`; write with `execute_query`\n\
                \n\
                ## Notes\n\
                - The connection is per session; switching does not affect other clients\n\
                - `explain_query` shows the plan without running the statement\n\
                - `analyze_table` runs COUNT(*) and may be slow on large tables\n\
                - DROP DATABASE, DROP SCHEMA and TRUNCATE are always rejected{}",
                mode
            )),
        }
    }
}
