//! Read query tools.
//!
//! This module implements `select_query`, `execute_select` and `show_query`.
//! Each accepts only statements with the matching leading keyword.

use crate::db::ActiveConnection;
use crate::db::QueryExecutor;
use crate::db::executor::{EXECUTE_SELECT_TIMEOUT, SELECT_TIMEOUT, SHOW_TIMEOUT};
use crate::error::{DbError, DbResult};
use crate::models::Record;
use crate::tools::guard::{self, READ_ONLY_MESSAGE};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Input shared by the SQL text tools.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct QueryInput {
    /// SQL statement to run
    pub query: String,
}

/// Output of `select_query` and `show_query`.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct QueryOutput {
    /// Result rows keyed by column name, in column order
    pub data: Vec<Record>,
    /// Summary including the row count
    pub message: String,
}

/// Output of `execute_select`.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ExecuteSelectOutput {
    /// Result rows keyed by column name, in column order
    pub results: Vec<Record>,
    /// Summary including the row count
    pub message: String,
}

/// Handler for the read query tools.
pub struct QueryToolHandler {
    read_only: bool,
}

impl QueryToolHandler {
    pub fn new(read_only: bool) -> Self {
        Self { read_only }
    }

    /// Handle `select_query`.
    pub async fn select_query(
        &self,
        conn: &ActiveConnection,
        input: QueryInput,
    ) -> DbResult<QueryOutput> {
        if !guard::is_select(&input.query) {
            return Err(DbError::wrong_query_kind("only SELECT queries are allowed"));
        }

        let data =
            QueryExecutor::fetch_records(conn, "select_query", &input.query, SELECT_TIMEOUT).await?;
        info!(connection = %conn.name(), rows = data.len(), "SELECT query completed");
        Ok(QueryOutput {
            message: format!(
                "SELECT query completed successfully ({} rows returned)",
                data.len()
            ),
            data,
        })
    }

    /// Handle `execute_select`.
    pub async fn execute_select(
        &self,
        conn: &ActiveConnection,
        input: QueryInput,
    ) -> DbResult<ExecuteSelectOutput> {
        if !guard::is_select(&input.query) {
            return Err(if self.read_only {
                DbError::read_only_violation(READ_ONLY_MESSAGE)
            } else {
                DbError::wrong_query_kind("only SELECT queries are allowed in execute_select")
            });
        }

        let results = QueryExecutor::fetch_records(
            conn,
            "execute_select",
            &input.query,
            EXECUTE_SELECT_TIMEOUT,
        )
        .await?;
        info!(connection = %conn.name(), rows = results.len(), "SELECT query completed");
        Ok(ExecuteSelectOutput {
            message: format!(
                "Query executed successfully ({} rows returned)",
                results.len()
            ),
            results,
        })
    }

    /// Handle `show_query`.
    pub async fn show_query(
        &self,
        conn: &ActiveConnection,
        input: QueryInput,
    ) -> DbResult<QueryOutput> {
        if !guard::is_show(&input.query) {
            return Err(DbError::wrong_query_kind("only SHOW queries are allowed"));
        }

        let data =
            QueryExecutor::fetch_records(conn, "show_query", &input.query, SHOW_TIMEOUT).await?;
        info!(connection = %conn.name(), rows = data.len(), "SHOW query completed");
        Ok(QueryOutput {
            message: format!(
                "SHOW query completed successfully ({} rows returned)",
                data.len()
            ),
            data,
        })
    }
}
