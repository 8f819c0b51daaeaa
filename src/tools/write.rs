//! Write operation tools.
//!
//! This module implements the `execute_query` MCP tool for running INSERT,
//! UPDATE, DELETE and DDL statements on the session's connection.

use crate::db::ActiveConnection;
use crate::db::QueryExecutor;
use crate::db::executor::WRITE_TIMEOUT;
use crate::error::{DbError, DbResult};
use crate::tools::guard;
use crate::tools::query::QueryInput;
use schemars::JsonSchema;
use serde::Serialize;
use tracing::info;

/// Output from the execute_query tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ExecuteQueryOutput {
    /// Number of rows affected by the statement (0 when the driver reports none)
    pub rows_affected: u64,
    /// Summary naming the statement kind
    pub message: String,
}

pub struct WriteToolHandler {
    read_only: bool,
}

impl WriteToolHandler {
    pub fn new(read_only: bool) -> Self {
        Self { read_only }
    }

    pub async fn execute_query(
        &self,
        conn: &ActiveConnection,
        input: QueryInput,
    ) -> DbResult<ExecuteQueryOutput> {
        if guard::is_select(&input.query) {
            return Err(DbError::wrong_query_kind(
                "use execute_select tool for SELECT queries",
            ));
        }

        guard::classify(&input.query, self.read_only)?;

        let rows_affected =
            QueryExecutor::execute(conn, "execute_query", &input.query, WRITE_TIMEOUT).await?;
        let operation = guard::operation_label(&input.query);

        info!(
            connection = %conn.name(),
            operation,
            rows_affected,
            "Write operation executed"
        );

        Ok(ExecuteQueryOutput {
            message: completion_message(operation, rows_affected),
            rows_affected,
        })
    }
}

fn completion_message(operation: &str, rows_affected: u64) -> String {
    if rows_affected > 0 {
        format!(
            "{} operation completed successfully ({} rows affected)",
            operation, rows_affected
        )
    } else {
        format!("{} operation completed successfully", operation)
    }
}
