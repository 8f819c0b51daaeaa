//! Query execution plan tools.
//!
//! This module implements the `explain_query` MCP tool. The plan comes from the
//! server's own EXPLAIN; see [`crate::db::explain`] for the variant order.

use crate::db::ActiveConnection;
use crate::db::executor::{EXPLAIN_TIMEOUT, with_deadline};
use crate::db::explain::{explain, strip_explain};
use crate::error::{DbError, DbResult};
use crate::tools::guard;
use crate::tools::query::QueryInput;
use schemars::JsonSchema;
use serde::Serialize;
use std::time::Instant;
use tracing::info;

/// Output from the explain_query tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ExplainOutput {
    /// Plan text. JSON plans are pretty-printed.
    pub plan: String,
}

/// Handler for the explain tool.
pub struct ExplainToolHandler {
    read_only: bool,
}

impl ExplainToolHandler {
    pub fn new(read_only: bool) -> Self {
        Self { read_only }
    }

    pub async fn explain_query(
        &self,
        conn: &ActiveConnection,
        input: QueryInput,
    ) -> DbResult<ExplainOutput> {
        let statement = strip_explain(&input.query);
        if statement.is_empty() {
            return Err(DbError::invalid_input("query must not be empty"));
        }

        // EXPLAIN ANALYZE runs the statement on Postgres
        if self.read_only {
            guard::classify(statement, true)?;
        }

        let start = Instant::now();
        let plan = with_deadline(
            "explain_query",
            EXPLAIN_TIMEOUT,
            explain(conn.handle(), statement),
        )
        .await?;

        info!(
            connection = %conn.name(),
            plan_len = plan.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Explained query"
        );
        Ok(ExplainOutput { plan })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_serialization() {
        let output = ExplainOutput {
            plan: "Seq Scan on users".into(),
        };
        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["plan"], "Seq Scan on users");
    }
}
