//! Query plans through the server's own EXPLAIN.
//!
//! Postgres and MySQL spell JSON output differently, so the wrapped forms are
//! tried in a fixed order and the first one the server accepts wins.

use crate::db::connection::DbConnection;
use crate::error::{DbError, DbResult};
use crate::models::RowSet;
use tracing::debug;

/// Drop a leading `EXPLAIN` keyword the caller may have included.
pub fn strip_explain(query: &str) -> &str {
    let trimmed = query.trim();
    match (trimmed.get(..7), trimmed.get(7..)) {
        (Some(head), Some(rest))
            if head.eq_ignore_ascii_case("explain") && rest.starts_with(char::is_whitespace) =>
        {
            rest.trim()
        }
        _ => trimmed,
    }
}

/// EXPLAIN forms to try, in order.
pub fn explain_variants(statement: &str) -> [String; 4] {
    [
        format!("EXPLAIN (FORMAT JSON, ANALYZE false) {}", statement),
        format!("EXPLAIN {}", statement),
        format!("EXPLAIN FORMAT=JSON {}", statement),
        format!("EXPLAIN {}", statement),
    ]
}

/// Explain `statement` (already stripped of any EXPLAIN keyword).
pub async fn explain(db: &dyn DbConnection, statement: &str) -> DbResult<String> {
    let mut last_error = None;
    for (attempt, sql) in explain_variants(statement).iter().enumerate() {
        match db.fetch(sql, &[]).await {
            Ok(set) => {
                debug!(attempt, rows = set.len(), "Explain succeeded");
                return Ok(render_plan(&set));
            }
            Err(e) => {
                debug!(attempt, error = %e, "Explain variant failed");
                last_error = Some(e);
            }
        }
    }
    Err(match last_error {
        Some(DbError::Query {
            message,
            sql_state,
            suggestion,
        }) => DbError::query(format!("failed to explain query: {}", message), sql_state, suggestion),
        Some(other) => other,
        None => DbError::internal("no explain variant was attempted"),
    })
}

/// Render plan rows as text.
///
/// Single-column rows render as the bare value; wider rows as `col: value`
/// pairs joined with ` | `. JSON output is pretty-printed.
pub fn render_plan(set: &RowSet) -> String {
    let single = set.columns.len() == 1;
    let plan = set
        .iter()
        .map(|row| {
            row.columns()
                .iter()
                .zip(row.values())
                .map(|(col, value)| {
                    if single {
                        value.to_string()
                    } else {
                        format!("{}: {}", col, value)
                    }
                })
                .collect::<Vec<_>>()
                .join(" | ")
        })
        .collect::<Vec<_>>()
        .join("\n");

    let trimmed = plan.trim_start();
    if trimmed.starts_with('[') || trimmed.starts_with('{') {
        if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(&plan) {
            if let Ok(pretty) = serde_json::to_string_pretty(&parsed) {
                return pretty;
            }
        }
    }
    plan
}
