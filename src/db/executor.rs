//! Query execution with per-operation deadlines.
//!
//! Every statement a tool issues runs under [`with_deadline`]. When the deadline
//! passes, the in-flight future is dropped, which cancels the driver call, and
//! the caller gets [`DbError::Timeout`].

use crate::db::connection::ActiveConnection;
use crate::error::{DbError, DbResult};
use crate::models::Record;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, warn};

pub const SELECT_TIMEOUT: Duration = Duration::from_secs(30);
pub const EXECUTE_SELECT_TIMEOUT: Duration = Duration::from_secs(5);
pub const SHOW_TIMEOUT: Duration = Duration::from_secs(30);
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(30);
pub const EXPLAIN_TIMEOUT: Duration = Duration::from_secs(15);
pub const LIST_TABLES_TIMEOUT: Duration = Duration::from_secs(10);
pub const DESCRIBE_TIMEOUT: Duration = Duration::from_secs(10);
pub const DB_INFO_TIMEOUT: Duration = Duration::from_secs(10);
pub const ANALYZE_TIMEOUT: Duration = Duration::from_secs(15);

/// Run `fut`, failing with a timeout error once `limit` elapses.
pub async fn with_deadline<T, F>(operation: &str, limit: Duration, fut: F) -> DbResult<T>
where
    F: Future<Output = DbResult<T>>,
{
    match timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            warn!(operation, timeout_secs = limit.as_secs(), "Operation timed out");
            Err(DbError::timeout(operation, limit.as_secs()))
        }
    }
}

/// Runs user SQL against a session's connection.
pub struct QueryExecutor;

impl QueryExecutor {
    /// Run a row-returning statement and marshal the rows into records.
    pub async fn fetch_records(
        conn: &ActiveConnection,
        operation: &str,
        sql: &str,
        limit: Duration,
    ) -> DbResult<Vec<Record>> {
        let start = Instant::now();
        let set = with_deadline(operation, limit, conn.handle().fetch(sql, &[])).await?;
        let records = set.records()?;
        debug!(
            operation,
            connection = %conn.name(),
            rows = records.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Query completed"
        );
        Ok(records)
    }

    /// Run a statement for its side effects and return the affected row count.
    pub async fn execute(
        conn: &ActiveConnection,
        operation: &str,
        sql: &str,
        limit: Duration,
    ) -> DbResult<u64> {
        let start = Instant::now();
        let affected = with_deadline(operation, limit, conn.handle().execute(sql)).await?;
        debug!(
            operation,
            connection = %conn.name(),
            rows_affected = affected,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Statement completed"
        );
        Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_deadline_passes_through_result() {
        let value = with_deadline("noop", Duration::from_secs(1), async { Ok::<_, DbError>(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_deadline_times_out() {
        let err = with_deadline("slow", Duration::from_secs(5), async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, DbError>(())
        })
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            DbError::Timeout {
                elapsed_secs: 5,
                ..
            }
        ));
    }

    #[test]
    fn test_deadlines() {
        assert_eq!(EXECUTE_SELECT_TIMEOUT.as_secs(), 5);
        assert_eq!(SELECT_TIMEOUT.as_secs(), 30);
        assert_eq!(EXPLAIN_TIMEOUT.as_secs(), 15);
        assert_eq!(ANALYZE_TIMEOUT.as_secs(), 15);
    }
}
