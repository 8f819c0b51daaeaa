//! Dialect probing and primary/secondary fallback.
//!
//! Only two information-schema conventions are supported, so detection is a
//! two-branch decision: run the Postgres canary, and treat any failure as MySQL.
//! Every introspection operation then runs its primary-dialect SQL and retries
//! with the other dialect's SQL when that fails.

use crate::db::connection::DbConnection;
use crate::error::DbResult;
use std::fmt;
use std::future::Future;
use tracing::debug;

/// Canary that only succeeds on Postgres-family servers.
pub const POSTGRES_CANARY: &str = "SELECT current_database()";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    Postgres,
    MySql,
}

impl Dialect {
    pub fn other(self) -> Self {
        match self {
            Self::Postgres => Self::MySql,
            Self::MySql => Self::Postgres,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Postgres => write!(f, "postgres"),
            Self::MySql => write!(f, "mysql"),
        }
    }
}

/// Infer the dialect of a live connection.
///
/// A canary failure for unrelated reasons (network, auth) also yields `MySql`;
/// the follow-up query then fails and reports the real error.
pub async fn probe(conn: &dyn DbConnection) -> Dialect {
    match conn.fetch(POSTGRES_CANARY, &[]).await {
        Ok(_) => Dialect::Postgres,
        Err(e) => {
            debug!(error = %e, "Postgres canary failed, assuming MySQL");
            Dialect::MySql
        }
    }
}

/// Run `attempt` for `primary`, then for the other dialect if the first attempt fails.
///
/// When both fail, the secondary error is returned.
pub async fn with_fallback<T, F, Fut>(operation: &str, primary: Dialect, mut attempt: F) -> DbResult<T>
where
    F: FnMut(Dialect) -> Fut,
    Fut: Future<Output = DbResult<T>>,
{
    match attempt(primary).await {
        Ok(value) => Ok(value),
        Err(e) => {
            let secondary = primary.other();
            debug!(
                operation,
                primary = %primary,
                secondary = %secondary,
                error = %e,
                "Primary dialect query failed, trying fallback"
            );
            attempt(secondary).await
        }
    }
}
