//! Connection abstraction.
//!
//! `DbConnection` is the only surface the rest of the crate uses to talk to a
//! database. The production implementation is [`DbPool`](crate::db::DbPool); tests
//! substitute scripted fakes.

use crate::db::dialect::{Dialect, probe};
use crate::error::DbResult;
use crate::models::RowSet;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// A pooled, shareable database handle.
#[async_trait]
pub trait DbConnection: Send + Sync + fmt::Debug {
    /// Run a row-returning statement. `params` bind positionally.
    async fn fetch(&self, sql: &str, params: &[&str]) -> DbResult<RowSet>;

    /// Run a statement for its side effects and return the affected row count.
    async fn execute(&self, sql: &str) -> DbResult<u64>;

    /// Verify that the server is reachable.
    async fn ping(&self) -> DbResult<()>;

    /// Release every physical connection held by this handle.
    async fn close(&self);
}

/// Opens handles for configured connections.
///
/// A returned handle has answered a ping. Implementations close anything they
/// opened before failing.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(
        &self,
        descriptor: &crate::models::ConnectionDescriptor,
    ) -> DbResult<Arc<dyn DbConnection>>;
}

/// An opened connection bound to a session, with its probed dialect.
pub struct ActiveConnection {
    name: String,
    handle: Arc<dyn DbConnection>,
    dialect: OnceCell<Dialect>,
}

impl ActiveConnection {
    pub fn new(name: impl Into<String>, handle: Arc<dyn DbConnection>) -> Self {
        Self {
            name: name.into(),
            handle,
            dialect: OnceCell::new(),
        }
    }

    /// Registry name this connection was opened from.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handle(&self) -> &dyn DbConnection {
        self.handle.as_ref()
    }

    /// Dialect of this connection, probed on first use and fixed afterwards.
    pub async fn dialect(&self) -> Dialect {
        *self
            .dialect
            .get_or_init(|| async {
                let dialect = probe(self.handle.as_ref()).await;
                debug!(connection = %self.name, dialect = %dialect, "Dialect probed");
                dialect
            })
            .await
    }

    pub async fn ping(&self) -> DbResult<()> {
        self.handle.ping().await
    }

    /// Drop this reference, closing the pool when it was the last one.
    pub async fn release(self: Arc<Self>) {
        let name = self.name.clone();
        match Arc::into_inner(self) {
            Some(conn) => {
                conn.handle.close().await;
                info!(connection = %name, "Connection closed");
            }
            None => debug!(connection = %name, "Connection still shared, not closing"),
        }
    }
}

impl fmt::Debug for ActiveConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveConnection")
            .field("name", &self.name)
            .field("dialect", &self.dialect.get())
            .finish()
    }
}
