//! Scripted database fakes shared by the integration tests.
//!
//! A `FakeConnection` answers each statement with the first rule whose needle
//! occurs in the whitespace-collapsed, lower-cased SQL. Every statement is logged.

#![allow(dead_code)]

use async_trait::async_trait;
use db_gateway_mcp::db::{ActiveConnection, Connector, DbConnection};
use db_gateway_mcp::error::{DbError, DbResult};
use db_gateway_mcp::models::{ConnectionDescriptor, RowSet, SqlValue};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Clone)]
enum Reply {
    Rows(RowSet),
    Fail(String),
    Affected(u64),
    Slow(Duration),
}

#[derive(Debug)]
struct Rule {
    needle: String,
    reply: Reply,
}

#[derive(Debug, Default)]
pub struct FakeConnection {
    rules: Vec<Rule>,
    log: Mutex<Vec<String>>,
    unreachable: bool,
    pings: AtomicUsize,
    closed: AtomicBool,
}

fn normalize(sql: &str) -> String {
    sql.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Build a row set from column names and rows.
pub fn rows(columns: &[&str], rows: Vec<Vec<SqlValue>>) -> RowSet {
    RowSet::new(columns.iter().map(|c| c.to_string()).collect(), rows)
}

/// A single-value row set.
pub fn scalar(column: &str, value: impl Into<SqlValue>) -> RowSet {
    rows(&[column], vec![vec![value.into()]])
}

impl FakeConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer statements containing `needle` with `set`.
    pub fn on(mut self, needle: &str, set: RowSet) -> Self {
        self.rules.push(Rule {
            needle: normalize(needle),
            reply: Reply::Rows(set),
        });
        self
    }

    /// Fail statements containing `needle`.
    pub fn fail_on(mut self, needle: &str, message: &str) -> Self {
        self.rules.push(Rule {
            needle: normalize(needle),
            reply: Reply::Fail(message.to_string()),
        });
        self
    }

    /// Report `n` affected rows for statements containing `needle`.
    pub fn affect(mut self, needle: &str, n: u64) -> Self {
        self.rules.push(Rule {
            needle: normalize(needle),
            reply: Reply::Affected(n),
        });
        self
    }

    /// Delay statements containing `needle` by `delay`, then answer with an empty set.
    pub fn slow(mut self, needle: &str, delay: Duration) -> Self {
        self.rules.push(Rule {
            needle: normalize(needle),
            reply: Reply::Slow(delay),
        });
        self
    }

    /// Fail every ping.
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    /// A Postgres-family server: the canary succeeds and `SELECT DATABASE()` fails.
    pub fn postgres() -> Self {
        Self::new()
            .on("select current_database()", scalar("current_database", "appdb"))
            .fail_on("select database()", "function database() does not exist")
    }

    /// A MySQL-family server with current database `shop`.
    pub fn mysql() -> Self {
        Self::new()
            .fail_on("current_database()", "FUNCTION shop.current_database does not exist")
            .on("select database()", scalar("DATABASE()", "shop"))
    }

    pub fn into_active(self, name: &str) -> (Arc<ActiveConnection>, Arc<FakeConnection>) {
        let fake = Arc::new(self);
        let handle: Arc<dyn DbConnection> = fake.clone();
        (Arc::new(ActiveConnection::new(name, handle)), fake)
    }

    /// Statements received so far, in order.
    pub fn statements(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    /// True when any received statement contains `needle`.
    pub fn saw(&self, needle: &str) -> bool {
        let needle = normalize(needle);
        self.statements().iter().any(|s| normalize(s).contains(&needle))
    }

    pub fn pings(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn reply_for(&self, sql: &str) -> Option<Reply> {
        self.log.lock().unwrap().push(sql.to_string());
        let normalized = normalize(sql);
        self.rules
            .iter()
            .find(|rule| normalized.contains(&rule.needle))
            .map(|rule| rule.reply.clone())
    }
}

#[async_trait]
impl DbConnection for FakeConnection {
    async fn fetch(&self, sql: &str, _params: &[&str]) -> DbResult<RowSet> {
        match self.reply_for(sql) {
            Some(Reply::Rows(set)) => Ok(set),
            Some(Reply::Fail(message)) => Err(DbError::query(message, None, "")),
            Some(Reply::Affected(_)) => Ok(RowSet::default()),
            Some(Reply::Slow(delay)) => {
                tokio::time::sleep(delay).await;
                Ok(RowSet::default())
            }
            None => Err(DbError::query(
                format!("syntax error near '{}'", sql.trim()),
                None,
                "",
            )),
        }
    }

    async fn execute(&self, sql: &str) -> DbResult<u64> {
        match self.reply_for(sql) {
            Some(Reply::Affected(n)) => Ok(n),
            Some(Reply::Fail(message)) => Err(DbError::query(message, None, "")),
            Some(Reply::Slow(delay)) => {
                tokio::time::sleep(delay).await;
                Ok(0)
            }
            _ => Ok(0),
        }
    }

    async fn ping(&self) -> DbResult<()> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        if self.unreachable || self.is_closed() {
            return Err(DbError::connection("connection refused", "Check the server"));
        }
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Connector handing out pre-built fakes by connection name.
#[derive(Default)]
pub struct FakeConnector {
    fakes: Mutex<HashMap<String, Vec<Arc<FakeConnection>>>>,
    opened: Mutex<Vec<String>>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a fake for the next `open` of `name`.
    pub fn register(&self, name: &str, fake: FakeConnection) -> Arc<FakeConnection> {
        let fake = Arc::new(fake);
        self.fakes
            .lock()
            .unwrap()
            .entry(name.to_string())
            .or_default()
            .push(fake.clone());
        fake
    }

    /// Names opened so far, in order.
    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn open(&self, descriptor: &ConnectionDescriptor) -> DbResult<Arc<dyn DbConnection>> {
        self.opened.lock().unwrap().push(descriptor.name.clone());
        let fake = {
            let mut fakes = self.fakes.lock().unwrap();
            fakes.get_mut(&descriptor.name).and_then(|queue| {
                if queue.len() > 1 {
                    Some(queue.remove(0))
                } else {
                    queue.first().cloned()
                }
            })
        };
        let fake = fake.ok_or_else(|| {
            DbError::connection(
                format!("failed to ping database: no server for {}", descriptor.name),
                "Check the server",
            )
        })?;
        fake.ping().await?;
        Ok(fake)
    }
}
