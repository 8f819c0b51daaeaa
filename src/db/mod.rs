//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - The `DbConnection` seam and sqlx-backed pools
//! - Driver row decoding into tagged values
//! - Dialect probing with primary/secondary fallback
//! - The per-session connection store and the connection registry
//! - Schema introspection, EXPLAIN and deadline-bounded execution

pub mod connection;
pub mod dialect;
pub mod executor;
pub mod explain;
pub mod pool;
pub mod registry;
pub mod schema;
pub mod session;
pub mod types;

pub use connection::{ActiveConnection, Connector, DbConnection};
pub use dialect::{Dialect, probe, with_fallback};
pub use executor::{QueryExecutor, with_deadline};
pub use pool::{DbPool, SqlxConnector};
pub use registry::ConnectionRegistry;
pub use schema::SchemaInspector;
pub use session::{DEFAULT_SCHEMA, DEFAULT_SESSION_ID, SessionState, SessionStore};
