//! Data models for the DB gateway.
//!
//! This module re-exports all model types used throughout the application.

pub mod connection;
pub mod query;
pub mod schema;

// Re-export commonly used types
pub use connection::{ConnectionDescriptor, DatabaseType, redact_url};
pub use query::{QueryIntent, Record, RowSet, RowView, SqlValue, decode_binary_text};
pub use schema::{
    ColumnInfo, DbInfo, IndexInfo, NOT_AVAILABLE, SYSTEM_SCHEMAS, TableDescription, TableInfo, TableStats,
    is_system_schema, normalize_table_type, parse_index_columns,
};
