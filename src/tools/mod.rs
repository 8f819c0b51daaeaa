//! MCP tool implementations.
//!
//! This module contains all database tool handlers:
//! - `query`: `select_query`, `execute_select` and `show_query`
//! - `write`: `execute_query` for INSERT/UPDATE/DELETE and DDL
//! - `schema`: `list_tables`, `describe_table`, `analyze_table`, `get_db_info`
//! - `explain`: `explain_query`
//! - `connection`: `list_connections`, `switch_connection`, `test_connection`
//! - `guard`: the lexical classifier every SQL tool passes through

pub mod connection;
pub mod explain;
pub mod guard;
pub mod query;
pub mod schema;
pub mod write;

pub use connection::{
    ConnectionSummary, ConnectionToolHandler, ListConnectionsOutput, SwitchConnectionInput,
    SwitchConnectionOutput, TestConnectionInput, TestConnectionOutput,
};
pub use explain::{ExplainOutput, ExplainToolHandler};
pub use query::{ExecuteSelectOutput, QueryInput, QueryOutput, QueryToolHandler};
pub use schema::{
    AnalyzeTableOutput, EmptyInput, ListTablesInput, ListTablesOutput, SchemaToolHandler,
    TableInput,
};
pub use write::{ExecuteQueryOutput, WriteToolHandler};
