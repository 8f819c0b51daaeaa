//! DB Gateway MCP Library
//!
//! This library provides MCP (Model Context Protocol) tools that give AI
//! assistants a session-scoped SQL gateway to PostgreSQL and MySQL databases.

pub mod config;
pub mod db;
pub mod error;
pub mod mcp;
pub mod models;
pub mod state;
pub mod tools;
pub mod transport;

pub use config::Config;
pub use error::{DbError, DbResult};
pub use mcp::DbService;
pub use state::GatewayState;
