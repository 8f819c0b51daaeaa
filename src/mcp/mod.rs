//! MCP server integration module.
//!
//! This module exposes the gateway tools over the MCP protocol using the rmcp
//! framework. Each MCP session gets its own [`DbService`].

pub mod service;

pub use service::DbService;
