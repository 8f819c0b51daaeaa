//! Configuration handling for the DB gateway.
//!
//! This module provides configuration management via CLI arguments and environment
//! variables. Named connections and the optional logging section come from the
//! connections file, see [`crate::db::registry`].

use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::path::PathBuf;

pub const DEFAULT_HTTP_HOST: &str = "127.0.0.1";
pub const DEFAULT_HTTP_PORT: u16 = 8080;
pub const DEFAULT_MCP_ENDPOINT: &str = "/";
pub const DEFAULT_LOG_LEVEL: &str = "info";

// Pool configuration defaults
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_MIN_CONNECTIONS: u32 = 0;
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_MAX_LIFETIME_SECS: u64 = 300;
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// Connection pool configuration applied to every opened connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolOptions {
    /// Maximum connections in pool (default: 10)
    pub max_connections: Option<u32>,
    /// Minimum connections in pool (default: 0)
    pub min_connections: Option<u32>,
    /// Idle timeout in seconds (default: 600)
    pub idle_timeout_secs: Option<u64>,
    /// Maximum lifetime of a pooled connection in seconds (default: 300)
    pub max_lifetime_secs: Option<u64>,
    /// Connection acquire timeout in seconds (default: 30)
    pub acquire_timeout_secs: Option<u64>,
}

impl PoolOptions {
    pub fn max_connections_or_default(&self) -> u32 {
        self.max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS)
    }

    pub fn min_connections_or_default(&self) -> u32 {
        self.min_connections.unwrap_or(DEFAULT_MIN_CONNECTIONS)
    }

    pub fn idle_timeout_or_default(&self) -> u64 {
        self.idle_timeout_secs.unwrap_or(DEFAULT_IDLE_TIMEOUT_SECS)
    }

    pub fn max_lifetime_or_default(&self) -> u64 {
        self.max_lifetime_secs.unwrap_or(DEFAULT_MAX_LIFETIME_SECS)
    }

    pub fn acquire_timeout_or_default(&self) -> u64 {
        self.acquire_timeout_secs
            .unwrap_or(DEFAULT_ACQUIRE_TIMEOUT_SECS)
    }

    /// Validate pool options and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_connections == Some(0) {
            return Err("max_connections must be greater than 0".to_string());
        }
        let max = self.max_connections_or_default();
        let min = self.min_connections_or_default();
        if min > max {
            return Err(format!(
                "min_connections ({}) cannot exceed max_connections ({})",
                min, max
            ));
        }
        if self.acquire_timeout_secs == Some(0) {
            return Err("connect timeout must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Optional `logging` section of the connections file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LoggingSettings {
    /// Level used when none is given on the command line
    #[serde(default)]
    pub level: Option<String>,
    /// Append log records to this file as well
    #[serde(default)]
    pub output_file: Option<PathBuf>,
    /// Emit logs on stderr
    #[serde(default)]
    pub console: bool,
}

/// Transport mode for the MCP server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum TransportMode {
    /// Standard input/output (for CLI integration)
    #[default]
    Stdio,
    /// Streamable HTTP, one session per MCP client
    Http,
}

impl std::fmt::Display for TransportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdio => write!(f, "stdio"),
            Self::Http => write!(f, "http"),
        }
    }
}

/// Configuration for the DB gateway.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "db-gateway-mcp",
    about = "MCP gateway that lets AI assistants inspect and query PostgreSQL and MySQL databases",
    version,
    author
)]
pub struct Config {
    /// Path to the connections file. Defaults to the platform config dir, then ./connections.json
    #[arg(short, long, value_name = "PATH", env = "DB_MCP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Named connection to open at startup (overrides the file's default_connection)
    #[arg(short = 'n', long, value_name = "NAME", env = "DB_MCP_CONNECTION")]
    pub connection: Option<String>,

    /// Raw connection URL to open at startup under the name "direct"
    #[arg(long, value_name = "URL", env = "DB_CONN_STRING")]
    pub conn_string: Option<String>,

    /// Reject every statement that is not SELECT or SHOW
    #[arg(short, long, env = "DB_MCP_READ_ONLY")]
    pub read_only: bool,

    /// Transport mode (stdio or http)
    #[arg(
        short,
        long,
        value_enum,
        default_value = "stdio",
        env = "MCP_TRANSPORT"
    )]
    pub transport: TransportMode,

    /// HTTP host to bind to (only used with http transport)
    #[arg(
        long,
        default_value = DEFAULT_HTTP_HOST,
        env = "MCP_HTTP_HOST"
    )]
    pub http_host: String,

    /// HTTP port to bind to (only used with http transport)
    #[arg(
        long,
        default_value_t = DEFAULT_HTTP_PORT,
        env = "MCP_HTTP_PORT"
    )]
    pub http_port: u16,

    /// MCP endpoint path (only used with http transport)
    #[arg(
        long,
        default_value = DEFAULT_MCP_ENDPOINT,
        env = "MCP_ENDPOINT"
    )]
    pub mcp_endpoint: String,

    /// Maximum connections per pool
    #[arg(
        long,
        default_value_t = DEFAULT_MAX_CONNECTIONS,
        env = "DB_MCP_MAX_CONNECTIONS"
    )]
    pub max_connections: u32,

    /// Maximum lifetime of a pooled connection in seconds
    #[arg(
        long,
        default_value_t = DEFAULT_MAX_LIFETIME_SECS,
        env = "DB_MCP_MAX_LIFETIME"
    )]
    pub max_lifetime: u64,

    /// Connection timeout in seconds
    #[arg(
        long,
        default_value_t = DEFAULT_ACQUIRE_TIMEOUT_SECS,
        env = "DB_MCP_CONNECT_TIMEOUT"
    )]
    pub connect_timeout: u64,

    /// Log level (trace, debug, info, warn, error). Defaults to the file's logging.level, then info
    #[arg(long, env = "MCP_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Enable JSON logging format
    #[arg(long, env = "MCP_JSON_LOGS")]
    pub json_logs: bool,

    /// Enable logging output (disabled by default to avoid interfering with stdio transport)
    #[arg(long, env = "MCP_ENABLE_LOGS")]
    pub enable_logs: bool,
}

impl Config {
    /// Parse configuration from command line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Pool settings for every connection this process opens.
    pub fn pool_options(&self) -> PoolOptions {
        PoolOptions {
            max_connections: Some(self.max_connections),
            max_lifetime_secs: Some(self.max_lifetime),
            acquire_timeout_secs: Some(self.connect_timeout),
            ..PoolOptions::default()
        }
    }

    /// Log level: the CLI value, then the file's, then `info`.
    pub fn effective_log_level(&self, file: &LoggingSettings) -> String {
        self.log_level
            .clone()
            .or_else(|| file.level.clone())
            .filter(|level| !level.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
    }

    /// Whether stderr logging is on.
    pub fn console_logs(&self, file: &LoggingSettings) -> bool {
        self.enable_logs || file.console
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config: None,
            connection: None,
            conn_string: None,
            read_only: false,
            transport: TransportMode::Stdio,
            http_host: DEFAULT_HTTP_HOST.to_string(),
            http_port: DEFAULT_HTTP_PORT,
            mcp_endpoint: DEFAULT_MCP_ENDPOINT.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            max_lifetime: DEFAULT_MAX_LIFETIME_SECS,
            connect_timeout: DEFAULT_ACQUIRE_TIMEOUT_SECS,
            log_level: None,
            json_logs: false,
            enable_logs: false,
        }
    }
}
