//! DB Gateway MCP - Main entry point.
//!
//! This server provides MCP (Model Context Protocol) tools that let AI assistants
//! inspect and query PostgreSQL and MySQL databases through a per-session connection.

use db_gateway_mcp::GatewayState;
use db_gateway_mcp::config::{Config, LoggingSettings, TransportMode};
use db_gateway_mcp::db::{ActiveConnection, ConnectionRegistry, Connector, SqlxConnector};
use db_gateway_mcp::state::initial_descriptor;
use db_gateway_mcp::transport::{HttpTransport, StdioTransport, Transport};
use std::fs::OpenOptions;
use std::sync::{Arc, Mutex};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, prelude::*};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Initialize the tracing subscriber for logging.
///
/// Console output goes to stderr since stdout carries the stdio transport.
fn init_tracing(config: &Config, settings: &LoggingSettings) -> std::io::Result<()> {
    let level = config.effective_log_level(settings);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    let mut layers: Vec<BoxedLayer> = Vec::new();
    if config.console_logs(settings) {
        let layer = fmt::layer().with_writer(std::io::stderr).with_target(true);
        layers.push(if config.json_logs {
            layer.json().boxed()
        } else {
            layer.boxed()
        });
    }
    if let Some(path) = &settings.output_file {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let layer = fmt::layer().with_writer(Mutex::new(file)).with_ansi(false);
        layers.push(if config.json_logs {
            layer.json().boxed()
        } else {
            layer.boxed()
        });
    }

    tracing_subscriber::registry().with(layers).with(filter).init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse_args();
    config.pool_options().validate()?;

    // The connections file may configure logging, so it is read first
    let registry = ConnectionRegistry::discover(config.config.as_deref())?;
    init_tracing(&config, registry.logging())?;

    info!(
        transport = %config.transport,
        read_only = config.read_only,
        "Starting DB Gateway MCP v{}",
        env!("CARGO_PKG_VERSION")
    );
    registry.log_summary();

    let connector = Arc::new(SqlxConnector::new(config.pool_options()));
    let initial = initial_descriptor(
        config.conn_string.as_deref(),
        config.connection.as_deref(),
        &registry,
    )?;

    let mut state = GatewayState::new(Arc::new(registry), connector.clone(), config.read_only);
    match initial {
        Some(descriptor) => {
            info!(
                connection = %descriptor.name,
                url = %descriptor.redacted_url(),
                "Opening startup connection"
            );
            let handle = connector.open(&descriptor).await?;
            state = state.with_bootstrap(Arc::new(ActiveConnection::new(&descriptor.name, handle)));
        }
        None => info!("No startup connection; call switch_connection to select one"),
    }

    let result = match config.transport {
        TransportMode::Stdio => StdioTransport::new(state).run().await,
        TransportMode::Http => {
            info!(
                host = %config.http_host,
                port = config.http_port,
                endpoint = %config.mcp_endpoint,
                "Using HTTP transport"
            );
            HttpTransport::new(
                state,
                &config.http_host,
                config.http_port,
                &config.mcp_endpoint,
            )
            .run()
            .await
        }
    };

    if let Err(e) = result {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}
