//! hf-mcp-server: Hugging Face MCP broker
//!
//!   hf-mcp-server                         # stdio
//!   hf-mcp-server --http 127.0.0.1:3001   # HTTP (POST /mcp, GET /health)
//!   hf-mcp-server --capacity 2 --config ./hf-mcp.toml

use anyhow::{Context, Result};
use clap::Parser;
use hf_core::config::{load_environment, BrokerConfig};
use hf_mcp::{
    build_context,
    transport::{HttpTransport, StdioTransport, Transport},
    McpServer,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hf-mcp-server")]
#[command(about = "Hugging Face Hub MCP server", version)]
struct Cli {
    /// TOML configuration file (defaults to ./hf-mcp.toml when present)
    #[arg(long, short, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Max concurrently loaded models
    #[arg(long)]
    capacity: Option<usize>,

    /// Max cached metadata records
    #[arg(long)]
    metadata_cache_size: Option<usize>,

    /// Serve HTTP on this address instead of stdio
    #[arg(long, value_name = "ADDR")]
    http: Option<String>,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so they never mix with stdio responses
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Some(path) = load_environment() {
        info!(path = %path, "Loaded environment file");
    }

    let mut config =
        BrokerConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(capacity) = cli.capacity {
        config.capacity = capacity;
    }
    if let Some(size) = cli.metadata_cache_size {
        config.metadata_cache_size = size;
    }
    config.validate().context("validating command-line overrides")?;

    info!(?config, "Starting hf-mcp-server");

    let server = Arc::new(McpServer::new(build_context(config)?).context("registering tools")?);

    let served = tokio::select! {
        result = serve(server.clone(), cli.http) => result,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted");
            Ok(())
        }
    };

    server.shutdown().await;
    info!(status = %server.status().await, "Stopped");
    served
}

async fn serve(server: Arc<McpServer>, http: Option<String>) -> Result<()> {
    match http {
        Some(addr) => HttpTransport::new(addr).serve(server).await,
        None => StdioTransport::new().serve(server).await,
    }
}
