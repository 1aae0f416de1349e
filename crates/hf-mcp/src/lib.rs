//! hf-mcp: Hugging Face Hub broker over the Model Context Protocol
//!
//! Architecture:
//! stdin/HTTP → JSON-RPC → [`McpServer`] → tool & resource registries
//! → metadata cache / model cache / Hub clients
//!
//! Methods:
//! - initialize, ping
//! - tools/list → enabled tools in declaration order
//! - tools/call → validated, gated dispatch
//! - resources/list, resources/read → `hf://` locators

pub mod protocol;
pub mod resources;
pub mod server;
pub mod transport;

use anyhow::Context;
use hf_cache::{MetadataCache, ModelCache};
use hf_core::BrokerConfig;
use hf_hub::{HuggingFaceClient, RepoWriter, SnapshotRuntime};
use hf_tools::ToolContext;
use std::sync::Arc;
use tracing::info;

// Re-export main types
pub use protocol::{JsonRpcError, McpRequest, McpResponse};
pub use resources::{Locator, ResourceContents, ResourceInfo, ResourceRegistry};
pub use server::McpServer;

pub const PROTOCOL_VERSION: &str = "2024-11-05";
pub const SERVER_NAME: &str = "hf-mcp";
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Wire the production collaborators: one Hub client serves lookups,
/// hosted inference and (with a token) repository writes.
pub fn build_context(config: BrokerConfig) -> anyhow::Result<ToolContext> {
    let config = Arc::new(config);
    let client = Arc::new(
        HuggingFaceClient::new(&config).context("creating Hugging Face client")?,
    );

    let runtime = Arc::new(SnapshotRuntime::new(
        client.clone(),
        client.clone(),
        config.model_dir.clone(),
        config.call_timeout(),
    ));
    let metadata = Arc::new(MetadataCache::new(
        client.clone(),
        config.metadata_cache_size,
        config.call_timeout(),
    ));
    let models = Arc::new(ModelCache::new(
        runtime,
        metadata.clone(),
        config.capacity,
        config.load_timeout(),
    ));

    let writer = config
        .credentials_present()
        .then(|| client.clone() as Arc<dyn RepoWriter>);
    info!(
        capacity = config.capacity,
        metadata_cache_size = config.metadata_cache_size,
        write_tools = writer.is_some(),
        "Broker context ready"
    );

    Ok(ToolContext {
        config,
        hub: client.clone(),
        inference: client,
        writer,
        metadata,
        models,
    })
}

/// Prelude for convenient imports
pub mod prelude {
    pub use super::{JsonRpcError, McpRequest, McpResponse, McpServer, ResourceRegistry};
}
