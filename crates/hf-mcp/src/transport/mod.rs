//! Transport Layer
//!
//! - Stdio (newline-delimited JSON-RPC on stdin/stdout)
//! - HTTP (`POST /mcp`, `GET /health`)

mod http;
mod stdio;

pub use http::{router, HttpTransport};
pub use stdio::StdioTransport;

use anyhow::Result;
use serde_json::Value;
use std::sync::Arc;

/// Anything that can answer MCP requests
#[async_trait::async_trait]
pub trait McpHandler: Send + Sync {
    /// `None` for notifications
    async fn handle_request(&self, request: crate::McpRequest) -> Option<crate::McpResponse>;

    async fn health(&self) -> Value {
        serde_json::json!({ "status": "ok" })
    }
}

/// Transport trait - implement for new transport types
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Serve requests until the peer goes away
    async fn serve<H: McpHandler + 'static>(self, handler: Arc<H>) -> Result<()>;
}

#[async_trait::async_trait]
impl McpHandler for crate::McpServer {
    async fn handle_request(&self, request: crate::McpRequest) -> Option<crate::McpResponse> {
        crate::McpServer::handle_request(self, request).await
    }

    async fn health(&self) -> Value {
        self.status().await
    }
}
