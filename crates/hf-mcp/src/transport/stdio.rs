//! Stdio Transport
//!
//! Standard MCP transport over stdin/stdout. Every request runs in its own
//! task; a single writer task owns stdout so responses never interleave.

use super::{McpHandler, Transport};
use crate::{JsonRpcError, McpRequest, McpResponse};
use anyhow::Result;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

const RESPONSE_QUEUE: usize = 64;

/// Stdio transport - reads JSON-RPC from stdin, writes to stdout
pub struct StdioTransport;

impl StdioTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Transport for StdioTransport {
    async fn serve<H: McpHandler + 'static>(self, handler: Arc<H>) -> Result<()> {
        info!("Starting MCP stdio transport");

        let (tx, mut rx) = mpsc::channel::<McpResponse>(RESPONSE_QUEUE);

        let writer = tokio::spawn(async move {
            let mut stdout = tokio::io::stdout();
            while let Some(response) = rx.recv().await {
                let response_json = serde_json::to_string(&response)?;
                debug!(response = %response_json, "Sending response");
                stdout.write_all(response_json.as_bytes()).await?;
                stdout.write_all(b"\n").await?;
                stdout.flush().await?;
            }
            Ok::<_, anyhow::Error>(())
        });

        let mut reader = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = reader.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            debug!(request = %line, "Received request");

            match serde_json::from_str::<McpRequest>(line) {
                Ok(request) => {
                    let handler = Arc::clone(&handler);
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        if let Some(response) = handler.handle_request(request).await {
                            if tx.send(response).await.is_err() {
                                error!("Response writer is gone");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "Parse error");
                    let response =
                        McpResponse::error(None, JsonRpcError::parse_error(e.to_string()));
                    if tx.send(response).await.is_err() {
                        break;
                    }
                }
            }
        }

        // Writer drains once every in-flight request has dropped its sender
        drop(tx);
        writer.await??;

        info!("Stdio transport shutting down");
        Ok(())
    }
}
