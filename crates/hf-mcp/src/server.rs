//! MCP Server
//!
//! Transport-agnostic dispatcher: resolves `tools/*` and `resources/*`
//! requests against the tool and resource registries and shapes the results
//! into MCP envelopes. Works the same behind stdio and HTTP.

use crate::protocol::{JsonRpcError, McpRequest, McpResponse};
use crate::resources::{ResourceContents, ResourceInfo, ResourceRegistry};
use crate::{PROTOCOL_VERSION, SERVER_NAME, SERVER_VERSION};
use hf_core::{ContentBlock, Error, ErrorReport, Result, ToolOutput};
use hf_tools::{register_builtin_tools, CapabilityDescriptor, ToolContext, ToolRegistry};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

pub struct McpServer {
    ctx: ToolContext,
    tools: ToolRegistry,
    resources: ResourceRegistry,
}

impl McpServer {
    /// Server exposing every built-in tool over `ctx`
    pub fn new(ctx: ToolContext) -> Result<Self> {
        let tools = register_builtin_tools(&ctx)?;
        Ok(Self::with_registry(ctx, tools))
    }

    pub fn with_registry(ctx: ToolContext, tools: ToolRegistry) -> Self {
        let resources = ResourceRegistry::new(ctx.clone());
        Self {
            ctx,
            tools,
            resources,
        }
    }

    pub fn context(&self) -> &ToolContext {
        &self.ctx
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    // ------------------------------------------------------------------
    // Typed operations
    // ------------------------------------------------------------------

    pub fn list_resources(&self) -> &[ResourceInfo] {
        self.resources.list_resources()
    }

    pub async fn read_resource(&self, uri: &str) -> Result<ResourceContents> {
        self.resources.read_resource(uri).await
    }

    /// Enabled tools only, in declaration order
    pub fn list_tools(&self) -> Vec<&CapabilityDescriptor> {
        self.tools.list_tools()
    }

    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolOutput> {
        self.tools.call(name, arguments).await
    }

    /// Release every loaded model
    pub async fn shutdown(&self) {
        info!(loaded = self.ctx.models.count(), "Releasing loaded models");
        self.ctx.models.clear().await;
    }

    /// Snapshot used by the health endpoint and shutdown logging
    pub async fn status(&self) -> Value {
        json!({
            "status": "ok",
            "server": SERVER_NAME,
            "version": SERVER_VERSION,
            "tools": self.tools.stats(),
            "models": {
                "loaded": self.ctx.models.resident_ids(),
                "capacity": self.ctx.models.capacity(),
                "stats": self.ctx.models.stats(),
            },
            "metadata": {
                "entries": self.ctx.metadata.len().await,
                "capacity": self.ctx.metadata.capacity(),
                "stats": self.ctx.metadata.stats().await,
            },
        })
    }

    // ------------------------------------------------------------------
    // JSON-RPC envelope
    // ------------------------------------------------------------------

    /// Handle one JSON-RPC message. Notifications, meaning any message
    /// without an id, yield `None` and are not dispatched.
    pub async fn handle_request(&self, request: McpRequest) -> Option<McpResponse> {
        debug!(method = %request.method, "Handling MCP request");

        if request.is_notification() || request.method.starts_with("notifications/") {
            debug!(method = %request.method, "Notification received");
            return None;
        }
        if request.jsonrpc != crate::protocol::JSONRPC_VERSION {
            return Some(McpResponse::error(
                request.id,
                JsonRpcError::invalid_request(format!(
                    "Unsupported jsonrpc version '{}'",
                    request.jsonrpc
                )),
            ));
        }

        let response = match request.method.as_str() {
            "initialize" => self.handle_initialize(request),
            "ping" => McpResponse::success(request.id, json!({})),
            "tools/list" => self.handle_tools_list(request),
            "tools/call" => self.handle_tools_call(request).await,
            "resources/list" => self.handle_resources_list(request),
            "resources/read" => self.handle_resources_read(request).await,
            _ => McpResponse::error(request.id, JsonRpcError::method_not_found(&request.method)),
        };
        Some(response)
    }

    fn handle_initialize(&self, request: McpRequest) -> McpResponse {
        let client = request
            .params
            .as_ref()
            .and_then(|p| p.get("clientInfo"))
            .and_then(|ci| ci.get("name"))
            .and_then(|n| n.as_str())
            .unwrap_or("unknown");
        info!(client = %client, "Client connected");

        McpResponse::success(
            request.id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {
                    "tools": { "listChanged": false },
                    "resources": { "subscribe": false, "listChanged": false }
                },
                "serverInfo": {
                    "name": SERVER_NAME,
                    "version": SERVER_VERSION
                }
            }),
        )
    }

    fn handle_tools_list(&self, request: McpRequest) -> McpResponse {
        McpResponse::success(request.id, json!({ "tools": self.list_tools() }))
    }

    async fn handle_tools_call(&self, request: McpRequest) -> McpResponse {
        let params = match &request.params {
            Some(p) => p,
            None => {
                return McpResponse::error(request.id, JsonRpcError::invalid_params("Missing params"))
            }
        };

        let tool_name = match params.get("name").and_then(|n| n.as_str()) {
            Some(n) => n.to_string(),
            None => {
                return McpResponse::error(
                    request.id,
                    JsonRpcError::invalid_params("Missing tool name"),
                )
            }
        };
        let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));

        match self.call_tool(&tool_name, arguments).await {
            Ok(output) => McpResponse::success(request.id, tool_result(output)),
            Err(e) if e.is_routing() => {
                McpResponse::error(request.id, JsonRpcError::from_error(&e))
            }
            Err(e) => McpResponse::success(request.id, tool_error(&e)),
        }
    }

    fn handle_resources_list(&self, request: McpRequest) -> McpResponse {
        McpResponse::success(request.id, json!({ "resources": self.list_resources() }))
    }

    async fn handle_resources_read(&self, request: McpRequest) -> McpResponse {
        let uri = request
            .params
            .as_ref()
            .and_then(|p| p.get("uri"))
            .and_then(|u| u.as_str())
            .unwrap_or("");

        if uri.is_empty() {
            return McpResponse::error(request.id, JsonRpcError::invalid_params("Missing uri"));
        }

        match self.read_resource(uri).await {
            Ok(contents) => McpResponse::success(request.id, json!({ "contents": [contents] })),
            Err(e) => {
                warn!(uri = %uri, code = e.code(), "Resource read failed");
                McpResponse::error(request.id, JsonRpcError::from_error(&e))
            }
        }
    }
}

/// MCP `tools/call` result for a successful handler.
///
/// Text blocks become text content; the first structured block becomes
/// `structuredContent` (wrapped under `result` when it is not an object).
pub fn tool_result(output: ToolOutput) -> Value {
    let mut content = Vec::new();
    let mut structured = None;

    for block in output.content {
        match block {
            ContentBlock::Text { text } => content.push(json!({ "type": "text", "text": text })),
            ContentBlock::Structured { data } if structured.is_none() => structured = Some(data),
            ContentBlock::Structured { data } => {
                content.push(json!({ "type": "text", "text": data.to_string() }))
            }
        }
    }
    if content.is_empty() {
        if let Some(data) = &structured {
            content.push(json!({ "type": "text", "text": data.to_string() }));
        }
    }

    let mut result = json!({ "content": content, "isError": false });
    if let Some(data) = structured {
        result["structuredContent"] = match data {
            Value::Object(_) => data,
            other => json!({ "result": other }),
        };
    }
    result
}

/// MCP `tools/call` result for a handler failure
pub fn tool_error(err: &Error) -> Value {
    let report = ErrorReport::from(err);
    json!({
        "content": [{ "type": "text", "text": report.render() }],
        "isError": true,
        "structuredContent": report,
    })
}
