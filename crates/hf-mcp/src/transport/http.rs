//! HTTP Transport
//!
//! JSON-RPC over `POST /mcp`, plus `GET /health` for liveness checks.

use super::{McpHandler, Transport};
use crate::{JsonRpcError, McpRequest, McpResponse};
use anyhow::Result;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info};

/// HTTP transport (REST endpoints)
pub struct HttpTransport {
    bind_addr: String,
    enable_cors: bool,
}

impl HttpTransport {
    pub fn new(bind_addr: impl Into<String>) -> Self {
        Self {
            bind_addr: bind_addr.into(),
            enable_cors: true,
        }
    }

    pub fn without_cors(mut self) -> Self {
        self.enable_cors = false;
        self
    }
}

/// Routes shared by the server and tests
pub fn router<H: McpHandler + 'static>(handler: Arc<H>) -> Router {
    Router::new()
        .route("/mcp", post(mcp_handler::<H>))
        .route("/health", get(health_handler::<H>))
        .with_state(handler)
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn serve<H: McpHandler + 'static>(self, handler: Arc<H>) -> Result<()> {
        info!(addr = %self.bind_addr, "Starting HTTP transport");

        let mut app = router(handler);
        if self.enable_cors {
            app = app.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            );
        }

        let listener = tokio::net::TcpListener::bind(&self.bind_addr).await?;
        info!(addr = %self.bind_addr, "HTTP transport listening");

        axum::serve(listener, app).await?;
        Ok(())
    }
}

async fn mcp_handler<H: McpHandler + 'static>(
    State(handler): State<Arc<H>>,
    body: String,
) -> Response {
    debug!(request = %body, "HTTP request");

    let request = match serde_json::from_str::<McpRequest>(&body) {
        Ok(request) => request,
        Err(e) => {
            let response = McpResponse::error(None, JsonRpcError::parse_error(e.to_string()));
            return (StatusCode::BAD_REQUEST, Json(response)).into_response();
        }
    };

    match handler.handle_request(request).await {
        Some(response) => Json(response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

async fn health_handler<H: McpHandler + 'static>(State(handler): State<Arc<H>>) -> Response {
    Json(handler.health().await).into_response()
}
