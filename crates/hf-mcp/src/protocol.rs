//! MCP Protocol Types
//!
//! JSON-RPC 2.0 envelope for the Model Context Protocol, plus the mapping
//! from broker errors onto JSON-RPC error objects.

use hf_core::{Error, ErrorReport};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

/// JSON-RPC 2.0 Request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpRequest {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

impl McpRequest {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: None,
            method: method.into(),
            params: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<Value>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }

    /// Notifications carry no id and never get a response
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// JSON-RPC 2.0 Response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpResponse {
    pub jsonrpc: String,
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl McpResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<Value>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// JSON-RPC 2.0 Error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
    /// Tool exists but is gated off by configuration
    pub const TOOL_DISABLED: i32 = -32001;
    pub const RESOURCE_NOT_FOUND: i32 = -32002;

    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    // Standard JSON-RPC error codes
    pub fn parse_error(msg: impl Into<String>) -> Self {
        Self::new(Self::PARSE_ERROR, msg)
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::new(Self::INVALID_REQUEST, msg)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(Self::METHOD_NOT_FOUND, format!("Method not found: {}", method))
    }

    pub fn invalid_params(msg: impl Into<String>) -> Self {
        Self::new(Self::INVALID_PARAMS, msg)
    }

    pub fn internal_error(msg: impl Into<String>) -> Self {
        Self::new(Self::INTERNAL_ERROR, msg)
    }

    /// JSON-RPC error for a broker error, with the translated report as `data`
    pub fn from_error(err: &Error) -> Self {
        let code = match err {
            Error::UnknownTool(_) => Self::METHOD_NOT_FOUND,
            Error::InvalidArguments(_) => Self::INVALID_PARAMS,
            Error::Disabled(_) => Self::TOOL_DISABLED,
            Error::NotFound { .. } => Self::RESOURCE_NOT_FOUND,
            _ => Self::INTERNAL_ERROR,
        };
        let report = ErrorReport::from(err);
        let data = serde_json::to_value(&report).ok();
        Self {
            code,
            message: report.message,
            data,
        }
    }
}

impl From<&Error> for JsonRpcError {
    fn from(err: &Error) -> Self {
        JsonRpcError::from_error(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serialization() {
        let req = McpRequest::new("tools/list")
            .with_id(json!(1))
            .with_params(json!({"limit": 10}));

        let json_str = serde_json::to_string(&req).unwrap();
        assert!(json_str.contains("tools/list"));
        assert!(!req.is_notification());
    }

    #[test]
    fn test_notification_has_no_id() {
        let req: McpRequest =
            serde_json::from_str(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
                .unwrap();
        assert!(req.is_notification());
    }

    #[test]
    fn test_response_success() {
        let resp = McpResponse::success(Some(json!(1)), json!({"tools": []}));
        assert!(resp.is_success());
    }

    #[test]
    fn test_response_error() {
        let resp = McpResponse::error(
            Some(json!(1)),
            JsonRpcError::method_not_found("unknown"),
        );
        assert!(!resp.is_success());
    }

    #[test]
    fn test_error_mapping_carries_report() {
        let err = JsonRpcError::from_error(&Error::disabled("hf_upload_file"));
        assert_eq!(err.code, JsonRpcError::TOOL_DISABLED);
        let data = err.data.unwrap();
        assert_eq!(data["code"], "DISABLED");
        assert!(data["suggestion"].as_str().unwrap().contains("HF_TOKEN"));

        let err = JsonRpcError::from_error(&Error::unknown_tool("nope"));
        assert_eq!(err.code, JsonRpcError::METHOD_NOT_FOUND);

        let err = JsonRpcError::from_error(&Error::not_found("hf://nope"));
        assert_eq!(err.code, JsonRpcError::RESOURCE_NOT_FOUND);
        assert_eq!(err.data.unwrap()["code"], "NOT_FOUND");
    }
}
