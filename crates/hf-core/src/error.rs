//! Error taxonomy for hf-mcp
//!
//! Every failure a request can produce ends up as one of the [`Error`]
//! variants below. [`ErrorReport`] is the translated, serializable form that
//! crosses the process boundary; its `code` is stable and is the only field
//! integrators should branch on.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Why a remote lookup failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "status")]
pub enum RemoteFailure {
    /// The remote service answered that the record does not exist
    Missing,
    /// Non-success HTTP status other than "not found"
    Status(u16),
    /// The call exceeded the configured ceiling
    Timeout,
    /// Connection-level failure
    Transport,
    /// The response body could not be decoded
    Decode,
}

impl fmt::Display for RemoteFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteFailure::Missing => write!(f, "missing"),
            RemoteFailure::Status(code) => write!(f, "status {}", code),
            RemoteFailure::Timeout => write!(f, "timeout"),
            RemoteFailure::Transport => write!(f, "transport"),
            RemoteFailure::Decode => write!(f, "decode"),
        }
    }
}

/// Main error type for broker operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Not found: {what}")]
    NotFound {
        what: String,
        hint: Option<&'static str>,
    },

    #[error("Tool '{0}' is disabled")]
    Disabled(String),

    #[error("Remote lookup failed for {subject} ({failure}): {reason}")]
    RemoteLookupFailed {
        subject: String,
        failure: RemoteFailure,
        reason: String,
    },

    #[error("Failed to load {model_id}: {reason}")]
    LoadFailed { model_id: String, reason: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn invalid_arguments(msg: impl Into<String>) -> Self {
        Error::InvalidArguments(msg.into())
    }

    pub fn unknown_tool(name: impl Into<String>) -> Self {
        Error::UnknownTool(name.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound {
            what: msg.into(),
            hint: None,
        }
    }

    /// A model that exists but is not resident in the runtime cache
    pub fn not_loaded(model_id: &str) -> Self {
        Error::NotFound {
            what: format!("model '{}' is not loaded", model_id),
            hint: Some("Load it first with load_model_locally"),
        }
    }

    pub fn disabled(name: impl Into<String>) -> Self {
        Error::Disabled(name.into())
    }

    pub fn remote(
        subject: impl Into<String>,
        failure: RemoteFailure,
        reason: impl Into<String>,
    ) -> Self {
        Error::RemoteLookupFailed {
            subject: subject.into(),
            failure,
            reason: reason.into(),
        }
    }

    pub fn load_failed(model_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::LoadFailed {
            model_id: model_id.into(),
            reason: reason.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }

    /// Stable code for this error. Never changes between releases.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidArguments(_) => "INVALID_ARGUMENTS",
            Error::UnknownTool(_) => "UNKNOWN_TOOL",
            Error::NotFound { .. } => "NOT_FOUND",
            Error::Disabled(_) => "DISABLED",
            Error::RemoteLookupFailed { .. } => "REMOTE_LOOKUP_FAILED",
            Error::LoadFailed { .. } => "LOAD_FAILED",
            Error::Internal(_) => "INTERNAL",
        }
    }

    /// Whether retrying the same request later could succeed.
    ///
    /// The broker itself never retries; this is advice for callers.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::RemoteLookupFailed { .. } | Error::LoadFailed { .. }
        )
    }

    /// Routing errors are raised before any handler runs.
    pub fn is_routing(&self) -> bool {
        matches!(
            self,
            Error::InvalidArguments(_) | Error::UnknownTool(_) | Error::Disabled(_)
        )
    }

    /// True when a remote service said the record does not exist.
    pub fn is_remote_missing(&self) -> bool {
        matches!(
            self,
            Error::RemoteLookupFailed {
                failure: RemoteFailure::Missing,
                ..
            }
        )
    }

    fn suggestion(&self) -> Option<&'static str> {
        match self {
            Error::InvalidArguments(_) => Some("Check the tool's inputSchema via tools/list"),
            Error::UnknownTool(_) => Some("Call tools/list to see the available tools"),
            Error::NotFound { hint, .. } => *hint,
            Error::Disabled(_) => Some("Set HF_TOKEN to enable repository write tools"),
            Error::RemoteLookupFailed {
                failure: RemoteFailure::Missing,
                ..
            } => Some("Check the identifier spelling and its visibility on the Hub"),
            Error::RemoteLookupFailed {
                failure: RemoteFailure::Timeout,
                ..
            } => Some("The remote service is slow; retry later or raise call_timeout_ms"),
            Error::RemoteLookupFailed { .. } => {
                Some("Check network connection, API limits and credentials")
            }
            Error::LoadFailed { .. } => Some("Check model availability and system memory"),
            Error::Internal(_) => None,
        }
    }
}

/// Translated error, the shape that crosses the process boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl ErrorReport {
    /// Human-readable multi-line rendering used for text content blocks.
    pub fn render(&self) -> String {
        let mut out = format!("Error {}: {}", self.code, self.message);
        if let Some(details) = &self.details {
            out.push_str(&format!("\nDetails: {}", details));
        }
        if let Some(suggestion) = &self.suggestion {
            out.push_str(&format!("\nSuggestion: {}", suggestion));
        }
        out
    }
}

impl From<&Error> for ErrorReport {
    fn from(err: &Error) -> Self {
        let (message, details) = match err {
            Error::RemoteLookupFailed {
                subject, reason, ..
            } => (
                format!("Remote lookup failed for {}", subject),
                Some(reason.clone()),
            ),
            Error::LoadFailed { model_id, reason } => (
                format!("Failed to load model {}", model_id),
                Some(reason.clone()),
            ),
            other => (other.to_string(), None),
        };

        Self {
            code: err.code().to_string(),
            message,
            details,
            suggestion: err.suggestion().map(String::from),
        }
    }
}

impl From<Error> for ErrorReport {
    fn from(err: Error) -> Self {
        ErrorReport::from(&err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Internal(format!("serialization: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(Error::invalid_arguments("x").code(), "INVALID_ARGUMENTS");
        assert_eq!(Error::unknown_tool("x").code(), "UNKNOWN_TOOL");
        assert_eq!(Error::not_found("x").code(), "NOT_FOUND");
        assert_eq!(Error::disabled("x").code(), "DISABLED");
        assert_eq!(
            Error::remote("gpt2", RemoteFailure::Timeout, "slow").code(),
            "REMOTE_LOOKUP_FAILED"
        );
        assert_eq!(Error::load_failed("gpt2", "oom").code(), "LOAD_FAILED");
        assert_eq!(Error::internal("x").code(), "INTERNAL");
    }

    #[test]
    fn test_transient_classification() {
        assert!(Error::load_failed("gpt2", "oom").is_transient());
        assert!(Error::remote("gpt2", RemoteFailure::Status(503), "busy").is_transient());
        assert!(!Error::invalid_arguments("missing").is_transient());
        assert!(!Error::disabled("hf_upload_file").is_transient());
        assert!(Error::unknown_tool("nope").is_routing());
        assert!(!Error::not_found("hf://nope").is_routing());
    }

    #[test]
    fn test_report_for_remote_failure() {
        let err = Error::remote("model gpt2", RemoteFailure::Missing, "404 Not Found");
        let report = ErrorReport::from(&err);

        assert_eq!(report.code, "REMOTE_LOOKUP_FAILED");
        assert_eq!(report.message, "Remote lookup failed for model gpt2");
        assert_eq!(report.details.as_deref(), Some("404 Not Found"));
        assert!(report.suggestion.unwrap().contains("identifier"));
        assert!(err.is_remote_missing());
    }

    #[test]
    fn test_not_loaded_carries_hint() {
        let report = ErrorReport::from(Error::not_loaded("gpt2"));
        assert_eq!(report.code, "NOT_FOUND");
        assert!(report.message.contains("gpt2"));
        assert!(report.suggestion.unwrap().contains("load_model_locally"));
    }

    #[test]
    fn test_render() {
        let report = ErrorReport::from(Error::load_failed("gpt2", "out of memory"));
        let text = report.render();
        assert!(text.starts_with("Error LOAD_FAILED: Failed to load model gpt2"));
        assert!(text.contains("\nDetails: out of memory"));
        assert!(text.contains("\nSuggestion: "));
    }

    #[test]
    fn test_report_serialization_skips_empty() {
        let report = ErrorReport::from(Error::not_found("hf://nowhere"));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["code"], "NOT_FOUND");
        assert!(json.get("details").is_none());
        assert!(json.get("suggestion").is_none());
    }
}
