//! Collaborator error types and their translation into the broker taxonomy.

use hf_core::{Error, RemoteFailure};
use std::time::Duration;
use thiserror::Error;

/// Failure talking to the Hub, the hosted inference service or the
/// repository write API.
#[derive(Error, Debug)]
pub enum HubError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("write credentials are not configured")]
    MissingToken,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HubError {
    pub fn failure(&self) -> RemoteFailure {
        match self {
            HubError::NotFound(_) => RemoteFailure::Missing,
            HubError::Status { status, .. } => RemoteFailure::Status(*status),
            HubError::MissingToken => RemoteFailure::Status(401),
            HubError::Timeout(_) => RemoteFailure::Timeout,
            HubError::Transport(_) | HubError::Io(_) => RemoteFailure::Transport,
            HubError::Decode(_) => RemoteFailure::Decode,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, HubError::NotFound(_))
    }

    /// Translate into the broker taxonomy, naming what was being looked up.
    pub fn into_error(self, subject: impl Into<String>) -> Error {
        let failure = self.failure();
        Error::remote(subject, failure, self.to_string())
    }
}

impl From<reqwest::Error> for HubError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            HubError::Timeout(Duration::ZERO)
        } else if err.is_decode() {
            HubError::Decode(err.to_string())
        } else {
            HubError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for HubError {
    fn from(err: serde_json::Error) -> Self {
        HubError::Decode(err.to_string())
    }
}

impl From<HubError> for Error {
    fn from(err: HubError) -> Self {
        err.into_error("hub")
    }
}

/// Failure inside the local model runtime.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("materialization failed: {0}")]
    Materialize(String),

    #[error("generation failed: {0}")]
    Generation(String),

    #[error("unsupported task: {0}")]
    UnsupportedTask(String),

    #[error(transparent)]
    Hub(#[from] HubError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RuntimeError {
    /// Translate into the broker taxonomy for the given model.
    pub fn into_error(self, model_id: impl Into<String>) -> Error {
        Error::load_failed(model_id, self.to_string())
    }
}
