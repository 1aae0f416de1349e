//! Shared collaborators handed to every built-in tool

use hf_cache::{MetadataCache, ModelCache};
use hf_core::{BrokerConfig, Error, RemoteFailure, Result};
use hf_hub::{HubApi, HubError, InferenceApi, RepoWriter};
use std::future::Future;
use std::sync::Arc;

#[derive(Clone)]
pub struct ToolContext {
    pub config: Arc<BrokerConfig>,
    pub hub: Arc<dyn HubApi>,
    pub inference: Arc<dyn InferenceApi>,
    /// Present only when write credentials are configured
    pub writer: Option<Arc<dyn RepoWriter>>,
    pub metadata: Arc<MetadataCache>,
    pub models: Arc<ModelCache>,
}

impl ToolContext {
    /// Run a collaborator call under the configured call timeout,
    /// translating failures into `RemoteLookupFailed` for `subject`.
    pub async fn remote<T, F>(&self, subject: &str, call: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, HubError>>,
    {
        let timeout = self.config.call_timeout();
        match tokio::time::timeout(timeout, call).await {
            Ok(result) => result.map_err(|e| e.into_error(subject)),
            Err(_) => Err(Error::remote(
                subject,
                RemoteFailure::Timeout,
                format!("no answer within {:?}", timeout),
            )),
        }
    }

    pub fn writer(&self) -> Result<&Arc<dyn RepoWriter>> {
        self.writer
            .as_ref()
            .ok_or_else(|| Error::internal("repository writer is not configured"))
    }
}
