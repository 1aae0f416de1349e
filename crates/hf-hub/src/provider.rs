//! Collaborator traits
//!
//! The broker core only talks to the outside world through these seams.
//! Each has an HTTP-backed implementation in this crate and a stub in
//! [`crate::testing`].

use async_trait::async_trait;
use hf_core::{MetadataRecord, RepoKind, TaskKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{HubError, RuntimeError};

/// Query for `HubApi::search`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub kind: RepoKind,
    pub search: Option<String>,
    /// Pipeline tag filter (models only)
    pub task: Option<String>,
    /// Library filter (models only)
    pub library: Option<String>,
    pub limit: usize,
}

impl SearchQuery {
    pub fn new(kind: RepoKind, limit: usize) -> Self {
        Self {
            kind,
            search: None,
            task: None,
            library: None,
            limit,
        }
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn with_task(mut self, task: Option<String>) -> Self {
        self.task = task;
        self
    }

    pub fn with_library(mut self, library: Option<String>) -> Self {
        self.library = library;
        self
    }
}

/// A single file to fetch from a Hub repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub repo_id: String,
    pub kind: RepoKind,
    pub filename: String,
    pub revision: String,
    pub dest_dir: PathBuf,
}

impl DownloadRequest {
    pub fn new(
        repo_id: impl Into<String>,
        filename: impl Into<String>,
        dest_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            repo_id: repo_id.into(),
            kind: RepoKind::Model,
            filename: filename.into(),
            revision: "main".to_string(),
            dest_dir: dest_dir.into(),
        }
    }

    pub fn with_kind(mut self, kind: RepoKind) -> Self {
        self.kind = kind;
        self
    }
}

/// A single file to commit to a Hub repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub repo_id: String,
    pub kind: RepoKind,
    pub local_path: PathBuf,
    pub path_in_repo: String,
    pub commit_message: String,
}

/// Sampling knobs for local generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub max_length: usize,
    pub temperature: f32,
    pub do_sample: bool,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_length: 50,
            temperature: 0.7,
            do_sample: true,
        }
    }
}

/// Read side of the Hub: metadata lookups, search and file downloads
#[async_trait]
pub trait HubApi: Send + Sync {
    /// Fetch one repository record. A missing repository is `HubError::NotFound`.
    async fn lookup(&self, kind: RepoKind, id: &str) -> Result<MetadataRecord, HubError>;

    async fn search(&self, query: &SearchQuery) -> Result<Vec<MetadataRecord>, HubError>;

    /// Download one file, returning where it was written.
    async fn download(&self, request: &DownloadRequest) -> Result<PathBuf, HubError>;
}

/// Hosted inference service
#[async_trait]
pub trait InferenceApi: Send + Sync {
    async fn invoke(
        &self,
        model_id: &str,
        inputs: &str,
        parameters: Option<&Value>,
        timeout: Duration,
    ) -> Result<Value, HubError>;
}

/// Repository write service; only wired up when a token is configured
#[async_trait]
pub trait RepoWriter: Send + Sync {
    /// Create a repository, returning its URL.
    async fn create_repo(
        &self,
        repo_id: &str,
        kind: RepoKind,
        private: bool,
    ) -> Result<String, HubError>;

    /// Commit one file, returning the commit URL.
    async fn upload_file(&self, request: &UploadRequest) -> Result<String, HubError>;
}

/// A materialized model: weights plus tokenizer/auxiliary state.
#[async_trait]
pub trait LoadedModel: Send + Sync {
    fn model_id(&self) -> &str;

    fn task(&self) -> TaskKind;

    async fn generate(&self, inputs: &str, params: &GenerationParams)
        -> Result<String, RuntimeError>;
}

pub type BoxedModel = Arc<dyn LoadedModel>;

/// Local model runtime
#[async_trait]
pub trait ModelRuntime: Send + Sync {
    /// Turn an identifier into a runnable payload. Expensive.
    async fn materialize(&self, model_id: &str, task: TaskKind) -> Result<BoxedModel, RuntimeError>;

    /// Called once when the cache drops its reference to a payload.
    ///
    /// Callers that still hold the payload keep it alive; the runtime must
    /// not invalidate it.
    async fn release(&self, model: BoxedModel);
}
