//! In-memory collaborators with call counters, for tests.
//!
//! Enabled for this crate's own tests and for downstream crates through the
//! `test-util` feature.

use async_trait::async_trait;
use hf_core::{MetadataRecord, RepoKind, TaskKind};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::{HubError, RuntimeError};
use crate::provider::{
    BoxedModel, DownloadRequest, GenerationParams, HubApi, InferenceApi, LoadedModel,
    ModelRuntime, RepoWriter, SearchQuery, UploadRequest,
};

/// Build a model record with a text-generation tag.
pub fn model_record(id: &str, downloads: u64) -> MetadataRecord {
    let mut record = MetadataRecord::new(id, RepoKind::Model);
    record.downloads = downloads;
    record.pipeline_tag = Some("text-generation".to_string());
    record.library_name = Some("transformers".to_string());
    record
}

#[derive(Default)]
pub struct StubHub {
    records: Mutex<HashMap<(RepoKind, String), MetadataRecord>>,
    delay: Option<Duration>,
    fail_transport: bool,
    pub lookup_calls: AtomicUsize,
    pub search_calls: AtomicUsize,
    pub download_calls: AtomicUsize,
}

impl StubHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// A hub that knows text-generation models with the given ids.
    pub fn with_models(ids: &[&str]) -> Self {
        let hub = Self::new();
        for (i, id) in ids.iter().enumerate() {
            hub.insert(model_record(id, 1000 * (i as u64 + 1)));
        }
        hub
    }

    /// Every call sleeps this long first.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every call fails with a transport error.
    pub fn failing(mut self) -> Self {
        self.fail_transport = true;
        self
    }

    pub fn insert(&self, record: MetadataRecord) {
        self.records
            .lock()
            .unwrap()
            .insert((record.kind, record.id.clone()), record);
    }

    pub fn lookups(&self) -> usize {
        self.lookup_calls.load(Ordering::SeqCst)
    }

    pub fn searches(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn downloads(&self) -> usize {
        self.download_calls.load(Ordering::SeqCst)
    }

    async fn before_call(&self) -> Result<(), HubError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_transport {
            return Err(HubError::Transport("connection refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl HubApi for StubHub {
    async fn lookup(&self, kind: RepoKind, id: &str) -> Result<MetadataRecord, HubError> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        self.before_call().await?;
        self.records
            .lock()
            .unwrap()
            .get(&(kind, id.to_string()))
            .cloned()
            .ok_or_else(|| HubError::NotFound(format!("{} {}", kind, id)))
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<MetadataRecord>, HubError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.before_call().await?;
        let records = self.records.lock().unwrap();
        let mut hits: Vec<MetadataRecord> = records
            .values()
            .filter(|r| r.kind == query.kind)
            .filter(|r| query.search.as_deref().map_or(true, |s| r.id.contains(s)))
            .filter(|r| {
                query
                    .task
                    .as_deref()
                    .map_or(true, |t| r.pipeline_tag.as_deref() == Some(t))
            })
            .cloned()
            .collect();
        hits.sort_by(|a, b| b.downloads.cmp(&a.downloads).then(a.id.cmp(&b.id)));
        hits.truncate(query.limit);
        Ok(hits)
    }

    async fn download(&self, request: &DownloadRequest) -> Result<PathBuf, HubError> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        self.before_call().await?;
        let path = request.dest_dir.join(&request.filename);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, format!("{}:{}", request.repo_id, request.filename)).await?;
        Ok(path)
    }
}

pub struct StubModel {
    id: String,
    task: TaskKind,
}

impl StubModel {
    pub fn new(id: impl Into<String>, task: TaskKind) -> Self {
        Self {
            id: id.into(),
            task,
        }
    }
}

#[async_trait]
impl LoadedModel for StubModel {
    fn model_id(&self) -> &str {
        &self.id
    }

    fn task(&self) -> TaskKind {
        self.task
    }

    async fn generate(&self, inputs: &str, params: &GenerationParams) -> Result<String, RuntimeError> {
        Ok(format!("{} [{}]: {}", self.id, params.max_length, inputs))
    }
}

/// Runtime that materializes [`StubModel`]s and counts every call.
#[derive(Default)]
pub struct StubRuntime {
    delay: Option<Duration>,
    release_delay: Option<Duration>,
    failing: Mutex<HashSet<String>>,
    released: Mutex<Vec<String>>,
    pub materialize_calls: AtomicUsize,
    pub release_calls: AtomicUsize,
}

impl StubRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Sleep this long inside every `release` before recording it.
    pub fn with_release_delay(mut self, delay: Duration) -> Self {
        self.release_delay = Some(delay);
        self
    }

    /// Make materialization of `model_id` fail.
    pub fn fail_on(&self, model_id: &str) {
        self.failing.lock().unwrap().insert(model_id.to_string());
    }

    pub fn materializations(&self) -> usize {
        self.materialize_calls.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> Vec<String> {
        self.released.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelRuntime for StubRuntime {
    async fn materialize(&self, model_id: &str, task: TaskKind) -> Result<BoxedModel, RuntimeError> {
        self.materialize_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().unwrap().contains(model_id) {
            return Err(RuntimeError::Materialize("out of memory".into()));
        }
        Ok(Arc::new(StubModel::new(model_id, task)))
    }

    async fn release(&self, model: BoxedModel) {
        self.release_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.release_delay {
            tokio::time::sleep(delay).await;
        }
        self.released.lock().unwrap().push(model.model_id().to_string());
    }
}

/// Hosted inference that echoes its inputs.
#[derive(Default)]
pub struct StubInference {
    delay: Option<Duration>,
    pub calls: AtomicUsize,
}

impl StubInference {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn invocations(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InferenceApi for StubInference {
    async fn invoke(
        &self,
        model_id: &str,
        inputs: &str,
        parameters: Option<&Value>,
        timeout: Duration,
    ) -> Result<Value, HubError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            if delay >= timeout {
                tokio::time::sleep(timeout).await;
                return Err(HubError::Timeout(timeout));
            }
            tokio::time::sleep(delay).await;
        }
        Ok(json!([{
            "model": model_id,
            "generated_text": inputs,
            "parameters": parameters.cloned().unwrap_or(Value::Null)
        }]))
    }
}

#[derive(Default)]
pub struct StubRepoWriter {
    pub create_calls: AtomicUsize,
    pub upload_calls: AtomicUsize,
}

impl StubRepoWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn creates(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn uploads(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RepoWriter for StubRepoWriter {
    async fn create_repo(&self, repo_id: &str, kind: RepoKind, _private: bool) -> Result<String, HubError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("https://huggingface.co/{}/{}", kind.api_segment(), repo_id))
    }

    async fn upload_file(&self, request: &UploadRequest) -> Result<String, HubError> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        if !request.local_path.exists() {
            return Err(HubError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} does not exist", request.local_path.display()),
            )));
        }
        Ok(format!(
            "https://huggingface.co/{}/commit/stub",
            request.repo_id
        ))
    }
}
