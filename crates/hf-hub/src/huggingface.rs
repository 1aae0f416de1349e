//! HuggingFace Hub + Inference API client
//!
//! One `reqwest` client backs all three HTTP collaborators: metadata and
//! search (`/api/{models,datasets,spaces}`), file downloads (`resolve/`),
//! hosted inference and repository writes.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use hf_core::{BrokerConfig, MetadataRecord, RepoKind};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::HubError;
use crate::provider::{DownloadRequest, HubApi, InferenceApi, RepoWriter, SearchQuery, UploadRequest};

const USER_AGENT: &str = concat!("hf-mcp/", env!("CARGO_PKG_VERSION"));

pub struct HuggingFaceClient {
    client: Client,
    token: Option<String>,
    hub_endpoint: String,
    inference_endpoint: String,
    timeout: Duration,
}

impl HuggingFaceClient {
    pub fn new(config: &BrokerConfig) -> Result<Self, HubError> {
        let client = Client::builder()
            .timeout(config.call_timeout())
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            token: config.token.clone().filter(|t| !t.trim().is_empty()),
            hub_endpoint: config.hub_endpoint.trim_end_matches('/').to_string(),
            inference_endpoint: config.inference_endpoint.trim_end_matches('/').to_string(),
            timeout: config.call_timeout(),
        })
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn require_token(&self) -> Result<&str, HubError> {
        self.token.as_deref().ok_or(HubError::MissingToken)
    }

    async fn send(&self, builder: RequestBuilder, subject: &str) -> Result<Response, HubError> {
        let response = builder.send().await.map_err(|e| match HubError::from(e) {
            HubError::Timeout(_) => HubError::Timeout(self.timeout),
            other => other,
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(HubError::NotFound(subject.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HubError::Status {
                status: status.as_u16(),
                body: truncate(&body, 500),
            });
        }
        Ok(response)
    }

    fn repo_url(&self, kind: RepoKind, repo_id: &str) -> String {
        match kind {
            RepoKind::Model => format!("{}/{}", self.hub_endpoint, repo_id),
            other => format!("{}/{}/{}", self.hub_endpoint, other.api_segment(), repo_id),
        }
    }
}

/// Subset of the Hub's repository JSON we keep
#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(alias = "modelId")]
    id: String,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    downloads: Option<u64>,
    #[serde(default)]
    likes: Option<u64>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    pipeline_tag: Option<String>,
    #[serde(default)]
    library_name: Option<String>,
    #[serde(default)]
    safetensors: Option<RawSafetensors>,
    #[serde(default)]
    sdk: Option<String>,
    #[serde(default, rename = "cardData")]
    card_data: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawSafetensors {
    #[serde(default)]
    total: Option<u64>,
}

impl RawRecord {
    fn into_record(self, kind: RepoKind) -> MetadataRecord {
        MetadataRecord {
            id: self.id,
            kind,
            author: self.author,
            downloads: self.downloads.unwrap_or(0),
            likes: self.likes.unwrap_or(0),
            tags: self.tags,
            pipeline_tag: self.pipeline_tag,
            library_name: self.library_name,
            parameters: self.safetensors.and_then(|s| s.total),
            sdk: self.sdk,
            card_data: self.card_data,
            fetched_at: Utc::now(),
        }
    }
}

#[async_trait]
impl HubApi for HuggingFaceClient {
    async fn lookup(&self, kind: RepoKind, id: &str) -> Result<MetadataRecord, HubError> {
        let url = format!("{}/api/{}/{}", self.hub_endpoint, kind.api_segment(), id);
        debug!(%url, "Hub lookup");

        let response = self
            .send(self.authorized(self.client.get(&url)), &format!("{} {}", kind, id))
            .await?;
        let raw: RawRecord = response.json().await?;
        Ok(raw.into_record(kind))
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<MetadataRecord>, HubError> {
        let url = format!("{}/api/{}", self.hub_endpoint, query.kind.api_segment());

        let mut params: Vec<(&str, String)> = vec![("limit", query.limit.to_string())];
        if let Some(search) = &query.search {
            params.push(("search", search.clone()));
        }
        if query.kind == RepoKind::Model {
            if let Some(task) = &query.task {
                params.push(("pipeline_tag", task.clone()));
            }
            if let Some(library) = &query.library {
                params.push(("library", library.clone()));
            }
        }
        if query.kind == RepoKind::Model || query.kind == RepoKind::Dataset {
            params.push(("sort", "downloads".to_string()));
            params.push(("direction", "-1".to_string()));
        }

        debug!(%url, ?params, "Hub search");
        let response = self
            .send(
                self.authorized(self.client.get(&url).query(&params)),
                query.kind.api_segment(),
            )
            .await?;
        let raw: Vec<RawRecord> = response.json().await?;
        Ok(raw.into_iter().map(|r| r.into_record(query.kind)).collect())
    }

    async fn download(&self, request: &DownloadRequest) -> Result<PathBuf, HubError> {
        let url = format!(
            "{}/resolve/{}/{}",
            self.repo_url(request.kind, &request.repo_id),
            request.revision,
            request.filename
        );
        debug!(%url, "Hub download");

        let subject = format!("{}/{}", request.repo_id, request.filename);
        let response = self
            .send(self.authorized(self.client.get(&url)), &subject)
            .await?;
        let bytes = response.bytes().await?;

        let target = request.dest_dir.join(&request.filename);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, &bytes).await?;

        info!(
            repo = %request.repo_id,
            file = %request.filename,
            bytes = bytes.len(),
            path = %target.display(),
            "Downloaded file"
        );
        Ok(target)
    }
}

#[async_trait]
impl InferenceApi for HuggingFaceClient {
    async fn invoke(
        &self,
        model_id: &str,
        inputs: &str,
        parameters: Option<&Value>,
        timeout: Duration,
    ) -> Result<Value, HubError> {
        let url = format!("{}/models/{}", self.inference_endpoint, model_id);

        let mut body = json!({ "inputs": inputs });
        if let Some(parameters) = parameters.filter(|p| !is_empty_object(p)) {
            body["parameters"] = parameters.clone();
        }

        debug!(%url, "Hosted inference request");
        let builder = self.authorized(self.client.post(&url).timeout(timeout).json(&body));
        let response = builder.send().await.map_err(|e| match HubError::from(e) {
            HubError::Timeout(_) => HubError::Timeout(timeout),
            other => other,
        })?;

        let status = response.status();
        let text = response.text().await?;
        if status == StatusCode::NOT_FOUND {
            return Err(HubError::NotFound(format!("model {}", model_id)));
        }
        if !status.is_success() {
            return Err(HubError::Status {
                status: status.as_u16(),
                body: truncate(&text, 500),
            });
        }

        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl RepoWriter for HuggingFaceClient {
    async fn create_repo(
        &self,
        repo_id: &str,
        kind: RepoKind,
        private: bool,
    ) -> Result<String, HubError> {
        let token = self.require_token()?;
        let url = format!("{}/api/repos/create", self.hub_endpoint);

        let (organization, name) = match repo_id.split_once('/') {
            Some((org, name)) => (Some(org), name),
            None => (None, repo_id),
        };
        let mut body = json!({ "name": name, "private": private });
        if let Some(org) = organization {
            body["organization"] = json!(org);
        }
        if kind != RepoKind::Model {
            body["type"] = json!(kind.as_str());
        }
        if kind == RepoKind::Space {
            body["sdk"] = json!("static");
        }

        let response = self
            .send(self.client.post(&url).bearer_auth(token).json(&body), repo_id)
            .await?;
        let created: Value = response.json().await?;
        let url = created
            .get("url")
            .and_then(Value::as_str)
            .map(String::from)
            .unwrap_or_else(|| self.repo_url(kind, repo_id));

        info!(repo = %repo_id, kind = %kind, private, "Created repository");
        Ok(url)
    }

    async fn upload_file(&self, request: &UploadRequest) -> Result<String, HubError> {
        let token = self.require_token()?;
        let content = tokio::fs::read(&request.local_path).await?;

        let url = format!(
            "{}/api/{}/{}/commit/main",
            self.hub_endpoint,
            request.kind.api_segment(),
            request.repo_id
        );
        let body = commit_payload(&request.commit_message, &request.path_in_repo, &content)?;

        let response = self
            .send(
                self.client
                    .post(&url)
                    .bearer_auth(token)
                    .header("Content-Type", "application/x-ndjson")
                    .body(body),
                &request.repo_id,
            )
            .await?;
        let commit: Value = response.json().await?;

        info!(
            repo = %request.repo_id,
            path = %request.path_in_repo,
            bytes = content.len(),
            "Uploaded file"
        );
        Ok(commit
            .get("commitUrl")
            .and_then(Value::as_str)
            .map(String::from)
            .unwrap_or_else(|| format!("{}/blob/main/{}", self.repo_url(request.kind, &request.repo_id), request.path_in_repo)))
    }
}

/// NDJSON body for the Hub commit endpoint: a header line, then one file line.
fn commit_payload(message: &str, path_in_repo: &str, content: &[u8]) -> Result<String, HubError> {
    let header = json!({
        "key": "header",
        "value": { "summary": message, "description": "" }
    });
    let file = json!({
        "key": "file",
        "value": {
            "path": path_in_repo,
            "encoding": "base64",
            "content": STANDARD.encode(content)
        }
    });
    Ok(format!(
        "{}\n{}\n",
        serde_json::to_string(&header)?,
        serde_json::to_string(&file)?
    ))
}

fn is_empty_object(value: &Value) -> bool {
    value.as_object().is_some_and(|o| o.is_empty()) || value.is_null()
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// Filesystem-safe directory name for a repository id
pub fn snapshot_dir(root: &Path, repo_id: &str) -> PathBuf {
    root.join(repo_id.replace('/', "--"))
}
