//! Resource Registry for MCP
//!
//! Read-only `hf://` resources. The four collection roots are always listed;
//! single records (`hf://model/{id}` and friends) are readable but not listed.

use hf_core::{Error, RepoKind, Result};
use hf_hub::SearchQuery;
use hf_tools::builtin::record_summary;
use hf_tools::ToolContext;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::debug;

pub const SCHEME: &str = "hf://";
pub const JSON_MIME: &str = "application/json";

/// Default result count for collection reads
pub const DEFAULT_LIST_LIMIT: usize = 20;

/// Resource information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceInfo {
    pub uri: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl ResourceInfo {
    fn json(uri: &str, name: &str, description: &str) -> Self {
        Self {
            uri: uri.to_string(),
            name: name.to_string(),
            description: Some(description.to_string()),
            mime_type: Some(JSON_MIME.to_string()),
        }
    }
}

/// Body of one `resources/read` answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceContents {
    pub uri: String,
    pub mime_type: String,
    pub text: String,
}

/// A parsed `hf://path?key=value` locator. Query values are percent-decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    pub path: String,
    pub query: HashMap<String, String>,
}

impl Locator {
    pub fn parse(uri: &str) -> Result<Self> {
        let rest = uri
            .strip_prefix(SCHEME)
            .ok_or_else(|| Error::not_found(format!("resource '{}'", uri)))?;

        let (path, raw_query) = match rest.split_once('?') {
            Some((path, query)) => (path, query),
            None => (rest, ""),
        };

        let mut query = HashMap::new();
        for pair in raw_query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            query.insert(decode(key)?, decode(value)?);
        }

        Ok(Self {
            path: path.trim_end_matches('/').to_string(),
            query,
        })
    }

    /// Query value, treating an empty value as absent
    pub fn param(&self, key: &str) -> Option<&str> {
        self.query
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn limit(&self) -> Result<usize> {
        match self.param("limit") {
            None => Ok(DEFAULT_LIST_LIMIT),
            Some(raw) => match raw.parse::<usize>() {
                Ok(0) | Err(_) => Err(Error::invalid_arguments(format!(
                    "limit must be a positive integer, got '{}'",
                    raw
                ))),
                Ok(n) => Ok(n),
            },
        }
    }
}

fn decode(raw: &str) -> Result<String> {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|s| s.into_owned())
        .map_err(|e| Error::invalid_arguments(format!("malformed query value '{}': {}", raw, e)))
}

/// Resource registry
pub struct ResourceRegistry {
    ctx: ToolContext,
    resources: Vec<ResourceInfo>,
}

impl ResourceRegistry {
    pub fn new(ctx: ToolContext) -> Self {
        let resources = vec![
            ResourceInfo::json(
                "hf://models",
                "Hugging Face Models",
                "Browse and search models on Hugging Face Hub",
            ),
            ResourceInfo::json(
                "hf://datasets",
                "Hugging Face Datasets",
                "Browse datasets on Hugging Face Hub",
            ),
            ResourceInfo::json(
                "hf://spaces",
                "Hugging Face Spaces",
                "Browse Spaces (demo apps) on Hugging Face Hub",
            ),
            ResourceInfo::json(
                "hf://loaded-models",
                "Loaded Models",
                "Models resident in the local runtime, next eviction first",
            ),
        ];
        Self { ctx, resources }
    }

    pub fn list_resources(&self) -> &[ResourceInfo] {
        &self.resources
    }

    pub async fn read_resource(&self, uri: &str) -> Result<ResourceContents> {
        let locator = Locator::parse(uri)?;
        debug!(uri = %uri, path = %locator.path, "Reading resource");

        let body = match locator.path.as_str() {
            "models" => self.list(RepoKind::Model, &locator).await?,
            "datasets" => self.list(RepoKind::Dataset, &locator).await?,
            "spaces" => self.list(RepoKind::Space, &locator).await?,
            "loaded-models" => self.loaded_models(),
            path => match path.split_once('/') {
                Some(("model", id)) if !id.is_empty() => self.record(RepoKind::Model, id).await?,
                Some(("dataset", id)) if !id.is_empty() => {
                    self.record(RepoKind::Dataset, id).await?
                }
                Some(("space", id)) if !id.is_empty() => self.record(RepoKind::Space, id).await?,
                _ => return Err(Error::not_found(format!("resource '{}'", uri))),
            },
        };

        Ok(ResourceContents {
            uri: uri.to_string(),
            mime_type: JSON_MIME.to_string(),
            text: serde_json::to_string_pretty(&body)?,
        })
    }

    async fn list(&self, kind: RepoKind, locator: &Locator) -> Result<Value> {
        let mut query = SearchQuery::new(kind, locator.limit()?);
        if let Some(search) = locator.param("search") {
            query = query.with_search(search);
        }
        if kind == RepoKind::Model {
            query = query
                .with_task(locator.param("task").map(String::from))
                .with_library(locator.param("library").map(String::from));
        }

        let records = self
            .ctx
            .remote(&format!("{} listing", kind), self.ctx.hub.search(&query))
            .await?;
        Ok(Value::Array(records.iter().map(record_summary).collect()))
    }

    async fn record(&self, kind: RepoKind, id: &str) -> Result<Value> {
        let record = match self.ctx.metadata.get_or_fetch(kind, id).await {
            Ok(record) => record,
            Err(e) if e.is_remote_missing() => {
                return Err(Error::not_found(format!("{} '{}'", kind, id)));
            }
            Err(e) => return Err(e),
        };

        let mut body = record_summary(&record);
        if let Value::Object(fields) = &mut body {
            fields.insert("card_data".into(), record.card_data.clone().unwrap_or(Value::Null));
            fields.insert("fetched_at".into(), json!(record.fetched_at));
        }
        Ok(body)
    }

    fn loaded_models(&self) -> Value {
        let models = &self.ctx.models;
        let resident: Vec<Value> = models
            .resident()
            .iter()
            .map(|h| {
                json!({
                    "model_id": h.id(),
                    "task": h.task(),
                    "loaded_at": h.loaded_at(),
                })
            })
            .collect();

        json!({
            "capacity": models.capacity(),
            "count": resident.len(),
            "models": resident,
            "stats": models.stats(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locator_without_query() {
        let locator = Locator::parse("hf://model/openai-community/gpt2").unwrap();
        assert_eq!(locator.path, "model/openai-community/gpt2");
        assert!(locator.query.is_empty());
        assert_eq!(locator.limit().unwrap(), DEFAULT_LIST_LIMIT);
    }

    #[test]
    fn test_locator_decodes_query() {
        let locator =
            Locator::parse("hf://models?task=text-generation&search=tiny%20llama&limit=5").unwrap();
        assert_eq!(locator.path, "models");
        assert_eq!(locator.param("task"), Some("text-generation"));
        assert_eq!(locator.param("search"), Some("tiny llama"));
        assert_eq!(locator.limit().unwrap(), 5);

        let plus = Locator::parse("hf://datasets?search=squad+v2&library=").unwrap();
        assert_eq!(plus.param("search"), Some("squad v2"));
        assert_eq!(plus.param("library"), None);
    }

    #[test]
    fn test_locator_rejects_other_schemes() {
        let err = Locator::parse("docs://architecture").unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[test]
    fn test_bad_limit() {
        let locator = Locator::parse("hf://models?limit=zero").unwrap();
        assert_eq!(locator.limit().unwrap_err().code(), "INVALID_ARGUMENTS");
        let locator = Locator::parse("hf://models?limit=0").unwrap();
        assert!(locator.limit().is_err());
    }
}
