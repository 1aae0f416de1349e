//! Common types used across hf-mcp

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Kind of Hub repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RepoKind {
    #[default]
    Model,
    Dataset,
    Space,
}

impl RepoKind {
    /// Path segment used by the Hub REST API (`/api/models`, ...)
    pub fn api_segment(&self) -> &'static str {
        match self {
            RepoKind::Model => "models",
            RepoKind::Dataset => "datasets",
            RepoKind::Space => "spaces",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RepoKind::Model => "model",
            RepoKind::Dataset => "dataset",
            RepoKind::Space => "space",
        }
    }
}

impl fmt::Display for RepoKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RepoKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "model" | "models" => Ok(RepoKind::Model),
            "dataset" | "datasets" => Ok(RepoKind::Dataset),
            "space" | "spaces" => Ok(RepoKind::Space),
            other => Err(format!("Unknown repository type: {}", other)),
        }
    }
}

/// How a loaded model must be invoked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TaskKind {
    #[default]
    TextGeneration,
    TextClassification,
    SentimentAnalysis,
}

impl TaskKind {
    pub const ALL: [TaskKind; 3] = [
        TaskKind::TextGeneration,
        TaskKind::TextClassification,
        TaskKind::SentimentAnalysis,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::TextGeneration => "text-generation",
            TaskKind::TextClassification => "text-classification",
            TaskKind::SentimentAnalysis => "sentiment-analysis",
        }
    }

    /// Generation tasks produce text, the others produce labels.
    pub fn is_generative(&self) -> bool {
        matches!(self, TaskKind::TextGeneration)
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskKind::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("Unknown task: {}", s))
    }
}

/// Descriptive record of a Hub repository.
///
/// Immutable once fetched; a re-fetch replaces the whole record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub id: String,
    pub kind: RepoKind,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub downloads: u64,
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Hub task tag, e.g. `text-generation`
    #[serde(default)]
    pub pipeline_tag: Option<String>,
    #[serde(default)]
    pub library_name: Option<String>,
    /// Total parameter count reported by safetensors metadata
    #[serde(default)]
    pub parameters: Option<u64>,
    /// Space SDK (`gradio`, `streamlit`, ...)
    #[serde(default)]
    pub sdk: Option<String>,
    #[serde(default)]
    pub card_data: Option<Value>,
    pub fetched_at: DateTime<Utc>,
}

impl MetadataRecord {
    pub fn new(id: impl Into<String>, kind: RepoKind) -> Self {
        Self {
            id: id.into(),
            kind,
            author: None,
            downloads: 0,
            likes: 0,
            tags: Vec::new(),
            pipeline_tag: None,
            library_name: None,
            parameters: None,
            sdk: None,
            card_data: None,
            fetched_at: Utc::now(),
        }
    }

    /// Task the Hub advertises for this model, when it is one we can run.
    pub fn task_kind(&self) -> Option<TaskKind> {
        self.pipeline_tag.as_deref().and_then(|t| t.parse().ok())
    }
}

/// One block of a successful response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    Structured { data: Value },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    pub fn structured(data: Value) -> Self {
        ContentBlock::Structured { data }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentBlock::Text { text } => Some(text),
            ContentBlock::Structured { .. } => None,
        }
    }
}

/// Ordered content returned by a tool handler
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub content: Vec<ContentBlock>,
}

impl ToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::text(text)],
        }
    }

    pub fn with_structured(mut self, data: Value) -> Self {
        self.content.push(ContentBlock::structured(data));
        self
    }

    /// All text blocks joined with newlines
    pub fn joined_text(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentBlock::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// First structured block, if any
    pub fn structured(&self) -> Option<&Value> {
        self.content.iter().find_map(|block| match block {
            ContentBlock::Structured { data } => Some(data),
            ContentBlock::Text { .. } => None,
        })
    }
}
