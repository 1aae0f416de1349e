//! Hub read tools: search, download, model comparison

use async_trait::async_trait;
use hf_core::{Error, MetadataRecord, RepoKind, Result, ToolOutput};
use hf_hub::{DownloadRequest, SearchQuery};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::context::ToolContext;
use crate::schema::{FieldSpec, FieldType, InputSpec, ItemType};
use crate::tool::{parse_args, Tool};

pub(crate) const REPO_TYPES: &[&str] = &["model", "dataset", "space"];
const DEFAULT_SEARCH_LIMIT: usize = 10;

// ============================================================================
// SEARCH
// ============================================================================

pub struct SearchHubTool {
    ctx: ToolContext,
}

impl SearchHubTool {
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }
}

#[derive(Deserialize)]
struct SearchArgs {
    query: String,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
}

#[async_trait]
impl Tool for SearchHubTool {
    fn name(&self) -> &str {
        "search_hub"
    }

    fn description(&self) -> &str {
        "Search Hugging Face Hub for models, datasets, or spaces"
    }

    fn category(&self) -> &str {
        "hub"
    }

    fn input_spec(&self) -> InputSpec {
        InputSpec::new()
            .field(FieldSpec::required("query", FieldType::String, "Search query"))
            .field(
                FieldSpec::optional("type", FieldType::String, "Type to search for")
                    .one_of(REPO_TYPES)
                    .with_default(json!("model")),
            )
            .field(
                FieldSpec::optional("limit", FieldType::Integer, "Maximum number of results")
                    .with_default(json!(DEFAULT_SEARCH_LIMIT)),
            )
    }

    async fn execute(&self, input: Value) -> Result<ToolOutput> {
        let args: SearchArgs = parse_args(input)?;
        let kind = repo_kind(args.kind.as_deref())?;
        let limit = args.limit.unwrap_or(DEFAULT_SEARCH_LIMIT).max(1);

        let query = SearchQuery::new(kind, limit).with_search(args.query);
        let records = self
            .ctx
            .remote(&format!("{} search", kind), self.ctx.hub.search(&query))
            .await?;

        let lines: Vec<String> = records.iter().map(|r| search_line(kind, r)).collect();
        let text = format!("Found {} {}s:\n\n{}", lines.len(), kind, lines.join("\n"));
        let hits: Vec<Value> = records.iter().map(record_summary).collect();

        Ok(ToolOutput::text(text).with_structured(json!({ "type": kind, "results": hits })))
    }
}

fn search_line(kind: RepoKind, record: &MetadataRecord) -> String {
    match kind {
        RepoKind::Model => format!(
            "**{}** (↓{}) - {}",
            record.id,
            record.downloads,
            record.pipeline_tag.as_deref().unwrap_or("N/A")
        ),
        RepoKind::Dataset => format!("**{}** (↓{})", record.id, record.downloads),
        RepoKind::Space => format!("**{}** - {}", record.id, record.sdk.as_deref().unwrap_or("N/A")),
    }
}

/// Compact JSON view of a record used by listings
pub fn record_summary(record: &MetadataRecord) -> Value {
    match record.kind {
        RepoKind::Model => json!({
            "id": record.id,
            "author": record.author,
            "downloads": record.downloads,
            "likes": record.likes,
            "tags": record.tags,
            "pipeline_tag": record.pipeline_tag,
        }),
        RepoKind::Dataset => json!({
            "id": record.id,
            "author": record.author,
            "downloads": record.downloads,
            "likes": record.likes,
            "tags": record.tags,
        }),
        RepoKind::Space => json!({
            "id": record.id,
            "author": record.author,
            "likes": record.likes,
            "sdk": record.sdk,
        }),
    }
}

pub(crate) fn repo_kind(value: Option<&str>) -> Result<RepoKind> {
    match value {
        None => Ok(RepoKind::Model),
        Some(s) => s.parse().map_err(Error::invalid_arguments),
    }
}

// ============================================================================
// DOWNLOAD
// ============================================================================

pub struct DownloadTool {
    ctx: ToolContext,
}

impl DownloadTool {
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }
}

#[derive(Deserialize)]
struct DownloadArgs {
    repo_id: String,
    filename: String,
    #[serde(default)]
    local_dir: Option<String>,
    #[serde(default)]
    repo_type: Option<String>,
}

#[async_trait]
impl Tool for DownloadTool {
    fn name(&self) -> &str {
        "hf_download"
    }

    fn description(&self) -> &str {
        "Download a model or dataset file"
    }

    fn category(&self) -> &str {
        "hub"
    }

    fn input_spec(&self) -> InputSpec {
        InputSpec::new()
            .field(FieldSpec::required("repo_id", FieldType::String, "Repository ID"))
            .field(FieldSpec::required("filename", FieldType::String, "File to download"))
            .field(FieldSpec::optional(
                "local_dir",
                FieldType::String,
                "Local directory to save to",
            ))
            .field(
                FieldSpec::optional("repo_type", FieldType::String, "Repository type")
                    .one_of(REPO_TYPES)
                    .with_default(json!("model")),
            )
    }

    async fn execute(&self, input: Value) -> Result<ToolOutput> {
        let args: DownloadArgs = parse_args(input)?;
        let kind = repo_kind(args.repo_type.as_deref())?;
        if args.filename.split('/').any(|part| part == "..") {
            return Err(Error::invalid_arguments("filename must not contain '..'"));
        }
        if Path::new(&args.filename).is_absolute() {
            return Err(Error::invalid_arguments("filename must be relative to the repository"));
        }

        let dest_dir = PathBuf::from(
            args.local_dir
                .unwrap_or_else(|| self.ctx.config.download_dir.clone()),
        );
        let request = DownloadRequest::new(&args.repo_id, &args.filename, dest_dir).with_kind(kind);
        let subject = format!("{}/{}", args.repo_id, args.filename);
        let path = self.ctx.remote(&subject, self.ctx.hub.download(&request)).await?;

        info!(repo = %args.repo_id, file = %args.filename, path = %path.display(), "Download complete");
        Ok(ToolOutput::text(format!(
            "Downloaded {} from {} to {}",
            args.filename,
            args.repo_id,
            path.display()
        ))
        .with_structured(json!({ "path": path.display().to_string() })))
    }
}

// ============================================================================
// COMPARE
// ============================================================================

pub struct CompareModelsTool {
    ctx: ToolContext,
}

impl CompareModelsTool {
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }
}

#[derive(Deserialize)]
struct CompareArgs {
    model_ids: Vec<String>,
    #[serde(default)]
    criteria: Option<Vec<String>>,
}

#[async_trait]
impl Tool for CompareModelsTool {
    fn name(&self) -> &str {
        "compare_models"
    }

    fn description(&self) -> &str {
        "Compare multiple models on key metrics"
    }

    fn category(&self) -> &str {
        "hub"
    }

    fn input_spec(&self) -> InputSpec {
        InputSpec::new()
            .field(FieldSpec::required(
                "model_ids",
                FieldType::Array(ItemType::String),
                "Models to compare",
            ))
            .field(
                FieldSpec::optional(
                    "criteria",
                    FieldType::Array(ItemType::String),
                    "Comparison criteria",
                )
                .with_default(json!(["downloads", "size", "task"])),
            )
    }

    async fn execute(&self, input: Value) -> Result<ToolOutput> {
        let args: CompareArgs = parse_args(input)?;
        if args.model_ids.is_empty() {
            return Err(Error::invalid_arguments("model_ids must name at least one model"));
        }

        let mut rows = Vec::with_capacity(args.model_ids.len());
        for id in &args.model_ids {
            rows.push(self.ctx.metadata.get_or_fetch(RepoKind::Model, id).await?);
        }
        // Stable sort keeps request order among equal download counts
        rows.sort_by(|a, b| b.downloads.cmp(&a.downloads));

        let mut text = String::from("Model Comparison:\n\n");
        text.push_str(&format!(
            "{:<30} {:<10} {:<20} {:<14} {:<8}\n",
            "Model", "Downloads", "Task", "Parameters", "Likes"
        ));
        text.push_str(&"-".repeat(84));
        text.push('\n');
        for row in &rows {
            let params = row
                .parameters
                .map(|p| p.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            text.push_str(&format!(
                "{:<30} {:<10} {:<20} {:<14} {:<8}\n",
                row.id,
                row.downloads,
                row.pipeline_tag.as_deref().unwrap_or("unknown"),
                params,
                row.likes
            ));
        }

        // Non-empty: model_ids was checked above and every lookup succeeded
        let most_popular = &rows[0];
        text.push_str("\n\nRecommendations:\n");
        text.push_str(&format!(
            "• Most Popular: {} ({} downloads)\n",
            most_popular.id, most_popular.downloads
        ));
        let smallest = rows
            .iter()
            .filter_map(|r| r.parameters.map(|p| (p, r)))
            .min_by_key(|(p, _)| *p);
        if let Some((params, row)) = smallest {
            text.push_str(&format!("• Smallest: {} ({} parameters)\n", row.id, params));
        }

        let table: Vec<Value> = rows
            .iter()
            .map(|r| {
                json!({
                    "model_id": r.id,
                    "downloads": r.downloads,
                    "likes": r.likes,
                    "task": r.pipeline_tag,
                    "parameters": r.parameters,
                    "library": r.library_name,
                })
            })
            .collect();

        Ok(ToolOutput::text(text).with_structured(json!({
            "criteria": args.criteria.unwrap_or_else(|| vec!["downloads".into(), "size".into(), "task".into()]),
            "models": table,
            "most_popular": most_popular.id,
            "smallest": smallest.map(|(_, r)| r.id.clone()),
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_lines() {
        let mut model = MetadataRecord::new("gpt2", RepoKind::Model);
        model.downloads = 12;
        model.pipeline_tag = Some("text-generation".into());
        assert_eq!(search_line(RepoKind::Model, &model), "**gpt2** (↓12) - text-generation");

        let dataset = MetadataRecord::new("squad", RepoKind::Dataset);
        assert_eq!(search_line(RepoKind::Dataset, &dataset), "**squad** (↓0)");

        let space = MetadataRecord::new("user/demo", RepoKind::Space);
        assert_eq!(search_line(RepoKind::Space, &space), "**user/demo** - N/A");
    }

    #[test]
    fn test_repo_kind_defaults_to_model() {
        assert_eq!(repo_kind(None).unwrap(), RepoKind::Model);
        assert_eq!(repo_kind(Some("dataset")).unwrap(), RepoKind::Dataset);
        assert!(repo_kind(Some("paper")).is_err());
    }
}
