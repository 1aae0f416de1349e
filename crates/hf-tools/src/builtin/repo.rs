//! Repository write tools. Offered only when a write token is configured.

use async_trait::async_trait;
use hf_core::{Error, Result, ToolOutput};
use hf_hub::UploadRequest;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;

use super::hub::{repo_kind, REPO_TYPES};
use crate::context::ToolContext;
use crate::schema::{FieldSpec, FieldType, InputSpec};
use crate::tool::{parse_args, requires_credentials, EnabledPredicate, Tool};

const DEFAULT_COMMIT_MESSAGE: &str = "Upload file via MCP";

pub struct RepoCreateTool {
    ctx: ToolContext,
}

impl RepoCreateTool {
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }
}

#[derive(Deserialize)]
struct CreateArgs {
    repo_id: String,
    #[serde(default)]
    repo_type: Option<String>,
    #[serde(default)]
    private: bool,
}

#[async_trait]
impl Tool for RepoCreateTool {
    fn name(&self) -> &str {
        "hf_repo_create"
    }

    fn description(&self) -> &str {
        "Create a new repository on Hugging Face Hub"
    }

    fn category(&self) -> &str {
        "repository"
    }

    fn enabled_when(&self) -> EnabledPredicate {
        requires_credentials
    }

    fn input_spec(&self) -> InputSpec {
        InputSpec::new()
            .field(FieldSpec::required("repo_id", FieldType::String, "Repository ID to create"))
            .field(
                FieldSpec::optional("repo_type", FieldType::String, "Repository type")
                    .one_of(REPO_TYPES)
                    .with_default(json!("model")),
            )
            .field(
                FieldSpec::optional("private", FieldType::Boolean, "Create a private repository")
                    .with_default(json!(false)),
            )
    }

    async fn execute(&self, input: Value) -> Result<ToolOutput> {
        let args: CreateArgs = parse_args(input)?;
        let kind = repo_kind(args.repo_type.as_deref())?;
        let writer = self.ctx.writer()?;

        let url = self
            .ctx
            .remote(
                &format!("create {}", args.repo_id),
                writer.create_repo(&args.repo_id, kind, args.private),
            )
            .await?;

        Ok(
            ToolOutput::text(format!("Created {} repository: {}", kind, args.repo_id)).with_structured(
                json!({
                    "repo_id": args.repo_id,
                    "repo_type": kind,
                    "private": args.private,
                    "url": url,
                }),
            ),
        )
    }
}

pub struct UploadFileTool {
    ctx: ToolContext,
}

impl UploadFileTool {
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }
}

#[derive(Deserialize)]
struct UploadArgs {
    repo_id: String,
    path_or_fileobj: String,
    path_in_repo: String,
    #[serde(default)]
    commit_message: Option<String>,
    #[serde(default)]
    repo_type: Option<String>,
}

#[async_trait]
impl Tool for UploadFileTool {
    fn name(&self) -> &str {
        "hf_upload_file"
    }

    fn description(&self) -> &str {
        "Upload a file to a Hugging Face repository"
    }

    fn category(&self) -> &str {
        "repository"
    }

    fn enabled_when(&self) -> EnabledPredicate {
        requires_credentials
    }

    fn input_spec(&self) -> InputSpec {
        InputSpec::new()
            .field(FieldSpec::required("repo_id", FieldType::String, "Repository ID"))
            .field(FieldSpec::required("path_or_fileobj", FieldType::String, "Local file path"))
            .field(FieldSpec::required("path_in_repo", FieldType::String, "Path in repository"))
            .field(
                FieldSpec::optional("commit_message", FieldType::String, "Commit message")
                    .with_default(json!(DEFAULT_COMMIT_MESSAGE)),
            )
            .field(
                FieldSpec::optional("repo_type", FieldType::String, "Repository type")
                    .one_of(REPO_TYPES)
                    .with_default(json!("model")),
            )
    }

    async fn execute(&self, input: Value) -> Result<ToolOutput> {
        let args: UploadArgs = parse_args(input)?;
        let kind = repo_kind(args.repo_type.as_deref())?;
        let local_path = PathBuf::from(&args.path_or_fileobj);
        if !local_path.is_file() {
            return Err(Error::invalid_arguments(format!(
                "{} is not a readable file",
                args.path_or_fileobj
            )));
        }
        let writer = self.ctx.writer()?;

        let request = UploadRequest {
            repo_id: args.repo_id.clone(),
            kind,
            local_path,
            path_in_repo: args.path_in_repo.clone(),
            commit_message: args
                .commit_message
                .unwrap_or_else(|| DEFAULT_COMMIT_MESSAGE.to_string()),
        };
        let commit_url = self
            .ctx
            .remote(&format!("upload {}", args.repo_id), writer.upload_file(&request))
            .await?;

        Ok(ToolOutput::text(format!(
            "Uploaded {} to {}/{}",
            args.path_or_fileobj, args.repo_id, args.path_in_repo
        ))
        .with_structured(json!({
            "repo_id": args.repo_id,
            "path_in_repo": args.path_in_repo,
            "commit_message": request.commit_message,
            "commit_url": commit_url,
        })))
    }
}
