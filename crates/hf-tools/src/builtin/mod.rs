//! Built-in Tools
//!
//! ## Tools
//!
//! - **Hub**: `search_hub`, `hf_download`, `compare_models`
//! - **Inference**: `inference_api_run` (hosted), `local_inference` (resident models)
//! - **Models**: `load_model_locally`, `unload_model`
//! - **Repository**: `hf_repo_create`, `hf_upload_file` (need a write token)

mod hub;
mod inference;
mod models;
mod repo;

pub use hub::{CompareModelsTool, DownloadTool, SearchHubTool};
pub use inference::{InferenceApiTool, LocalInferenceTool};
pub use models::{LoadModelTool, UnloadModelTool};
pub use repo::{RepoCreateTool, UploadFileTool};

pub use hub::record_summary;

use crate::context::ToolContext;
use crate::tool::BoxedTool;
use std::sync::Arc;

/// Every built-in tool, in listing order
pub fn builtin_tools(ctx: &ToolContext) -> Vec<BoxedTool> {
    vec![
        Arc::new(SearchHubTool::new(ctx.clone())),
        Arc::new(InferenceApiTool::new(ctx.clone())),
        Arc::new(DownloadTool::new(ctx.clone())),
        Arc::new(LoadModelTool::new(ctx.clone())),
        Arc::new(LocalInferenceTool::new(ctx.clone())),
        Arc::new(UnloadModelTool::new(ctx.clone())),
        Arc::new(CompareModelsTool::new(ctx.clone())),
        Arc::new(RepoCreateTool::new(ctx.clone())),
        Arc::new(UploadFileTool::new(ctx.clone())),
    ]
}
