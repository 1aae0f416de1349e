//! Local model lifecycle tools

use async_trait::async_trait;
use hf_core::{Error, Result, TaskKind, ToolOutput};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::context::ToolContext;
use crate::schema::{FieldSpec, FieldType, InputSpec};
use crate::tool::{parse_args, Tool};

const TASKS: &[&str] = &["text-generation", "text-classification", "sentiment-analysis"];

pub struct LoadModelTool {
    ctx: ToolContext,
}

impl LoadModelTool {
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }
}

#[derive(Deserialize)]
struct LoadArgs {
    model_id: String,
    #[serde(default)]
    task: Option<String>,
}

#[async_trait]
impl Tool for LoadModelTool {
    fn name(&self) -> &str {
        "load_model_locally"
    }

    fn description(&self) -> &str {
        "Load a model locally for faster inference"
    }

    fn category(&self) -> &str {
        "models"
    }

    fn input_spec(&self) -> InputSpec {
        InputSpec::new()
            .field(FieldSpec::required("model_id", FieldType::String, "Model ID to load"))
            .field(
                FieldSpec::optional("task", FieldType::String, "Task type")
                    .one_of(TASKS)
                    .with_default(json!("text-generation")),
            )
    }

    async fn execute(&self, input: Value) -> Result<ToolOutput> {
        let args: LoadArgs = parse_args(input)?;
        let task: TaskKind = match args.task.as_deref() {
            Some(task) => task.parse().map_err(Error::invalid_arguments)?,
            None => TaskKind::default(),
        };

        let outcome = self.ctx.models.load(&args.model_id, task).await?;

        let mut text = if outcome.already_loaded {
            format!("Model {} already loaded", args.model_id)
        } else {
            format!("Successfully loaded {} for {}", args.model_id, task)
        };
        if let Some(evicted) = &outcome.evicted {
            text.push_str(&format!("\nUnloaded {} to make space", evicted));
        }

        Ok(ToolOutput::text(text).with_structured(json!({
            "model_id": outcome.handle.id(),
            "task": outcome.handle.task(),
            "already_loaded": outcome.already_loaded,
            "evicted": outcome.evicted,
            "resident": self.ctx.models.resident_ids(),
            "capacity": self.ctx.models.capacity(),
        })))
    }
}

pub struct UnloadModelTool {
    ctx: ToolContext,
}

impl UnloadModelTool {
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }
}

#[derive(Deserialize)]
struct UnloadArgs {
    model_id: String,
}

#[async_trait]
impl Tool for UnloadModelTool {
    fn name(&self) -> &str {
        "unload_model"
    }

    fn description(&self) -> &str {
        "Unload a locally loaded model and free its resources"
    }

    fn category(&self) -> &str {
        "models"
    }

    fn input_spec(&self) -> InputSpec {
        InputSpec::new().field(FieldSpec::required("model_id", FieldType::String, "Loaded model ID"))
    }

    async fn execute(&self, input: Value) -> Result<ToolOutput> {
        let args: UnloadArgs = parse_args(input)?;
        let unloaded = self.ctx.models.evict(&args.model_id).await;

        let text = if unloaded {
            format!("Unloaded {}", args.model_id)
        } else {
            format!("Model {} was not loaded", args.model_id)
        };
        Ok(ToolOutput::text(text).with_structured(json!({
            "model_id": args.model_id,
            "unloaded": unloaded,
            "resident": self.ctx.models.resident_ids(),
        })))
    }
}
