//! Inference tools: hosted API and locally loaded models

use async_trait::async_trait;
use hf_core::{Error, Result, ToolOutput};
use hf_hub::GenerationParams;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::context::ToolContext;
use crate::schema::{FieldSpec, FieldType, InputSpec};
use crate::tool::{parse_args, Tool};

const DEFAULT_MAX_LENGTH: usize = 50;

pub struct InferenceApiTool {
    ctx: ToolContext,
}

impl InferenceApiTool {
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }
}

#[derive(Deserialize)]
struct InferenceArgs {
    model_id: String,
    inputs: String,
    #[serde(default)]
    parameters: Option<Map<String, Value>>,
}

#[async_trait]
impl Tool for InferenceApiTool {
    fn name(&self) -> &str {
        "inference_api_run"
    }

    fn description(&self) -> &str {
        "Run inference using Hugging Face Inference API"
    }

    fn category(&self) -> &str {
        "inference"
    }

    fn input_spec(&self) -> InputSpec {
        InputSpec::new()
            .field(FieldSpec::required("model_id", FieldType::String, "Model ID on Hugging Face Hub"))
            .field(FieldSpec::required("inputs", FieldType::String, "Input text or data"))
            .field(FieldSpec::optional(
                "parameters",
                FieldType::Object,
                "Optional parameters for inference",
            ))
    }

    async fn execute(&self, input: Value) -> Result<ToolOutput> {
        let args: InferenceArgs = parse_args(input)?;
        let parameters = args.parameters.map(Value::Object);
        let timeout = self.ctx.config.call_timeout();

        debug!(model_id = %args.model_id, "Hosted inference");
        let result = self
            .ctx
            .remote(
                &format!("inference {}", args.model_id),
                self.ctx
                    .inference
                    .invoke(&args.model_id, &args.inputs, parameters.as_ref(), timeout),
            )
            .await?;

        let pretty = serde_json::to_string_pretty(&result)?;
        Ok(ToolOutput::text(format!("Inference result:\n```json\n{}\n```", pretty))
            .with_structured(result))
    }
}

pub struct LocalInferenceTool {
    ctx: ToolContext,
}

impl LocalInferenceTool {
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }
}

#[derive(Deserialize)]
struct LocalInferenceArgs {
    model_id: String,
    inputs: String,
    #[serde(default)]
    max_length: Option<usize>,
}

#[async_trait]
impl Tool for LocalInferenceTool {
    fn name(&self) -> &str {
        "local_inference"
    }

    fn description(&self) -> &str {
        "Run inference on locally loaded model"
    }

    fn category(&self) -> &str {
        "inference"
    }

    fn input_spec(&self) -> InputSpec {
        InputSpec::new()
            .field(FieldSpec::required("model_id", FieldType::String, "Loaded model ID"))
            .field(FieldSpec::required("inputs", FieldType::String, "Input text"))
            .field(
                FieldSpec::optional("max_length", FieldType::Integer, "Maximum generated length")
                    .with_default(json!(DEFAULT_MAX_LENGTH)),
            )
    }

    async fn execute(&self, input: Value) -> Result<ToolOutput> {
        let args: LocalInferenceArgs = parse_args(input)?;
        let max_length = args.max_length.unwrap_or(DEFAULT_MAX_LENGTH);
        if max_length == 0 {
            return Err(Error::invalid_arguments("max_length must be positive"));
        }

        // The handle stays valid for this call even if it is evicted meanwhile
        let handle = self
            .ctx
            .models
            .get(&args.model_id)
            .ok_or_else(|| Error::not_loaded(&args.model_id))?;

        let params = GenerationParams {
            max_length,
            ..GenerationParams::default()
        };
        let text = handle.generate(&args.inputs, &params).await?;

        Ok(ToolOutput::text(format!("Local inference result:\n{}", text)).with_structured(json!({
            "model_id": handle.id(),
            "task": handle.task(),
            "output": text,
        })))
    }
}
