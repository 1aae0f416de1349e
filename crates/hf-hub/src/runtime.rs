//! Snapshot-backed model runtime
//!
//! Materializing a model downloads its configuration (and tokenizer config
//! when the repository has one) into `model_dir/<org>--<name>`, checks the
//! architecture list, and yields a payload that generates through the hosted
//! inference endpoint pinned to that model and task. A native tensor backend
//! plugs in by implementing [`ModelRuntime`] instead.

use async_trait::async_trait;
use hf_core::{RepoKind, TaskKind};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{HubError, RuntimeError};
use crate::huggingface::snapshot_dir;
use crate::provider::{
    BoxedModel, DownloadRequest, GenerationParams, HubApi, InferenceApi, LoadedModel,
    ModelRuntime,
};

const CONFIG_FILE: &str = "config.json";
const TOKENIZER_CONFIG_FILE: &str = "tokenizer_config.json";

pub struct SnapshotRuntime {
    hub: Arc<dyn HubApi>,
    inference: Arc<dyn InferenceApi>,
    model_dir: PathBuf,
    call_timeout: Duration,
}

impl SnapshotRuntime {
    pub fn new(
        hub: Arc<dyn HubApi>,
        inference: Arc<dyn InferenceApi>,
        model_dir: impl Into<PathBuf>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            hub,
            inference,
            model_dir: model_dir.into(),
            call_timeout,
        }
    }
}

#[async_trait]
impl ModelRuntime for SnapshotRuntime {
    async fn materialize(&self, model_id: &str, task: TaskKind) -> Result<BoxedModel, RuntimeError> {
        let dir = snapshot_dir(&self.model_dir, model_id);
        info!(model_id = %model_id, task = %task, dir = %dir.display(), "Materializing model snapshot");

        let config_path = self
            .hub
            .download(&DownloadRequest::new(model_id, CONFIG_FILE, &dir).with_kind(RepoKind::Model))
            .await?;
        let config: Value = serde_json::from_slice(&tokio::fs::read(&config_path).await?)
            .map_err(|e| RuntimeError::Materialize(format!("invalid {}: {}", CONFIG_FILE, e)))?;

        let architectures: Vec<String> = config
            .get("architectures")
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_default();
        if architectures.is_empty() {
            return Err(RuntimeError::Materialize(format!(
                "{} declares no architectures",
                CONFIG_FILE
            )));
        }
        check_architecture(task, &architectures)?;

        let tokenizer = self
            .hub
            .download(&DownloadRequest::new(model_id, TOKENIZER_CONFIG_FILE, &dir))
            .await;
        let has_tokenizer = match tokenizer {
            Ok(_) => true,
            Err(HubError::NotFound(_)) => false,
            Err(e) => return Err(e.into()),
        };

        debug!(model_id = %model_id, ?architectures, has_tokenizer, "Snapshot ready");
        Ok(Arc::new(HostedModel {
            model_id: model_id.to_string(),
            task,
            architectures,
            snapshot: dir,
            inference: Arc::clone(&self.inference),
            timeout: self.call_timeout,
        }))
    }

    async fn release(&self, model: BoxedModel) {
        // Snapshot files stay on disk; memory goes with the last Arc.
        info!(model_id = %model.model_id(), "Released model");
    }
}

/// Classification heads cannot serve causal generation and vice versa.
fn check_architecture(task: TaskKind, architectures: &[String]) -> Result<(), RuntimeError> {
    let ok = architectures.iter().any(|arch| match task {
        TaskKind::TextGeneration => {
            arch.ends_with("ForCausalLM") || arch.ends_with("LMHeadModel") || arch.ends_with("ForConditionalGeneration")
        }
        TaskKind::TextClassification | TaskKind::SentimentAnalysis => {
            arch.ends_with("ForSequenceClassification")
        }
    });

    if ok {
        Ok(())
    } else {
        Err(RuntimeError::UnsupportedTask(format!(
            "{} cannot run {}",
            architectures.join(", "),
            task
        )))
    }
}

pub struct HostedModel {
    model_id: String,
    task: TaskKind,
    architectures: Vec<String>,
    snapshot: PathBuf,
    inference: Arc<dyn InferenceApi>,
    timeout: Duration,
}

impl HostedModel {
    pub fn architectures(&self) -> &[String] {
        &self.architectures
    }

    pub fn snapshot(&self) -> &PathBuf {
        &self.snapshot
    }
}

#[async_trait]
impl LoadedModel for HostedModel {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn task(&self) -> TaskKind {
        self.task
    }

    async fn generate(&self, inputs: &str, params: &GenerationParams) -> Result<String, RuntimeError> {
        let parameters = if self.task.is_generative() {
            json!({
                "max_new_tokens": params.max_length,
                "temperature": params.temperature,
                "do_sample": params.do_sample,
                "return_full_text": true
            })
        } else {
            json!({})
        };

        let output = self
            .inference
            .invoke(&self.model_id, inputs, Some(&parameters), self.timeout)
            .await?;
        render_output(self.task, &output)
    }
}

/// Flatten the inference JSON into the text a caller expects for the task.
fn render_output(task: TaskKind, output: &Value) -> Result<String, RuntimeError> {
    if task.is_generative() {
        return output
            .pointer("/0/generated_text")
            .or_else(|| output.get("generated_text"))
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| RuntimeError::Generation(format!("no generated_text in {}", output)));
    }

    // Classification answers either `[{label, score}]` or `[[{label, score}]]`.
    let labels = match output.pointer("/0/0") {
        Some(_) => output.get(0),
        None => Some(output),
    }
    .and_then(Value::as_array)
    .ok_or_else(|| RuntimeError::Generation(format!("unexpected classification output {}", output)))?;

    let rendered: Vec<String> = labels
        .iter()
        .filter_map(|entry| {
            let label = entry.get("label")?.as_str()?;
            let score = entry.get("score")?.as_f64()?;
            Some(format!("{} ({:.4})", label, score))
        })
        .collect();

    if rendered.is_empty() {
        return Err(RuntimeError::Generation("classification returned no labels".into()));
    }
    Ok(rendered.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::SearchQuery;
    use crate::testing::StubInference;
    use hf_core::MetadataRecord;
    use std::path::Path;

    /// Hub that serves a fixed `config.json` and no tokenizer
    struct SnapshotHub {
        config: Value,
    }

    #[async_trait]
    impl HubApi for SnapshotHub {
        async fn lookup(&self, kind: RepoKind, id: &str) -> Result<MetadataRecord, HubError> {
            Err(HubError::NotFound(format!("{} {}", kind, id)))
        }

        async fn search(&self, _query: &SearchQuery) -> Result<Vec<MetadataRecord>, HubError> {
            Ok(Vec::new())
        }

        async fn download(&self, request: &DownloadRequest) -> Result<PathBuf, HubError> {
            if request.filename != CONFIG_FILE {
                return Err(HubError::NotFound(request.filename.clone()));
            }
            tokio::fs::create_dir_all(&request.dest_dir).await?;
            let path = request.dest_dir.join(&request.filename);
            tokio::fs::write(&path, self.config.to_string()).await?;
            Ok(path)
        }
    }

    fn runtime(root: &Path, architecture: &str) -> SnapshotRuntime {
        SnapshotRuntime::new(
            Arc::new(SnapshotHub {
                config: json!({ "architectures": [architecture] }),
            }),
            Arc::new(StubInference::new()),
            root,
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_materialize_writes_snapshot_and_generates() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = runtime(dir.path(), "GPT2LMHeadModel");

        let model = runtime
            .materialize("openai-community/gpt2", TaskKind::TextGeneration)
            .await
            .unwrap();

        assert_eq!(model.model_id(), "openai-community/gpt2");
        assert!(dir.path().join("openai-community--gpt2").join(CONFIG_FILE).is_file());
        let text = model.generate("Hello", &GenerationParams::default()).await.unwrap();
        assert_eq!(text, "Hello");
    }

    #[tokio::test]
    async fn test_materialize_rejects_wrong_head() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = runtime(dir.path(), "DistilBertForSequenceClassification");

        let err = runtime
            .materialize("distilbert", TaskKind::TextGeneration)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, RuntimeError::UnsupportedTask(_)));
    }

    #[test]
    fn test_render_generation() {
        let out = json!([{"generated_text": "Hello world"}]);
        assert_eq!(render_output(TaskKind::TextGeneration, &out).unwrap(), "Hello world");
        assert!(render_output(TaskKind::TextGeneration, &json!([])).is_err());
    }

    #[test]
    fn test_render_classification_nested_and_flat() {
        let nested = json!([[{"label": "POSITIVE", "score": 0.99}, {"label": "NEGATIVE", "score": 0.01}]]);
        let flat = json!([{"label": "POSITIVE", "score": 0.5}]);

        let text = render_output(TaskKind::SentimentAnalysis, &nested).unwrap();
        assert_eq!(text, "POSITIVE (0.9900)\nNEGATIVE (0.0100)");
        assert_eq!(
            render_output(TaskKind::TextClassification, &flat).unwrap(),
            "POSITIVE (0.5000)"
        );
    }

    #[test]
    fn test_architecture_check() {
        let causal = vec!["GPT2LMHeadModel".to_string()];
        let classifier = vec!["DistilBertForSequenceClassification".to_string()];

        assert!(check_architecture(TaskKind::TextGeneration, &causal).is_ok());
        assert!(check_architecture(TaskKind::SentimentAnalysis, &classifier).is_ok());
        assert!(matches!(
            check_architecture(TaskKind::TextGeneration, &classifier),
            Err(RuntimeError::UnsupportedTask(_))
        ));
    }
}
