//! Built-in tools against in-memory collaborators

use hf_cache::{MetadataCache, ModelCache};
use hf_core::{BrokerConfig, MetadataRecord, RepoKind};
use hf_hub::testing::{model_record, StubHub, StubInference, StubRepoWriter, StubRuntime};
use hf_hub::RepoWriter;
use hf_tools::{register_builtin_tools, ToolContext, ToolRegistry};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

struct Harness {
    hub: Arc<StubHub>,
    runtime: Arc<StubRuntime>,
    inference: Arc<StubInference>,
    writer: Arc<StubRepoWriter>,
    registry: ToolRegistry,
}

fn harness_with(config: BrokerConfig, hub: StubHub, inference: StubInference) -> Harness {
    let config = Arc::new(config);
    let hub = Arc::new(hub);
    let runtime = Arc::new(StubRuntime::new());
    let inference = Arc::new(inference);
    let writer = Arc::new(StubRepoWriter::new());

    let metadata = Arc::new(MetadataCache::new(
        hub.clone(),
        config.metadata_cache_size,
        config.call_timeout(),
    ));
    let models = Arc::new(ModelCache::new(
        runtime.clone(),
        metadata.clone(),
        config.capacity,
        config.load_timeout(),
    ));
    let ctx = ToolContext {
        config: config.clone(),
        hub: hub.clone(),
        inference: inference.clone(),
        writer: config
            .credentials_present()
            .then(|| writer.clone() as Arc<dyn RepoWriter>),
        metadata,
        models,
    };

    Harness {
        hub,
        runtime,
        inference,
        writer,
        registry: register_builtin_tools(&ctx).unwrap(),
    }
}

fn harness(config: BrokerConfig) -> Harness {
    harness_with(
        config,
        StubHub::with_models(&["gpt2", "distilgpt2", "bert-base"]),
        StubInference::new(),
    )
}

fn listed(registry: &ToolRegistry) -> Vec<String> {
    registry.list_tools().iter().map(|d| d.name.clone()).collect()
}

#[test]
fn tool_listing_is_declaration_order_and_gated() {
    let anonymous = harness(BrokerConfig::default());
    assert_eq!(
        listed(&anonymous.registry),
        vec![
            "search_hub",
            "inference_api_run",
            "hf_download",
            "load_model_locally",
            "local_inference",
            "unload_model",
            "compare_models",
        ]
    );

    let authed = harness(BrokerConfig::default().with_token("hf_secret"));
    let names = listed(&authed.registry);
    assert_eq!(names.len(), 9);
    assert_eq!(&names[7..], ["hf_repo_create", "hf_upload_file"]);

    let categories = anonymous.registry.stats().categories;
    assert_eq!(categories.get("hub"), Some(&3));
    assert_eq!(categories.get("models"), Some(&2));
    assert_eq!(categories.get("repository"), None);
    assert_eq!(authed.registry.stats().categories.get("repository"), Some(&2));
}

#[tokio::test]
async fn gated_tool_is_disabled_without_credentials() {
    let h = harness(BrokerConfig::default());
    let err = h
        .registry
        .call("hf_repo_create", json!({"repo_id": "me/new"}))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "DISABLED");
    assert_eq!(h.writer.creates(), 0);
}

#[tokio::test]
async fn missing_argument_never_reaches_collaborators() {
    let h = harness(BrokerConfig::default());

    assert_err!(h.registry.call("search_hub", json!({})).await);
    assert_err!(h.registry.call("inference_api_run", json!({"model_id": "gpt2"})).await);
    assert_err!(h.registry.call("load_model_locally", json!({"task": "text-generation"})).await);

    assert_eq!(h.hub.searches(), 0);
    assert_eq!(h.hub.lookups(), 0);
    assert_eq!(h.inference.invocations(), 0);
    assert_eq!(h.runtime.materializations(), 0);
}

#[tokio::test]
async fn search_formats_hits() {
    let h = harness(BrokerConfig::default());
    let output = assert_ok!(h.registry.call("search_hub", json!({"query": "gpt"})).await);

    let text = output.joined_text();
    assert!(text.starts_with("Found 2 models:\n\n"));
    assert!(text.contains("**distilgpt2** (↓2000) - text-generation"));
    assert_eq!(output.structured().unwrap()["results"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn search_rejects_unknown_type() {
    let h = harness(BrokerConfig::default());
    let err = h
        .registry
        .call("search_hub", json!({"query": "x", "type": "paper"}))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_ARGUMENTS");
}

#[tokio::test]
async fn hosted_inference_returns_structured_result() {
    let h = harness(BrokerConfig::default());
    let output = assert_ok!(
        h.registry
            .call(
                "inference_api_run",
                json!({"model_id": "gpt2", "inputs": "Hello", "parameters": {"max_new_tokens": 5}}),
            )
            .await
    );

    assert!(output.joined_text().starts_with("Inference result:\n```json"));
    assert_eq!(output.structured().unwrap()[0]["generated_text"], "Hello");
    assert_eq!(h.inference.invocations(), 1);
}

#[tokio::test(start_paused = true)]
async fn hosted_inference_timeout_is_remote_failure() {
    let mut config = BrokerConfig::default();
    config.call_timeout_ms = 1_000;
    let h = harness_with(
        config,
        StubHub::with_models(&["gpt2"]),
        StubInference::new().with_delay(Duration::from_secs(30)),
    );

    let err = h
        .registry
        .call("inference_api_run", json!({"model_id": "gpt2", "inputs": "Hi"}))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "REMOTE_LOOKUP_FAILED");
    assert!(err.is_transient());
}

#[tokio::test]
async fn load_then_infer_then_unload() {
    let h = harness(BrokerConfig::default());

    let loaded = assert_ok!(h.registry.call("load_model_locally", json!({"model_id": "gpt2"})).await);
    assert_eq!(loaded.joined_text(), "Successfully loaded gpt2 for text-generation");

    let again = assert_ok!(h.registry.call("load_model_locally", json!({"model_id": "gpt2"})).await);
    assert_eq!(again.joined_text(), "Model gpt2 already loaded");
    assert_eq!(h.runtime.materializations(), 1);

    let out = assert_ok!(
        h.registry
            .call("local_inference", json!({"model_id": "gpt2", "inputs": "Once", "max_length": 20}))
            .await
    );
    assert_eq!(out.joined_text(), "Local inference result:\ngpt2 [20]: Once");

    let unloaded = assert_ok!(h.registry.call("unload_model", json!({"model_id": "gpt2"})).await);
    assert_eq!(unloaded.joined_text(), "Unloaded gpt2");

    let err = h
        .registry
        .call("local_inference", json!({"model_id": "gpt2", "inputs": "Once"}))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");
}

#[tokio::test]
async fn local_inference_never_loads() {
    let h = harness(BrokerConfig::default());
    let err = h
        .registry
        .call("local_inference", json!({"model_id": "gpt2", "inputs": "x"}))
        .await
        .unwrap_err();

    assert_eq!(err.code(), "NOT_FOUND");
    assert!(hf_core::ErrorReport::from(&err)
        .suggestion
        .unwrap()
        .contains("load_model_locally"));
    assert_eq!(h.runtime.materializations(), 0);
}

#[tokio::test]
async fn load_reports_eviction() {
    let mut config = BrokerConfig::default();
    config.capacity = 1;
    let h = harness(config);

    assert_ok!(h.registry.call("load_model_locally", json!({"model_id": "gpt2"})).await);
    let second = assert_ok!(
        h.registry
            .call("load_model_locally", json!({"model_id": "distilgpt2"}))
            .await
    );
    assert!(second.joined_text().ends_with("Unloaded gpt2 to make space"));
    assert_eq!(second.structured().unwrap()["evicted"], "gpt2");
}

#[tokio::test]
async fn loading_unknown_model_is_not_found() {
    let h = harness(BrokerConfig::default());
    let err = h
        .registry
        .call("load_model_locally", json!({"model_id": "nobody/nothing"}))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");
    assert_eq!(h.runtime.materializations(), 0);
}

#[tokio::test]
async fn compare_models_ranks_by_downloads() {
    let hub = StubHub::new();
    let mut small = model_record("tiny", 50);
    small.parameters = Some(1_000);
    let mut big = model_record("huge", 9_000);
    big.parameters = Some(7_000_000_000);
    hub.insert(small);
    hub.insert(big);
    hub.insert(model_record("mystery", 100));
    let h = harness_with(BrokerConfig::default(), hub, StubInference::new());

    let output = assert_ok!(
        h.registry
            .call("compare_models", json!({"model_ids": ["tiny", "mystery", "huge"]}))
            .await
    );

    let data = output.structured().unwrap();
    let order: Vec<&str> = data["models"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["model_id"].as_str().unwrap())
        .collect();
    assert_eq!(order, vec!["huge", "mystery", "tiny"]);
    assert_eq!(data["most_popular"], "huge");
    assert_eq!(data["smallest"], "tiny");
    assert!(output.joined_text().contains("• Most Popular: huge (9000 downloads)"));

    // Second comparison is served from the metadata cache
    assert_ok!(h.registry.call("compare_models", json!({"model_ids": ["tiny"]})).await);
    assert_eq!(h.hub.lookups(), 3);
}

#[tokio::test]
async fn compare_models_rejects_empty_list() {
    let h = harness(BrokerConfig::default());
    let err = h
        .registry
        .call("compare_models", json!({"model_ids": []}))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_ARGUMENTS");
}

#[tokio::test]
async fn download_writes_into_local_dir() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(BrokerConfig::default());

    let output = assert_ok!(
        h.registry
            .call(
                "hf_download",
                json!({"repo_id": "gpt2", "filename": "config.json", "local_dir": dir.path()}),
            )
            .await
    );

    assert!(dir.path().join("config.json").exists());
    assert!(output.joined_text().starts_with("Downloaded config.json from gpt2 to "));
}

#[tokio::test]
async fn download_rejects_paths_outside_local_dir() {
    let h = harness(BrokerConfig::default());
    for filename in ["../etc/passwd", "nested/../../escape", "/etc/passwd"] {
        let err = h
            .registry
            .call("hf_download", json!({"repo_id": "gpt2", "filename": filename}))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_ARGUMENTS", "{filename}");
    }
    assert_eq!(h.hub.downloads(), 0);
}

#[tokio::test]
async fn write_tools_with_credentials() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("README.md");
    std::fs::write(&file, "# hello").unwrap();
    let h = harness(BrokerConfig::default().with_token("hf_secret"));

    let created = assert_ok!(
        h.registry
            .call("hf_repo_create", json!({"repo_id": "me/new", "repo_type": "dataset"}))
            .await
    );
    assert_eq!(created.joined_text(), "Created dataset repository: me/new");

    let uploaded = assert_ok!(
        h.registry
            .call(
                "hf_upload_file",
                json!({
                    "repo_id": "me/new",
                    "path_or_fileobj": file.to_str().unwrap(),
                    "path_in_repo": "README.md"
                }),
            )
            .await
    );
    assert_eq!(uploaded.structured().unwrap()["commit_message"], "Upload file via MCP");
    assert_eq!((h.writer.creates(), h.writer.uploads()), (1, 1));
}

#[test]
fn record_summary_shapes() {
    let mut space = MetadataRecord::new("user/demo", RepoKind::Space);
    space.sdk = Some("gradio".into());
    let summary = hf_tools::builtin::record_summary(&space);
    assert_eq!(summary["sdk"], "gradio");
    assert!(summary.get("downloads").is_none());
}
