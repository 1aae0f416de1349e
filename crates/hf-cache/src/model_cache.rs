//! Model runtime cache
//!
//! Owns every materialized model. At most `capacity` handles are resident;
//! inserting into a full cache first evicts the handle that was loaded
//! earliest. Access never changes that order.
//!
//! Loads are single-flight: concurrent `ensure_loaded` calls for the same
//! id share one materialization and all observe its outcome, success or
//! failure. Loads of different ids run concurrently.
//!
//! Handles are `Arc` snapshots. A caller that obtained one keeps a working
//! payload even if the handle is evicted while it is in use; the runtime is
//! told to release the payload once, when the cache drops it.

use chrono::{DateTime, Utc};
use hf_core::{Error, RepoKind, Result, TaskKind};
use hf_hub::{BoxedModel, GenerationParams, ModelRuntime};
use lru::LruCache;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::metadata::MetadataCache;
use crate::stats::CacheStats;

/// One materialized model
pub struct ModelHandle {
    id: String,
    task: TaskKind,
    model: BoxedModel,
    /// Monotonic insertion marker; lower means evicted sooner
    loaded_seq: u64,
    loaded_at: DateTime<Utc>,
}

impl ModelHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn task(&self) -> TaskKind {
        self.task
    }

    pub fn loaded_seq(&self) -> u64 {
        self.loaded_seq
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn model(&self) -> &BoxedModel {
        &self.model
    }

    /// Run the payload. Failures are reported as `LoadFailed` for this model.
    pub async fn generate(&self, inputs: &str, params: &GenerationParams) -> Result<String> {
        self.model
            .generate(inputs, params)
            .await
            .map_err(|e| e.into_error(&self.id))
    }
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("id", &self.id)
            .field("task", &self.task)
            .field("loaded_seq", &self.loaded_seq)
            .field("loaded_at", &self.loaded_at)
            .finish()
    }
}

/// What `ModelCache::load` did
#[derive(Debug, Clone)]
pub struct LoadOutcome {
    pub handle: Arc<ModelHandle>,
    /// The model was resident before the call
    pub already_loaded: bool,
    /// Model pushed out to make room, if any
    pub evicted: Option<String>,
}

#[derive(Clone)]
struct Loaded {
    handle: Arc<ModelHandle>,
    evicted: Option<String>,
}

struct InFlight {
    cell: OnceCell<Result<Loaded>>,
    /// Handle displaced by this load; taken by the first caller to finish
    victim: Mutex<Option<Arc<ModelHandle>>>,
}

struct CacheState {
    /// Unbounded; the capacity check happens on insert
    resident: LruCache<String, Arc<ModelHandle>>,
    in_flight: HashMap<String, Arc<InFlight>>,
    next_seq: u64,
    stats: CacheStats,
}

pub struct ModelCache {
    runtime: Arc<dyn ModelRuntime>,
    metadata: Arc<MetadataCache>,
    capacity: usize,
    load_timeout: Duration,
    state: Mutex<CacheState>,
}

impl ModelCache {
    /// Create an empty cache. A zero capacity is treated as one.
    pub fn new(
        runtime: Arc<dyn ModelRuntime>,
        metadata: Arc<MetadataCache>,
        capacity: usize,
        load_timeout: Duration,
    ) -> Self {
        Self {
            runtime,
            metadata,
            capacity: capacity.max(1),
            load_timeout,
            state: Mutex::new(CacheState {
                resident: LruCache::unbounded(),
                in_flight: HashMap::new(),
                next_seq: 0,
                stats: CacheStats::default(),
            }),
        }
    }

    // Critical sections never panic part-way, so a poisoned lock still
    // holds consistent state.
    fn state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the resident handle for `model_id`, loading it if needed.
    ///
    /// An already resident model is returned unchanged even when `task`
    /// differs from the task it was loaded for.
    pub async fn ensure_loaded(&self, model_id: &str, task: TaskKind) -> Result<Arc<ModelHandle>> {
        self.load(model_id, task).await.map(|outcome| outcome.handle)
    }

    /// Like [`ensure_loaded`](Self::ensure_loaded), also reporting whether
    /// the model was already resident and what was evicted.
    pub async fn load(&self, model_id: &str, task: TaskKind) -> Result<LoadOutcome> {
        let flight = {
            let mut state = self.state();
            if let Some(handle) = state.resident.peek(model_id).cloned() {
                state.stats.hits += 1;
                debug!(model_id = %model_id, "Model cache hit");
                return Ok(LoadOutcome {
                    handle,
                    already_loaded: true,
                    evicted: None,
                });
            }
            state.stats.misses += 1;

            let flight = state
                .in_flight
                .entry(model_id.to_string())
                .or_insert_with(|| {
                    Arc::new(InFlight {
                        cell: OnceCell::new(),
                        victim: Mutex::new(None),
                    })
                });
            Arc::clone(flight)
        };

        let loaded = flight
            .cell
            .get_or_init(|| self.load_and_insert(model_id, task, &flight))
            .await
            .clone();

        let victim = flight
            .victim
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(victim) = victim {
            self.release_victim(victim).await;
        }
        let loaded = loaded?;

        Ok(LoadOutcome {
            handle: loaded.handle,
            already_loaded: false,
            evicted: loaded.evicted,
        })
    }

    /// Runs once per in-flight entry. Nothing is awaited once the handle is
    /// inserted, so a dropped caller either leaves the cache untouched or
    /// leaves the result published.
    async fn load_and_insert(
        &self,
        model_id: &str,
        task: TaskKind,
        flight: &Arc<InFlight>,
    ) -> Result<Loaded> {
        {
            let mut state = self.state();
            if let Some(handle) = state.resident.peek(model_id).cloned() {
                Self::finish_flight(&mut state, model_id, flight);
                debug!(model_id = %model_id, "Model became resident before its load started");
                return Ok(Loaded {
                    handle,
                    evicted: None,
                });
            }
        }

        info!(model_id = %model_id, task = %task, "Loading model");
        let result = self.materialize(model_id, task).await;

        let outcome = {
            let mut state = self.state();
            Self::finish_flight(&mut state, model_id, flight);

            match result {
                Ok(model) => {
                    assert!(
                        !state.resident.contains(model_id),
                        "model cache invariant violated: {} inserted twice",
                        model_id
                    );
                    let victim = if state.resident.len() >= self.capacity {
                        state.resident.pop_lru()
                    } else {
                        None
                    };

                    let handle = Arc::new(ModelHandle {
                        id: model_id.to_string(),
                        task,
                        model,
                        loaded_seq: state.next_seq,
                        loaded_at: Utc::now(),
                    });
                    state.next_seq += 1;
                    state.resident.push(model_id.to_string(), Arc::clone(&handle));
                    state.stats.loads += 1;
                    if victim.is_some() {
                        state.stats.evictions += 1;
                    }
                    Ok((handle, victim))
                }
                Err(e) => {
                    state.stats.failures += 1;
                    Err(e)
                }
            }
        };

        match outcome {
            Ok((handle, victim)) => {
                let evicted = victim.map(|(victim_id, victim_handle)| {
                    info!(model_id = %victim_id, "Evicted model to make room");
                    *flight.victim.lock().unwrap_or_else(PoisonError::into_inner) =
                        Some(victim_handle);
                    victim_id
                });
                info!(model_id = %model_id, seq = handle.loaded_seq, "Model loaded");
                Ok(Loaded { handle, evicted })
            }
            Err(e) => {
                warn!(model_id = %model_id, code = e.code(), error = %e, "Model load failed");
                Err(e)
            }
        }
    }

    /// Drop the in-flight entry for `model_id` if it still belongs to `flight`
    fn finish_flight(state: &mut CacheState, model_id: &str, flight: &Arc<InFlight>) {
        if state
            .in_flight
            .get(model_id)
            .is_some_and(|current| Arc::ptr_eq(current, flight))
        {
            state.in_flight.remove(model_id);
        }
    }

    /// Release an evicted payload on its own task so it completes even if
    /// the caller is dropped mid-release.
    async fn release_victim(&self, victim: Arc<ModelHandle>) {
        let runtime = Arc::clone(&self.runtime);
        let model = Arc::clone(&victim.model);
        if let Err(e) = tokio::spawn(async move { runtime.release(model).await }).await {
            warn!(model_id = %victim.id, error = %e, "Releasing evicted model failed");
        }
    }

    async fn materialize(&self, model_id: &str, task: TaskKind) -> Result<BoxedModel> {
        self.metadata
            .get_or_fetch(RepoKind::Model, model_id)
            .await
            .map_err(|e| {
                if e.is_remote_missing() {
                    Error::not_found(format!("Model '{}' does not exist on the Hub", model_id))
                } else {
                    e
                }
            })?;

        match tokio::time::timeout(self.load_timeout, self.runtime.materialize(model_id, task)).await {
            Ok(Ok(model)) => Ok(model),
            Ok(Err(e)) => Err(e.into_error(model_id)),
            Err(_) => Err(Error::load_failed(
                model_id,
                format!("materialization did not finish within {:?}", self.load_timeout),
            )),
        }
    }

    /// Resident handle, if any. Never loads.
    pub fn get(&self, model_id: &str) -> Option<Arc<ModelHandle>> {
        self.state().resident.peek(model_id).cloned()
    }

    /// Unload `model_id`. Returns false when it was not resident.
    pub async fn evict(&self, model_id: &str) -> bool {
        let removed = self.state().resident.pop(model_id);
        match removed {
            Some(handle) => {
                self.runtime.release(Arc::clone(&handle.model)).await;
                info!(model_id = %model_id, "Unloaded model");
                true
            }
            None => {
                debug!(model_id = %model_id, "Unload requested for model that is not resident");
                false
            }
        }
    }

    /// Unload everything, oldest first.
    pub async fn clear(&self) {
        let drained: Vec<Arc<ModelHandle>> = {
            let mut state = self.state();
            std::iter::from_fn(|| state.resident.pop_lru().map(|(_, h)| h)).collect()
        };
        for handle in drained {
            self.runtime.release(Arc::clone(&handle.model)).await;
            info!(model_id = %handle.id, "Unloaded model");
        }
    }

    pub fn count(&self) -> usize {
        self.state().resident.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_loading(&self, model_id: &str) -> bool {
        self.state().in_flight.contains_key(model_id)
    }

    /// Resident handles, next victim first
    pub fn resident(&self) -> Vec<Arc<ModelHandle>> {
        self.state()
            .resident
            .iter()
            .rev()
            .map(|(_, handle)| Arc::clone(handle))
            .collect()
    }

    pub fn resident_ids(&self) -> Vec<String> {
        self.resident().iter().map(|h| h.id.clone()).collect()
    }

    pub fn stats(&self) -> CacheStats {
        self.state().stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hf_hub::testing::{StubHub, StubRuntime};

    fn setup(ids: &[&str], capacity: usize) -> (Arc<StubHub>, Arc<StubRuntime>, ModelCache) {
        let hub = Arc::new(StubHub::with_models(ids));
        let runtime = Arc::new(StubRuntime::new());
        let metadata = Arc::new(MetadataCache::new(hub.clone(), 16, Duration::from_secs(5)));
        let cache = ModelCache::new(runtime.clone(), metadata, capacity, Duration::from_secs(60));
        (hub, runtime, cache)
    }

    #[tokio::test]
    async fn test_same_id_returns_same_handle() {
        let (_, runtime, cache) = setup(&["gpt2"], 3);

        let first = cache.ensure_loaded("gpt2", TaskKind::TextGeneration).await.unwrap();
        let second = cache.ensure_loaded("gpt2", TaskKind::TextGeneration).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(runtime.materializations(), 1);
        assert_eq!(cache.count(), 1);
    }

    #[tokio::test]
    async fn test_capacity_scenario() {
        let (_, runtime, cache) = setup(&["A", "B", "C"], 2);

        for id in ["A", "B", "C"] {
            cache.ensure_loaded(id, TaskKind::TextGeneration).await.unwrap();
        }
        assert_eq!(cache.resident_ids(), vec!["B", "C"]);
        assert_eq!(runtime.materializations(), 3);

        let outcome = cache.load("A", TaskKind::TextGeneration).await.unwrap();
        assert_eq!(outcome.evicted.as_deref(), Some("B"));
        assert_eq!(cache.resident_ids(), vec!["C", "A"]);

        assert_eq!(runtime.materializations(), 4);
        assert_eq!(runtime.released(), vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_hit_reports_already_loaded() {
        let (_, _, cache) = setup(&["gpt2"], 1);

        let first = cache.load("gpt2", TaskKind::TextGeneration).await.unwrap();
        let second = cache.load("gpt2", TaskKind::SentimentAnalysis).await.unwrap();

        assert!(!first.already_loaded);
        assert!(second.already_loaded);
        assert_eq!(second.handle.task(), TaskKind::TextGeneration);
    }

    #[tokio::test]
    async fn test_unknown_model_is_not_found() {
        let (_, runtime, cache) = setup(&[], 2);

        let err = cache.ensure_loaded("ghost", TaskKind::TextGeneration).await.unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
        assert_eq!(runtime.materializations(), 0);
        assert_eq!(cache.count(), 0);
    }

    #[tokio::test]
    async fn test_hub_outage_stays_remote_failure() {
        let hub = Arc::new(StubHub::with_models(&["gpt2"]).failing());
        let runtime = Arc::new(StubRuntime::new());
        let metadata = Arc::new(MetadataCache::new(hub, 4, Duration::from_secs(5)));
        let cache = ModelCache::new(runtime, metadata, 2, Duration::from_secs(5));

        let err = cache.ensure_loaded("gpt2", TaskKind::TextGeneration).await.unwrap_err();
        assert_eq!(err.code(), "REMOTE_LOOKUP_FAILED");
    }

    #[tokio::test]
    async fn test_failed_load_keeps_residents() {
        let (_, runtime, cache) = setup(&["A", "B"], 1);
        cache.ensure_loaded("A", TaskKind::TextGeneration).await.unwrap();
        runtime.fail_on("B");

        let err = cache.ensure_loaded("B", TaskKind::TextGeneration).await.unwrap_err();
        assert_eq!(err.code(), "LOAD_FAILED");
        assert!(err.to_string().contains("out of memory"));
        assert_eq!(cache.resident_ids(), vec!["A"]);
        assert!(!cache.is_loading("B"));
        assert_eq!(cache.stats().failures, 1);
    }

    #[tokio::test]
    async fn test_evict_releases_once() {
        let (_, runtime, cache) = setup(&["gpt2"], 2);
        cache.ensure_loaded("gpt2", TaskKind::TextGeneration).await.unwrap();

        assert!(cache.evict("gpt2").await);
        assert!(!cache.evict("gpt2").await);
        assert!(cache.get("gpt2").is_none());
        assert_eq!(runtime.released(), vec!["gpt2"]);
    }

    #[tokio::test]
    async fn test_handle_survives_eviction() {
        let (_, _, cache) = setup(&["A", "B"], 1);
        let handle = cache.ensure_loaded("A", TaskKind::TextGeneration).await.unwrap();

        cache.ensure_loaded("B", TaskKind::TextGeneration).await.unwrap();
        assert!(cache.get("A").is_none());

        let text = handle.generate("hi", &GenerationParams::default()).await.unwrap();
        assert_eq!(text, "A [50]: hi");
    }

    #[tokio::test]
    async fn test_clear_releases_everything() {
        let (_, runtime, cache) = setup(&["A", "B"], 2);
        cache.ensure_loaded("A", TaskKind::TextGeneration).await.unwrap();
        cache.ensure_loaded("B", TaskKind::TextGeneration).await.unwrap();

        cache.clear().await;
        assert_eq!(cache.count(), 0);
        assert_eq!(runtime.released(), vec!["A", "B"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_timeout_is_load_failed() {
        let hub = Arc::new(StubHub::with_models(&["slow"]));
        let runtime = Arc::new(StubRuntime::new().with_delay(Duration::from_secs(120)));
        let metadata = Arc::new(MetadataCache::new(hub, 4, Duration::from_secs(5)));
        let cache = ModelCache::new(runtime, metadata, 2, Duration::from_secs(10));

        let err = cache.ensure_loaded("slow", TaskKind::TextGeneration).await.unwrap_err();
        assert_eq!(err.code(), "LOAD_FAILED");
        assert_eq!(cache.count(), 0);
    }
}
