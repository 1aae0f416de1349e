//! Metadata cache
//!
//! Memoizes Hub records keyed by `(kind, id)`. Bounded; when full the
//! record inserted earliest is dropped. Hits never reorder entries, so the
//! eviction order is exactly the insertion order. There is no TTL: a record
//! stays until capacity pressure pushes it out.

use hf_core::{Error, MetadataRecord, RemoteFailure, RepoKind, Result};
use hf_hub::HubApi;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::stats::CacheStats;

type MetadataKey = (RepoKind, String);

pub struct MetadataCache {
    hub: Arc<dyn HubApi>,
    /// Only ever read with `peek` so recency never changes
    entries: RwLock<LruCache<MetadataKey, Arc<MetadataRecord>>>,
    capacity: NonZeroUsize,
    call_timeout: Duration,
    stats: RwLock<CacheStats>,
}

impl MetadataCache {
    /// Create a new metadata cache. A zero capacity is treated as one.
    pub fn new(hub: Arc<dyn HubApi>, capacity: usize, call_timeout: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            hub,
            entries: RwLock::new(LruCache::new(capacity)),
            capacity,
            call_timeout,
            stats: RwLock::new(CacheStats::default()),
        }
    }

    /// Return the cached record or fetch it from the Hub.
    ///
    /// Fails with `RemoteLookupFailed` when the Hub call fails, times out,
    /// or the record does not exist (failure kind `Missing`).
    pub async fn get_or_fetch(&self, kind: RepoKind, id: &str) -> Result<Arc<MetadataRecord>> {
        let key = (kind, id.to_string());

        let cached = self.entries.read().await.peek(&key).cloned();
        if let Some(record) = cached {
            self.stats.write().await.hits += 1;
            debug!(kind = %kind, id = %id, "Metadata cache hit");
            return Ok(record);
        }
        self.stats.write().await.misses += 1;
        debug!(kind = %kind, id = %id, "Metadata cache miss");

        let record = match self.fetch(kind, id).await {
            Ok(record) => Arc::new(record),
            Err(e) => {
                self.stats.write().await.failures += 1;
                return Err(e);
            }
        };

        let mut entries = self.entries.write().await;
        // A concurrent miss may have stored the key already; keep the first
        // copy so insertion order is not disturbed.
        if let Some(existing) = entries.peek(&key) {
            return Ok(Arc::clone(existing));
        }

        let evicted = entries.push(key, Arc::clone(&record));
        drop(entries);

        let mut stats = self.stats.write().await;
        stats.loads += 1;
        if let Some(((old_kind, old_id), _)) = evicted {
            stats.evictions += 1;
            debug!(kind = %old_kind, id = %old_id, "Evicted metadata record");
        }
        Ok(record)
    }

    async fn fetch(&self, kind: RepoKind, id: &str) -> Result<MetadataRecord> {
        let subject = format!("{} {}", kind, id);
        match tokio::time::timeout(self.call_timeout, self.hub.lookup(kind, id)).await {
            Ok(Ok(record)) => Ok(record),
            Ok(Err(e)) => {
                if !e.is_not_found() {
                    warn!(kind = %kind, id = %id, error = %e, "Hub lookup failed");
                }
                Err(e.into_error(subject))
            }
            Err(_) => {
                warn!(kind = %kind, id = %id, timeout = ?self.call_timeout, "Hub lookup timed out");
                Err(Error::remote(
                    subject,
                    RemoteFailure::Timeout,
                    format!("no answer within {:?}", self.call_timeout),
                ))
            }
        }
    }

    /// Cached record without touching the Hub
    pub async fn peek(&self, kind: RepoKind, id: &str) -> Option<Arc<MetadataRecord>> {
        self.entries
            .read()
            .await
            .peek(&(kind, id.to_string()))
            .cloned()
    }

    pub async fn contains(&self, kind: RepoKind, id: &str) -> bool {
        self.entries.read().await.contains(&(kind, id.to_string()))
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    pub async fn stats(&self) -> CacheStats {
        *self.stats.read().await
    }

    /// Drop every record
    pub async fn clear(&self) {
        self.entries.write().await.clear();
        info!("Metadata cache cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hf_hub::testing::StubHub;

    fn cache(hub: &Arc<StubHub>, capacity: usize) -> MetadataCache {
        MetadataCache::new(hub.clone(), capacity, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_hit_skips_remote() {
        let hub = Arc::new(StubHub::with_models(&["gpt2"]));
        let cache = cache(&hub, 4);

        let first = cache.get_or_fetch(RepoKind::Model, "gpt2").await.unwrap();
        let second = cache.get_or_fetch(RepoKind::Model, "gpt2").await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(hub.lookups(), 1);
        let stats = cache.stats().await;
        assert_eq!((stats.hits, stats.misses, stats.loads), (1, 1, 1));
    }

    #[tokio::test]
    async fn test_insertion_order_eviction() {
        let hub = Arc::new(StubHub::with_models(&["a", "b", "c"]));
        let cache = cache(&hub, 2);

        for id in ["a", "b", "c"] {
            cache.get_or_fetch(RepoKind::Model, id).await.unwrap();
        }
        assert_eq!(hub.lookups(), 3);
        assert!(!cache.contains(RepoKind::Model, "a").await);

        // Recent entry: hit
        cache.get_or_fetch(RepoKind::Model, "c").await.unwrap();
        assert_eq!(hub.lookups(), 3);

        // Earliest entry was evicted: miss
        cache.get_or_fetch(RepoKind::Model, "a").await.unwrap();
        assert_eq!(hub.lookups(), 4);
        assert_eq!(cache.len().await, 2);
        assert_eq!(cache.stats().await.evictions, 2);
    }

    #[tokio::test]
    async fn test_hits_do_not_promote() {
        let hub = Arc::new(StubHub::with_models(&["a", "b", "c"]));
        let cache = cache(&hub, 2);

        cache.get_or_fetch(RepoKind::Model, "a").await.unwrap();
        cache.get_or_fetch(RepoKind::Model, "b").await.unwrap();
        cache.get_or_fetch(RepoKind::Model, "a").await.unwrap();
        cache.get_or_fetch(RepoKind::Model, "c").await.unwrap();

        assert!(!cache.contains(RepoKind::Model, "a").await);
        assert!(cache.contains(RepoKind::Model, "b").await);
    }

    #[tokio::test]
    async fn test_missing_record_is_remote_missing() {
        let hub = Arc::new(StubHub::new());
        let cache = cache(&hub, 2);

        let err = cache.get_or_fetch(RepoKind::Model, "nope").await.unwrap_err();
        assert_eq!(err.code(), "REMOTE_LOOKUP_FAILED");
        assert!(err.is_remote_missing());
        assert!(cache.is_empty().await);
        assert_eq!(cache.stats().await.failures, 1);
    }

    #[tokio::test]
    async fn test_kinds_are_separate_keys() {
        let hub = Arc::new(StubHub::with_models(&["squad"]));
        let cache = cache(&hub, 4);

        cache.get_or_fetch(RepoKind::Model, "squad").await.unwrap();
        let err = cache.get_or_fetch(RepoKind::Dataset, "squad").await.unwrap_err();
        assert!(err.is_remote_missing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_lookup_times_out() {
        let hub = Arc::new(StubHub::with_models(&["gpt2"]).with_delay(Duration::from_secs(60)));
        let cache = MetadataCache::new(hub.clone(), 2, Duration::from_secs(1));

        let err = cache.get_or_fetch(RepoKind::Model, "gpt2").await.unwrap_err();
        assert!(matches!(
            err,
            Error::RemoteLookupFailed {
                failure: RemoteFailure::Timeout,
                ..
            }
        ));
        assert!(err.is_transient());
    }
}
