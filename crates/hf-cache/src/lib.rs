//! hf-cache: process-wide caches of the broker
//!
//! - [`MetadataCache`]: bounded memo of Hub records, insertion-order eviction
//! - [`ModelCache`]: bounded set of materialized models with single-flight
//!   loads and insertion-order eviction
//!
//! Both are plain values constructed by the caller and shared behind `Arc`;
//! nothing here is a global.

pub mod metadata;
pub mod model_cache;
pub mod stats;

pub use metadata::MetadataCache;
pub use model_cache::{LoadOutcome, ModelCache, ModelHandle};
pub use stats::CacheStats;

/// Prelude for convenient imports
pub mod prelude {
    pub use super::metadata::MetadataCache;
    pub use super::model_cache::{LoadOutcome, ModelCache, ModelHandle};
    pub use super::stats::CacheStats;
}
