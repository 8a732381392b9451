//! Client-side read cache.
//!
//! - **Keys**: deterministic `CacheKey`s derived from request descriptors
//! - **Store**: per-key entries with single-flight fetches, explicit
//!   invalidation and stale-while-revalidate reads
//!
//! ## Configuration
//!
//! Entry lifetime is controlled via `albumsync.toml`:
//!
//! ```toml
//! [cache]
//! eviction = "lru"   # or "session" (default)
//! max_entries = 64
//! ```

mod config;
mod generation;
mod keys;
pub(crate) mod lock;
mod store;

pub use config::{CacheConfig, EvictionPolicy};
pub use generation::Generation;
pub use keys::{ALBUMS_NAMESPACE, CacheKey};
pub use store::{
    Binding, CacheStore, FetchFuture, Invalidation, ReadState, Subscription,
};

pub use store::{
    METRIC_COMPLETION_DISCARDED_TOTAL, METRIC_EVICT_TOTAL, METRIC_FETCH_DEDUPLICATED_TOTAL,
    METRIC_FETCH_MS, METRIC_FETCH_TOTAL,
};
