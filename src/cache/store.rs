//! Key-addressed read cache with stale-while-revalidate semantics.
//!
//! Each key owns one entry holding the last fetched data, the last error, and
//! at most one tracked in-flight fetch. Reads never block: they return a
//! snapshot and start a background fetch when the entry needs one. Fetches
//! are stamped with a [`Generation`]; a completion only lands if the entry is
//! still waiting for that generation, so a superseded fetch that resolves
//! late can never overwrite newer data.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use lru::LruCache;
use metrics::{counter, histogram};
use time::OffsetDateTime;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::config::CacheConfig;
use super::generation::{Generation, GenerationCounter};
use super::keys::CacheKey;
use super::lock::mutex_lock;

const SOURCE: &str = "cache::store";

pub const METRIC_FETCH_TOTAL: &str = "albumsync_cache_fetch_total";
pub const METRIC_FETCH_DEDUPLICATED_TOTAL: &str = "albumsync_cache_fetch_deduplicated_total";
pub const METRIC_COMPLETION_DISCARDED_TOTAL: &str =
    "albumsync_cache_completion_discarded_total";
pub const METRIC_EVICT_TOTAL: &str = "albumsync_cache_evict_total";
pub const METRIC_FETCH_MS: &str = "albumsync_cache_fetch_ms";

pub type FetchFuture<T, E> = BoxFuture<'static, Result<T, E>>;
pub type FetchFn<T, E> = Arc<dyn Fn() -> FetchFuture<T, E> + Send + Sync>;

type SharedFetch<T, E> = Shared<FetchFuture<T, E>>;

/// A cache key bound to the remote operation that produces its data.
pub struct Binding<T, E> {
    key: CacheKey,
    fetch: FetchFn<T, E>,
}

impl<T, E> Binding<T, E> {
    pub fn new<F, Fut>(key: CacheKey, fetch: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self {
            key,
            fetch: Arc::new(move || fetch().boxed()),
        }
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }
}

impl<T, E> Clone for Binding<T, E> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            fetch: Arc::clone(&self.fetch),
        }
    }
}

impl<T, E> fmt::Debug for Binding<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding").field("key", &self.key).finish()
    }
}

/// Snapshot of one entry as seen by a consumer.
///
/// `data` is the last successful result and survives later failures, so
/// `data` and `error` may both be set; they never come from the same fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadState<T, E> {
    pub data: Option<T>,
    pub error: Option<E>,
    /// Nothing has been fetched successfully yet.
    pub is_loading: bool,
    /// A fetch is outstanding.
    pub is_validating: bool,
    pub fetched_at: Option<OffsetDateTime>,
}

impl<T, E> ReadState<T, E> {
    /// State of a key that has no entry.
    pub fn empty() -> Self {
        Self {
            data: None,
            error: None,
            is_loading: false,
            is_validating: false,
            fetched_at: None,
        }
    }
}

/// What an invalidation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invalidation {
    /// No entry exists for the key.
    NotCached,
    /// Marked stale; the next read fetches.
    Deferred,
    /// A subscriber is attached, so a fetch was started immediately.
    Refetching,
}

struct InFlight<T, E> {
    generation: Generation,
    pending: SharedFetch<T, E>,
}

struct Entry<T, E> {
    data: Option<T>,
    error: Option<E>,
    fetched_at: Option<OffsetDateTime>,
    in_flight: Option<InFlight<T, E>>,
    // Set on creation and by invalidation, cleared when a fetch starts.
    stale: bool,
    fetch: FetchFn<T, E>,
    watchers: watch::Sender<ReadState<T, E>>,
}

impl<T: Clone, E: Clone> Entry<T, E> {
    fn new(fetch: FetchFn<T, E>) -> Self {
        let (watchers, _) = watch::channel(ReadState::empty());
        Self {
            data: None,
            error: None,
            fetched_at: None,
            in_flight: None,
            stale: true,
            fetch,
            watchers,
        }
    }

    fn state(&self) -> ReadState<T, E> {
        let is_validating = self.in_flight.is_some();
        ReadState {
            data: self.data.clone(),
            error: self.error.clone(),
            is_loading: self.data.is_none(),
            is_validating,
            fetched_at: self.fetched_at,
        }
    }

    fn publish(&self) {
        self.watchers.send_replace(self.state());
    }

    fn subscriber_count(&self) -> usize {
        self.watchers.receiver_count()
    }

    // Never served data and the last attempt failed: the next read retries.
    fn needs_retry(&self) -> bool {
        self.data.is_none() && self.error.is_some() && self.in_flight.is_none()
    }

    fn is_idle(&self) -> bool {
        self.in_flight.is_none() && self.subscriber_count() == 0
    }
}

struct StoreInner<T, E> {
    config: CacheConfig,
    entries: Mutex<LruCache<CacheKey, Entry<T, E>>>,
    generations: GenerationCounter,
    runtime: Handle,
}

/// Process-wide cache of remote reads.
///
/// Cloning is cheap and every clone addresses the same entries. Construct one
/// per session and hand clones to the consumers that need it.
pub struct CacheStore<T, E> {
    inner: Arc<StoreInner<T, E>>,
}

impl<T, E> Clone for CacheStore<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, E> CacheStore<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + fmt::Display + Send + Sync + 'static,
{
    /// Create a store whose background fetches run on `runtime`.
    pub fn new(config: CacheConfig, runtime: Handle) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                config,
                entries: Mutex::new(LruCache::unbounded()),
                generations: GenerationCounter::new(),
                runtime,
            }),
        }
    }

    /// Observe the entry for `binding`, starting a fetch if it needs one.
    ///
    /// A read while a fetch is outstanding attaches to that fetch; it never
    /// issues a second remote call.
    pub fn read(&self, binding: &Binding<T, E>) -> ReadState<T, E> {
        let mut entries = mutex_lock(&self.inner.entries, SOURCE, "read");
        self.attach(&mut entries, binding).state()
    }

    /// Read through the cache and wait until the entry settles.
    ///
    /// If the awaited fetch is superseded while waiting, the newer one is
    /// awaited too, so the returned state always reflects the latest fetch.
    pub async fn load(&self, binding: &Binding<T, E>) -> ReadState<T, E> {
        let mut pending = {
            let mut entries = mutex_lock(&self.inner.entries, SOURCE, "load");
            self.attach(&mut entries, binding)
                .in_flight
                .as_ref()
                .map(|in_flight| in_flight.pending.clone())
        };

        while let Some(fetch) = pending.take() {
            // The shared future applies its own result before resolving.
            let _ = fetch.await;
            let entries = mutex_lock(&self.inner.entries, SOURCE, "load.settle");
            pending = entries.peek(&binding.key).and_then(|entry| {
                entry
                    .in_flight
                    .as_ref()
                    .map(|in_flight| in_flight.pending.clone())
            });
        }

        self.snapshot(&binding.key).unwrap_or_else(ReadState::empty)
    }

    /// Attach an observer to the entry for `binding`.
    ///
    /// Has the same fetch side effect as [`read`](Self::read). While the
    /// returned subscription is alive, invalidating the key refetches
    /// immediately.
    pub fn subscribe(&self, binding: &Binding<T, E>) -> Subscription<T, E> {
        let mut entries = mutex_lock(&self.inner.entries, SOURCE, "subscribe");
        let entry = self.attach(&mut entries, binding);
        let receiver = entry.watchers.subscribe();
        debug!(
            cache_key = %binding.key,
            subscribers = entry.subscriber_count(),
            "Cache subscriber attached"
        );
        Subscription {
            key: binding.key.clone(),
            receiver,
        }
    }

    /// Mark `key` stale.
    ///
    /// With a subscriber attached, a fetch starts right away and supersedes
    /// any outstanding one. Otherwise nothing is fetched until the next read.
    pub fn invalidate(&self, key: &CacheKey) -> Invalidation {
        let mut entries = mutex_lock(&self.inner.entries, SOURCE, "invalidate");
        let Some(entry) = entries.peek_mut(key) else {
            debug!(cache_key = %key, "Invalidation skipped: key not cached");
            return Invalidation::NotCached;
        };

        entry.stale = true;
        if entry.subscriber_count() == 0 {
            info!(cache_key = %key, "Cache entry invalidated; refetch deferred to next read");
            return Invalidation::Deferred;
        }

        if let Some(previous) = entry.in_flight.as_ref() {
            debug!(
                cache_key = %key,
                superseded_generation = previous.generation,
                "Invalidation supersedes in-flight fetch"
            );
        }
        self.start_fetch(key, entry);
        info!(cache_key = %key, "Cache entry invalidated; refetching for subscribers");
        Invalidation::Refetching
    }

    /// Drop every entry. Fetches still in flight resolve into nothing.
    pub fn clear(&self) {
        let mut entries = mutex_lock(&self.inner.entries, SOURCE, "clear");
        let cleared = entries.len();
        entries.clear();
        info!(cleared, "Cache cleared");
    }

    /// Current state of `key` without any fetch side effect.
    pub fn snapshot(&self, key: &CacheKey) -> Option<ReadState<T, E>> {
        mutex_lock(&self.inner.entries, SOURCE, "snapshot")
            .peek(key)
            .map(Entry::state)
    }

    pub fn entry_count(&self) -> usize {
        mutex_lock(&self.inner.entries, SOURCE, "entry_count").len()
    }

    pub fn subscriber_count(&self, key: &CacheKey) -> usize {
        mutex_lock(&self.inner.entries, SOURCE, "subscriber_count")
            .peek(key)
            .map_or(0, Entry::subscriber_count)
    }

    fn attach<'a>(
        &self,
        entries: &'a mut LruCache<CacheKey, Entry<T, E>>,
        binding: &Binding<T, E>,
    ) -> &'a mut Entry<T, E> {
        if !entries.contains(&binding.key) {
            self.make_room(entries);
            debug!(cache_key = %binding.key, "Cache entry created");
        }

        let entry = entries.get_or_insert_mut(binding.key.clone(), || {
            Entry::new(Arc::clone(&binding.fetch))
        });
        entry.fetch = Arc::clone(&binding.fetch);

        if entry.stale || entry.needs_retry() {
            self.start_fetch(&binding.key, entry);
        } else if let Some(in_flight) = entry.in_flight.as_ref() {
            counter!(METRIC_FETCH_DEDUPLICATED_TOTAL).increment(1);
            debug!(
                cache_key = %binding.key,
                generation = in_flight.generation,
                "Read attached to in-flight fetch"
            );
        }
        entry
    }

    fn make_room(&self, entries: &mut LruCache<CacheKey, Entry<T, E>>) {
        let Some(max_entries) = self.inner.config.eviction.max_entries() else {
            return;
        };

        while entries.len() >= max_entries.get() {
            let victim = entries
                .iter()
                .rev()
                .find(|(_, entry)| entry.is_idle())
                .map(|(key, _)| key.clone());
            let Some(victim) = victim else {
                debug!(
                    len = entries.len(),
                    max_entries = max_entries.get(),
                    "No idle entry to evict; store grows past its ceiling"
                );
                return;
            };
            entries.pop(&victim);
            counter!(METRIC_EVICT_TOTAL).increment(1);
            debug!(cache_key = %victim, "Cache entry evicted");
        }
    }

    // Called with the entries lock held. Building the future does not poll it;
    // the spawned task and any `load` waiters poll it after the lock is gone.
    fn start_fetch(&self, key: &CacheKey, entry: &mut Entry<T, E>) {
        let generation = self.inner.generations.next();
        let store = self.clone();
        let completion_key = key.clone();
        let fetch = (entry.fetch)();

        let pending = async move {
            let started_at = Instant::now();
            let result = fetch.await;
            histogram!(METRIC_FETCH_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);
            store.complete(&completion_key, generation, &result);
            result
        }
        .boxed()
        .shared();

        entry.stale = false;
        entry.in_flight = Some(InFlight {
            generation,
            pending: pending.clone(),
        });
        entry.publish();

        counter!(METRIC_FETCH_TOTAL).increment(1);
        debug!(cache_key = %key, generation, "Fetch started");

        self.inner.runtime.spawn(async move {
            let _ = pending.await;
        });
    }

    fn complete(&self, key: &CacheKey, generation: Generation, result: &Result<T, E>) {
        let mut entries = mutex_lock(&self.inner.entries, SOURCE, "complete");
        let Some(entry) = entries.peek_mut(key) else {
            counter!(METRIC_COMPLETION_DISCARDED_TOTAL, "reason" => "entry_gone").increment(1);
            debug!(
                cache_key = %key,
                generation,
                "Fetch completion discarded: entry no longer cached"
            );
            return;
        };

        let awaited = entry.in_flight.as_ref().map(|in_flight| in_flight.generation);
        if awaited != Some(generation) {
            counter!(METRIC_COMPLETION_DISCARDED_TOTAL, "reason" => "superseded").increment(1);
            debug!(
                cache_key = %key,
                generation,
                awaited = ?awaited,
                "Fetch completion discarded: superseded"
            );
            return;
        }

        entry.in_flight = None;
        match result {
            Ok(data) => {
                entry.data = Some(data.clone());
                entry.error = None;
                entry.fetched_at = Some(OffsetDateTime::now_utc());
                debug!(cache_key = %key, generation, "Fetch applied");
            }
            Err(error) => {
                entry.error = Some(error.clone());
                warn!(
                    cache_key = %key,
                    generation,
                    error = %error,
                    kept_data = entry.data.is_some(),
                    "Fetch failed"
                );
            }
        }
        entry.publish();
    }
}

/// An attached observer of one cache entry.
///
/// Dropping it (or calling [`unsubscribe`](Self::unsubscribe)) detaches.
pub struct Subscription<T, E> {
    key: CacheKey,
    receiver: watch::Receiver<ReadState<T, E>>,
}

impl<T: Clone, E: Clone> Subscription<T, E> {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Latest published state.
    pub fn current(&self) -> ReadState<T, E> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next state change. Returns `None` once the entry is gone.
    pub async fn changed(&mut self) -> Option<ReadState<T, E>> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }

    /// Wait until no fetch is outstanding. Returns `None` once the entry is gone.
    pub async fn settled(&mut self) -> Option<ReadState<T, E>> {
        loop {
            let state = self.receiver.borrow_and_update().clone();
            if !state.is_validating {
                return Some(state);
            }
            self.receiver.changed().await.ok()?;
        }
    }

    pub fn unsubscribe(self) {}
}
