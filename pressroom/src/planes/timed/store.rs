use crate::planes::key::CacheKey;
use crate::planes::timed::policy::CachePolicy;
use moka::Expiry;
use moka::future::Cache;
use std::any::Any;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// A computed value together with when and under which policy it was made.
#[derive(Clone)]
pub(crate) struct TimedEntry {
    pub value: Arc<dyn Any + Send + Sync>,
    pub produced_at: Instant,
    pub policy: CachePolicy,
    pub negative: bool,
}

impl TimedEntry {
    pub fn new<T>(value: T, policy: CachePolicy, negative: bool) -> Self
    where
        T: Send + Sync + 'static,
    {
        Self {
            value: Arc::new(value),
            produced_at: Instant::now(),
            policy,
            negative,
        }
    }

    pub fn age(&self) -> Duration {
        self.produced_at.elapsed()
    }
}

/// Lets moka reclaim entries past their hard expiry without waiting for a
/// read to notice.
struct PolicyExpiry;

impl Expiry<CacheKey, TimedEntry> for PolicyExpiry {
    fn expire_after_create(
        &self,
        _key: &CacheKey,
        value: &TimedEntry,
        _created_at: std::time::Instant,
    ) -> Option<Duration> {
        value.policy.expires_after()
    }

    fn expire_after_update(
        &self,
        _key: &CacheKey,
        value: &TimedEntry,
        _updated_at: std::time::Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value.policy.expires_after()
    }
}

/// Moka-based entry storage for the timed cache.
/// Lock-free and concurrent, optionally bounded, with per-entry expiry.
pub(crate) struct EntryStore {
    cache: Cache<CacheKey, TimedEntry>,
}

impl EntryStore {
    pub fn new(name: &str, max_entries: Option<u64>) -> Self {
        let mut builder = Cache::builder().name(name).expire_after(PolicyExpiry);

        if let Some(capacity) = max_entries {
            builder = builder.max_capacity(capacity);
        }

        Self {
            cache: builder.build(),
        }
    }

    pub async fn get(&self, key: &CacheKey) -> Option<TimedEntry> {
        self.cache.get(key).await
    }

    pub async fn put(&self, key: CacheKey, entry: TimedEntry) {
        self.cache.insert(key, entry).await;
    }

    pub async fn remove(&self, key: &CacheKey) -> bool {
        self.cache.remove(key).await.is_some()
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    /// Exact count, after applying pending inserts and evictions.
    pub async fn entry_count(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }
}

impl Debug for EntryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryStore")
            .field("entry_count", &self.cache.entry_count())
            .field("weighted_size", &self.cache.weighted_size())
            .finish()
    }
}
