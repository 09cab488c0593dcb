use crate::events::{CacheEvent, EntryEvent, FailureEvent, StoredEvent, now_timestamp};
use crate::planes::key::{CacheKey, FnId};
use crate::planes::timed::policy::{CacheLife, CachePolicy, NegativeResult, Tier};
use crate::planes::timed::revalidation::{RevalidationJob, RevalidationQueue};
use crate::planes::timed::store::{EntryStore, TimedEntry};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use shared::config::{Config, OnRevalidationFailure};
use shared::{Error, Result};
use std::any::Any;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

const EVENT_CHANNEL_CAPACITY: usize = 1024;

#[derive(Clone, Debug)]
pub struct TimedCacheSettings {
    pub name: String,
    /// Upper bound on stored entries, unbounded when `None`.
    pub max_entries: Option<u64>,
    pub on_revalidation_failure: OnRevalidationFailure,
    /// Policy applied to `None` / empty results instead of the one the
    /// producer asked for.
    pub negative_policy: Option<CachePolicy>,
}

impl Default for TimedCacheSettings {
    fn default() -> Self {
        Self {
            name: "timed".to_string(),
            max_entries: None,
            on_revalidation_failure: OnRevalidationFailure::default(),
            negative_policy: None,
        }
    }
}

impl TimedCacheSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_entries: config.cache_max_entries,
            on_revalidation_failure: config.on_revalidation_failure,
            negative_policy: config
                .negative_ttl
                .map(|ttl| CachePolicy::tiered(ttl, ttl, ttl)),
            ..Self::default()
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub stale_hits: u64,
    pub misses: u64,
    pub revalidations: u64,
    pub revalidation_failures: u64,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    stale_hits: AtomicU64,
    misses: AtomicU64,
    revalidations: AtomicU64,
    revalidation_failures: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            stale_hits: self.stale_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            revalidations: self.revalidations.load(Ordering::Relaxed),
            revalidation_failures: self.revalidation_failures.load(Ordering::Relaxed),
        }
    }
}

struct Inner {
    store: EntryStore,
    settings: TimedCacheSettings,
    queue: RevalidationQueue,
    events: broadcast::Sender<CacheEvent>,
    /// Misses currently being computed, as `InFlight<T>`.
    in_flight: DashMap<CacheKey, Box<dyn Any + Send + Sync>>,
    /// Keys with a background revalidation in flight.
    revalidating: DashMap<CacheKey, ()>,
    counters: Counters,
}

impl Inner {
    fn publish(&self, event: CacheEvent) {
        let kind = event.kind();
        match self.events.send(event) {
            Ok(subscribers) => trace!(kind, subscribers, "cache event published"),
            Err(_) => trace!(kind, "no subscribers for cache event"),
        }
    }
}

/// Process-wide cache with fresh, stale-while-revalidate and hard-expiry
/// tiers.
///
/// Cloning is cheap and every clone shares the same entries. Construct it
/// inside a tokio runtime: it starts the background revalidation worker.
#[derive(Clone)]
pub struct TimedCache {
    inner: Arc<Inner>,
}

impl TimedCache {
    pub fn new(settings: TimedCacheSettings) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        debug!(
            cache = %settings.name,
            max_entries = ?settings.max_entries,
            on_revalidation_failure = settings.on_revalidation_failure.as_str(),
            negative_policy = ?settings.negative_policy.map(|p| p.to_string()),
            "timed cache created"
        );
        Self {
            inner: Arc::new(Inner {
                store: EntryStore::new(&settings.name, settings.max_entries),
                queue: RevalidationQueue::start(&settings.name),
                settings,
                events,
                in_flight: DashMap::new(),
                revalidating: DashMap::new(),
                counters: Counters::default(),
            }),
        }
    }

    /// Wrap `f` so its results are kept across requests.
    ///
    /// `f` receives a [`CacheLife`] for choosing the policy of the value it
    /// is about to return; a value produced without calling
    /// [`CacheLife::set`] is kept permanently.
    pub fn wrap<A, T, F, Fut>(&self, name: &'static str, f: F) -> TimedFn<A, T>
    where
        A: Serialize + Send + Sync + 'static,
        T: NegativeResult + Clone + Send + Sync + 'static,
        F: Fn(CacheLife, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        TimedFn {
            id: FnId::new(name),
            cache: self.clone(),
            producer: Arc::new(move |life, args| f(life, args).boxed()),
            _args: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.settings.name
    }

    pub fn settings(&self) -> &TimedCacheSettings {
        &self.inner.settings
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.inner.events.subscribe()
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.counters.snapshot()
    }

    pub async fn invalidate(&self, key: &CacheKey) -> bool {
        let removed = self.inner.store.remove(key).await;
        if removed {
            self.inner.publish(CacheEvent::Evicted(EntryEvent::new(
                key.function().name(),
                key.to_string(),
            )));
        }
        removed
    }

    pub fn invalidate_all(&self) {
        debug!(cache = %self.inner.settings.name, "invalidating all entries");
        self.inner.store.invalidate_all();
    }

    pub async fn entry_count(&self) -> u64 {
        self.inner.store.entry_count().await
    }

    /// Stop accepting background revalidations and wait for the ones in
    /// flight. Stale entries are still served afterwards, just never
    /// refreshed in the background.
    pub async fn shutdown(&self) {
        self.inner.queue.shutdown().await;
    }
}

impl std::fmt::Debug for TimedCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimedCache")
            .field("name", &self.inner.settings.name)
            .field("store", &self.inner.store)
            .field("stats", &self.stats())
            .finish()
    }
}

/// A miss being computed, shared by every caller that arrives meanwhile.
type InFlight<T> = Shared<BoxFuture<'static, Result<T>>>;

type Producer<A, T> = Arc<dyn Fn(CacheLife, A) -> BoxFuture<'static, Result<T>> + Send + Sync>;

/// A function bound to a [`TimedCache`].
pub struct TimedFn<A, T> {
    id: FnId,
    cache: TimedCache,
    producer: Producer<A, T>,
    _args: PhantomData<fn(A)>,
}

impl<A, T> Clone for TimedFn<A, T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            cache: self.cache.clone(),
            producer: self.producer.clone(),
            _args: PhantomData,
        }
    }
}

impl<A, T> TimedFn<A, T>
where
    A: Serialize + Send + Sync + 'static,
    T: NegativeResult + Clone + Send + Sync + 'static,
{
    pub fn id(&self) -> FnId {
        self.id
    }

    pub fn key(&self, args: &A) -> Result<CacheKey> {
        CacheKey::derive(self.id, args)
    }

    pub async fn invalidate(&self, args: &A) -> Result<bool> {
        let key = self.key(args)?;
        Ok(self.cache.invalidate(&key).await)
    }

    pub async fn call(&self, args: A) -> Result<T> {
        let key = self.key(&args)?;
        let inner = &self.cache.inner;
        let function = self.id.name();

        if let Some(entry) = inner.store.get(&key).await {
            let age = entry.age();
            match entry.policy.tier(age) {
                Tier::Fresh => {
                    Counters::bump(&inner.counters.hits);
                    debug!(%key, age_ms = age.as_millis() as u64, negative = entry.negative, "timed cache hit");
                    inner.publish(CacheEvent::Hit(EntryEvent::new(function, key.to_string())));
                    return downcast(&key, &entry);
                }
                Tier::Stale => {
                    Counters::bump(&inner.counters.stale_hits);
                    debug!(%key, age_ms = age.as_millis() as u64, negative = entry.negative, "serving stale entry");
                    let value = downcast(&key, &entry)?;
                    inner.publish(CacheEvent::StaleServed(EntryEvent::new(
                        function,
                        key.to_string(),
                    )));
                    self.schedule_revalidation(key, args);
                    return Ok(value);
                }
                Tier::Aged => {
                    debug!(%key, age_ms = age.as_millis() as u64, "entry past stale window, recomputing");
                }
                Tier::Expired => {
                    debug!(%key, age_ms = age.as_millis() as u64, "entry expired, evicting");
                    inner.store.remove(&key).await;
                    inner.publish(CacheEvent::Evicted(EntryEvent::new(function, key.to_string())));
                }
            }
        }

        Counters::bump(&inner.counters.misses);
        inner.publish(CacheEvent::Miss(EntryEvent::new(function, key.to_string())));

        self.join_or_start(key, args)?.await
    }

    /// Concurrent misses for one key share a single computation.
    // Synchronous so the in-flight entry exists before any caller yields.
    fn join_or_start(&self, key: CacheKey, args: A) -> Result<InFlight<T>> {
        let inner = &self.cache.inner;

        match inner.in_flight.entry(key) {
            Entry::Occupied(existing) => {
                debug!(key = %existing.key(), "joining in-flight computation");
                existing
                    .get()
                    .downcast_ref::<InFlight<T>>()
                    .cloned()
                    .ok_or_else(|| {
                        Error::Internal(format!(
                            "in-flight entry {} holds a different value type",
                            existing.key()
                        ))
                    })
            }
            Entry::Vacant(slot) => {
                let key = slot.key().clone();
                let label = key.to_string();
                let task_inner = inner.clone();
                let producer = self.producer.clone();
                let claim = Claim::new(inner.clone(), key.clone(), ClaimKind::InFlight);
                let task = tokio::spawn(async move {
                    let _claim = claim;
                    produce(task_inner, producer, key, args).await
                });
                let fetch: InFlight<T> = async move {
                    match task.await {
                        Ok(result) => result,
                        Err(e) => Err(Error::Internal(format!(
                            "fetch for {label} did not complete: {e}"
                        ))),
                    }
                }
                .boxed()
                .shared();
                slot.insert(Box::new(fetch.clone()));
                Ok(fetch)
            }
        }
    }

    fn schedule_revalidation(&self, key: CacheKey, args: A) {
        let inner = &self.cache.inner;

        match inner.revalidating.entry(key.clone()) {
            Entry::Occupied(_) => {
                debug!(%key, "revalidation already in flight");
                return;
            }
            Entry::Vacant(slot) => {
                slot.insert(());
            }
        }

        let claim = Claim::new(inner.clone(), key.clone(), ClaimKind::Revalidating);
        let job_inner = inner.clone();
        let producer = self.producer.clone();
        let job_key = key.clone();
        let work = async move {
            let _claim = claim;
            let function = job_key.function().name();
            let outcome = produce(job_inner.clone(), producer, job_key.clone(), args).await;

            let result = match outcome {
                Ok(_) => {
                    Counters::bump(&job_inner.counters.revalidations);
                    job_inner.publish(CacheEvent::Revalidated(EntryEvent::new(
                        function,
                        job_key.to_string(),
                    )));
                    Ok(())
                }
                Err(e) => {
                    Counters::bump(&job_inner.counters.revalidation_failures);
                    let evicted = match job_inner.settings.on_revalidation_failure {
                        OnRevalidationFailure::Evict => job_inner.store.remove(&job_key).await,
                        OnRevalidationFailure::KeepStale => false,
                    };
                    job_inner.publish(CacheEvent::RevalidationFailed(FailureEvent {
                        function: function.to_string(),
                        key: job_key.to_string(),
                        error: e.to_string(),
                        evicted,
                        timestamp: now_timestamp(),
                    }));
                    Err(e)
                }
            };

            result
        }
        .boxed();

        let submitted = inner.queue.submit(RevalidationJob {
            label: key.to_string(),
            work,
        });
        if !submitted {
            warn!(%key, "revalidation queue is shut down, entry stays stale");
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum ClaimKind {
    InFlight,
    Revalidating,
}

/// A key held in one of the bookkeeping maps, released on drop so that a
/// panicking or dropped producer never leaves the key claimed.
struct Claim {
    inner: Arc<Inner>,
    key: CacheKey,
    kind: ClaimKind,
}

impl Claim {
    fn new(inner: Arc<Inner>, key: CacheKey, kind: ClaimKind) -> Self {
        Self { inner, key, kind }
    }
}

impl Drop for Claim {
    fn drop(&mut self) {
        match self.kind {
            ClaimKind::InFlight => {
                self.inner.in_flight.remove(&self.key);
            }
            ClaimKind::Revalidating => {
                self.inner.revalidating.remove(&self.key);
            }
        }
        trace!(key = %self.key, kind = ?self.kind, "claim released");
    }
}

/// Compute a value and store it under the policy the producer picked.
async fn produce<A, T>(
    inner: Arc<Inner>,
    producer: Producer<A, T>,
    key: CacheKey,
    args: A,
) -> Result<T>
where
    T: NegativeResult + Clone + Send + Sync + 'static,
{
    let life = CacheLife::default();
    let value = producer(life.clone(), args).await?;

    let requested = life.take().unwrap_or(CachePolicy::PERMANENT);
    let negative = value.is_negative();
    let policy = match inner.settings.negative_policy {
        Some(negative_policy) if negative => negative_policy,
        _ => requested,
    };

    debug!(%key, %policy, negative, "storing timed entry");
    inner
        .store
        .put(key.clone(), TimedEntry::new(value.clone(), policy, negative))
        .await;
    inner.publish(CacheEvent::Stored(StoredEvent {
        function: key.function().name().to_string(),
        key: key.to_string(),
        expire_ms: policy.expires_after().map(|d| d.as_millis() as u64),
        negative,
        timestamp: now_timestamp(),
    }));

    Ok(value)
}

fn downcast<T>(key: &CacheKey, entry: &TimedEntry) -> Result<T>
where
    T: Clone + 'static,
{
    entry
        .value
        .downcast_ref::<T>()
        .cloned()
        .ok_or_else(|| Error::Internal(format!("timed entry {key} holds a different value type")))
}
