use pressroom::{ArticleFetchers, TimedCache, TimedCacheSettings};
use shared::config::Config;
use std::collections::BTreeMap;
use std::sync::Arc;
use storage_engine::MockDatabase;

/// Everything a page render needs, shared across requests.
#[derive(Clone)]
pub struct SiteState {
    pub store: Arc<MockDatabase>,
    pub timed_cache: TimedCache,
    pub fetchers: Arc<ArticleFetchers>,
}

impl SiteState {
    /// Must be called from within a tokio runtime.
    pub fn new(config: &Config) -> Self {
        let store = Arc::new(MockDatabase::from_config(config));
        Self::with_store(store, TimedCacheSettings::from_config(config))
    }

    pub fn with_store(store: Arc<MockDatabase>, settings: TimedCacheSettings) -> Self {
        let timed_cache = TimedCache::new(TimedCacheSettings {
            name: "pressroom".to_string(),
            ..settings
        });
        let fetchers = Arc::new(ArticleFetchers::new(store.clone(), timed_cache.clone()));

        Self {
            store,
            timed_cache,
            fetchers,
        }
    }

    /// Store calls since the log was last cleared, counted per method.
    pub fn store_calls(&self) -> BTreeMap<String, usize> {
        let mut calls = BTreeMap::new();
        for entry in self.store.request_log() {
            *calls.entry(entry.method).or_default() += 1;
        }
        calls
    }

    pub async fn shutdown(&self) {
        self.timed_cache.shutdown().await;
    }
}
