use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Lifecycle events published by the timed cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CacheEvent {
    Hit(EntryEvent),
    StaleServed(EntryEvent),
    Miss(EntryEvent),
    Stored(StoredEvent),
    Revalidated(EntryEvent),
    RevalidationFailed(FailureEvent),
    Evicted(EntryEvent),
}

impl CacheEvent {
    pub fn function(&self) -> &str {
        match self {
            CacheEvent::Hit(e)
            | CacheEvent::StaleServed(e)
            | CacheEvent::Miss(e)
            | CacheEvent::Revalidated(e)
            | CacheEvent::Evicted(e) => &e.function,
            CacheEvent::Stored(e) => &e.function,
            CacheEvent::RevalidationFailed(e) => &e.function,
        }
    }

    pub fn key(&self) -> &str {
        match self {
            CacheEvent::Hit(e)
            | CacheEvent::StaleServed(e)
            | CacheEvent::Miss(e)
            | CacheEvent::Revalidated(e)
            | CacheEvent::Evicted(e) => &e.key,
            CacheEvent::Stored(e) => &e.key,
            CacheEvent::RevalidationFailed(e) => &e.key,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            CacheEvent::Hit(_) => "hit",
            CacheEvent::StaleServed(_) => "stale_served",
            CacheEvent::Miss(_) => "miss",
            CacheEvent::Stored(_) => "stored",
            CacheEvent::Revalidated(_) => "revalidated",
            CacheEvent::RevalidationFailed(_) => "revalidation_failed",
            CacheEvent::Evicted(_) => "evicted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryEvent {
    pub function: String,
    pub key: String,
    pub timestamp: u64,
}

impl EntryEvent {
    pub fn new(function: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            key: key.into(),
            timestamp: now_timestamp(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub function: String,
    pub key: String,
    /// `None` when the entry never expires.
    pub expire_ms: Option<u64>,
    pub negative: bool,
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureEvent {
    pub function: String,
    pub key: String,
    pub error: String,
    pub evicted: bool,
    pub timestamp: u64,
}

/// Current wall-clock time in seconds since UNIX epoch
pub fn now_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_accessors() {
        let event = CacheEvent::RevalidationFailed(FailureEvent {
            function: "related_articles".into(),
            key: "related_articles#3([\"article-1\",4])".into(),
            error: "store failure: boom".into(),
            evicted: true,
            timestamp: 0,
        });
        assert_eq!(event.function(), "related_articles");
        assert_eq!(event.kind(), "revalidation_failed");
        assert!(event.key().starts_with("related_articles#3"));
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = CacheEvent::Hit(EntryEvent {
            function: "article".into(),
            key: "k".into(),
            timestamp: 1,
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "hit");
        assert_eq!(json["function"], "article");
    }
}
