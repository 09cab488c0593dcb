use crate::planes::key::CacheKey;
use dashmap::DashMap;
use std::any::Any;
use std::fmt;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

pub(crate) type MemoTable = DashMap<CacheKey, Box<dyn Any + Send + Sync>>;

/// The lifetime of one logical request, e.g. one page render.
///
/// Create one at the start of handling, pass it by reference to every
/// request-scoped fetch, and drop it (or call [`RequestScope::finish`]) once
/// the response is produced. Memoized results never outlive the scope and
/// are never visible to another scope.
pub struct RequestScope {
    id: Uuid,
    label: String,
    started_at: Instant,
    entries: MemoTable,
}

impl RequestScope {
    pub fn new(label: impl Into<String>) -> Self {
        let scope = Self {
            id: Uuid::new_v4(),
            label: label.into(),
            started_at: Instant::now(),
            entries: DashMap::new(),
        };
        debug!(scope = %scope.id, label = %scope.label, "request scope opened");
        scope
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Number of distinct memoized calls made in this scope so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn entries(&self) -> &MemoTable {
        &self.entries
    }

    /// Tear the scope down, discarding every memoized result.
    pub fn finish(self) {
        debug!(
            scope = %self.id,
            label = %self.label,
            memoized = self.entries.len(),
            elapsed_ms = self.started_at.elapsed().as_millis() as u64,
            "request scope finished"
        );
    }
}

impl fmt::Debug for RequestScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestScope")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("entries", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scopes_are_distinct_and_start_empty() {
        let a = RequestScope::new("GET /articles");
        let b = RequestScope::new("GET /articles");
        assert_ne!(a.id(), b.id());
        assert!(a.is_empty());
        assert_eq!(a.label(), "GET /articles");
        a.finish();
        b.finish();
    }
}
