use crate::planes::key::{CacheKey, FnId};
use crate::planes::request::scope::RequestScope;
use dashmap::mapref::entry::Entry;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use shared::{Error, Result};
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

/// A fetch registered in a scope's memo table.
type MemoFetch<T> = Shared<BoxFuture<'static, Result<T>>>;

type Producer<A, T> = Arc<dyn Fn(A) -> BoxFuture<'static, Result<T>> + Send + Sync>;

/// Wrap `f` so that, within one [`RequestScope`], it runs at most once per
/// distinct argument value.
///
/// Arguments are compared structurally through their JSON form, so `A`
/// must be `Serialize`; values with no JSON form are rejected with
/// [`Error::Validation`] before `f` is invoked.
pub fn memoize<A, T, F, Fut>(name: &'static str, f: F) -> Memoized<A, T>
where
    A: Serialize + Send + 'static,
    T: Clone + Send + Sync + 'static,
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    Memoized {
        id: FnId::new(name),
        producer: Arc::new(move |args| f(args).boxed()),
        _args: PhantomData,
    }
}

pub struct Memoized<A, T> {
    id: FnId,
    producer: Producer<A, T>,
    _args: PhantomData<fn(A)>,
}

impl<A, T> Clone for Memoized<A, T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            producer: self.producer.clone(),
            _args: PhantomData,
        }
    }
}

impl<A, T> Memoized<A, T>
where
    A: Serialize + Send + 'static,
    T: Clone + Send + Sync + 'static,
{
    pub fn id(&self) -> FnId {
        self.id
    }

    /// Call through the memo table of `scope`.
    ///
    /// The first caller for a key spawns the fetch; every later caller for
    /// the same key, whether it arrives before or after completion, awaits
    /// that same fetch and sees the same value or the same error.
    pub async fn call(&self, scope: &RequestScope, args: A) -> Result<T> {
        let key = CacheKey::derive(self.id, &args)?;
        let fetch = self.register(scope, key, args)?;
        fetch.await
    }

    // No await here: the entry must exist before any caller yields.
    fn register(&self, scope: &RequestScope, key: CacheKey, args: A) -> Result<MemoFetch<T>> {
        match scope.entries().entry(key) {
            Entry::Occupied(existing) => {
                debug!(scope = %scope.id(), key = %existing.key(), "memo hit");
                existing
                    .get()
                    .downcast_ref::<MemoFetch<T>>()
                    .cloned()
                    .ok_or_else(|| {
                        Error::Internal(format!(
                            "memo entry {} holds a different result type",
                            existing.key()
                        ))
                    })
            }
            Entry::Vacant(slot) => {
                debug!(scope = %scope.id(), key = %slot.key(), "memo miss, spawning fetch");
                let label = slot.key().to_string();
                let task = tokio::spawn((self.producer)(args));
                let fetch: MemoFetch<T> = async move {
                    match task.await {
                        Ok(result) => result,
                        Err(e) => Err(Error::Internal(format!("fetch for {label} did not complete: {e}"))),
                    }
                }
                .boxed()
                .shared();
                slot.insert(Box::new(fetch.clone()));
                Ok(fetch)
            }
        }
    }
}
