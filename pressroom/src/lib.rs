//! Request deduplication and time-based caching in front of an article store.

pub mod domain;
pub mod events;
pub mod facade;
pub mod planes;
pub mod ports;

pub use facade::{ArticleFetchers, Binding, Fetcher, binding_table};
pub use planes::request::{Memoized, RequestScope, memoize};
pub use planes::timed::{CacheLife, CachePolicy, TimedCache, TimedCacheSettings, TimedFn};
pub use ports::ArticleStore;
