pub mod cache;
pub mod policy;
mod revalidation;
mod store;

pub use cache::{CacheStats, TimedCache, TimedCacheSettings, TimedFn};
pub use policy::{CacheLife, CachePolicy, NegativeResult, Tier};
