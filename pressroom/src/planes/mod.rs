//! The two caching planes the fetch facade binds to.
//!
//! `request` deduplicates fetches within one request scope; `timed` keeps
//! results across requests under a fresh/stale/expire policy.

pub mod key;
pub mod request;
pub mod timed;

pub use key::{CacheKey, FnId};
