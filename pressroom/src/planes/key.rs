//! Cache key derivation shared by both caching planes.
//!
//! A key is the identity of the wrapped function plus the canonical JSON
//! encoding of its arguments. Object members are emitted in sorted order, so
//! structurally equal arguments always produce the same key.

use serde::Serialize;
use serde_json::Value;
use shared::{Error, Result};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_FN_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one wrapped function.
///
/// Every call to [`FnId::new`] yields a distinct id, so two wrappers never
/// share keys even when they carry the same display name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FnId {
    id: u64,
    name: &'static str,
}

impl FnId {
    pub fn new(name: &'static str) -> Self {
        Self {
            id: NEXT_FN_ID.fetch_add(1, Ordering::Relaxed),
            name,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    function: FnId,
    args: String,
}

impl CacheKey {
    /// Derive the key for calling `function` with `args`.
    ///
    /// Fails with [`Error::Validation`] when the arguments have no JSON
    /// representation (for example a map keyed by tuples).
    pub fn derive<A>(function: FnId, args: &A) -> Result<Self>
    where
        A: Serialize + ?Sized,
    {
        let value = serde_json::to_value(args).map_err(|e| {
            Error::validation(format!(
                "arguments to `{}` cannot be used as a cache key: {e}",
                function.name
            ))
        })?;
        let mut encoded = String::new();
        write_canonical(&value, &mut encoded);
        Ok(Self {
            function,
            args: encoded,
        })
    }

    pub fn function(&self) -> FnId {
        self.function
    }

    pub fn args(&self) -> &str {
        &self.args
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}({})", self.function.name, self.function.id, self.args)
    }
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut members: Vec<_> = map.iter().collect();
            members.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (name, member)) in members.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(name.clone()).to_string());
                out.push(':');
                write_canonical(member, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
