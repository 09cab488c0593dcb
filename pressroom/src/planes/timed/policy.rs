use shared::{Error, Result};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Lifetime of a timed cache entry.
///
/// An entry is served directly while younger than `fresh`, served while a
/// background revalidation runs until `stale`, recomputed synchronously
/// after that, and discarded once older than `expire`. `Duration::MAX`
/// stands for "never".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CachePolicy {
    fresh: Duration,
    stale: Duration,
    expire: Duration,
}

/// Where an entry of a given age sits within its policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tier {
    Fresh,
    Stale,
    /// Past the stale window but not yet expired: no longer servable.
    Aged,
    Expired,
}

impl CachePolicy {
    pub const NEVER: Duration = Duration::MAX;

    /// Never expires within the lifetime of the process.
    pub const PERMANENT: Self = Self {
        fresh: Self::NEVER,
        stale: Self::NEVER,
        expire: Self::NEVER,
    };

    pub fn new(fresh: Duration, stale: Duration, expire: Duration) -> Result<Self> {
        if fresh > stale || stale > expire {
            return Err(Error::validation(format!(
                "cache policy must satisfy fresh <= stale <= expire, got {fresh:?} / {stale:?} / {expire:?}"
            )));
        }
        Ok(Self {
            fresh,
            stale,
            expire,
        })
    }

    pub fn from_secs(fresh: u64, stale: u64, expire: u64) -> Result<Self> {
        Self::new(
            Duration::from_secs(fresh),
            Duration::from_secs(stale),
            Duration::from_secs(expire),
        )
    }

    /// Compile-time constructor for policy constants.
    ///
    /// # Panics
    ///
    /// If the windows are out of order.
    pub const fn tiered(fresh: Duration, stale: Duration, expire: Duration) -> Self {
        assert!(
            fresh.as_nanos() <= stale.as_nanos() && stale.as_nanos() <= expire.as_nanos(),
            "cache policy windows out of order"
        );
        Self {
            fresh,
            stale,
            expire,
        }
    }

    /// Fresh for `every`, then served stale and revalidated in the
    /// background indefinitely.
    pub const fn revalidate(every: Duration) -> Self {
        Self {
            fresh: every,
            stale: Self::NEVER,
            expire: Self::NEVER,
        }
    }

    pub fn fresh(&self) -> Duration {
        self.fresh
    }

    pub fn stale(&self) -> Duration {
        self.stale
    }

    pub fn expire(&self) -> Duration {
        self.expire
    }

    /// Hard expiry, `None` when the entry never expires.
    pub fn expires_after(&self) -> Option<Duration> {
        (self.expire != Self::NEVER).then_some(self.expire)
    }

    pub fn is_permanent(&self) -> bool {
        *self == Self::PERMANENT
    }

    pub fn tier(&self, age: Duration) -> Tier {
        if age < self.fresh {
            Tier::Fresh
        } else if age < self.stale {
            Tier::Stale
        } else if age < self.expire {
            Tier::Aged
        } else {
            Tier::Expired
        }
    }
}

impl fmt::Display for CachePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn window(d: Duration) -> String {
            if d == CachePolicy::NEVER {
                "never".to_string()
            } else {
                format!("{}s", d.as_secs())
            }
        }
        write!(
            f,
            "fresh {}, stale {}, expire {}",
            window(self.fresh),
            window(self.stale),
            window(self.expire)
        )
    }
}

/// Handle passed to a timed-cache producer so it can pick the lifetime of
/// the entry it is computing. Leaving it unset makes the entry permanent.
#[derive(Clone, Debug, Default)]
pub struct CacheLife {
    policy: Arc<Mutex<Option<CachePolicy>>>,
}

impl CacheLife {
    pub fn set(&self, policy: CachePolicy) {
        let mut slot = self.policy.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = Some(policy);
    }

    pub(crate) fn take(&self) -> Option<CachePolicy> {
        self.policy
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }
}

/// Marks "not found" results (`None`, empty collections).
///
/// The timed cache can give these a separate, usually shorter, policy.
pub trait NegativeResult {
    fn is_negative(&self) -> bool;
}

impl<T> NegativeResult for Option<T> {
    fn is_negative(&self) -> bool {
        self.is_none()
    }
}

impl<T> NegativeResult for Vec<T> {
    fn is_negative(&self) -> bool {
        self.is_empty()
    }
}
