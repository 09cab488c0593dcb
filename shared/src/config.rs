use std::time::Duration;
use tracing::warn;

/// What the timed cache does with a stale entry whose background
/// revalidation failed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OnRevalidationFailure {
    /// Keep serving the stale value until it ages out.
    #[default]
    KeepStale,
    /// Drop the entry so the next read is a hard miss.
    Evict,
}

impl OnRevalidationFailure {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "keep-stale" | "keep_stale" | "keep" => Some(Self::KeepStale),
            "evict" => Some(Self::Evict),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KeepStale => "keep-stale",
            Self::Evict => "evict",
        }
    }
}

pub struct Config {
    pub article_count: usize,
    pub seed: u64,
    pub cache_max_entries: Option<u64>,
    pub on_revalidation_failure: OnRevalidationFailure,
    pub negative_ttl: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            article_count: Self::DEFAULT_ARTICLE_COUNT,
            seed: Self::DEFAULT_SEED,
            cache_max_entries: None,
            on_revalidation_failure: OnRevalidationFailure::default(),
            negative_ttl: None,
        }
    }
}

impl Config {
    const DEFAULT_ARTICLE_COUNT: usize = 50;
    const DEFAULT_SEED: u64 = 42;

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let article_count = parse_or(&lookup, "PRESSROOM_ARTICLE_COUNT", Self::DEFAULT_ARTICLE_COUNT);
        let seed = parse_or(&lookup, "PRESSROOM_SEED", Self::DEFAULT_SEED);
        let cache_max_entries = lookup("PRESSROOM_CACHE_MAX_ENTRIES").and_then(|raw| {
            raw.trim()
                .parse::<u64>()
                .map_err(|_| warn!("PRESSROOM_CACHE_MAX_ENTRIES={raw:?} is not a number, cache stays unbounded"))
                .ok()
        });
        let on_revalidation_failure = match lookup("PRESSROOM_REVALIDATION_FAILURE") {
            Some(raw) => OnRevalidationFailure::parse(&raw).unwrap_or_else(|| {
                warn!("PRESSROOM_REVALIDATION_FAILURE={raw:?} not recognised, using 'keep-stale'");
                OnRevalidationFailure::KeepStale
            }),
            None => OnRevalidationFailure::default(),
        };
        let negative_ttl = lookup("PRESSROOM_NEGATIVE_TTL_SECS").and_then(|raw| {
            raw.trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| warn!("PRESSROOM_NEGATIVE_TTL_SECS={raw:?} is not a number, ignoring"))
                .ok()
        });

        Self {
            article_count,
            seed,
            cache_max_entries,
            on_revalidation_failure,
            negative_ttl,
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr + std::fmt::Display + Copy,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse::<T>().unwrap_or_else(|_| {
            warn!("{key}={raw:?} could not be parsed, using default {default}");
            default
        }),
        None => default,
    }
}
