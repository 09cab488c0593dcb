// shared/src/lib.rs

/// Errors surfaced by the store and the caching layers.
///
/// One failed fetch is handed, cloned, to every caller that coalesced on it.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("store failure: {0}")]
    Store(String),
    #[error("validation failure: {0}")]
    Validation(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl Error {
    pub fn store(message: impl Into<String>) -> Self {
        Error::Store(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

pub mod config;
