//! Cache errors.

use worker_core::{Method, StatusCode, WorkerError};

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache operation errors.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Backend storage error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Only GET requests can be stored.
    #[error("{0} requests cannot be cached")]
    NotCacheable(Method),

    /// A pre-warm fetch answered with a non-success status.
    #[error("fetching {url} returned {status}")]
    BadStatus { url: String, status: StatusCode },

    /// A pre-warm fetch failed outright.
    #[error(transparent)]
    Fetch(#[from] WorkerError),
}
