//! Routing errors.

use thiserror::Error;
use worker_cache::CacheError;
use worker_core::WorkerError;

/// Errors raised while dispatching one event.
///
/// Every variant ends the same way: the router answers the event with the
/// fixed failure response.
#[derive(Error, Debug)]
pub enum RouteError {
    /// A handler tried to set a cookie other than the bridged one.
    #[error("Setting cookie '{actual}' is not supported; only '{expected}' is bridged")]
    CookieName { expected: String, actual: String },

    /// A header name or value is not valid HTTP.
    #[error("Invalid header '{0}'")]
    InvalidHeader(String),

    /// The network fallback failed.
    #[error(transparent)]
    Network(#[from] WorkerError),

    /// The cache failed while a handler was using it.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// A handler reported a failure.
    #[error("Handler failed: {0}")]
    Handler(String),

    /// A handler panicked.
    #[error("Handler panicked: {0}")]
    Panicked(String),
}

impl RouteError {
    /// Wrap any displayable handler failure.
    pub fn handler(err: impl std::fmt::Display) -> Self {
        Self::Handler(err.to_string())
    }
}
