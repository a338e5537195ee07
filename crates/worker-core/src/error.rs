//! Error types shared by the host abstractions.

use thiserror::Error;

/// Errors raised by host primitives and core value types.
#[derive(Error, Debug)]
pub enum WorkerError {
    /// A URL could not be parsed or is not absolute.
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// A header name or value is not valid HTTP.
    #[error("Invalid header '{0}'")]
    InvalidHeader(String),

    /// The network could not produce a response.
    #[error("Network error for {url}: {reason}")]
    Network { url: String, reason: String },

    /// A message could not be delivered to a page.
    #[error("Client {0} is no longer reachable")]
    ClientGone(String),

    /// The event was dropped without a response.
    #[error("Event dropped before a response was sent")]
    Unanswered,

    /// Any other failure reported by the host.
    #[error("Host error: {0}")]
    Host(String),

    /// Configuration could not be read or parsed.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl WorkerError {
    /// Build a network error for a URL.
    pub fn network(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Network {
            url: url.into(),
            reason: reason.into(),
        }
    }
}

impl From<std::io::Error> for WorkerError {
    fn from(err: std::io::Error) -> Self {
        WorkerError::Config(err.to_string())
    }
}
