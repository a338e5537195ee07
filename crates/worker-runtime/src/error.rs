//! Lifecycle errors.

use thiserror::Error;
use worker_cache::CacheError;
use worker_core::{LifecycleState, WorkerError};

/// Errors raised by install and activate.
#[derive(Error, Debug)]
pub enum LifecycleError {
    /// The step is not allowed from the current state.
    #[error("cannot {action} while {state}")]
    InvalidState {
        action: &'static str,
        state: LifecycleState,
    },

    /// Pre-warming or evicting the cache failed.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// A host primitive failed.
    #[error(transparent)]
    Host(#[from] WorkerError),
}

impl From<LifecycleError> for WorkerError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::Host(e) => e,
            other => WorkerError::Host(other.to_string()),
        }
    }
}
