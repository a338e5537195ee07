//! Versioned static asset cache for the intercepting worker.
//!
//! This crate provides:
//! - `CacheBackend` - Named cache storage (the host's cache primitive)
//! - `MemoryCacheBackend` - In-memory backend for development/testing
//! - `CacheGeneration` - The current versioned cache name
//! - `CacheStore` - Request-keyed lookup, put, pre-warm and stale eviction
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use worker_cache::{CacheGeneration, CacheStore, MemoryCacheBackend};
//!
//! let store = CacheStore::new(
//!     Arc::new(MemoryCacheBackend::new()),
//!     CacheGeneration::new("minesweeper-service-worker-cache", "1"),
//! );
//!
//! store.add_all(&manifest, &scope, network.as_ref()).await?;
//! let evicted = store.evict_stale().await?;
//! ```

mod backend;
mod error;
mod generation;
mod store;

pub use backend::*;
pub use error::*;
pub use generation::*;
pub use store::*;
