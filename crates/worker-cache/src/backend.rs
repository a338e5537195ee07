//! Named cache storage.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use worker_core::Response;

use crate::{CacheError, CacheResult};

/// The host's named cache storage.
///
/// Each named cache maps request keys to stored responses. Writes replace whole
/// entries; an entry is never mutated in place.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Create the named cache if it does not exist.
    async fn open(&self, cache: &str) -> CacheResult<()>;

    /// Store a response under `key` in the named cache, creating the cache if needed.
    async fn put(&self, cache: &str, key: &str, response: Response) -> CacheResult<()>;

    /// Look up `key` in one named cache.
    async fn match_in(&self, cache: &str, key: &str) -> CacheResult<Option<Response>>;

    /// Look up `key` across every cache, oldest cache first.
    async fn match_any(&self, key: &str) -> CacheResult<Option<Response>>;

    /// Names of every cache, oldest first.
    async fn keys(&self) -> CacheResult<Vec<String>>;

    /// Delete a named cache. Returns whether it existed.
    async fn delete(&self, cache: &str) -> CacheResult<bool>;
}

/// In-memory cache backend (for development/testing).
#[derive(Debug, Default)]
pub struct MemoryCacheBackend {
    caches: RwLock<Vec<(String, HashMap<String, Response>)>>,
}

impl MemoryCacheBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries in a named cache.
    pub fn len(&self, cache: &str) -> usize {
        let caches = self.caches.read().unwrap_or_else(|e| e.into_inner());
        caches
            .iter()
            .find(|(name, _)| name == cache)
            .map(|(_, entries)| entries.len())
            .unwrap_or(0)
    }

    /// Whether no cache holds any entry.
    pub fn is_empty(&self) -> bool {
        let caches = self.caches.read().unwrap_or_else(|e| e.into_inner());
        caches.iter().all(|(_, entries)| entries.is_empty())
    }

    fn with_cache<T>(&self, cache: &str, f: impl FnOnce(&mut HashMap<String, Response>) -> T) -> T {
        let mut caches = self.caches.write().unwrap_or_else(|e| e.into_inner());
        let index = match caches.iter().position(|(name, _)| name == cache) {
            Some(index) => index,
            None => {
                caches.push((cache.to_string(), HashMap::new()));
                caches.len() - 1
            }
        };
        f(&mut caches[index].1)
    }
}

#[async_trait]
impl CacheBackend for MemoryCacheBackend {
    async fn open(&self, cache: &str) -> CacheResult<()> {
        self.with_cache(cache, |_| ());
        Ok(())
    }

    async fn put(&self, cache: &str, key: &str, response: Response) -> CacheResult<()> {
        if cache.is_empty() {
            return Err(CacheError::Storage("cache name must not be empty".to_string()));
        }
        self.with_cache(cache, |entries| {
            entries.insert(key.to_string(), response);
        });
        Ok(())
    }

    async fn match_in(&self, cache: &str, key: &str) -> CacheResult<Option<Response>> {
        let caches = self.caches.read().unwrap_or_else(|e| e.into_inner());
        Ok(caches
            .iter()
            .find(|(name, _)| name == cache)
            .and_then(|(_, entries)| entries.get(key).cloned()))
    }

    async fn match_any(&self, key: &str) -> CacheResult<Option<Response>> {
        let caches = self.caches.read().unwrap_or_else(|e| e.into_inner());
        Ok(caches
            .iter()
            .find_map(|(_, entries)| entries.get(key).cloned()))
    }

    async fn keys(&self) -> CacheResult<Vec<String>> {
        let caches = self.caches.read().unwrap_or_else(|e| e.into_inner());
        Ok(caches.iter().map(|(name, _)| name.clone()).collect())
    }

    async fn delete(&self, cache: &str) -> CacheResult<bool> {
        let mut caches = self.caches.write().unwrap_or_else(|e| e.into_inner());
        let before = caches.len();
        caches.retain(|(name, _)| name != cache);
        Ok(caches.len() != before)
    }
}
