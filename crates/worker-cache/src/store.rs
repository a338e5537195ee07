//! Request-keyed access to the current cache generation.

use std::sync::Arc;

use futures::future::try_join_all;
use worker_core::{Method, Network, Request, Response, Scope};

use crate::{CacheBackend, CacheError, CacheGeneration, CacheResult};

/// The worker's static asset cache.
///
/// Writes go to the current generation. Reads search every generation the
/// host still holds, so a page served by an older instance keeps working until
/// activation evicts it.
#[derive(Clone)]
pub struct CacheStore {
    backend: Arc<dyn CacheBackend>,
    generation: CacheGeneration,
}

impl CacheStore {
    /// Create a store over a backend.
    pub fn new(backend: Arc<dyn CacheBackend>, generation: CacheGeneration) -> Self {
        Self {
            backend,
            generation,
        }
    }

    /// The current generation.
    pub fn generation(&self) -> &CacheGeneration {
        &self.generation
    }

    /// The underlying backend.
    pub fn backend(&self) -> &Arc<dyn CacheBackend> {
        &self.backend
    }

    /// Look up a stored response for the request.
    ///
    /// Only GET and HEAD requests can hit; anything else is a miss. A HEAD hit
    /// carries the stored headers with an empty body.
    pub async fn get(&self, request: &Request) -> CacheResult<Option<Response>> {
        let head = request.is_method(&Method::HEAD);
        if !head && !request.is_method(&Method::GET) {
            return Ok(None);
        }

        let key = request.cache_key();
        let hit = self.backend.match_any(&key).await?;
        tracing::debug!(
            url = %key,
            cache = if hit.is_some() { "hit" } else { "miss" },
            "cache lookup"
        );
        Ok(match hit {
            Some(response) if head => Some(response.with_body(Vec::new())),
            hit => hit,
        })
    }

    /// Store a response for a GET request in the current generation.
    pub async fn put(&self, request: &Request, response: Response) -> CacheResult<()> {
        if !request.is_method(&Method::GET) {
            return Err(CacheError::NotCacheable(request.method().clone()));
        }
        self.backend
            .put(&self.generation.name(), &request.cache_key(), response)
            .await
    }

    /// Fetch every manifest entry and store them all.
    ///
    /// Either every entry is stored or none is: a failed or non-2xx fetch
    /// aborts before anything is written.
    pub async fn add_all(
        &self,
        manifest: &[String],
        scope: &Scope,
        network: &dyn Network,
    ) -> CacheResult<usize> {
        let name = self.generation.name();
        self.backend.open(&name).await?;

        let requests = manifest
            .iter()
            .map(|path| Request::get(&scope.resolve(path)))
            .collect::<Result<Vec<_>, _>>()?;

        let responses = try_join_all(requests.iter().map(|request| async move {
            let response = network.fetch(request).await?;
            if !response.is_success() {
                return Err(CacheError::BadStatus {
                    url: request.url(),
                    status: response.status(),
                });
            }
            Ok::<_, CacheError>(response)
        }))
        .await?;

        for (request, response) in requests.iter().zip(responses) {
            self.backend
                .put(&name, &request.cache_key(), response)
                .await?;
        }

        tracing::info!(cache = %name, entries = requests.len(), "cache pre-warmed");
        Ok(requests.len())
    }

    /// Delete every cache except the current generation.
    ///
    /// Returns the names that were deleted.
    pub async fn evict_stale(&self) -> CacheResult<Vec<String>> {
        let mut evicted = Vec::new();
        for name in self.backend.keys().await? {
            if self.generation.is_stale(&name) && self.backend.delete(&name).await? {
                tracing::info!(cache = %name, "evicted stale cache");
                evicted.push(name);
            }
        }
        Ok(evicted)
    }
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("generation", &self.generation.name())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryCacheBackend;
    use worker_core::memory::MemoryNetwork;
    use worker_core::StatusCode;

    fn store(backend: Arc<MemoryCacheBackend>) -> CacheStore {
        CacheStore::new(backend, CacheGeneration::new("app", "2"))
    }

    // === Lookup Tests ===

    #[tokio::test]
    async fn test_store_put_then_get() {
        let backend = Arc::new(MemoryCacheBackend::new());
        let store = store(backend.clone());
        let request = Request::get("http://localhost/site.css").unwrap();

        store.put(&request, Response::html("css")).await.unwrap();

        let hit = store.get(&request).await.unwrap().unwrap();
        assert_eq!(hit.text(), "css");
        assert_eq!(backend.len("app-v2"), 1);
    }

    #[tokio::test]
    async fn test_store_post_never_hits() {
        let store = store(Arc::new(MemoryCacheBackend::new()));
        let get = Request::get("http://localhost/reveal.html").unwrap();
        let post = Request::post("http://localhost/reveal.html").unwrap();
        store.put(&get, Response::html("cached")).await.unwrap();

        assert!(store.get(&post).await.unwrap().is_none());
        assert!(matches!(
            store.put(&post, Response::html("x")).await,
            Err(CacheError::NotCacheable(_))
        ));
    }

    #[tokio::test]
    async fn test_store_head_hit_has_no_body() {
        let store = store(Arc::new(MemoryCacheBackend::new()));
        let get = Request::get("http://localhost/site.css").unwrap();
        let head = Request::new(Method::HEAD, "http://localhost/site.css").unwrap();
        store.put(&get, Response::html("css")).await.unwrap();

        let hit = store.get(&head).await.unwrap().unwrap();
        assert_eq!(hit.status(), StatusCode::OK);
        assert_eq!(hit.header("content-type"), Some(worker_core::TEXT_HTML));
        assert!(hit.body().is_empty());
        assert_eq!(store.get(&get).await.unwrap().unwrap().text(), "css");
    }

    #[tokio::test]
    async fn test_store_lowercase_get_hits() {
        let store = store(Arc::new(MemoryCacheBackend::new()));
        let get = Request::new(Method::from_bytes(b"get").unwrap(), "http://localhost/site.css").unwrap();

        store.put(&get, Response::html("css")).await.unwrap();

        assert_eq!(store.get(&get).await.unwrap().unwrap().text(), "css");
    }

    #[tokio::test]
    async fn test_store_key_includes_query() {
        let store = store(Arc::new(MemoryCacheBackend::new()));
        store
            .put(
                &Request::get("http://localhost/a?x=1").unwrap(),
                Response::html("one"),
            )
            .await
            .unwrap();

        let miss = store
            .get(&Request::get("http://localhost/a?x=2").unwrap())
            .await
            .unwrap();
        assert!(miss.is_none());
    }

    // === Pre-warm Tests ===

    #[tokio::test]
    async fn test_store_add_all_fetches_manifest() {
        let backend = Arc::new(MemoryCacheBackend::new());
        let store = store(backend.clone());
        let network = MemoryNetwork::new()
            .with_response("http://localhost:3003/site.css", Response::html("css"))
            .with_response("http://localhost:3003/favicon.ico", Response::html("ico"));
        let manifest = vec!["site.css".to_string(), "favicon.ico".to_string()];

        let stored = store
            .add_all(&manifest, &Scope::default(), &network)
            .await
            .unwrap();

        assert_eq!(stored, 2);
        assert_eq!(backend.len("app-v2"), 2);
        assert_eq!(network.call_count(), 2);
    }

    #[tokio::test]
    async fn test_store_add_all_is_all_or_nothing() {
        let backend = Arc::new(MemoryCacheBackend::new());
        let store = store(backend.clone());
        let network =
            MemoryNetwork::new().with_response("http://localhost:3003/site.css", Response::html("css"));
        let manifest = vec!["site.css".to_string(), "missing.png".to_string()];

        let result = store.add_all(&manifest, &Scope::default(), &network).await;

        assert!(matches!(
            result,
            Err(CacheError::BadStatus { status, .. }) if status == StatusCode::NOT_FOUND
        ));
        assert_eq!(backend.len("app-v2"), 0);
    }

    // === Eviction Tests ===

    #[tokio::test]
    async fn test_store_evict_stale_keeps_current() {
        let backend = Arc::new(MemoryCacheBackend::new());
        backend.put("app-v1", "k", Response::html("old")).await.unwrap();
        backend.put("other", "k", Response::html("other")).await.unwrap();
        backend.put("app-v2", "k", Response::html("new")).await.unwrap();
        let store = store(backend.clone());

        let mut evicted = store.evict_stale().await.unwrap();
        evicted.sort();

        assert_eq!(evicted, vec!["app-v1", "other"]);
        assert_eq!(backend.keys().await.unwrap(), vec!["app-v2"]);
    }
}
