//! What happens when no handler answers, and cache-first middleware.

use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use worker_cache::CacheStore;
use worker_core::{Method, Network};

use crate::router::Walk;
use crate::{Finalized, Next, PseudoRequest, PseudoResponse, RouteError, Source};

/// Answer from the cache, then the host's preload, then the network.
///
/// A failing cache lookup is logged and skipped; a failing network fetch fails
/// the event.
pub(crate) async fn run_fallback(walk: &Walk, res: PseudoResponse) -> Result<Finalized, RouteError> {
    let request = walk.request.event().request();

    match walk.context.cache.get(request).await {
        Ok(Some(hit)) => return Ok(res.finalize_from(Source::Cache, hit)),
        Ok(None) => {}
        Err(e) => tracing::warn!(url = %request.url(), error = %e, "cache lookup failed"),
    }

    let preload = walk.preload.lock().unwrap_or_else(|e| e.into_inner()).take();
    if let Some(preload) = preload {
        if let Some(response) = preload.await {
            tracing::debug!(url = %request.url(), "using navigation preload");
            return Ok(res.finalize_from(Source::Preload, response));
        }
    }

    let response = walk.context.host.network.fetch(request).await?;
    Ok(res.finalize_from(Source::Network, response))
}

/// Middleware answering GETs under `prefix` from the cache.
///
/// On a miss the response is fetched and, if successful, stored in the current
/// generation. Requests outside the prefix continue down the chain.
pub fn cache_first(
    prefix: impl Into<String>,
    cache: CacheStore,
    network: Arc<dyn Network>,
) -> impl Fn(Arc<PseudoRequest>, PseudoResponse, Next) -> BoxFuture<'static, Result<Finalized, RouteError>>
       + Send
       + Sync
       + 'static {
    let prefix: Arc<str> = prefix.into().into();
    move |req: Arc<PseudoRequest>, res: PseudoResponse, next: Next| {
        let prefix = prefix.clone();
        let cache = cache.clone();
        let network = network.clone();
        async move {
            let request = req.event().request();
            if !request.is_method(&Method::GET) || !request.url().starts_with(&*prefix) {
                return next.run(res).await;
            }

            if let Some(hit) = cache.get(request).await? {
                return Ok(res.finalize_from(Source::Cache, hit));
            }

            let response = network.fetch(request).await?;
            if response.is_success() {
                if let Err(e) = cache.put(request, response.clone()).await {
                    tracing::warn!(url = %request.url(), error = %e, "failed to cache response");
                }
            }
            Ok(res.finalize_from(Source::Network, response))
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use worker_bridge::CookieBridge;
    use worker_cache::{CacheGeneration, MemoryCacheBackend};
    use worker_core::memory::MemoryHost;
    use worker_core::{FetchEvent, Request, Response, Scope, StatusCode};

    use crate::{DispatchContext, Router};

    fn context(host: &MemoryHost) -> DispatchContext {
        let bridge = Arc::new(CookieBridge::new("minesweeper", Duration::from_millis(1000)));
        bridge.receive(None).unwrap();
        DispatchContext::new(
            Scope::default(),
            bridge,
            CacheStore::new(
                Arc::new(MemoryCacheBackend::new()),
                CacheGeneration::new("test", "1"),
            ),
            host.host(),
        )
    }

    const ICON: &str = "http://localhost:3003/favicon.ico";

    // === Fallback Tests ===

    #[tokio::test]
    async fn test_fallback_cache_hit_skips_network() {
        let host = MemoryHost::new();
        host.network.insert(ICON, Response::html("network"));
        let ctx = context(&host);
        let request = Request::get(ICON).unwrap();
        ctx.cache.put(&request, Response::html("cached")).await.unwrap();

        let (event, rx) = FetchEvent::new(request);
        let source = Router::new().dispatch(event, &ctx).await;

        assert_eq!(source, Source::Cache);
        assert_eq!(rx.recv().await.unwrap(), Response::html("cached"));
        assert_eq!(host.network.call_count(), 0);
    }

    #[tokio::test]
    async fn test_fallback_preload_before_network() {
        let host = MemoryHost::new();
        host.network.insert(ICON, Response::html("network"));
        let ctx = context(&host);

        let (event, rx) = FetchEvent::new(Request::get(ICON).unwrap());
        let event = event.with_preload(async { Some(Response::html("preloaded")) });
        let source = Router::new().dispatch(event, &ctx).await;

        assert_eq!(source, Source::Preload);
        assert_eq!(rx.recv().await.unwrap().text(), "preloaded");
        assert_eq!(host.network.call_count(), 0);
    }

    #[tokio::test]
    async fn test_fallback_empty_preload_uses_network() {
        let host = MemoryHost::new();
        host.network.insert(ICON, Response::html("network"));
        let ctx = context(&host);

        let (event, rx) = FetchEvent::new(Request::get(ICON).unwrap());
        let event = event.with_preload(async { None });
        let source = Router::new().dispatch(event, &ctx).await;

        assert_eq!(source, Source::Network);
        assert_eq!(rx.recv().await.unwrap().text(), "network");
    }

    #[tokio::test]
    async fn test_fallback_network_failure_is_501() {
        let host = MemoryHost::new();
        host.network.set_offline(true);
        let ctx = context(&host);

        let (event, rx) = FetchEvent::new(Request::get(ICON).unwrap());
        let source = Router::new().dispatch(event, &ctx).await;

        assert_eq!(source, Source::Failed);
        assert_eq!(rx.recv().await.unwrap().status(), StatusCode::NOT_IMPLEMENTED);
    }

    // === cache_first Tests ===

    const HTMX: &str = "https://unpkg.com/htmx.org@1.9.2";

    #[tokio::test]
    async fn test_cache_first_stores_then_hits() {
        let host = MemoryHost::new();
        host.network.insert(HTMX, Response::html("htmx"));
        let ctx = context(&host);
        let router = Router::new();
        router.middleware(cache_first(
            "https://unpkg.com/",
            ctx.cache.clone(),
            host.network.clone(),
        ));

        for expected in [Source::Network, Source::Cache] {
            let (event, rx) = FetchEvent::new(Request::get(HTMX).unwrap());
            assert_eq!(router.dispatch(event, &ctx).await, expected);
            assert_eq!(rx.recv().await.unwrap().text(), "htmx");
        }
        assert_eq!(host.network.call_count(), 1);
    }

    #[tokio::test]
    async fn test_cache_first_does_not_store_failures() {
        let host = MemoryHost::new();
        let ctx = context(&host);
        let router = Router::new();
        router.middleware(cache_first(
            "https://unpkg.com/",
            ctx.cache.clone(),
            host.network.clone(),
        ));

        for _ in 0..2 {
            let (event, rx) = FetchEvent::new(Request::get(HTMX).unwrap());
            router.dispatch(event, &ctx).await;
            assert_eq!(rx.recv().await.unwrap().status(), StatusCode::NOT_FOUND);
        }
        assert_eq!(host.network.call_count(), 2);
    }

    #[tokio::test]
    async fn test_cache_first_passes_other_urls_on() {
        let host = MemoryHost::new();
        let ctx = context(&host);
        let router = Router::new();
        router
            .middleware(cache_first(
                "https://unpkg.com/",
                ctx.cache.clone(),
                host.network.clone(),
            ))
            .get("/", |_req, res: PseudoResponse, _next| async move { Ok(res.send("home")) });

        let (event, rx) = FetchEvent::new(Request::get("http://localhost:3003/").unwrap());
        assert_eq!(router.dispatch(event, &ctx).await, Source::Route);
        assert_eq!(rx.recv().await.unwrap().text(), "home");
    }
}
