//! Route registration and per-event dispatch.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use worker_bridge::CookieBridge;
use worker_cache::CacheStore;
use worker_core::{FetchEvent, Host, Method, PreloadFuture, Request, Scope};

use crate::fallback::run_fallback;
use crate::{Finalized, PseudoRequest, PseudoResponse, RouteError, Source};

/// A route or middleware handler.
///
/// Any async closure `Fn(Arc<PseudoRequest>, PseudoResponse, Next)` returning
/// `Result<Finalized, RouteError>` is a handler.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    /// Handle one event.
    async fn call(
        &self,
        req: Arc<PseudoRequest>,
        res: PseudoResponse,
        next: Next,
    ) -> Result<Finalized, RouteError>;
}

#[async_trait]
impl<F, Fut> Handler for F
where
    F: Fn(Arc<PseudoRequest>, PseudoResponse, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Finalized, RouteError>> + Send + 'static,
{
    async fn call(
        &self,
        req: Arc<PseudoRequest>,
        res: PseudoResponse,
        next: Next,
    ) -> Result<Finalized, RouteError> {
        (self)(req, res, next).await
    }
}

/// What a registration matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteMatcher {
    /// Every request; the handler is middleware.
    Any,
    /// One method and one exact scope-relative path.
    Exact { method: Method, path: String },
}

impl RouteMatcher {
    fn matches(&self, request: &Request, scope: &Scope) -> bool {
        match self {
            RouteMatcher::Any => true,
            RouteMatcher::Exact { method, path } => {
                method.as_str().eq_ignore_ascii_case(request.method().as_str())
                    && scope.relative_path(request.uri()) == Some(path.as_str())
            }
        }
    }
}

impl std::fmt::Display for RouteMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RouteMatcher::Any => write!(f, "*"),
            RouteMatcher::Exact { method, path } => write!(f, "{} {}", method, path),
        }
    }
}

struct Route {
    matcher: RouteMatcher,
    handler: Box<dyn Handler>,
}

/// Where one event's dispatch is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    /// Waiting for the cookie bridge.
    Pending,
    /// Walking the registrations.
    Dispatching,
    /// The respond-with slot has been filled.
    Done,
}

impl std::fmt::Display for DispatchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Dispatching => write!(f, "dispatching"),
            Self::Done => write!(f, "done"),
        }
    }
}

/// Everything dispatch needs besides the registrations.
#[derive(Clone, Debug)]
pub struct DispatchContext {
    /// The controlled scope.
    pub scope: Scope,
    /// The bridged cookie.
    pub bridge: Arc<CookieBridge>,
    /// The static asset cache.
    pub cache: CacheStore,
    /// Host primitives.
    pub host: Host,
}

impl DispatchContext {
    /// Bundle dispatch dependencies.
    pub fn new(scope: Scope, bridge: Arc<CookieBridge>, cache: CacheStore, host: Host) -> Self {
        Self {
            scope,
            bridge,
            cache,
            host,
        }
    }
}

/// The state shared by every step of one event's walk.
#[derive(Clone)]
pub(crate) struct Walk {
    routes: Arc<[Arc<Route>]>,
    pub(crate) request: Arc<PseudoRequest>,
    pub(crate) context: DispatchContext,
    pub(crate) preload: Arc<Mutex<Option<PreloadFuture>>>,
}

impl Walk {
    /// Resume at registration `from`; fall back once registrations run out.
    fn resume(self, from: usize, res: PseudoResponse) -> BoxFuture<'static, Result<Finalized, RouteError>> {
        async move {
            let request = self.request.event().request();
            let matched = self
                .routes
                .iter()
                .enumerate()
                .skip(from)
                .find(|(_, route)| route.matcher.matches(request, &self.context.scope))
                .map(|(index, route)| (index, route.clone()));

            match matched {
                Some((index, route)) => {
                    tracing::trace!(url = %self.request.url(), route = %route.matcher, "invoking handler");
                    let terminal = route.matcher != RouteMatcher::Any;
                    let next = Next {
                        walk: self.clone(),
                        resume_at: index + 1,
                        terminal,
                    };
                    route.handler.call(self.request.clone(), res, next).await
                }
                None => run_fallback(&self, res).await,
            }
        }
        .boxed()
    }
}

/// Continuation handed to every handler.
///
/// For middleware it resumes the walk at the next registration. A route
/// handler is expected to finalize itself; calling its `next` is logged and
/// then also resumes the walk.
pub struct Next {
    walk: Walk,
    resume_at: usize,
    terminal: bool,
}

impl Next {
    /// Whether this continuation was handed to a route handler.
    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    /// Continue with the next matching registration, or the fallback chain.
    pub async fn run(self, res: PseudoResponse) -> Result<Finalized, RouteError> {
        if self.terminal {
            tracing::warn!(url = %self.walk.request.url(), "route handler called next; continuing walk");
        }
        self.walk.resume(self.resume_at, res).await
    }
}

impl std::fmt::Debug for Next {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Next")
            .field("resume_at", &self.resume_at)
            .field("terminal", &self.terminal)
            .finish_non_exhaustive()
    }
}

/// Ordered route and middleware registrations.
///
/// Registration order is dispatch order. Each event walks a snapshot taken
/// when it starts dispatching, so later registrations only affect later events.
#[derive(Default)]
pub struct Router {
    routes: RwLock<Vec<Arc<Route>>>,
}

impl Router {
    /// Create an empty router.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register any [`Handler`] under a matcher.
    pub fn register(&self, matcher: RouteMatcher, handler: impl Handler) -> &Self {
        let mut routes = self.routes.write().unwrap_or_else(|e| e.into_inner());
        routes.push(Arc::new(Route {
            matcher,
            handler: Box::new(handler),
        }));
        self
    }

    /// Register a handler for one method and exact path.
    pub fn route<F, Fut>(&self, method: Method, path: impl Into<String>, handler: F) -> &Self
    where
        F: Fn(Arc<PseudoRequest>, PseudoResponse, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Finalized, RouteError>> + Send + 'static,
    {
        self.register(
            RouteMatcher::Exact {
                method,
                path: path.into(),
            },
            handler,
        )
    }

    /// Register a GET handler.
    pub fn get<F, Fut>(&self, path: impl Into<String>, handler: F) -> &Self
    where
        F: Fn(Arc<PseudoRequest>, PseudoResponse, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Finalized, RouteError>> + Send + 'static,
    {
        self.route(Method::GET, path, handler)
    }

    /// Register a POST handler.
    pub fn post<F, Fut>(&self, path: impl Into<String>, handler: F) -> &Self
    where
        F: Fn(Arc<PseudoRequest>, PseudoResponse, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Finalized, RouteError>> + Send + 'static,
    {
        self.route(Method::POST, path, handler)
    }

    /// Register middleware that sees every request.
    pub fn middleware<F, Fut>(&self, handler: F) -> &Self
    where
        F: Fn(Arc<PseudoRequest>, PseudoResponse, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Finalized, RouteError>> + Send + 'static,
    {
        self.register(RouteMatcher::Any, handler)
    }

    /// Matchers in registration order.
    pub fn matchers(&self) -> Vec<RouteMatcher> {
        self.read().iter().map(|r| r.matcher.clone()).collect()
    }

    /// Number of registrations.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<Arc<Route>>> {
        self.routes.read().unwrap_or_else(|e| e.into_inner())
    }

    fn snapshot(&self) -> Arc<[Arc<Route>]> {
        self.read().iter().cloned().collect()
    }

    /// Answer one intercepted event.
    ///
    /// The event's respond-with slot is filled exactly once: with the
    /// handler's or fallback's response, or with the fixed failure response if
    /// anything errors or panics.
    pub async fn dispatch(&self, event: FetchEvent, context: &DispatchContext) -> Source {
        let (info, preload, slot) = event.into_parts();
        let url = info.request().url();
        let method = info.request().method().clone();
        let routes = self.snapshot();

        let walk = async {
            tracing::trace!(%url, state = %DispatchState::Pending, "dispatch");
            let cookie = context.bridge.resolve_cookie().await;
            let request = Arc::new(PseudoRequest::new(info, context.bridge.name(), cookie));
            let res = PseudoResponse::new(
                context.bridge.clone(),
                context.host.clients.clone(),
                request.event().client_id().cloned(),
            );
            let walk = Walk {
                routes,
                request,
                context: context.clone(),
                preload: Arc::new(Mutex::new(preload)),
            };
            tracing::trace!(%url, state = %DispatchState::Dispatching, "dispatch");
            walk.resume(0, res).await
        };

        let finalized = match AssertUnwindSafe(walk).catch_unwind().await {
            Ok(Ok(finalized)) => finalized,
            Ok(Err(e)) => {
                tracing::error!(%url, %method, error = %e, "dispatch failed");
                Finalized::failed()
            }
            Err(panic) => {
                let e = RouteError::Panicked(panic_message(panic.as_ref()));
                tracing::error!(%url, %method, error = %e, "dispatch failed");
                Finalized::failed()
            }
        };

        let source = finalized.source();
        let status = finalized.response().status();
        slot.respond(finalized.into_response());
        tracing::debug!(%url, %method, %status, %source, "responded");
        tracing::trace!(%url, state = %DispatchState::Done, "dispatch");
        source
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.matchers())
            .finish()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use worker_cache::{CacheGeneration, MemoryCacheBackend};
    use worker_core::memory::MemoryHost;
    use worker_core::{ResponseReceiver, StatusCode};

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

    fn get(path: &str) -> (FetchEvent, ResponseReceiver) {
        FetchEvent::new(Request::get(&format!("http://localhost:3003{}", path)).unwrap())
    }

    // === Matching Tests ===

    #[tokio::test]
    async fn test_router_exact_match() {
        let host = MemoryHost::new();
        let router = Router::new();
        router.get("/newGameForm.html", |_req, res: PseudoResponse, _next| async move {
            Ok(res.send("form"))
        });

        let (event, rx) = get("/newGameForm.html");
        let source = router.dispatch(event, &context(&host)).await;

        assert_eq!(source, Source::Route);
        assert_eq!(rx.recv().await.unwrap().text(), "form");
    }

    #[tokio::test]
    async fn test_router_method_mismatch_falls_back() {
        let host = MemoryHost::new();
        let router = Router::new();
        router.post("/reveal.html", |_req, res: PseudoResponse, _next| async move {
            Ok(res.send("revealed"))
        });

        let (event, rx) = get("/reveal.html");
        let source = router.dispatch(event, &context(&host)).await;

        assert_eq!(source, Source::Network);
        assert_eq!(rx.recv().await.unwrap().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_router_lowercase_post_reaches_handler_with_form() {
        let host = MemoryHost::new();
        let router = Router::new();
        router.post("/reveal.html", |req: Arc<PseudoRequest>, res: PseudoResponse, _next| async move {
            Ok(res.send(format!("fields={}", req.body().len())))
        });

        let request = Request::new(
            Method::from_bytes(b"post").unwrap(),
            "http://localhost:3003/reveal.html",
        )
        .unwrap()
        .with_form("selected=1&grid__cell=A");
        let (event, rx) = FetchEvent::new(request);
        let source = router.dispatch(event, &context(&host)).await;

        assert_eq!(source, Source::Route);
        assert_eq!(rx.recv().await.unwrap().text(), "fields=2");
    }

    #[tokio::test]
    async fn test_router_other_origin_not_matched() {
        let host = MemoryHost::new();
        let router = Router::new();
        router.get("/", |_req, res: PseudoResponse, _next| async move { Ok(res.send("home")) });

        let (event, _rx) = FetchEvent::new(Request::get("https://unpkg.com/").unwrap());
        let source = router.dispatch(event, &context(&host)).await;

        assert_eq!(source, Source::Network);
        assert_eq!(host.network.calls(), vec!["https://unpkg.com/"]);
    }

    #[tokio::test]
    async fn test_router_first_match_wins() {
        let host = MemoryHost::new();
        let router = Router::new();
        let later = Arc::new(AtomicUsize::new(0));
        router.get("/", |_req, res: PseudoResponse, _next| async move { Ok(res.send("first")) });
        router.get("/", {
            let later = later.clone();
            move |_req: Arc<PseudoRequest>, res: PseudoResponse, _next: Next| {
                let later = later.clone();
                async move {
                    later.fetch_add(1, Ordering::SeqCst);
                    Ok(res.send("second"))
                }
            }
        });

        let (event, rx) = get("/");
        router.dispatch(event, &context(&host)).await;

        assert_eq!(rx.recv().await.unwrap().text(), "first");
        assert_eq!(later.load(Ordering::SeqCst), 0);
    }

    // === Middleware Tests ===

    #[tokio::test]
    async fn test_router_middleware_runs_in_order() {
        let host = MemoryHost::new();
        let router = Router::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for name in ["a", "b"] {
            let order = order.clone();
            router.middleware(move |_req: Arc<PseudoRequest>, mut res: PseudoResponse, next: Next| {
                let order = order.clone();
                async move {
                    order.lock().unwrap().push(name);
                    res.set(&format!("x-{}", name), Some("1"))?;
                    next.run(res).await
                }
            });
        }
        router.get("/", |_req, res: PseudoResponse, _next| async move { Ok(res.send("home")) });

        let (event, rx) = get("/");
        router.dispatch(event, &context(&host)).await;

        let response = rx.recv().await.unwrap();
        assert_eq!(*order.lock().unwrap(), vec!["a", "b"]);
        assert_eq!(response.header("x-a"), Some("1"));
        assert_eq!(response.header("x-b"), Some("1"));
    }

    #[tokio::test]
    async fn test_router_middleware_can_short_circuit() {
        let host = MemoryHost::new();
        let router = Router::new();
        router.middleware(|_req, res: PseudoResponse, _next: Next| async move {
            Ok(res.raw_response(worker_core::Response::new(StatusCode::FORBIDDEN)))
        });
        router.get("/", |_req, res: PseudoResponse, _next| async move { Ok(res.send("home")) });

        let (event, rx) = get("/");
        router.dispatch(event, &context(&host)).await;

        assert_eq!(rx.recv().await.unwrap().status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_router_terminal_next_continues_walk() {
        let host = MemoryHost::new();
        let router = Router::new();
        router.get("/", |_req, res: PseudoResponse, next: Next| async move {
            assert!(next.is_terminal());
            next.run(res).await
        });
        router.get("/", |_req, res: PseudoResponse, _next| async move { Ok(res.send("second")) });

        let (event, rx) = get("/");
        router.dispatch(event, &context(&host)).await;

        assert_eq!(rx.recv().await.unwrap().text(), "second");
    }

    // === Failure Tests ===

    #[tokio::test]
    async fn test_router_handler_error_is_501() {
        let host = MemoryHost::new();
        let router = Router::new();
        router.get("/", |_req, _res: PseudoResponse, _next| async move {
            Err::<Finalized, _>(RouteError::handler("boom"))
        });

        let (event, rx) = get("/");
        let source = router.dispatch(event, &context(&host)).await;

        let response = rx.recv().await.unwrap();
        assert_eq!(source, Source::Failed);
        assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
        assert_eq!(response.text(), "501");
    }

    #[tokio::test]
    async fn test_router_handler_panic_is_501() {
        let host = MemoryHost::new();
        let router = Router::new();
        router.get("/", |_req, _res: PseudoResponse, _next| async move {
            if true {
                panic!("handler bug");
            }
            Err::<Finalized, _>(RouteError::handler("unreachable"))
        });

        let (event, rx) = get("/");
        router.dispatch(event, &context(&host)).await;

        assert_eq!(rx.recv().await.unwrap().status(), StatusCode::NOT_IMPLEMENTED);
    }

    #[tokio::test]
    async fn test_router_abandoned_event_does_not_panic() {
        let host = MemoryHost::new();
        let router = Router::new();
        router.get("/", |_req, res: PseudoResponse, _next| async move { Ok(res.send("home")) });

        let (event, rx) = get("/");
        drop(rx);

        assert_eq!(router.dispatch(event, &context(&host)).await, Source::Route);
    }

    // === Snapshot Tests ===

    #[tokio::test]
    async fn test_router_registration_during_dispatch_not_seen() {
        let host = MemoryHost::new();
        let router = Arc::new(Router::new());
        router.middleware({
            let router = Arc::downgrade(&router);
            move |_req: Arc<PseudoRequest>, res: PseudoResponse, next: Next| {
                let router = router.clone();
                async move {
                    if let Some(router) = router.upgrade() {
                        router.get("/", |_req, res: PseudoResponse, _next| async move {
                            Ok(res.send("late"))
                        });
                    }
                    next.run(res).await
                }
            }
        });

        let (event, rx) = get("/");
        let source = router.dispatch(event, &context(&host)).await;

        assert_eq!(source, Source::Network);
        assert_eq!(rx.recv().await.unwrap().status(), StatusCode::NOT_FOUND);
        assert_eq!(router.len(), 2);
    }

    #[test]
    fn test_router_matchers_in_order() {
        let router = Router::new();
        router
            .get("/", |_req, res: PseudoResponse, _next| async move { Ok(res.send("")) })
            .middleware(|_req, res: PseudoResponse, next: Next| async move { next.run(res).await });

        let matchers: Vec<String> = router.matchers().iter().map(|m| m.to_string()).collect();
        assert_eq!(matchers, vec!["GET /", "*"]);
    }
}
