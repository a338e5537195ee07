//! The worker's lifecycle.

use std::sync::{Arc, RwLock};

use worker_bridge::CookieBridge;
use worker_cache::{CacheBackend, CacheGeneration, CacheStore};
use worker_core::{
    ExtendableEvent, FetchEvent, ForegroundMessage, Host, LifecycleState, Response, WorkerConfig,
};
use worker_router::{DispatchContext, Router, Source};

use crate::LifecycleError;

/// One running instance of the worker.
///
/// Creating a manager is a cold start: the cookie bridge's race begins
/// immediately, so build it when the host starts the worker, not lazily.
pub struct LifecycleManager {
    config: WorkerConfig,
    router: Arc<Router>,
    context: DispatchContext,
    state: RwLock<LifecycleState>,
}

impl LifecycleManager {
    /// Start an instance with the given routes.
    pub fn new(
        config: WorkerConfig,
        host: Host,
        caches: Arc<dyn CacheBackend>,
        router: Arc<Router>,
    ) -> Self {
        let bridge = Arc::new(CookieBridge::from_config(&config.cookie));
        let cache = CacheStore::new(caches, CacheGeneration::from_config(&config.cache));
        let context = DispatchContext::new(config.scope.clone(), bridge, cache, host);
        Self {
            config,
            router,
            context,
            state: RwLock::new(LifecycleState::Parsed),
        }
    }

    /// The current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        *self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    /// The configuration this instance runs with.
    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// The route table.
    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    /// The cookie bridge.
    pub fn bridge(&self) -> &Arc<CookieBridge> {
        &self.context.bridge
    }

    /// The static asset cache.
    pub fn cache(&self) -> &CacheStore {
        &self.context.cache
    }

    /// Everything dispatch runs against.
    pub fn context(&self) -> &DispatchContext {
        &self.context
    }

    fn set_state(&self, state: LifecycleState) {
        let mut current = self.state.write().unwrap_or_else(|e| e.into_inner());
        tracing::info!(from = %*current, to = %state, "lifecycle transition");
        *current = state;
    }

    /// Enter `during` if the current state satisfies `allowed`.
    fn begin(
        &self,
        action: &'static str,
        allowed: fn(&LifecycleState) -> bool,
        during: LifecycleState,
    ) -> Result<(), LifecycleError> {
        let mut current = self.state.write().unwrap_or_else(|e| e.into_inner());
        if !allowed(&current) {
            return Err(LifecycleError::InvalidState {
                action,
                state: *current,
            });
        }
        tracing::info!(from = %*current, to = %during, "lifecycle transition");
        *current = during;
        Ok(())
    }

    /// Host entry point for the install event.
    pub fn on_install(self: &Arc<Self>, event: &ExtendableEvent) {
        let this = self.clone();
        event.wait_until(async move { this.install().await.map_err(Into::into) });
    }

    /// Pre-warm the current cache generation and skip waiting.
    pub async fn install(&self) -> Result<(), LifecycleError> {
        self.begin("install", LifecycleState::can_install, LifecycleState::Installing)?;

        let result = async {
            self.context
                .cache
                .add_all(
                    &self.config.cache.manifest,
                    &self.config.scope,
                    self.context.host.network.as_ref(),
                )
                .await?;
            self.context.host.registration.skip_waiting().await?;
            Ok::<_, LifecycleError>(())
        }
        .await;

        match result {
            Ok(()) => {
                self.set_state(LifecycleState::Installed);
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "install failed");
                self.set_state(LifecycleState::Redundant);
                Err(e)
            }
        }
    }

    /// Host entry point for the activate event.
    pub fn on_activate(self: &Arc<Self>, event: &ExtendableEvent) {
        let this = self.clone();
        event.wait_until(async move { this.activate().await.map_err(Into::into) });
    }

    /// Evict stale caches, enable preloads, and claim open pages.
    pub async fn activate(&self) -> Result<(), LifecycleError> {
        self.begin("activate", LifecycleState::can_activate, LifecycleState::Activating)?;

        let result = async {
            self.context.cache.evict_stale().await?;
            if self.config.navigation_preload {
                let enabled = self
                    .context
                    .host
                    .registration
                    .enable_navigation_preload()
                    .await?;
                if !enabled {
                    tracing::debug!("navigation preload not supported by host");
                }
            }
            self.context.host.clients.claim().await?;
            Ok::<_, LifecycleError>(())
        }
        .await;

        match result {
            Ok(()) => {
                self.set_state(LifecycleState::Active);
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "activate failed");
                self.set_state(LifecycleState::Redundant);
                Err(e)
            }
        }
    }

    /// Answer an intercepted request.
    ///
    /// Before activation the request goes straight to the network. Either way
    /// the event is answered exactly once.
    pub async fn handle_fetch(&self, event: FetchEvent) -> Source {
        if self.state().is_active() {
            return self.router.dispatch(event, &self.context).await;
        }

        let (info, _, slot) = event.into_parts();
        let request = info.request();
        tracing::debug!(url = %request.url(), state = %self.state(), "worker not active, passing through");
        match self.context.host.network.fetch(request).await {
            Ok(response) => {
                slot.respond(response);
                Source::Network
            }
            Err(e) => {
                tracing::error!(url = %request.url(), error = %e, "passthrough fetch failed");
                slot.respond(Response::router_failed());
                Source::Failed
            }
        }
    }

    /// Accept a message posted by a page.
    ///
    /// Unknown messages are ignored; a malformed cookie payload is logged and
    /// leaves the bridge waiting for its ceiling.
    pub fn handle_message(&self, payload: serde_json::Value) {
        let Some(message) = ForegroundMessage::from_value(payload) else {
            tracing::debug!("ignoring unrecognised message");
            return;
        };
        // The bridge logs decode failures itself.
        let _ = self.context.bridge.handle_message(&message);
    }
}

impl std::fmt::Debug for LifecycleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleManager")
            .field("state", &self.state())
            .field("cache", &self.context.cache.generation().name())
            .field("router", &self.router)
            .finish_non_exhaustive()
    }
}
