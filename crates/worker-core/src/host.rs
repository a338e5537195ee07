//! Host primitives available inside the worker sandbox.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{BackgroundMessage, ClientId, Request, Response, WorkerError};

/// Live network access.
#[async_trait]
pub trait Network: Send + Sync {
    /// Perform the request against the network.
    async fn fetch(&self, request: &Request) -> Result<Response, WorkerError>;
}

/// A page controlled by the worker.
pub trait Client: Send + Sync {
    /// The page identifier.
    fn id(&self) -> &ClientId;

    /// Post a message to the page. Delivery is best effort.
    fn post_message(&self, message: &BackgroundMessage) -> Result<(), WorkerError>;
}

/// The set of pages in the worker's scope.
#[async_trait]
pub trait Clients: Send + Sync {
    /// Look up a page; `None` if it has been closed.
    async fn get(&self, id: &ClientId) -> Option<Arc<dyn Client>>;

    /// Take control of every open page in scope.
    async fn claim(&self) -> Result<(), WorkerError>;
}

/// The worker's registration with its host.
#[async_trait]
pub trait Registration: Send + Sync {
    /// Activate without waiting for previous instances to unload.
    async fn skip_waiting(&self) -> Result<(), WorkerError>;

    /// Enable speculative navigation preloads.
    ///
    /// Returns `false` when the host does not support preloading.
    async fn enable_navigation_preload(&self) -> Result<bool, WorkerError>;
}

/// Handles to every host primitive the worker uses, except caches.
#[derive(Clone)]
pub struct Host {
    /// Network access.
    pub network: Arc<dyn Network>,
    /// Controlled pages.
    pub clients: Arc<dyn Clients>,
    /// The worker's registration.
    pub registration: Arc<dyn Registration>,
}

impl Host {
    /// Bundle host primitives.
    pub fn new(
        network: Arc<dyn Network>,
        clients: Arc<dyn Clients>,
        registration: Arc<dyn Registration>,
    ) -> Self {
        Self {
            network,
            clients,
            registration,
        }
    }
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host").finish_non_exhaustive()
    }
}
