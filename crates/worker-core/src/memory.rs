//! In-memory host primitives (for development/testing).
//!
//! These back the command-line simulator and the test suites. Every
//! implementation records what the worker did to it so tests can assert on
//! side effects.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use http::StatusCode;

use crate::{
    BackgroundMessage, Client, ClientId, Clients, Host, Network, Registration, Request, Response,
    WorkerError,
};

/// Network backed by a fixture table.
///
/// Unknown URLs answer 404, like a real server would.
#[derive(Debug, Default)]
pub struct MemoryNetwork {
    fixtures: RwLock<HashMap<String, Response>>,
    calls: Mutex<Vec<String>>,
    offline: AtomicBool,
}

impl MemoryNetwork {
    /// Create an empty network.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fixture.
    pub fn with_response(self, url: &str, response: Response) -> Self {
        self.insert(url, response);
        self
    }

    /// Add or replace a fixture.
    pub fn insert(&self, url: &str, response: Response) {
        let mut fixtures = self.fixtures.write().unwrap_or_else(|e| e.into_inner());
        fixtures.insert(url.to_string(), response);
    }

    /// Make every fetch fail.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// URLs fetched so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of fetches so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl Network for MemoryNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, WorkerError> {
        let url = request.url();
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(url.clone());

        if self.offline.load(Ordering::SeqCst) {
            return Err(WorkerError::network(url, "offline"));
        }

        let fixtures = self.fixtures.read().unwrap_or_else(|e| e.into_inner());
        Ok(fixtures
            .get(&url)
            .cloned()
            .unwrap_or_else(|| Response::new(StatusCode::NOT_FOUND).with_body("404")))
    }
}

/// A page that collects the messages posted to it.
#[derive(Debug)]
pub struct MemoryClient {
    id: ClientId,
    inbox: Mutex<Vec<BackgroundMessage>>,
}

impl MemoryClient {
    /// Create a page.
    pub fn new(id: impl Into<ClientId>) -> Self {
        Self {
            id: id.into(),
            inbox: Mutex::new(Vec::new()),
        }
    }

    /// Messages received so far.
    pub fn messages(&self) -> Vec<BackgroundMessage> {
        self.inbox.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Client for MemoryClient {
    fn id(&self) -> &ClientId {
        &self.id
    }

    fn post_message(&self, message: &BackgroundMessage) -> Result<(), WorkerError> {
        self.inbox
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(message.clone());
        Ok(())
    }
}

/// The set of open pages.
#[derive(Debug, Default)]
pub struct MemoryClients {
    clients: RwLock<HashMap<ClientId, Arc<MemoryClient>>>,
    claimed: AtomicBool,
}

impl MemoryClients {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a page.
    pub fn open(&self, id: impl Into<ClientId>) -> Arc<MemoryClient> {
        let client = Arc::new(MemoryClient::new(id));
        let mut clients = self.clients.write().unwrap_or_else(|e| e.into_inner());
        clients.insert(client.id().clone(), client.clone());
        client
    }

    /// Close a page.
    pub fn close(&self, id: &ClientId) {
        let mut clients = self.clients.write().unwrap_or_else(|e| e.into_inner());
        clients.remove(id);
    }

    /// Whether the worker has claimed the open pages.
    pub fn is_claimed(&self) -> bool {
        self.claimed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Clients for MemoryClients {
    async fn get(&self, id: &ClientId) -> Option<Arc<dyn Client>> {
        let clients = self.clients.read().unwrap_or_else(|e| e.into_inner());
        clients.get(id).map(|c| c.clone() as Arc<dyn Client>)
    }

    async fn claim(&self) -> Result<(), WorkerError> {
        self.claimed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Registration that records lifecycle requests.
#[derive(Debug)]
pub struct MemoryRegistration {
    preload_supported: bool,
    skipped_waiting: AtomicBool,
    preload_enabled: AtomicBool,
}

impl MemoryRegistration {
    /// Create a registration; `preload_supported` mirrors host capability.
    pub fn new(preload_supported: bool) -> Self {
        Self {
            preload_supported,
            skipped_waiting: AtomicBool::new(false),
            preload_enabled: AtomicBool::new(false),
        }
    }

    /// Whether skip-waiting was requested.
    pub fn skipped_waiting(&self) -> bool {
        self.skipped_waiting.load(Ordering::SeqCst)
    }

    /// Whether navigation preload was enabled.
    pub fn preload_enabled(&self) -> bool {
        self.preload_enabled.load(Ordering::SeqCst)
    }
}

impl Default for MemoryRegistration {
    fn default() -> Self {
        Self::new(true)
    }
}

#[async_trait]
impl Registration for MemoryRegistration {
    async fn skip_waiting(&self) -> Result<(), WorkerError> {
        self.skipped_waiting.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn enable_navigation_preload(&self) -> Result<bool, WorkerError> {
        if !self.preload_supported {
            return Ok(false);
        }
        self.preload_enabled.store(true, Ordering::SeqCst);
        Ok(true)
    }
}

/// All in-memory primitives together, keeping concrete handles for inspection.
#[derive(Debug, Clone, Default)]
pub struct MemoryHost {
    /// Network fixtures and call log.
    pub network: Arc<MemoryNetwork>,
    /// Open pages.
    pub clients: Arc<MemoryClients>,
    /// Registration flags.
    pub registration: Arc<MemoryRegistration>,
}

impl MemoryHost {
    /// Create a host with no fixtures and no open pages.
    pub fn new() -> Self {
        Self::default()
    }

    /// Erase the concrete types.
    pub fn host(&self) -> Host {
        Host::new(
            self.network.clone(),
            self.clients.clone(),
            self.registration.clone(),
        )
    }
}
