//! # Worker SDK
//!
//! An in-browser request router that lets a server-rendered app keep
//! working offline. Routes registered here answer intercepted requests
//! as if they were the server; everything else falls back to the static
//! asset cache, the host's navigation preload, and finally the network.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use worker_sdk::prelude::*;
//!
//! let router = Router::new();
//! router.get("/", |_req, res: PseudoResponse, _next| async move {
//!     Ok(res.send("<h1>Hello</h1>"))
//! });
//!
//! let worker = Arc::new(LifecycleManager::new(
//!     WorkerConfig::default(),
//!     host,
//!     Arc::new(MemoryCacheBackend::new()),
//!     Arc::new(router),
//! ));
//! worker.install().await?;
//! worker.activate().await?;
//! worker.handle_fetch(event).await;
//! ```
//!
//! ## Crates
//!
//! - `worker-core` - requests, responses, events and host abstractions
//! - `worker-cache` - versioned static asset cache
//! - `worker-bridge` - cookie persistence through the controlled page
//! - `worker-router` - route table, dispatch and fallback
//! - `worker-runtime` - install, activate and fetch entry points

pub mod prelude;

// Re-export worker crates
pub use worker_bridge;
pub use worker_cache;
pub use worker_core;
pub use worker_router;
pub use worker_runtime;

// Re-export the types most apps touch
pub use worker_core::{Request, Response, WorkerConfig, WorkerError};
pub use worker_router::{Finalized, Next, PseudoRequest, PseudoResponse, RouteError, Router, Source};
pub use worker_runtime::{LifecycleError, LifecycleManager};
