//! Prelude for convenient imports.
//!
//! ```rust,ignore
//! use worker_sdk::prelude::*;
//! ```
//!
//! This imports all commonly used items:
//! - Routing: `Router`, `Next`, `PseudoRequest`, `PseudoResponse`, `cache_first`
//! - Host types: `Host`, `FetchEvent`, `ExtendableEvent`
//! - Lifecycle: `LifecycleManager`, `LifecycleState`

pub use std::sync::Arc;

// Core types
pub use worker_core::{
    CookieOptions, ExtendableEvent, FetchEvent, Host, LifecycleState, Method, Request, Response,
    Scope, StatusCode, WorkerConfig, WorkerError,
};

// Cache
pub use worker_cache::{CacheBackend, CacheStore, MemoryCacheBackend};

// Router
pub use worker_router::{
    cache_first, FormBody, FormValue, Finalized, Next, PseudoRequest, PseudoResponse,
    RouteError, RouteMatcher, Router, Source,
};

// Lifecycle
pub use worker_runtime::{LifecycleError, LifecycleManager};
