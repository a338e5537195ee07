//! Core abstractions for the intercepting worker router.
//!
//! This crate provides the fundamental types and traits:
//! - `Request` / `Response` - Values exchanged with the host
//! - `FetchEvent` / `RespondWith` - One intercepted request and its write-once slot
//! - `ExtendableEvent` - Lifetime extension for install/activate work
//! - `Network`, `Clients`, `Registration` - Host primitives (with in-memory versions)
//! - `ForegroundMessage` / `BackgroundMessage` - Cross-context message protocol
//! - `WorkerConfig` - Worker configuration
//! - `LifecycleState` - Install/activate state tracking

mod config;
mod error;
mod event;
mod host;
mod lifecycle;
pub mod memory;
mod protocol;
mod request;
mod response;

pub use crate::config::*;
pub use crate::error::*;
pub use crate::event::*;
pub use crate::host::*;
pub use crate::lifecycle::*;
pub use crate::protocol::*;
pub use crate::request::*;
pub use crate::response::*;

// Re-export the http vocabulary types used across the workspace.
pub use http::{header, HeaderMap, Method, StatusCode, Uri};
