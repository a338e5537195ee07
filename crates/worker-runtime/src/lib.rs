//! Install, activate and fetch entry points for the intercepting worker.
//!
//! [`LifecycleManager`] is what the host talks to: it pre-warms the cache on
//! install, evicts stale generations and claims pages on activate, feeds page
//! messages to the cookie bridge, and hands every intercepted fetch to the
//! router once active.

mod error;
mod manager;

pub use error::*;
pub use manager::*;
