//! Express-style routing inside the intercepting worker.
//!
//! This crate provides:
//! - `Router` - Ordered route and middleware registrations with per-event snapshots
//! - `PseudoRequest` - Lazy, read-only view of an intercepted request
//! - `PseudoResponse` - Header, cookie and body builder that finalizes exactly once
//! - `Next` - Continuation resuming the registration walk
//! - `cache_first` - Middleware serving a URL prefix from the cache
//!
//! # Example
//!
//! ```ignore
//! use worker_router::{Router, RouteError};
//!
//! let router = Router::new();
//! router
//!     .get("/newGameForm.html", |req, res, _next| async move {
//!         Ok(res.send(render_form(req.cookies())))
//!     })
//!     .post("/reveal.html", |req, res, _next| async move {
//!         Ok(res.send(reveal(req.body())?))
//!     });
//!
//! let source = router.dispatch(event, &context).await;
//! ```

mod error;
mod fallback;
mod request;
mod response;
mod router;

pub use error::*;
pub use fallback::*;
pub use request::*;
pub use response::*;
pub use router::*;
