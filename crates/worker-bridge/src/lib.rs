//! Cookie recovery across worker restarts.
//!
//! The worker cannot read cookies and loses its memory whenever the host
//! evicts it. After every restart the page posts the tracked cookie back; the
//! [`CookieBridge`] races that message against a fixed ceiling so the first
//! request after a cold start never waits longer than the ceiling.
//!
//! The [`foreground`] module holds the page's half of the exchange.

mod bridge;
mod decode;
mod error;
pub mod foreground;

pub use bridge::*;
pub use decode::*;
pub use error::*;
