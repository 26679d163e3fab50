//! Seam to the browser transport that drives a result page.
//!
//! The transport itself (browser automation, network capture) lives outside
//! this workspace. This crate defines what placescout needs from it: page
//! actions, coarse page-state signals, and captured responses tagged with
//! their kind and page index.

pub mod actions;
pub mod error;
pub mod jitter;
pub mod response;

pub use actions::{zoom_from_url, PageSignals, PageTransport};
pub use error::{Result, TransportError};
pub use jitter::SettleDelay;
pub use response::{page_index_from_request, ResponseKind, WireResponse};
