//! Placescout Crawler - Wire decoding and scroll-session control.
//!
//! This crate turns captured search responses into typed place records and
//! decides, step by step, whether a search session should keep scrolling,
//! switch to DOM extraction, or stop.
//!
//! # Features
//!
//! - Layered decoding of the guarded, string-wrapped nested-array format
//! - Depth-bounded structural search for place candidates with in-call dedup
//! - Geofence filtering, shared coordinate cache and export dedup
//! - Per-search and global budgets with exact compensation on duplicates
//! - Concurrent sessions with page-level retries
//!
//! # Example
//!
//! ```rust,ignore
//! use placescout_crawler::{ScoutOrchestrator, SearchRequest, Collaborators};
//! use std::sync::Arc;
//!
//! let (collaborators, frontier, _, _) = Collaborators::in_memory();
//! let orchestrator = ScoutOrchestrator::new(Arc::new(opener), collaborators, config);
//!
//! let outcomes = orchestrator
//!     .run_all(vec![SearchRequest::new("pizza minneapolis")])
//!     .await;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

#[allow(missing_docs)]
pub mod budget;
#[allow(missing_docs)]
pub mod cache;
#[allow(missing_docs)]
pub mod collaborators;
#[allow(missing_docs)]
pub mod context;
#[allow(missing_docs)]
pub mod decoder;
#[allow(missing_docs)]
pub mod error;
#[allow(missing_docs)]
pub mod feed;
#[allow(missing_docs)]
pub mod geofence;
#[allow(missing_docs)]
pub mod orchestrator;
#[allow(missing_docs)]
pub mod session;
pub mod strategy;

// Re-export commonly used types
pub use budget::{BudgetState, BudgetTracker};
pub use cache::{CoordinateCache, CoordinateEntry, ExportDedup};
pub use collaborators::{
    diagnostics_key, Collaborators, DiagnosticsStore, EnqueueOutcome, EnqueueRequest, Frontier,
    MemoryDiagnostics, MemoryFrontier, MemorySink, PlaceMetadata, PushItem, ResultSink,
};
pub use context::SharedContext;
pub use decoder::{DecodeResult, DecodedBatch, WireDecoder};
pub use error::{CrawlError, DecodeError, Result, SessionError};
pub use feed::{response_channel, DecodedResponse, ResponseFeed, ResponseReceiver};
pub use geofence::{passes, Geofence, Polygon};
pub use orchestrator::{PageOpener, ScoutOrchestrator, SearchOutcome};
pub use session::{
    PageOutcome, SearchRequest, SearchSession, SessionPhase, SessionReport, SessionState,
    Termination,
};
pub use strategy::{DomStrategy, ExtractionStrategy, Harvest, WireStrategy};
