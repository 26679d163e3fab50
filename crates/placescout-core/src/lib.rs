//! Placescout Core - Foundation crate for the placescout search harvester.
//!
//! This crate provides the record model, shared identifiers, configuration
//! management and error types that the transport and crawler crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths and env overrides
//! - [`types`] - Record model and newtypes (`PlaceId`, `SearchKey`, `LatLng`, `PlaceRecord`)
//! - [`telemetry`] - Tracing subscriber setup
//!
//! # Example
//!
//! ```rust
//! use placescout_core::{AppConfig, rank_for};
//!
//! let config = AppConfig::default();
//! assert_eq!(config.layout.page_size, 20);
//! assert_eq!(rank_for(2, 0, config.layout.page_size), 21);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod telemetry;
pub mod types;

// Re-export commonly used types
pub use config::{
    AddressOffsets, AppConfig, CoordinateEncoding, CrawlConfig, CrawlMode, DomFallbackConfig,
    TimingConfig, WireLayout,
};
pub use error::{ConfigError, ConfigResult, Result, ScoutError};
pub use types::{rank_for, Address, LatLng, PlaceId, PlaceRecord, SearchKey, PAGE_SIZE};
