//! Configuration management for placescout.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides. The [`WireLayout`] section holds the
//! producer-specific constants of the wire format; they change without notice
//! on the producer side, so they are versioned data rather than literals.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main application configuration.
///
/// Loaded from `~/.config/placescout/config.toml` (or platform equivalent).
/// If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Crawl limits and stop conditions
    pub crawl: CrawlConfig,
    /// Timeouts, poll intervals and delays
    pub timing: TimingConfig,
    /// Producer wire-format constants
    pub layout: WireLayout,
    /// DOM fallback selectors
    pub dom: DomFallbackConfig,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load and validate configuration from an explicit path.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        tracing::debug!("Loading config from {}", path.display());
        let contents = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `PLACESCOUT_MAX_PLACES_PER_SEARCH`: per-search budget (`0` = unbounded)
    /// - `PLACESCOUT_MAX_PLACES_TOTAL`: global budget (`0` = unbounded)
    /// - `PLACESCOUT_MODE`: `enqueue` or `export`
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;
        config.apply_env(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("PLACESCOUT_MAX_PLACES_PER_SEARCH") {
            if let Ok(limit) = val.parse::<u64>() {
                self.crawl.max_places_per_search = (limit > 0).then_some(limit);
                tracing::debug!("Override crawl.max_places_per_search from env: {}", limit);
            }
        }

        if let Some(val) = lookup("PLACESCOUT_MAX_PLACES_TOTAL") {
            if let Ok(limit) = val.parse::<u64>() {
                self.crawl.max_places_total = (limit > 0).then_some(limit);
                tracing::debug!("Override crawl.max_places_total from env: {}", limit);
            }
        }

        if let Some(val) = lookup("PLACESCOUT_MODE") {
            match val.to_ascii_lowercase().as_str() {
                "enqueue" => self.crawl.mode = CrawlMode::Enqueue,
                "export" => self.crawl.mode = CrawlMode::Export,
                other => tracing::warn!("Ignoring unknown PLACESCOUT_MODE: {}", other),
            }
        }
    }

    /// Check cross-field consistency.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.timing.settle_min_ms > self.timing.settle_max_ms {
            return Err(invalid(
                "timing.settle_min_ms",
                "must not exceed timing.settle_max_ms",
            ));
        }
        if self.timing.outcome_poll_ms == 0 {
            return Err(invalid("timing.outcome_poll_ms", "must be positive"));
        }
        if self.layout.page_size == 0 {
            return Err(invalid("layout.page_size", "must be positive"));
        }
        if self.layout.coordinate_scale <= 0.0 || !self.layout.coordinate_scale.is_finite() {
            return Err(invalid("layout.coordinate_scale", "must be a positive number"));
        }
        if self.layout.id_slots.is_empty() {
            return Err(invalid("layout.id_slots", "at least one slot is required"));
        }
        if self.crawl.response_queue_capacity == 0 {
            return Err(invalid("crawl.response_queue_capacity", "must be positive"));
        }
        if self.crawl.concurrent_searches == 0 {
            return Err(invalid("crawl.concurrent_searches", "must be positive"));
        }
        Ok(())
    }

    /// Save configuration to disk.
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> ConfigResult<()> {
        let config_path = Self::config_path()?;
        let config_dir = config_path
            .parent()
            .ok_or_else(|| invalid("config_path", "no parent directory"))?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", config_path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/placescout/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("com", "placescout", "placescout")
            .ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

/// What a session does with accepted records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrawlMode {
    /// Submit detail-page requests to the external frontier
    #[default]
    Enqueue,
    /// Push records straight to the results sink
    Export,
}

/// Crawl limits and stop conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Session mode
    pub mode: CrawlMode,
    /// Maximum places enqueued/pushed per search (`None` = unbounded)
    pub max_places_per_search: Option<u64>,
    /// Maximum places enqueued/pushed across all searches (`None` = unbounded)
    pub max_places_total: Option<u64>,
    /// Consecutive scroll steps without new results before stopping
    pub max_empty_scrolls: u32,
    /// Hard cap of results per search page
    pub page_result_cap: u64,
    /// Maximum zoom-out from the initial zoom before the search is considered over-broadened
    pub max_zoom_drift: Option<f64>,
    /// Page index after which an empty session switches to DOM extraction
    pub fallback_after_page: u32,
    /// Page-level retries for retryable session failures
    pub max_page_retries: u32,
    /// Searches run concurrently by the orchestrator
    pub concurrent_searches: usize,
    /// Capacity of the decoded-response channel feeding a session
    pub response_queue_capacity: usize,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            mode: CrawlMode::Enqueue,
            max_places_per_search: None,
            max_places_total: None,
            max_empty_scrolls: 10,
            page_result_cap: 120,
            max_zoom_drift: None,
            fallback_after_page: 2,
            max_page_retries: 3,
            concurrent_searches: 3,
            response_queue_capacity: 64,
        }
    }
}

/// Timeouts, poll intervals and delays, all in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Window for a page-state outcome after revealing results
    pub outcome_timeout_ms: u64,
    /// Poll granularity for page-state signals
    pub outcome_poll_ms: u64,
    /// Wait for the single-place detail payload
    pub single_place_timeout_ms: u64,
    /// Lower bound of the randomized settle delay after a scroll
    pub settle_min_ms: u64,
    /// Upper bound of the randomized settle delay after a scroll
    pub settle_max_ms: u64,
    /// Best-effort wait for the visible result count to change after a scroll
    pub count_settle_timeout_ms: u64,
    /// Base delay between page-level retries
    pub retry_backoff_ms: u64,
}

impl TimingConfig {
    /// Outcome window as a `Duration`.
    #[must_use]
    pub fn outcome_timeout(&self) -> Duration {
        Duration::from_millis(self.outcome_timeout_ms)
    }

    /// Signal poll interval as a `Duration`.
    #[must_use]
    pub fn outcome_poll(&self) -> Duration {
        Duration::from_millis(self.outcome_poll_ms)
    }

    /// Single-place wait as a `Duration`.
    #[must_use]
    pub fn single_place_timeout(&self) -> Duration {
        Duration::from_millis(self.single_place_timeout_ms)
    }

    /// Count-settle wait as a `Duration`.
    #[must_use]
    pub fn count_settle_timeout(&self) -> Duration {
        Duration::from_millis(self.count_settle_timeout_ms)
    }

    /// Retry backoff as a `Duration`.
    #[must_use]
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            outcome_timeout_ms: 30_000,
            outcome_poll_ms: 500,
            single_place_timeout_ms: 60_000,
            settle_min_ms: 2_000,
            settle_max_ms: 3_000,
            count_settle_timeout_ms: 5_000,
            retry_backoff_ms: 2_000,
        }
    }
}

/// How integer coordinate components are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateEncoding {
    /// Integers are fixed-point and divided by `coordinate_scale`
    #[default]
    FixedPoint,
    /// Every number is already in degrees
    Degrees,
}

/// Offsets of the address components inside the address block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddressOffsets {
    /// Neighborhood offset
    pub neighborhood: usize,
    /// Street offset
    pub street: usize,
    /// City offset
    pub city: usize,
    /// Postal code offset
    pub postal_code: usize,
    /// State offset
    pub state: usize,
    /// Country code offset
    pub country_code: usize,
}

impl Default for AddressOffsets {
    fn default() -> Self {
        Self {
            neighborhood: 1,
            street: 2,
            city: 3,
            postal_code: 4,
            state: 5,
            country_code: 6,
        }
    }
}

/// Producer wire-format constants.
///
/// Paths are sequences of array offsets walked from the payload root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WireLayout {
    /// Label of the producer layout these constants describe
    pub version: String,
    /// Top-level field holding the string-encoded payload
    pub wrapper_field: String,
    /// Anti-hijacking prefix preceding JSON text
    pub guard_prefix: String,
    /// Inert comment appended to some bodies
    pub trailing_marker: String,
    /// Results per page
    pub page_size: u32,
    /// Depth bound of the structural candidate search
    pub max_search_depth: usize,
    /// A candidate array must be longer than this
    pub min_candidate_len: usize,
    /// Slot holding the coordinate block
    pub coordinate_slot: usize,
    /// Latitude offset inside the coordinate block
    pub lat_index: usize,
    /// Longitude offset inside the coordinate block
    pub lng_index: usize,
    /// Encoding of integer coordinate components
    pub coordinate_encoding: CoordinateEncoding,
    /// Divisor turning fixed-point integer coordinates into degrees
    pub coordinate_scale: f64,
    /// Slots tried in order for the stable id
    pub id_slots: Vec<usize>,
    /// Slot of the title
    pub title_slot: usize,
    /// Slot of the category list
    pub category_slot: usize,
    /// Path to the website URL
    pub website_path: Vec<usize>,
    /// Path to the address block
    pub address_path: Vec<usize>,
    /// Path to the advertisement list in search payloads
    pub ads_path: Vec<usize>,
    /// Path to the place value in detail-preview payloads
    pub detail_place_path: Vec<usize>,
    /// Offsets inside the address block
    pub address_offsets: AddressOffsets,
}

impl Default for WireLayout {
    fn default() -> Self {
        Self {
            version: "2024-06".to_string(),
            wrapper_field: "d".to_string(),
            guard_prefix: ")]}'".to_string(),
            trailing_marker: "/*\"\"*/".to_string(),
            page_size: crate::types::PAGE_SIZE,
            max_search_depth: 6,
            min_candidate_len: 30,
            coordinate_slot: 9,
            lat_index: 2,
            lng_index: 3,
            coordinate_encoding: CoordinateEncoding::FixedPoint,
            coordinate_scale: 1e7,
            id_slots: vec![78, 10],
            title_slot: 11,
            category_slot: 13,
            website_path: vec![7, 0],
            address_path: vec![183, 1],
            ads_path: vec![2],
            detail_place_path: vec![6],
            address_offsets: AddressOffsets::default(),
        }
    }
}

/// Selectors used by the DOM fallback extraction strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomFallbackConfig {
    /// Selector matching one result link in the result list
    pub item_selector: String,
    /// Attribute carrying the place URL
    pub link_attribute: String,
    /// Attribute carrying the title
    pub title_attribute: String,
}

impl Default for DomFallbackConfig {
    fn default() -> Self {
        Self {
            item_selector: "div[role=\"feed\"] a[href*=\"/maps/place/\"]".to_string(),
            link_attribute: "href".to_string(),
            title_attribute: "aria-label".to_string(),
        }
    }
}
