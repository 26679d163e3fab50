//! State shared by every session of one run.

use crate::budget::BudgetTracker;
use crate::cache::{CoordinateCache, ExportDedup};
use placescout_core::CrawlConfig;

/// Caches and counters passed explicitly to each session.
#[derive(Debug, Default)]
pub struct SharedContext {
    pub coordinates: CoordinateCache,
    pub budget: BudgetTracker,
    pub export_seen: ExportDedup,
}

impl SharedContext {
    pub fn new(budget: BudgetTracker) -> Self {
        Self {
            coordinates: CoordinateCache::new(),
            budget,
            export_seen: ExportDedup::new(),
        }
    }

    /// Budget limits come from the crawl section.
    pub fn from_config(config: &CrawlConfig) -> Self {
        Self::new(BudgetTracker::new(
            config.max_places_per_search,
            config.max_places_total,
        ))
    }
}
