//! Cross-session dedup caches.

use chrono::{DateTime, Utc};
use placescout_core::{LatLng, PlaceId, SearchKey};
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

/// Last known location of a place.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateEntry {
    pub coordinates: LatLng,
    /// Search that last reported the coordinates
    pub last_seen_search_key: SearchKey,
    pub updated_at: DateTime<Utc>,
}

/// Process-wide place id to coordinates cache.
///
/// Later non-null observations overwrite earlier ones; a null observation
/// never erases a known location.
#[derive(Debug, Default)]
pub struct CoordinateCache {
    entries: RwLock<HashMap<PlaceId, CoordinateEntry>>,
}

impl CoordinateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &PlaceId) -> Option<LatLng> {
        self.entry(id).map(|entry| entry.coordinates)
    }

    pub fn entry(&self, id: &PlaceId) -> Option<CoordinateEntry> {
        self.entries
            .read()
            .expect("acquire read lock on coordinates")
            .get(id)
            .cloned()
    }

    pub fn put(&self, id: &PlaceId, coordinates: Option<LatLng>, search_key: &SearchKey) {
        let Some(coordinates) = coordinates else {
            return;
        };
        self.entries
            .write()
            .expect("acquire write lock on coordinates")
            .insert(
                id.clone(),
                CoordinateEntry {
                    coordinates,
                    last_seen_search_key: search_key.clone(),
                    updated_at: Utc::now(),
                },
            );
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .expect("acquire read lock on coordinates")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Ids already pushed to the results sink in export mode.
#[derive(Debug, Default)]
pub struct ExportDedup {
    seen: RwLock<HashSet<PlaceId>>,
}

impl ExportDedup {
    pub fn new() -> Self {
        Self::default()
    }

    /// True the first time `id` is seen. The test and the insert are one step.
    pub fn test_and_add(&self, id: &PlaceId) -> bool {
        self.seen
            .write()
            .expect("acquire write lock on export ids")
            .insert(id.clone())
    }

    /// Forget `id`, used when a push did not go through.
    pub fn remove(&self, id: &PlaceId) {
        self.seen
            .write()
            .expect("acquire write lock on export ids")
            .remove(id);
    }

    pub fn contains(&self, id: &PlaceId) -> bool {
        self.seen
            .read()
            .expect("acquire read lock on export ids")
            .contains(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> PlaceId {
        PlaceId::new(s).unwrap()
    }

    fn at(lat: f64, lng: f64) -> LatLng {
        LatLng::new(lat, lng).unwrap()
    }

    #[test]
    fn test_null_never_erases() {
        let cache = CoordinateCache::new();
        let key = SearchKey::new("pizza");
        cache.put(&id("a"), Some(at(1.0, 2.0)), &key);
        cache.put(&id("a"), None, &key);
        assert_eq!(cache.get(&id("a")), Some(at(1.0, 2.0)));
    }

    #[test]
    fn test_last_write_wins() {
        let cache = CoordinateCache::new();
        cache.put(&id("a"), Some(at(1.0, 2.0)), &SearchKey::new("first"));
        cache.put(&id("a"), Some(at(3.0, 4.0)), &SearchKey::new("second"));
        let entry = cache.entry(&id("a")).unwrap();
        assert_eq!(entry.coordinates, at(3.0, 4.0));
        assert_eq!(entry.last_seen_search_key.as_str(), "second");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_null_on_unknown_id_stores_nothing() {
        let cache = CoordinateCache::new();
        cache.put(&id("a"), None, &SearchKey::new("k"));
        assert!(cache.is_empty());
        assert_eq!(cache.get(&id("a")), None);
    }

    #[test]
    fn test_export_dedup() {
        let dedup = ExportDedup::new();
        assert!(dedup.test_and_add(&id("a")));
        assert!(!dedup.test_and_add(&id("a")));
        assert!(dedup.test_and_add(&id("b")));
        dedup.remove(&id("a"));
        assert!(!dedup.contains(&id("a")));
        assert!(dedup.test_and_add(&id("a")));
    }
}
