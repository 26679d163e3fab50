//! Record model shared across placescout.
//!
//! A [`PlaceRecord`] is one extracted location. Records are built by the wire
//! decoder (or the DOM fallback) and only read afterwards.

use crate::error::ScoutError;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::form_urlencoded;

/// Fixed batch size the producer returns per page of results.
pub const PAGE_SIZE: u32 = 20;

/// Compute the 1-based rank of a result from its page and in-page offset.
///
/// `rank = (page_index - 1) * page_size + offset + 1`. A `page_index` of 0 is
/// treated as page 1.
#[must_use]
pub fn rank_for(page_index: u32, offset: usize, page_size: u32) -> u32 {
    let offset = u32::try_from(offset).unwrap_or(u32::MAX);
    page_index
        .saturating_sub(1)
        .saturating_mul(page_size)
        .saturating_add(offset)
        .saturating_add(1)
}

/// Stable place identifier used for dedup and as the frontier uniqueness key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlaceId(String);

impl PlaceId {
    /// Create a new `PlaceId`, trimming surrounding whitespace.
    ///
    /// # Errors
    /// Returns error if the id is empty after trimming.
    pub fn new(id: impl Into<String>) -> Result<Self, ScoutError> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(ScoutError::Validation(
                "invalid place ID: must not be empty".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Key identifying one search (query + location) across sessions and retries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SearchKey(String);

impl SearchKey {
    /// Create a new search key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SearchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SearchKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A latitude/longitude pair in floating degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    /// Latitude in degrees, -90..=90
    pub lat: f64,
    /// Longitude in degrees, -180..=180
    pub lng: f64,
}

impl LatLng {
    /// Create a coordinate pair, rejecting values outside the valid degree range.
    ///
    /// # Errors
    /// Returns error if either component is not finite or out of range.
    pub fn new(lat: f64, lng: f64) -> Result<Self, ScoutError> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(ScoutError::Validation(format!(
                "latitude out of range: {lat}"
            )));
        }
        if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
            return Err(ScoutError::Validation(format!(
                "longitude out of range: {lng}"
            )));
        }
        Ok(Self { lat, lng })
    }
}

/// Structured address breakdown. Every component is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// Neighborhood or district
    pub neighborhood: Option<String>,
    /// Street and house number
    pub street: Option<String>,
    /// City or locality
    pub city: Option<String>,
    /// Postal code
    pub postal_code: Option<String>,
    /// State or region
    pub state: Option<String>,
    /// ISO country code
    pub country_code: Option<String>,
}

impl Address {
    /// True when no component is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.neighborhood.is_none()
            && self.street.is_none()
            && self.city.is_none()
            && self.postal_code.is_none()
            && self.state.is_none()
            && self.country_code.is_none()
    }
}

/// One extracted location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceRecord {
    /// Stable identifier
    pub id: PlaceId,
    /// Display title, when the producer supplied one
    pub title: Option<String>,
    /// Inline coordinates, when the producer supplied them
    pub coordinates: Option<LatLng>,
    /// Structured address
    pub address: Option<Address>,
    /// Categories in producer order
    pub categories: Vec<String>,
    /// Website URL
    pub website: Option<String>,
    /// Sponsored result
    pub is_advertisement: bool,
    /// 1-based position in the full result set, see [`rank_for`]
    pub rank: u32,
}

impl PlaceRecord {
    /// URL of the place detail page used for frontier requests and sink items.
    #[must_use]
    pub fn url(&self) -> String {
        let query = self.title.as_deref().unwrap_or(self.id.as_str());
        let params = form_urlencoded::Serializer::new(String::new())
            .append_pair("api", "1")
            .append_pair("query", query)
            .append_pair("query_place_id", self.id.as_str())
            .finish();
        format!("{PLACE_SEARCH_URL}?{params}")
    }
}

const PLACE_SEARCH_URL: &str = "https://www.google.com/maps/search/";
