//! Captured responses handed over by the transport.

use placescout_core::PAGE_SIZE;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Which endpoint produced a captured response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResponseKind {
    /// One batch of search results
    SearchPage,
    /// Preview payload of a single place
    DetailPreview,
}

impl ResponseKind {
    /// Classify a request URL; `None` for responses the crawler ignores.
    pub fn from_request_url(raw: &str) -> Option<Self> {
        let url = url::Url::parse(raw).ok()?;
        let path = url.path();
        if path.contains("/preview/place") {
            Some(Self::DetailPreview)
        } else if path.ends_with("/search") {
            Some(Self::SearchPage)
        } else {
            None
        }
    }
}

/// Raw response body tagged with its kind and page index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireResponse {
    /// Raw body bytes as received
    pub body: Vec<u8>,
    /// Endpoint kind
    pub kind: ResponseKind,
    /// 1-based page index parsed from the request
    pub page_index: u32,
}

impl WireResponse {
    /// Create a response with an explicit kind and page index.
    pub fn new(body: impl Into<Vec<u8>>, kind: ResponseKind, page_index: u32) -> Self {
        Self {
            body: body.into(),
            kind,
            page_index: page_index.max(1),
        }
    }

    /// Build a response from the request URL that produced it.
    ///
    /// Returns `None` when the URL belongs to an endpoint the crawler ignores.
    pub fn from_request(request_url: &str, body: impl Into<Vec<u8>>) -> Option<Self> {
        let kind = ResponseKind::from_request_url(request_url)?;
        let page_index = page_index_from_request(request_url);
        tracing::trace!(?kind, page_index, "captured response");
        Some(Self::new(body, kind, page_index))
    }
}

/// Page index encoded in a search request's `pb` parameter.
///
/// The `!8i<offset>` token carries the result offset; the page is
/// `offset / PAGE_SIZE + 1`. Requests without the token are page 1.
pub fn page_index_from_request(raw: &str) -> u32 {
    static OFFSET_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = OFFSET_REGEX.get_or_init(|| Regex::new(r"!8i(\d+)").expect("valid regex"));

    let Ok(url) = url::Url::parse(raw) else {
        return 1;
    };

    url.query_pairs()
        .find(|(name, _)| name == "pb")
        .and_then(|(_, pb)| {
            regex
                .captures(&pb)
                .and_then(|caps| caps.get(1))
                .and_then(|m| m.as_str().parse::<u32>().ok())
        })
        .map_or(1, |offset| offset / PAGE_SIZE + 1)
}
