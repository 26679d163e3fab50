use placescout_transport::TransportError;
use std::time::Duration;
use thiserror::Error;

/// Hard failure to decode one response body.
///
/// Every variant can hand back the raw body so it can be kept for diagnostics.
#[derive(Debug, Clone, Error)]
pub enum DecodeError {
    #[error("empty response body")]
    EmptyBody,

    #[error("response body is an HTML document, not JSON")]
    NotJson { raw: Vec<u8> },

    #[error("unparseable response body: {detail}")]
    Unparseable { detail: String, raw: Vec<u8> },
}

impl DecodeError {
    /// Raw body that failed to decode (empty for `EmptyBody`).
    pub fn raw_body(&self) -> &[u8] {
        match self {
            Self::EmptyBody => &[],
            Self::NotJson { raw } | Self::Unparseable { raw, .. } => raw,
        }
    }
}

/// Errors raised by collaborators and session setup.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("frontier rejected request: {0}")]
    Frontier(String),

    #[error("results sink failed: {0}")]
    Sink(String),

    #[error("diagnostics store failed: {0}")]
    Diagnostics(String),

    #[error("invalid DOM selector {selector}: {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("response channel closed")]
    ChannelClosed,

    #[error("response channel full, dropped response for page {page_index}")]
    ChannelFull { page_index: u32 },

    #[error("invalid geofence: {0}")]
    InvalidGeofence(String),
}

/// Failure that ends a search session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("decode failed on page {page_index}: {error}")]
    Decode {
        page_index: u32,
        error: DecodeError,
        /// Key under which the raw body was stored, when storing succeeded
        diagnostics_key: Option<String>,
    },

    #[error("no page outcome observed within {waited:?}")]
    NoOutcome { waited: Duration },

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("crawl error: {0}")]
    Crawl(#[from] CrawlError),
}

impl SessionError {
    /// Whether the page should be fetched again by the caller.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Decode { .. } | Self::NoOutcome { .. } | Self::Transport(_) => true,
            Self::Crawl(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, CrawlError>;
