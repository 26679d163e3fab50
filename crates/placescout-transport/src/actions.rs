use crate::error::Result;
use regex::Regex;
use std::sync::OnceLock;

/// Coarse page-state signals reported by the transport.
///
/// The flags are read independently; the session applies its own priority
/// order when several are true at once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageSignals {
    /// The producer rejected the query
    pub bad_query: bool,
    /// The producer found nothing
    pub no_results: bool,
    /// The search redirected straight to one place
    pub single_place: bool,
    /// A result list is present
    pub has_results: bool,
    /// The result list shows its end-of-list marker
    pub end_of_list: bool,
}

/// Page actions and state the session needs from the browser transport.
#[async_trait::async_trait]
pub trait PageTransport: Send + Sync {
    /// Submit the search so that results (or an outcome page) appear
    async fn reveal_results(&self) -> Result<()>;

    /// Scroll the result list to request the next batch
    async fn scroll_results(&self) -> Result<()>;

    /// Read the current page-state signals
    async fn signals(&self) -> Result<PageSignals>;

    /// URL currently shown by the page
    async fn current_url(&self) -> Result<String>;

    /// Number of result entries currently rendered
    async fn visible_result_count(&self) -> Result<usize>;

    /// HTML of the rendered result list
    async fn result_list_html(&self) -> Result<String>;

    /// Screenshot of the page
    async fn screenshot(&self) -> Result<Vec<u8>>;

    /// Zoom level parsed from the current URL
    async fn current_zoom(&self) -> Result<Option<f64>> {
        let url = self.current_url().await?;
        Ok(zoom_from_url(&url))
    }
}

/// Extract the zoom level from a map URL of the form `.../@lat,lng,15z/...`.
pub fn zoom_from_url(raw: &str) -> Option<f64> {
    static ZOOM_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = ZOOM_REGEX.get_or_init(|| {
        Regex::new(r"@-?\d+(?:\.\d+)?,-?\d+(?:\.\d+)?,(\d+(?:\.\d+)?)z").expect("valid regex")
    });

    let url = url::Url::parse(raw).ok()?;
    regex
        .captures(url.path())
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zoom_from_url() {
        assert_eq!(
            zoom_from_url("https://www.google.com/maps/search/pizza/@44.9778,-93.265,14z/data=!3m1"),
            Some(14.0)
        );
        assert_eq!(
            zoom_from_url("https://www.google.com/maps/search/pizza/@-33.86,151.2,12.5z"),
            Some(12.5)
        );
    }

    #[test]
    fn test_zoom_from_url_missing() {
        assert_eq!(zoom_from_url("https://www.google.com/maps/search/pizza"), None);
        assert_eq!(zoom_from_url("not-a-url"), None);
    }
}
