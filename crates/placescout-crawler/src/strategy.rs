//! Record extraction strategies a session can switch between.
//!
//! The wire strategy consumes decoded network responses; the DOM strategy
//! scrapes the rendered result list and is the last resort when the wire
//! format yields nothing.

use crate::error::{CrawlError, DecodeError, SessionError};
use crate::feed::ResponseReceiver;
use async_trait::async_trait;
use placescout_core::{rank_for, DomFallbackConfig, LatLng, PlaceId, PlaceRecord, PAGE_SIZE};
use placescout_transport::{PageTransport, ResponseKind};
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::OnceLock;
use tokio::sync::mpsc::error::TryRecvError;

/// Everything a strategy gathered since the previous harvest.
#[derive(Debug, Default)]
pub struct Harvest {
    /// Records in arrival order
    pub records: Vec<PlaceRecord>,
    /// Hard decode failures, with the page index of the failing response
    pub errors: Vec<(u32, DecodeError)>,
    /// Candidates dropped for lack of an id
    pub skipped_metadata: usize,
    /// Detail-preview responses seen
    pub detail_responses: usize,
    /// Non-fatal decoder notes (truncated search, malformed ads block)
    pub diagnostics: Vec<String>,
}

/// Source of records for one session.
#[async_trait]
pub trait ExtractionStrategy: Send {
    /// Short label used in logs and reports
    fn name(&self) -> &'static str;

    /// Collect whatever is available now. Never waits for new data.
    async fn harvest(&mut self, page: &dyn PageTransport) -> Result<Harvest, SessionError>;
}

/// Drains decoded responses delivered through a [`ResponseFeed`](crate::feed::ResponseFeed).
pub struct WireStrategy {
    rx: ResponseReceiver,
}

impl WireStrategy {
    /// Wrap the receiving end of a session's response feed.
    pub fn new(rx: ResponseReceiver) -> Self {
        Self { rx }
    }
}

#[async_trait]
impl ExtractionStrategy for WireStrategy {
    fn name(&self) -> &'static str {
        "wire"
    }

    async fn harvest(&mut self, _page: &dyn PageTransport) -> Result<Harvest, SessionError> {
        let mut harvest = Harvest::default();
        loop {
            match self.rx.try_recv() {
                Ok(decoded) => {
                    if decoded.kind == ResponseKind::DetailPreview {
                        harvest.detail_responses += 1;
                    }
                    match decoded.result {
                        Ok(batch) => {
                            harvest.skipped_metadata += batch.skipped_metadata;
                            harvest.records.extend(batch.records);
                            harvest.diagnostics.extend(batch.diagnostics);
                        }
                        Err(e) => harvest.errors.push((decoded.page_index, e)),
                    }
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        Ok(harvest)
    }
}

/// Scrapes place links out of the rendered result list.
///
/// Links carry the id as `!1s<id>` and coordinates as `!3d<lat>!4d<lng>`.
/// Records have no address or category metadata.
#[derive(Debug, Clone)]
pub struct DomStrategy {
    config: DomFallbackConfig,
}

impl DomStrategy {
    /// Validate the configured selector up front.
    pub fn new(config: DomFallbackConfig) -> Result<Self, CrawlError> {
        Selector::parse(&config.item_selector).map_err(|e| CrawlError::InvalidSelector {
            selector: config.item_selector.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self { config })
    }

    /// Parse one snapshot of the result list, in document order.
    pub fn parse(&self, html: &str) -> Result<Harvest, CrawlError> {
        let item_selector =
            Selector::parse(&self.config.item_selector).map_err(|e| CrawlError::InvalidSelector {
                selector: self.config.item_selector.clone(),
                reason: e.to_string(),
            })?;
        let document = Html::parse_document(html);

        let mut harvest = Harvest::default();
        let mut seen = HashSet::new();
        for element in document.select(&item_selector) {
            let Some(link) = element.value().attr(&self.config.link_attribute) else {
                harvest.skipped_metadata += 1;
                continue;
            };
            let Some(id) = id_from_link(link) else {
                harvest.skipped_metadata += 1;
                continue;
            };
            if !seen.insert(id.clone()) {
                continue;
            }

            let title = element
                .value()
                .attr(&self.config.title_attribute)
                .map(str::to_string)
                .or_else(|| Some(element.text().collect::<String>()))
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty());

            let rank = rank_for(1, harvest.records.len(), PAGE_SIZE);
            harvest.records.push(PlaceRecord {
                id,
                title,
                coordinates: coordinates_from_link(link),
                address: None,
                categories: Vec::new(),
                website: None,
                is_advertisement: false,
                rank,
            });
        }
        Ok(harvest)
    }
}

#[async_trait]
impl ExtractionStrategy for DomStrategy {
    fn name(&self) -> &'static str {
        "dom"
    }

    async fn harvest(&mut self, page: &dyn PageTransport) -> Result<Harvest, SessionError> {
        let html = page.result_list_html().await?;
        Ok(self.parse(&html)?)
    }
}

fn id_from_link(link: &str) -> Option<PlaceId> {
    static ID_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = ID_REGEX.get_or_init(|| Regex::new(r"!1s([^!?&#/]+)").expect("valid regex"));

    let raw = regex.captures(link)?.get(1)?.as_str();
    let (decoded, _) = url::form_urlencoded::parse(raw.as_bytes()).next()?;
    PlaceId::new(decoded.into_owned()).ok()
}

fn coordinates_from_link(link: &str) -> Option<LatLng> {
    static COORD_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = COORD_REGEX
        .get_or_init(|| Regex::new(r"!3d(-?\d+(?:\.\d+)?)!4d(-?\d+(?:\.\d+)?)").expect("valid regex"));

    let caps = regex.captures(link)?;
    let lat = caps.get(1)?.as_str().parse().ok()?;
    let lng = caps.get(2)?.as_str().parse().ok()?;
    LatLng::new(lat, lng).ok()
}
