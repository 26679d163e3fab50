#![allow(dead_code)]

use async_trait::async_trait;
use placescout_core::AppConfig;
use placescout_crawler::ResponseFeed;
use placescout_transport::{PageSignals, PageTransport, ResponseKind, TransportError, WireResponse};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

pub const PLACE_LEN: usize = 190;

/// A place array in the producer layout: fixed-point coordinates in slot 9,
/// title in 11, categories in 13, id in 78, address block in 183.
pub fn place(id: &str, lat: f64, lng: f64) -> Value {
    let mut items = vec![Value::Null; PLACE_LEN];
    #[allow(clippy::cast_possible_truncation)]
    let fixed = |deg: f64| (deg * 1e7).round() as i64;
    items[9] = json!([null, null, fixed(lat), fixed(lng)]);
    items[11] = json!(format!("Place {id}"));
    items[13] = json!(["Restaurant"]);
    items[78] = json!(id);
    items[183] = json!([null, [null, "Downtown", "1 Main St", "Minneapolis", "55401", "MN", "US"]]);
    Value::Array(items)
}

/// A place without inline coordinates.
pub fn place_without_coordinates(id: &str) -> Value {
    let mut value = place(id, 0.0, 0.0);
    value[9] = json!([null, null]);
    value
}

/// Places spread around downtown Minneapolis.
pub fn places(ids: &[&str]) -> Vec<Value> {
    ids.iter()
        .enumerate()
        .map(|(i, id)| {
            #[allow(clippy::cast_precision_loss)]
            let offset = i as f64 * 0.001;
            place(id, 44.97 + offset, -93.26 - offset)
        })
        .collect()
}

/// Guarded, string-wrapped search page body with a trailing marker.
pub fn search_body(places: &[Value]) -> Vec<u8> {
    let results: Vec<Value> = places.iter().map(|p| json!([null, p])).collect();
    let payload = json!([["query", results], null, null]);
    let inner = format!(")]}}'\n{payload}");
    format!("{}/*\"\"*/", json!({"c": 0, "d": inner})).into_bytes()
}

pub fn search_response(page_index: u32, places: &[Value]) -> WireResponse {
    WireResponse::new(search_body(places), ResponseKind::SearchPage, page_index)
}

pub fn detail_response(place: &Value) -> WireResponse {
    let payload = json!([null, null, null, null, null, null, place]);
    WireResponse::new(format!(")]}}'\n{payload}").into_bytes(), ResponseKind::DetailPreview, 1)
}

/// Config with millisecond timings so sessions finish quickly.
pub fn test_config() -> AppConfig {
    placescout_core::telemetry::init_tracing();
    let mut config = AppConfig::default();
    config.timing.outcome_timeout_ms = 100;
    config.timing.outcome_poll_ms = 1;
    config.timing.single_place_timeout_ms = 50;
    config.timing.settle_min_ms = 0;
    config.timing.settle_max_ms = 0;
    config.timing.count_settle_timeout_ms = 5;
    config.timing.retry_backoff_ms = 1;
    config
}

pub const START_URL: &str = "https://www.google.com/maps/search/pizza/@44.9778,-93.265,15z";

/// Result page that replays a fixed script.
///
/// The first scripted batch is delivered when results are revealed, each
/// later batch on the matching scroll.
pub struct ScriptedPage {
    feed: ResponseFeed,
    script: Mutex<VecDeque<Vec<WireResponse>>>,
    signals: PageSignals,
    end_of_list_after: Option<u32>,
    urls: Vec<String>,
    list_html: String,
    scrolls: AtomicU32,
    reveals: AtomicU32,
    closed: bool,
}

impl ScriptedPage {
    pub fn new(feed: ResponseFeed) -> Self {
        Self {
            feed,
            script: Mutex::new(VecDeque::new()),
            signals: PageSignals {
                has_results: true,
                ..PageSignals::default()
            },
            end_of_list_after: None,
            urls: vec![START_URL.to_string()],
            list_html: String::new(),
            scrolls: AtomicU32::new(0),
            reveals: AtomicU32::new(0),
            closed: false,
        }
    }

    pub fn then(self, batch: Vec<WireResponse>) -> Self {
        self.script.lock().unwrap().push_back(batch);
        self
    }

    pub fn with_signals(mut self, signals: PageSignals) -> Self {
        self.signals = signals;
        self
    }

    pub fn end_of_list_after(mut self, scrolls: u32) -> Self {
        self.end_of_list_after = Some(scrolls);
        self
    }

    /// URL shown after 0, 1, 2... scrolls; the last one repeats.
    pub fn with_urls(mut self, urls: &[&str]) -> Self {
        self.urls = urls.iter().map(|u| (*u).to_string()).collect();
        self
    }

    pub fn with_list_html(mut self, html: &str) -> Self {
        self.list_html = html.to_string();
        self
    }

    /// The page was closed under the session; every action fails.
    pub fn closed(mut self) -> Self {
        self.closed = true;
        self
    }

    pub fn scrolls(&self) -> u32 {
        self.scrolls.load(Ordering::SeqCst)
    }

    pub fn reveals(&self) -> u32 {
        self.reveals.load(Ordering::SeqCst)
    }

    async fn deliver_next(&self) -> Result<(), TransportError> {
        let batch = self.script.lock().unwrap().pop_front().unwrap_or_default();
        for response in batch {
            self.feed
                .deliver(&response)
                .await
                .map_err(|e| TransportError::ActionFailed(e.to_string()))?;
        }
        Ok(())
    }
}

#[async_trait]
impl PageTransport for ScriptedPage {
    async fn reveal_results(&self) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::PageClosed);
        }
        self.reveals.fetch_add(1, Ordering::SeqCst);
        self.deliver_next().await
    }

    async fn scroll_results(&self) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::PageClosed);
        }
        self.scrolls.fetch_add(1, Ordering::SeqCst);
        self.deliver_next().await
    }

    async fn signals(&self) -> Result<PageSignals, TransportError> {
        let mut signals = self.signals;
        if let Some(after) = self.end_of_list_after {
            signals.end_of_list = self.scrolls() >= after;
        }
        Ok(signals)
    }

    async fn current_url(&self) -> Result<String, TransportError> {
        let index = (self.scrolls() as usize).min(self.urls.len() - 1);
        Ok(self.urls[index].clone())
    }

    async fn visible_result_count(&self) -> Result<usize, TransportError> {
        Ok(self.scrolls() as usize * 20)
    }

    async fn result_list_html(&self) -> Result<String, TransportError> {
        Ok(self.list_html.clone())
    }

    async fn screenshot(&self) -> Result<Vec<u8>, TransportError> {
        Ok(b"\x89PNG".to_vec())
    }
}
