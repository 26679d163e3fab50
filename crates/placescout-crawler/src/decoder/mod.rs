//! Wire decoder for the producer's nested-array response format.
//!
//! Decoding is a pure function of the body, its [`ResponseKind`] and page
//! index. Each stage falls back to the next before giving up:
//!
//! 1. strip the trailing inert marker and the anti-hijacking guard
//! 2. reject empty bodies and HTML documents up front
//! 3. parse, re-strip and parse, then parse as escaped string content
//! 4. unwrap the string-encoded payload held by the wrapper field, if any
//! 5. detail previews: read the place at a fixed path
//! 6. search pages: read advertisements, then search the tree for places
//!
//! A payload with no places is a successful, empty batch.

mod envelope;
mod extract;
mod search;

use crate::error::DecodeError;
use extract::{extract_fields, value_at, PlaceFields};
use placescout_core::{rank_for, PlaceId, PlaceRecord, WireLayout};
use placescout_transport::{ResponseKind, WireResponse};
use serde_json::Value;
use std::collections::HashSet;

/// Outcome of decoding one response.
pub type DecodeResult = std::result::Result<DecodedBatch, DecodeError>;

/// Records decoded from one response, in input order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedBatch {
    /// Records with ranks assigned from page index and offset
    pub records: Vec<PlaceRecord>,
    /// Place-shaped values dropped because they had no id
    pub skipped_metadata: usize,
    /// Repeats of an id already decoded from the same response
    pub duplicates_dropped: usize,
    /// Non-fatal notes about the payload
    pub diagnostics: Vec<String>,
}

impl DecodedBatch {
    /// True when no record was decoded.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Decoder configured with one producer layout.
#[derive(Debug, Clone, Default)]
pub struct WireDecoder {
    layout: WireLayout,
}

impl WireDecoder {
    pub fn new(layout: WireLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &WireLayout {
        &self.layout
    }

    /// Decode a captured response.
    pub fn decode_response(&self, response: &WireResponse) -> DecodeResult {
        self.decode(&response.body, response.kind, response.page_index)
    }

    /// Decode a raw body of the given kind fetched as page `page_index`.
    pub fn decode(&self, body: &[u8], kind: ResponseKind, page_index: u32) -> DecodeResult {
        let text = String::from_utf8_lossy(body);
        let cleaned = envelope::strip_artifacts(&text, &self.layout);

        if cleaned.is_empty() {
            return Err(DecodeError::EmptyBody);
        }
        if looks_like_html(cleaned) {
            return Err(DecodeError::NotJson { raw: body.to_vec() });
        }

        let unparseable = |detail: String| DecodeError::Unparseable {
            detail,
            raw: body.to_vec(),
        };
        let tree = envelope::parse_tree(cleaned, &self.layout).map_err(unparseable)?;
        let payload = envelope::locate_payload(tree, &self.layout).map_err(unparseable)?;

        let batch = match kind {
            ResponseKind::DetailPreview => self.decode_detail(&payload, page_index),
            ResponseKind::SearchPage => self.decode_search(&payload, page_index),
        };

        tracing::debug!(
            ?kind,
            page_index,
            records = batch.records.len(),
            skipped = batch.skipped_metadata,
            duplicates = batch.duplicates_dropped,
            layout = %self.layout.version,
            "decoded response"
        );
        Ok(batch)
    }

    fn decode_detail(&self, payload: &Value, page_index: u32) -> DecodedBatch {
        let mut builder = BatchBuilder::new(page_index, self.layout.page_size);
        match value_at(payload, &self.layout.detail_place_path)
            .and_then(|value| search::as_candidate(value, &self.layout))
        {
            Some(candidate) => builder.push(extract_fields(candidate, &self.layout), false),
            None => tracing::debug!("detail preview carries no place"),
        }
        builder.finish()
    }

    fn decode_search(&self, payload: &Value, page_index: u32) -> DecodedBatch {
        let mut builder = BatchBuilder::new(page_index, self.layout.page_size);

        match value_at(payload, &self.layout.ads_path) {
            Some(Value::Array(entries)) => {
                for entry in entries {
                    if let Some(candidate) = search::as_candidate(entry, &self.layout) {
                        builder.push(extract_fields(candidate, &self.layout), true);
                    }
                }
            }
            Some(_) => builder
                .diagnostics
                .push("advertisement block is not an array".to_string()),
            None => {}
        }

        let found = search::find_candidates(payload, &self.layout);
        if found.truncated {
            builder.diagnostics.push(format!(
                "structural search stopped at depth {}",
                self.layout.max_search_depth
            ));
        }
        for candidate in found.candidates {
            builder.push(extract_fields(candidate, &self.layout), false);
        }

        builder.finish()
    }
}

fn looks_like_html(text: &str) -> bool {
    let head: String = text.chars().take(16).collect::<String>().to_ascii_lowercase();
    head.starts_with("<!doctype") || head.starts_with("<html")
}

/// Collects records in order, dropping id-less candidates and repeated ids.
struct BatchBuilder {
    page_index: u32,
    page_size: u32,
    seen: HashSet<PlaceId>,
    records: Vec<PlaceRecord>,
    skipped_metadata: usize,
    duplicates_dropped: usize,
    diagnostics: Vec<String>,
}

impl BatchBuilder {
    fn new(page_index: u32, page_size: u32) -> Self {
        Self {
            page_index,
            page_size,
            seen: HashSet::new(),
            records: Vec::new(),
            skipped_metadata: 0,
            duplicates_dropped: 0,
            diagnostics: Vec::new(),
        }
    }

    fn push(&mut self, fields: PlaceFields, is_advertisement: bool) {
        let Some(id) = fields.id else {
            self.skipped_metadata += 1;
            return;
        };
        if !self.seen.insert(id.clone()) {
            self.duplicates_dropped += 1;
            return;
        }
        let rank = rank_for(self.page_index, self.records.len(), self.page_size);
        self.records.push(PlaceRecord {
            id,
            title: fields.title,
            coordinates: fields.coordinates,
            address: fields.address,
            categories: fields.categories,
            website: fields.website,
            is_advertisement,
            rank,
        });
    }

    fn finish(mut self) -> DecodedBatch {
        if self.skipped_metadata > 0 {
            self.diagnostics.push(format!(
                "{} place-shaped values without an id skipped",
                self.skipped_metadata
            ));
        }
        DecodedBatch {
            records: self.records,
            skipped_metadata: self.skipped_metadata,
            duplicates_dropped: self.duplicates_dropped,
            diagnostics: self.diagnostics,
        }
    }
}
