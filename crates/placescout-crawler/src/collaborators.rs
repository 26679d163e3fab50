//! Seams to the external request frontier, results sink and diagnostics store.

use crate::error::{CrawlError, Result};
use async_trait::async_trait;
use chrono::Utc;
use placescout_core::{Address, LatLng, PlaceId, PlaceRecord, SearchKey};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Metadata attached to a frontier request for one place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceMetadata {
    pub rank: u32,
    pub coordinates: Option<LatLng>,
    pub address: Option<Address>,
    pub categories: Vec<String>,
    pub is_advertisement: bool,
    pub search_key: SearchKey,
    pub title: Option<String>,
}

/// Request to fetch a place's detail page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnqueueRequest {
    pub url: String,
    /// Uniqueness key, always the place id
    pub unique_key: String,
    /// Front-of-queue priority
    pub forefront: bool,
    pub metadata: PlaceMetadata,
}

impl EnqueueRequest {
    /// Build a front-of-queue request for `record`. Cached coordinates fill
    /// in when the record carries none.
    pub fn for_record(record: &PlaceRecord, coordinates: Option<LatLng>, search_key: &SearchKey) -> Self {
        Self {
            url: record.url(),
            unique_key: record.id.as_str().to_string(),
            forefront: true,
            metadata: PlaceMetadata {
                rank: record.rank,
                coordinates: record.coordinates.or(coordinates),
                address: record.address.clone(),
                categories: record.categories.clone(),
                is_advertisement: record.is_advertisement,
                search_key: search_key.clone(),
                title: record.title.clone(),
            },
        }
    }
}

/// Whether the frontier took the request as new.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Added,
    /// The uniqueness key was already known
    Duplicate,
}

/// One exported place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushItem {
    pub url: String,
    pub id: PlaceId,
    pub search_key: SearchKey,
}

/// External queue of pending fetch targets.
#[async_trait]
pub trait Frontier: Send + Sync {
    async fn enqueue(&self, request: EnqueueRequest) -> Result<EnqueueOutcome>;
}

/// External export destination.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn push(&self, item: PushItem) -> Result<()>;
}

/// Blob store for raw bodies and screenshots kept for inspection.
#[async_trait]
pub trait DiagnosticsStore: Send + Sync {
    async fn store(&self, key: &str, content_type: &str, body: &[u8]) -> Result<()>;
}

/// Generate a unique diagnostics key such as `decode-error-20240611T101500-1a2b3c4d`.
pub fn diagnostics_key(prefix: &str) -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{prefix}-{}-{}", Utc::now().format("%Y%m%dT%H%M%S"), &id[..8])
}

/// The collaborators one session talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub frontier: Arc<dyn Frontier>,
    pub sink: Arc<dyn ResultSink>,
    pub diagnostics: Arc<dyn DiagnosticsStore>,
}

impl Collaborators {
    pub fn new(
        frontier: Arc<dyn Frontier>,
        sink: Arc<dyn ResultSink>,
        diagnostics: Arc<dyn DiagnosticsStore>,
    ) -> Self {
        Self {
            frontier,
            sink,
            diagnostics,
        }
    }

    /// Store `body` under a fresh key. Failures are logged, not raised.
    pub async fn store_diagnostic(&self, prefix: &str, content_type: &str, body: &[u8]) -> Option<String> {
        let key = diagnostics_key(prefix);
        match self.diagnostics.store(&key, content_type, body).await {
            Ok(()) => Some(key),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "failed to store diagnostics blob");
                None
            }
        }
    }

    /// In-memory collaborators, returned alongside the concrete stores.
    pub fn in_memory() -> (Self, Arc<MemoryFrontier>, Arc<MemorySink>, Arc<MemoryDiagnostics>) {
        let frontier = Arc::new(MemoryFrontier::new());
        let sink = Arc::new(MemorySink::new());
        let diagnostics = Arc::new(MemoryDiagnostics::new());
        let collaborators = Self::new(frontier.clone(), sink.clone(), diagnostics.clone());
        (collaborators, frontier, sink, diagnostics)
    }
}

/// Frontier that remembers uniqueness keys in memory.
#[derive(Debug, Default)]
pub struct MemoryFrontier {
    keys: Mutex<HashSet<String>>,
    requests: Mutex<Vec<EnqueueRequest>>,
}

impl MemoryFrontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests accepted as new, in order.
    pub fn requests(&self) -> Vec<EnqueueRequest> {
        self.requests.lock().expect("acquire frontier lock").clone()
    }

    pub fn len(&self) -> usize {
        self.requests.lock().expect("acquire frontier lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Frontier for MemoryFrontier {
    async fn enqueue(&self, request: EnqueueRequest) -> Result<EnqueueOutcome> {
        let added = self
            .keys
            .lock()
            .expect("acquire frontier lock")
            .insert(request.unique_key.clone());
        if !added {
            return Ok(EnqueueOutcome::Duplicate);
        }
        self.requests.lock().expect("acquire frontier lock").push(request);
        Ok(EnqueueOutcome::Added)
    }
}

/// Sink collecting pushed items in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    items: Mutex<Vec<PushItem>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> Vec<PushItem> {
        self.items.lock().expect("acquire sink lock").clone()
    }
}

#[async_trait]
impl ResultSink for MemorySink {
    async fn push(&self, item: PushItem) -> Result<()> {
        self.items.lock().expect("acquire sink lock").push(item);
        Ok(())
    }
}

/// A stored diagnostics blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub content_type: String,
    pub body: Vec<u8>,
}

/// Diagnostics store keeping blobs in memory.
#[derive(Debug, Default)]
pub struct MemoryDiagnostics {
    blobs: Mutex<HashMap<String, StoredBlob>>,
}

impl MemoryDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<StoredBlob> {
        self.blobs.lock().expect("acquire diagnostics lock").get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self
            .blobs
            .lock()
            .expect("acquire diagnostics lock")
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl DiagnosticsStore for MemoryDiagnostics {
    async fn store(&self, key: &str, content_type: &str, body: &[u8]) -> Result<()> {
        let mut blobs = self.blobs.lock().expect("acquire diagnostics lock");
        if blobs.contains_key(key) {
            return Err(CrawlError::Diagnostics(format!("key already stored: {key}")));
        }
        blobs.insert(
            key.to_string(),
            StoredBlob {
                content_type: content_type.to_string(),
                body: body.to_vec(),
            },
        );
        Ok(())
    }
}
