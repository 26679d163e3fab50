//! Per-search session controller.
//!
//! A session reveals the results, waits for the page to settle into one of
//! the known outcomes, then scrolls the result list until a stop condition
//! holds. Records from the active [`ExtractionStrategy`] are filtered and
//! handed to the frontier (enqueue mode) or the results sink (export mode).
//!
//! Stop conditions, checked in order after every harvest:
//!
//! 1. end-of-list signal
//! 2. too many consecutive steps without new records
//! 3. a pending decode error (escalated, not swallowed)
//! 4. budget exhausted for this search or globally
//! 5. zoom drifted out past the configured bound
//! 6. per-page result cap reached
//! 7. the step decoded new records but none was accepted

use crate::collaborators::{Collaborators, EnqueueOutcome, EnqueueRequest, PushItem};
use crate::context::SharedContext;
use crate::error::{DecodeError, SessionError};
use crate::feed::ResponseReceiver;
use crate::geofence::{self, Geofence};
use crate::strategy::{DomStrategy, ExtractionStrategy, WireStrategy};
use placescout_core::{
    AppConfig, CrawlConfig, CrawlMode, DomFallbackConfig, LatLng, PlaceId, PlaceRecord,
    SearchKey, TimingConfig,
};
use placescout_transport::{PageSignals, PageTransport, SettleDelay};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

/// One search to run.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub search_key: SearchKey,
    pub geofence: Option<Arc<Geofence>>,
    /// Overrides the configured mode when set
    pub mode: Option<CrawlMode>,
}

impl SearchRequest {
    pub fn new(search_key: impl Into<SearchKey>) -> Self {
        Self {
            search_key: search_key.into(),
            geofence: None,
            mode: None,
        }
    }

    #[must_use]
    pub fn with_geofence(mut self, geofence: Geofence) -> Self {
        self.geofence = Some(Arc::new(geofence));
        self
    }

    #[must_use]
    pub fn with_mode(mut self, mode: CrawlMode) -> Self {
        self.mode = Some(mode);
        self
    }
}

impl From<SearchKey> for SearchRequest {
    fn from(search_key: SearchKey) -> Self {
        Self::new(search_key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Init,
    AwaitingOutcome,
    SinglePlace,
    Scrolling,
    Terminal,
}

/// How the page resolved after revealing results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOutcome {
    BadQuery,
    NoResults,
    SinglePlace,
    HasResults,
}

impl PageOutcome {
    /// First true signal wins, in priority order.
    pub fn from_signals(signals: PageSignals) -> Option<Self> {
        if signals.bad_query {
            Some(Self::BadQuery)
        } else if signals.no_results {
            Some(Self::NoResults)
        } else if signals.single_place {
            Some(Self::SinglePlace)
        } else if signals.has_results {
            Some(Self::HasResults)
        } else {
            None
        }
    }
}

/// Why a session ended successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    BadQuery,
    NoResults,
    SinglePlace,
    EndOfResults,
    EmptyScrollLimitExceeded,
    BudgetExhausted,
    ZoomDriftExceeded,
    PageCapReached,
    NoNewResultsOnStep,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::BadQuery => "bad query",
            Self::NoResults => "no results",
            Self::SinglePlace => "single place",
            Self::EndOfResults => "end of results",
            Self::EmptyScrollLimitExceeded => "empty scroll limit exceeded",
            Self::BudgetExhausted => "budget exhausted",
            Self::ZoomDriftExceeded => "zoom drift exceeded",
            Self::PageCapReached => "page cap reached",
            Self::NoNewResultsOnStep => "no new results on step",
        };
        f.write_str(label)
    }
}

/// Counters owned by one session.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub page_index: u32,
    /// Distinct records that passed the geofence
    pub total_found: u64,
    pub total_enqueued: u64,
    pub total_pushed: u64,
    pub consecutive_empty_steps: u32,
    /// First undelivered decode failure, with its page index
    pub last_error: Option<(u32, DecodeError)>,
    pub start_zoom: Option<f64>,
    pub current_zoom: Option<f64>,
    pub out_of_polygon: u64,
    pub duplicates: u64,
    pub skipped_metadata: u64,
}

/// Summary of a finished session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub search_key: SearchKey,
    pub termination: Termination,
    pub found: u64,
    pub enqueued: u64,
    pub pushed: u64,
    pub out_of_polygon: u64,
    pub duplicates: u64,
    pub skipped_metadata: u64,
    /// Page index reached
    pub pages: u32,
    pub used_dom_fallback: bool,
}

/// What happened to one harvested record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordFate {
    /// Already handled earlier in this session
    Repeat,
    OutOfPolygon,
    Duplicate,
    OverBudget,
    Accepted,
}

#[derive(Debug, Default, Clone, Copy)]
struct StepTally {
    decoded: usize,
    fresh: usize,
    accepted: usize,
    detail_responses: usize,
}

/// State machine for one search.
pub struct SearchSession {
    page: Arc<dyn PageTransport>,
    strategy: Box<dyn ExtractionStrategy>,
    request: SearchRequest,
    mode: CrawlMode,
    context: Arc<SharedContext>,
    collaborators: Collaborators,
    crawl: CrawlConfig,
    timing: TimingConfig,
    dom: DomFallbackConfig,
    settle: SettleDelay,
    state: SessionState,
    phase: SessionPhase,
    seen: HashSet<PlaceId>,
    used_dom_fallback: bool,
}

impl SearchSession {
    pub fn new(
        page: Arc<dyn PageTransport>,
        responses: ResponseReceiver,
        request: SearchRequest,
        context: Arc<SharedContext>,
        collaborators: Collaborators,
        config: &AppConfig,
    ) -> Self {
        let mode = request.mode.unwrap_or(config.crawl.mode);
        Self {
            page,
            strategy: Box::new(WireStrategy::new(responses)),
            request,
            mode,
            context,
            collaborators,
            crawl: config.crawl.clone(),
            timing: config.timing.clone(),
            dom: config.dom.clone(),
            settle: SettleDelay::new(config.timing.settle_min_ms, config.timing.settle_max_ms),
            state: SessionState {
                page_index: 1,
                ..SessionState::default()
            },
            phase: SessionPhase::Init,
            seen: HashSet::new(),
            used_dom_fallback: false,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Drive the session to termination.
    pub async fn run(mut self) -> Result<SessionReport, SessionError> {
        let result = self.drive().await;
        self.transition(SessionPhase::Terminal);
        let key = &self.request.search_key;
        match result {
            Ok(termination) => {
                info!(
                    search_key = %key,
                    termination = ?termination,
                    found = self.state.total_found,
                    enqueued = self.state.total_enqueued,
                    pushed = self.state.total_pushed,
                    pages = self.state.page_index,
                    "search session finished"
                );
                Ok(self.report(termination))
            }
            Err(e) => {
                warn!(
                    search_key = %key,
                    error = %e,
                    retryable = e.is_retryable(),
                    page_index = self.state.page_index,
                    "search session failed"
                );
                Err(e)
            }
        }
    }

    async fn drive(&mut self) -> Result<Termination, SessionError> {
        self.page.reveal_results().await?;
        self.state.start_zoom = self.page.current_zoom().await?;
        self.state.current_zoom = self.state.start_zoom;

        self.transition(SessionPhase::AwaitingOutcome);
        match self.await_outcome().await? {
            PageOutcome::BadQuery => Ok(Termination::BadQuery),
            PageOutcome::NoResults => Ok(Termination::NoResults),
            PageOutcome::SinglePlace => {
                self.transition(SessionPhase::SinglePlace);
                self.await_single_place().await?;
                Ok(Termination::SinglePlace)
            }
            PageOutcome::HasResults => {
                self.transition(SessionPhase::Scrolling);
                self.scroll().await
            }
        }
    }

    fn transition(&mut self, next: SessionPhase) {
        debug!(search_key = %self.request.search_key, from = ?self.phase, to = ?next, "session phase");
        self.phase = next;
    }

    async fn await_outcome(&self) -> Result<PageOutcome, SessionError> {
        let started = Instant::now();
        let timeout = self.timing.outcome_timeout();
        loop {
            let signals = self.page.signals().await?;
            if let Some(outcome) = PageOutcome::from_signals(signals) {
                debug!(search_key = %self.request.search_key, ?outcome, "page outcome");
                return Ok(outcome);
            }
            if started.elapsed() >= timeout {
                return Err(SessionError::NoOutcome {
                    waited: started.elapsed(),
                });
            }
            sleep(self.timing.outcome_poll()).await;
        }
    }

    async fn await_single_place(&mut self) -> Result<(), SessionError> {
        let deadline = Instant::now() + self.timing.single_place_timeout();
        loop {
            let tally = self.absorb().await?;
            if let Some(error) = self.take_decode_error().await {
                return Err(error);
            }
            if !self.seen.is_empty() {
                return Ok(());
            }
            if tally.detail_responses > 0 {
                debug!(search_key = %self.request.search_key, "detail preview carried no place");
                return Ok(());
            }
            if Instant::now() >= deadline {
                warn!(search_key = %self.request.search_key, "single place payload never arrived");
                return Ok(());
            }
            sleep(self.timing.outcome_poll()).await;
        }
    }

    async fn scroll(&mut self) -> Result<Termination, SessionError> {
        loop {
            let found_before = self.state.total_found;
            let tally = self.absorb().await?;
            if self.state.total_found == found_before {
                self.state.consecutive_empty_steps += 1;
            } else {
                self.state.consecutive_empty_steps = 0;
            }
            debug!(
                search_key = %self.request.search_key,
                page_index = self.state.page_index,
                decoded = tally.decoded,
                fresh = tally.fresh,
                accepted = tally.accepted,
                found = self.state.total_found,
                empty_steps = self.state.consecutive_empty_steps,
                "scroll step harvested"
            );

            if let Some(termination) = self.check_stop(tally).await? {
                return Ok(termination);
            }

            let count_before = self.page.visible_result_count().await?;
            self.page.scroll_results().await?;
            self.state.page_index += 1;
            self.settle.wait().await;
            self.wait_for_count_change(count_before).await?;

            if !self.used_dom_fallback
                && self.state.page_index > self.crawl.fallback_after_page
                && self.state.total_found == 0
            {
                self.switch_to_dom().await?;
            }
        }
    }

    async fn check_stop(&mut self, tally: StepTally) -> Result<Option<Termination>, SessionError> {
        if self.page.signals().await?.end_of_list {
            return Ok(Some(Termination::EndOfResults));
        }
        if self.state.consecutive_empty_steps >= self.crawl.max_empty_scrolls {
            return Ok(Some(Termination::EmptyScrollLimitExceeded));
        }
        if let Some(error) = self.take_decode_error().await {
            return Err(error);
        }
        let budget_left = {
            let _gate = self.context.budget.commit_gate().await;
            self.context.budget.can_reserve_more(&self.request.search_key)
        };
        if !budget_left {
            return Ok(Some(Termination::BudgetExhausted));
        }
        if let Some(max_drift) = self.crawl.max_zoom_drift {
            self.state.current_zoom = self.page.current_zoom().await?;
            if let (Some(start), Some(current)) = (self.state.start_zoom, self.state.current_zoom) {
                if start - current > max_drift {
                    debug!(start, current, max_drift, "zoom drifted");
                    return Ok(Some(Termination::ZoomDriftExceeded));
                }
            }
        }
        if self.state.total_found >= self.crawl.page_result_cap {
            return Ok(Some(Termination::PageCapReached));
        }
        if tally.fresh > 0 && tally.accepted == 0 {
            return Ok(Some(Termination::NoNewResultsOnStep));
        }
        Ok(None)
    }

    /// Best effort; an unchanged count is not an error.
    async fn wait_for_count_change(&self, before: usize) -> Result<(), SessionError> {
        let deadline = Instant::now() + self.timing.count_settle_timeout();
        loop {
            if self.page.visible_result_count().await? != before {
                return Ok(());
            }
            if Instant::now() >= deadline {
                debug!(page_index = self.state.page_index, "result count unchanged after scroll");
                return Ok(());
            }
            sleep(self.timing.outcome_poll()).await;
        }
    }

    async fn switch_to_dom(&mut self) -> Result<(), SessionError> {
        warn!(
            search_key = %self.request.search_key,
            page_index = self.state.page_index,
            from = self.strategy.name(),
            "extraction found nothing, switching to DOM extraction"
        );
        match self.page.screenshot().await {
            Ok(png) => {
                self.collaborators
                    .store_diagnostic("dom-fallback", "image/png", &png)
                    .await;
            }
            Err(e) => warn!(error = %e, "screenshot for DOM fallback failed"),
        }
        self.strategy = Box::new(DomStrategy::new(self.dom.clone())?);
        self.used_dom_fallback = true;
        Ok(())
    }

    /// Turn a pending decode failure into a session error, keeping the raw body.
    async fn take_decode_error(&mut self) -> Option<SessionError> {
        let (page_index, error) = self.state.last_error.take()?;
        let diagnostics_key = if error.raw_body().is_empty() {
            None
        } else {
            self.collaborators
                .store_diagnostic("decode-error", "application/octet-stream", error.raw_body())
                .await
        };
        Some(SessionError::Decode {
            page_index,
            error,
            diagnostics_key,
        })
    }

    async fn absorb(&mut self) -> Result<StepTally, SessionError> {
        let harvest = self.strategy.harvest(self.page.as_ref()).await?;
        self.state.skipped_metadata += harvest.skipped_metadata as u64;
        for note in &harvest.diagnostics {
            debug!(
                search_key = %self.request.search_key,
                page_index = self.state.page_index,
                note = %note,
                "decoder diagnostic"
            );
        }
        for (page_index, error) in harvest.errors {
            if self.state.last_error.is_none() {
                self.state.last_error = Some((page_index, error));
            } else {
                debug!(page_index, error = %error, "additional decode failure");
            }
        }

        let mut tally = StepTally {
            detail_responses: harvest.detail_responses,
            ..StepTally::default()
        };
        for record in harvest.records {
            tally.decoded += 1;
            match self.process_record(record).await? {
                RecordFate::Repeat => {}
                RecordFate::Accepted => {
                    tally.fresh += 1;
                    tally.accepted += 1;
                }
                RecordFate::OutOfPolygon | RecordFate::Duplicate | RecordFate::OverBudget => {
                    tally.fresh += 1;
                }
            }
        }
        Ok(tally)
    }

    async fn process_record(&mut self, record: PlaceRecord) -> Result<RecordFate, SessionError> {
        if !self.seen.insert(record.id.clone()) {
            self.state.duplicates += 1;
            return Ok(RecordFate::Repeat);
        }

        let key = &self.request.search_key;
        let cached = self.context.coordinates.get(&record.id);
        self.context.coordinates.put(&record.id, record.coordinates, key);
        let coordinates = record.coordinates.or(cached);

        if !geofence::passes(self.request.geofence.as_deref(), coordinates.as_ref()) {
            self.state.out_of_polygon += 1;
            return Ok(RecordFate::OutOfPolygon);
        }
        self.state.total_found += 1;

        let fate = match self.mode {
            CrawlMode::Export => self.push(&record).await?,
            CrawlMode::Enqueue => self.enqueue(&record, cached).await?,
        };
        if fate == RecordFate::OverBudget {
            // may fit on a later step once another session gives a slot back
            self.seen.remove(&record.id);
            self.state.total_found -= 1;
        }
        Ok(fate)
    }

    async fn push(&mut self, record: &PlaceRecord) -> Result<RecordFate, SessionError> {
        let context = Arc::clone(&self.context);
        let _gate = context.budget.commit_gate().await;
        let key = &self.request.search_key;
        if !self.context.export_seen.test_and_add(&record.id) {
            self.state.duplicates += 1;
            return Ok(RecordFate::Duplicate);
        }
        if !self.context.budget.try_reserve(key) {
            self.context.export_seen.remove(&record.id);
            return Ok(RecordFate::OverBudget);
        }
        let item = PushItem {
            url: record.url(),
            id: record.id.clone(),
            search_key: key.clone(),
        };
        if let Err(e) = self.collaborators.sink.push(item).await {
            self.context.budget.release(key);
            self.context.export_seen.remove(&record.id);
            return Err(e.into());
        }
        self.state.total_pushed += 1;
        Ok(RecordFate::Accepted)
    }

    async fn enqueue(
        &mut self,
        record: &PlaceRecord,
        cached: Option<LatLng>,
    ) -> Result<RecordFate, SessionError> {
        let context = Arc::clone(&self.context);
        let _gate = context.budget.commit_gate().await;
        let key = &self.request.search_key;
        if !self.context.budget.try_reserve(key) {
            return Ok(RecordFate::OverBudget);
        }
        let request = EnqueueRequest::for_record(record, cached, key);
        match self.collaborators.frontier.enqueue(request).await {
            Ok(EnqueueOutcome::Added) => {
                self.state.total_enqueued += 1;
                Ok(RecordFate::Accepted)
            }
            Ok(EnqueueOutcome::Duplicate) => {
                self.context.budget.release(key);
                self.state.duplicates += 1;
                Ok(RecordFate::Duplicate)
            }
            Err(e) => {
                self.context.budget.release(key);
                Err(e.into())
            }
        }
    }

    fn report(&self, termination: Termination) -> SessionReport {
        SessionReport {
            search_key: self.request.search_key.clone(),
            termination,
            found: self.state.total_found,
            enqueued: self.state.total_enqueued,
            pushed: self.state.total_pushed,
            out_of_polygon: self.state.out_of_polygon,
            duplicates: self.state.duplicates,
            skipped_metadata: self.state.skipped_metadata,
            pages: self.state.page_index,
            used_dom_fallback: self.used_dom_fallback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_priority() {
        let all = PageSignals {
            bad_query: true,
            no_results: true,
            single_place: true,
            has_results: true,
            end_of_list: false,
        };
        assert_eq!(PageOutcome::from_signals(all), Some(PageOutcome::BadQuery));

        let results_and_single = PageSignals {
            single_place: true,
            has_results: true,
            ..PageSignals::default()
        };
        assert_eq!(
            PageOutcome::from_signals(results_and_single),
            Some(PageOutcome::SinglePlace)
        );

        let no_results = PageSignals {
            no_results: true,
            has_results: true,
            ..PageSignals::default()
        };
        assert_eq!(PageOutcome::from_signals(no_results), Some(PageOutcome::NoResults));
        assert_eq!(PageOutcome::from_signals(PageSignals::default()), None);
    }

    #[test]
    fn test_request_builder() {
        let request = SearchRequest::new("pizza minneapolis").with_mode(CrawlMode::Export);
        assert_eq!(request.search_key.as_str(), "pizza minneapolis");
        assert_eq!(request.mode, Some(CrawlMode::Export));
        assert!(request.geofence.is_none());
    }

    #[test]
    fn test_termination_display() {
        assert_eq!(Termination::EmptyScrollLimitExceeded.to_string(), "empty scroll limit exceeded");
        assert_eq!(Termination::NoNewResultsOnStep.to_string(), "no new results on step");
    }
}
