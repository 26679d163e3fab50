//! Runs many search sessions with a concurrency limit and page-level retries.

use crate::collaborators::Collaborators;
use crate::context::SharedContext;
use crate::decoder::WireDecoder;
use crate::error::SessionError;
use crate::feed::{response_channel, ResponseFeed};
use crate::session::{SearchRequest, SearchSession, SessionReport};
use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use placescout_core::{AppConfig, SearchKey};
use placescout_transport::PageTransport;
use std::sync::Arc;
use std::time::Duration;

/// Opens a fresh result page for one attempt at a search.
///
/// The opener must route the page's captured responses into `feed`.
#[async_trait]
pub trait PageOpener: Send + Sync {
    async fn open(
        &self,
        request: &SearchRequest,
        feed: ResponseFeed,
    ) -> Result<Arc<dyn PageTransport>, SessionError>;
}

/// Final result of one search after retries.
#[derive(Debug)]
pub struct SearchOutcome {
    pub search_key: SearchKey,
    /// Attempts made, including the successful one
    pub attempts: u32,
    pub result: Result<SessionReport, SessionError>,
}

impl SearchOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Drives sessions over a shared context.
pub struct ScoutOrchestrator {
    opener: Arc<dyn PageOpener>,
    decoder: Arc<WireDecoder>,
    context: Arc<SharedContext>,
    collaborators: Collaborators,
    config: AppConfig,
}

impl ScoutOrchestrator {
    /// Budget limits for the shared context come from `config.crawl`.
    pub fn new(opener: Arc<dyn PageOpener>, collaborators: Collaborators, config: AppConfig) -> Self {
        let context = Arc::new(SharedContext::from_config(&config.crawl));
        Self::with_context(opener, collaborators, config, context)
    }

    pub fn with_context(
        opener: Arc<dyn PageOpener>,
        collaborators: Collaborators,
        config: AppConfig,
        context: Arc<SharedContext>,
    ) -> Self {
        Self {
            opener,
            decoder: Arc::new(WireDecoder::new(config.layout.clone())),
            context,
            collaborators,
            config,
        }
    }

    pub fn context(&self) -> &Arc<SharedContext> {
        &self.context
    }

    /// Run every request, at most `concurrent_searches` at a time.
    ///
    /// Outcomes are returned in completion order.
    pub async fn run_all(&self, requests: Vec<SearchRequest>) -> Vec<SearchOutcome> {
        let limit = self.config.crawl.concurrent_searches.max(1);
        let mut futures = FuturesUnordered::new();
        let mut outcomes = Vec::with_capacity(requests.len());

        for request in requests {
            futures.push(self.run_search(request));

            while futures.len() >= limit {
                if let Some(outcome) = futures.next().await {
                    outcomes.push(outcome);
                }
            }
        }

        while let Some(outcome) = futures.next().await {
            outcomes.push(outcome);
        }

        let failed = outcomes.iter().filter(|o| !o.is_success()).count();
        tracing::info!(
            searches = outcomes.len(),
            failed,
            global = self.context.budget.snapshot().global,
            "all searches finished"
        );
        outcomes
    }

    /// Run one search, retrying retryable failures with linear backoff.
    pub async fn run_search(&self, request: SearchRequest) -> SearchOutcome {
        let max_attempts = self.config.crawl.max_page_retries + 1;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let result = self.attempt(&request).await;

            match result {
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = self.backoff(attempt);
                    tracing::warn!(
                        search_key = %request.search_key,
                        attempt,
                        max_attempts,
                        error = %e,
                        "search attempt failed, retrying in {:?}",
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                result => {
                    if let Err(e) = &result {
                        tracing::error!(
                            search_key = %request.search_key,
                            attempts = attempt,
                            error = %e,
                            "search abandoned"
                        );
                    }
                    return SearchOutcome {
                        search_key: request.search_key.clone(),
                        attempts: attempt,
                        result,
                    };
                }
            }
        }
    }

    async fn attempt(&self, request: &SearchRequest) -> Result<SessionReport, SessionError> {
        let (feed, responses) = response_channel(
            Arc::clone(&self.decoder),
            self.config.crawl.response_queue_capacity,
        );
        let page = self.opener.open(request, feed).await?;
        SearchSession::new(
            page,
            responses,
            request.clone(),
            Arc::clone(&self.context),
            self.collaborators.clone(),
            &self.config,
        )
        .run()
        .await
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.config.timing.retry_backoff() * attempt
    }
}
