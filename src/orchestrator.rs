//! Per-query pipeline: discover, dedup-gate, fetch concurrently, save.
//!
//! # Architecture
//!
//! One [`Orchestrator::run_query`] call is the unit of work the CLI loop
//! dispatches. Discovery runs once (never retried); its candidates are
//! collapsed to distinct URLs, gated through the dedup store, and every
//! survivor becomes one fetch-and-save future. The futures run concurrently
//! with no pool cap and are joined before the summary is assembled, so a
//! summary always describes a finished query.
//!
//! URLs are marked in the dedup store when their fetch is dispatched, not
//! when it succeeds. A URL that exhausts its retries is therefore not
//! reattempted on the next run; operators clear the store file to force a
//! refetch.

use crate::dedup::DedupStore;
use crate::discover::{self, DiscoveryError};
use crate::fetch::{FetchError, RetryFetch, RetryPolicy};
use crate::identity::IdentityPool;
use crate::models::{CandidateLink, QuerySummary, SearchQuery};
use crate::persist::ArticlePersister;
use crate::render::Renderer;
use futures::future::join_all;
use itertools::Itertools;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Drives the full pipeline for one query at a time.
pub struct Orchestrator<R> {
    renderer: Arc<R>,
    identities: Arc<IdentityPool>,
    store: Arc<DedupStore>,
    fetcher: RetryFetch<R>,
    persister: ArticlePersister,
}

impl<R: Renderer> Orchestrator<R> {
    pub fn new(
        renderer: Arc<R>,
        identities: Arc<IdentityPool>,
        store: Arc<DedupStore>,
        persister: ArticlePersister,
        policy: RetryPolicy,
    ) -> Self {
        let fetcher = RetryFetch::new(Arc::clone(&renderer), Arc::clone(&identities), policy);
        Self {
            renderer,
            identities,
            store,
            fetcher,
            persister,
        }
    }

    /// Run one query end to end and report what happened.
    ///
    /// # Returns
    ///
    /// A [`QuerySummary`] whose counts satisfy
    /// `discovered == dispatched + skipped` and
    /// `dispatched == saved + failed`.
    ///
    /// # Errors
    ///
    /// Only discovery failures abort the query. Individual fetch or write
    /// failures are absorbed into the summary's `failed` count.
    #[instrument(level = "info", skip_all, fields(query = %query.text, limit = query.limit))]
    pub async fn run_query(&self, query: &SearchQuery) -> Result<QuerySummary, DiscoveryError> {
        let candidates = discover::discover(self.renderer.as_ref(), &self.identities, query).await?;
        let discovered = candidates.len();

        // Collapse repeats within the batch (first occurrence keeps its
        // rank), then gate the survivors through the store. Marking happens
        // here, before any fetch starts.
        let distinct: Vec<CandidateLink> = candidates
            .into_iter()
            .unique_by(|link| link.url.clone())
            .collect();
        let mut dispatched = Vec::with_capacity(distinct.len());
        for link in distinct {
            if self.store.try_mark(&link.url).await {
                dispatched.push(link);
            } else {
                info!(url = %link.url, rank = link.rank, "Skipping already-processed URL");
            }
        }
        let skipped = discovered - dispatched.len();

        info!(
            discovered,
            dispatched = dispatched.len(),
            skipped,
            "Dispatching concurrent fetches"
        );
        let outcomes = join_all(
            dispatched
                .iter()
                .map(|link| self.process_link(link, query)),
        )
        .await;

        let saved = outcomes.iter().filter(|saved| **saved).count();
        let failed = outcomes.len() - saved;

        if let Err(e) = self.store.persist().await {
            warn!(
                error = %e,
                path = %self.store.path().display(),
                "Failed to persist processed-URL list; continuing"
            );
        }

        let summary = QuerySummary {
            query: query.text.clone(),
            discovered,
            skipped,
            dispatched: outcomes.len(),
            saved,
            failed,
        };
        info!(
            saved = summary.saved,
            failed = summary.failed,
            skipped = summary.skipped,
            "Query complete"
        );
        Ok(summary)
    }

    /// Fetch one candidate and write it out. Returns whether a file landed
    /// on disk; every failure path logs its own cause.
    async fn process_link(&self, link: &CandidateLink, query: &SearchQuery) -> bool {
        let content = match self.fetcher.fetch(&link.url).await {
            Ok(content) => content,
            Err(FetchError::Permanent(e)) => {
                error!(url = %link.url, error = %e, "Unrecoverable fetch failure");
                return false;
            }
            Err(FetchError::Exhausted { attempts, last }) => {
                error!(
                    url = %link.url,
                    attempts,
                    error = %last,
                    "Giving up on URL after exhausting retries"
                );
                return false;
            }
        };

        match self
            .persister
            .persist(&content, &link.url, link.rank, query)
            .await
        {
            Ok(saved) => {
                info!(
                    url = %saved.source_url,
                    rank = saved.rank,
                    captured_at = %saved.captured_at.format("%Y-%m-%d %H:%M:%S"),
                    path = %saved.path.display(),
                    "Article saved"
                );
                true
            }
            Err(e) => {
                error!(url = %link.url, error = %e, "Fetched but could not write article");
                false
            }
        }
    }
}
