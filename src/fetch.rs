//! Single-URL fetching with identity rotation and exponential backoff.
//!
//! # Retry Strategy
//!
//! - Every attempt presents a fresh [`Identity`](crate::identity::Identity):
//!   new user-agent, viewport, headers, and an independently chosen proxy
//!   when a proxy pool is configured
//! - One randomized pre-fetch delay before the first attempt only; retries
//!   are spaced by backoff instead
//! - Backoff doubles from the initial delay, capped, with 0-250ms of jitter
//! - Transient failures (network, page load, dropped session) retry up to
//!   the attempt budget; anything else fails permanently on the spot
//!
//! Exhaustion is reported to the caller, never raised as a process-level
//! failure; sibling fetches keep running.

use crate::identity::{IdentityPool, default_headers};
use crate::render::{RenderError, Renderer, WaitFor};
use rand::{Rng, rng};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, instrument, warn};

/// A fetch that will not be retried further.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The failure class does not improve with retrying.
    #[error("fetch failed permanently: {0}")]
    Permanent(#[source] RenderError),
    /// Every attempt in the budget failed transiently.
    #[error("fetch exhausted after {attempts} attempts: {last}")]
    Exhausted {
        attempts: usize,
        #[source]
        last: RenderError,
    },
}

/// Knobs for the retry loop.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempt budget per URL (first try included).
    pub max_attempts: usize,
    /// Backoff after the first failed attempt; doubles per attempt.
    pub initial_backoff: Duration,
    /// Ceiling for the doubling schedule.
    pub max_backoff: Duration,
    /// Bounds of the uniform pre-fetch delay window.
    pub pre_fetch_delay: (Duration, Duration),
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            pre_fetch_delay: (Duration::from_secs(2), Duration::from_secs(5)),
        }
    }
}

impl RetryPolicy {
    /// Backoff to sleep after failed attempt `attempt` (1-based):
    /// `initial * 2^(attempt-1)`, capped at `max_backoff`. Jitter is added
    /// at the sleep site, not here.
    pub fn backoff_delay(&self, attempt: usize) -> Duration {
        debug_assert!(attempt >= 1);
        let delay = self.initial_backoff.saturating_mul(1 << (attempt - 1));
        delay.min(self.max_backoff)
    }

    /// Uniform sample from the pre-fetch delay window.
    fn sample_pre_fetch_delay(&self) -> Duration {
        let (lo, hi) = self.pre_fetch_delay;
        if hi <= lo {
            return lo;
        }
        let span_ms = (hi - lo).as_millis() as u64;
        lo + Duration::from_millis(rng().random_range(0..=span_ms))
    }
}

/// Fetcher that wraps a [`Renderer`] with the retry policy.
///
/// All state for one fetch (attempt counter, last failure) lives on the
/// call stack; the struct itself only carries the collaborators, so one
/// instance serves any number of concurrent fetches.
pub struct RetryFetch<R> {
    renderer: Arc<R>,
    identities: Arc<IdentityPool>,
    policy: RetryPolicy,
}

impl<R> RetryFetch<R>
where
    R: Renderer,
{
    pub fn new(renderer: Arc<R>, identities: Arc<IdentityPool>, policy: RetryPolicy) -> Self {
        Self {
            renderer,
            identities,
            policy,
        }
    }

    /// Fetch `url`, returning the rendered document.
    ///
    /// # Errors
    ///
    /// [`FetchError::Permanent`] on a non-retryable failure;
    /// [`FetchError::Exhausted`] once the attempt budget is spent on
    /// transient failures. Either way the caller gets the last underlying
    /// [`RenderError`].
    #[instrument(level = "info", skip_all, fields(%url))]
    pub async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let total_t0 = Instant::now();

        // One pacing delay per URL, before the first attempt. Retries are
        // already spaced by backoff.
        let pre_delay = self.policy.sample_pre_fetch_delay();
        if pre_delay > Duration::ZERO {
            debug!(?pre_delay, "Pre-fetch delay");
            sleep(pre_delay).await;
        }

        let mut attempt = 0usize;
        loop {
            attempt += 1;
            let identity = self.identities.next_identity(&default_headers()).await;
            debug!(
                attempt,
                max = self.policy.max_attempts,
                user_agent = %identity.user_agent,
                proxy = ?identity.proxy,
                "Fetch attempt"
            );

            let attempt_t0 = Instant::now();
            match self.renderer.render(url, &identity, &WaitFor::Load).await {
                Ok(content) => {
                    debug!(
                        attempt,
                        bytes = content.len(),
                        elapsed_ms_attempt = attempt_t0.elapsed().as_millis() as u64,
                        elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                        "Fetch succeeded"
                    );
                    return Ok(content);
                }
                Err(e) if !e.is_transient() => {
                    warn!(attempt, error = %e, "Permanent fetch failure; not retrying");
                    return Err(FetchError::Permanent(e));
                }
                Err(e) => {
                    if attempt >= self.policy.max_attempts {
                        warn!(
                            attempt,
                            max = self.policy.max_attempts,
                            elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                            error = %e,
                            "Fetch exhausted retries"
                        );
                        return Err(FetchError::Exhausted {
                            attempts: attempt,
                            last: e,
                        });
                    }

                    let delay =
                        self.policy.backoff_delay(attempt) + Duration::from_millis(rng().random_range(0..=250));
                    warn!(
                        attempt,
                        max = self.policy.max_attempts,
                        ?delay,
                        elapsed_ms_attempt = attempt_t0.elapsed().as_millis() as u64,
                        error = %e,
                        "Transient fetch failure; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}
