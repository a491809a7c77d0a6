use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard};
use tokio::time::Instant;

use super::global::GlobalGate;
use super::headers::RateLimitHeaders;
use super::stats::BucketStats;
use crate::config::RestConfig;
use crate::events::{EventSink, RateLimitEvent};
use crate::request::ApiRequest;
use crate::retry::{RetryExt, StatusClass};
use crate::types::{ApiError, ResponseBody, TransportError, TransportErrorKind};
use crate::{BucketKey, Result};

/// Reaction endpoints report imprecise windows. Their reset is always
/// pinned to this long after the response.
const REACTION_RESET: Duration = Duration::from_millis(250);

/// What a bucket has learned about its window from response headers
#[derive(Debug, Clone)]
pub(crate) struct Throttle {
    /// Maximum requests per window, if known
    pub(crate) limit: Option<u64>,
    /// Requests left in the window, -1 while unknown
    pub(crate) remaining: i64,
    /// When the window resets
    pub(crate) reset_at: Option<Instant>,
    /// Delay requested by the last 429
    pub(crate) retry_after: Option<Duration>,
}

impl Default for Throttle {
    fn default() -> Self {
        Self {
            limit: None,
            remaining: -1,
            reset_at: None,
            retry_after: None,
        }
    }
}

impl Throttle {
    /// How long until the window resets, if the bucket is exhausted
    pub(crate) fn limited_for(&self, now: Instant) -> Option<Duration> {
        match self.reset_at {
            Some(reset_at) if self.remaining <= 0 && now < reset_at => Some(reset_at - now),
            _ => None,
        }
    }

    /// Learn from the headers of a response received just now
    pub(crate) fn update(&mut self, headers: &RateLimitHeaders, reactions: bool) {
        let now = Instant::now();
        self.limit = headers.limit;
        self.remaining = headers.remaining.unwrap_or(1);
        self.reset_at = Some(if reactions {
            now + REACTION_RESET
        } else {
            super::deadline_after(now, headers.reset_after().unwrap_or(Duration::ZERO))
        });
        self.retry_after = headers.retry_after;
    }
}

/// Everything a bucket needs from its owner to run requests
#[derive(Debug, Clone, Copy)]
pub(crate) struct Dispatch<'a> {
    pub(crate) http: &'a reqwest::Client,
    pub(crate) config: &'a RestConfig,
    pub(crate) gate: &'a GlobalGate,
    pub(crate) sink: &'a dyn EventSink,
}

/// One rate limit domain.
///
/// Requests queue up on an async mutex, which hands out the lock in FIFO
/// order. Holding the lock is what it means to be at the head of the queue,
/// so at most one request per bucket is in flight and execution starts in
/// submission order. Retries keep the lock and therefore stay at the head.
#[derive(Debug)]
pub struct Bucket {
    /// The key this bucket was created for
    pub key: BucketKey,

    /// Learned window state, locked for the whole lifetime of a request
    throttle: AsyncMutex<Throttle>,

    /// Requests queued or in flight
    pending: AtomicUsize,

    /// Request statistics
    stats: Mutex<BucketStats>,
}

impl Bucket {
    pub(crate) fn new(key: BucketKey) -> Self {
        Self {
            key,
            throttle: AsyncMutex::new(Throttle::default()),
            pending: AtomicUsize::new(0),
            stats: Mutex::new(BucketStats::default()),
        }
    }

    /// Number of requests queued or in flight
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Returns `true` if the bucket's window is exhausted right now.
    /// A bucket with a request in flight counts as limited.
    #[must_use]
    pub fn is_limited(&self) -> bool {
        self.throttle
            .try_lock()
            .map_or(true, |t| t.limited_for(Instant::now()).is_some())
    }

    /// Idle buckets can be swept: nothing queued and not limited
    pub(crate) fn is_inactive(&self) -> bool {
        self.pending() == 0 && !self.is_limited()
    }

    /// Get bucket statistics
    #[must_use]
    pub fn stats(&self) -> BucketStats {
        self.stats_mut().clone()
    }

    fn stats_mut(&self) -> std::sync::MutexGuard<'_, BucketStats> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn enter(&self) {
        self.pending.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn leave(&self) {
        self.pending.fetch_sub(1, Ordering::AcqRel);
    }

    #[cfg(test)]
    pub(crate) async fn throttle_for_test(&self) -> MutexGuard<'_, Throttle> {
        self.throttle.lock().await
    }

    /// Wait for this request's turn, then run it to completion
    pub(crate) async fn push(&self, request: ApiRequest, dispatch: Dispatch<'_>) -> Result<ResponseBody> {
        let throttle = self.throttle.lock().await;
        log::trace!("Bucket {} running {} {}", self.key, request.method, request.path);
        self.execute(throttle, request, dispatch).await
    }

    async fn execute(
        &self,
        mut throttle: MutexGuard<'_, Throttle>,
        mut request: ApiRequest,
        dispatch: Dispatch<'_>,
    ) -> Result<ResponseBody> {
        let retry_limit = dispatch.config.retry_limit;

        loop {
            self.wait_until_clear(&throttle, &request, dispatch).await;

            let start = std::time::Instant::now();
            let response = match request
                .execute(dispatch.http, dispatch.config.request_timeout)
                .await
            {
                Ok(response) => response,
                Err(error) => {
                    self.stats_mut().record_transport_error();
                    if request.retries >= retry_limit {
                        log::warn!("Giving up on {} {}: {error}", request.method, request.path);
                        return Err(error.into());
                    }
                    self.retry(&mut request, &error.to_string());
                    continue;
                }
            };

            let status = response.status();
            self.stats_mut()
                .record_response(status.as_u16(), start.elapsed());

            let headers = RateLimitHeaders::from_headers(response.headers());
            throttle.update(&headers, self.key.is_reactions());
            if headers.global
                && let Some(retry_after) = headers.retry_after
            {
                dispatch.gate.engage(retry_after);
            }

            match status.classify() {
                StatusClass::Success => {
                    return ResponseBody::from_response(response, &request.method, &request.path)
                        .await;
                }
                StatusClass::RateLimited => {
                    dispatch.sink.debug(&format!("429 hit on route {}", self.key));
                    let timeout = throttle.retry_after.unwrap_or(Duration::ZERO);
                    dispatch
                        .sink
                        .rate_limit(&self.event(&throttle, &request, timeout, headers.global));
                    // A global 429 waits on the shared gate at the top of the loop
                    if !(headers.global && dispatch.gate.is_engaged()) {
                        tokio::time::sleep(timeout).await;
                    }
                }
                StatusClass::Rejected => {
                    return Err(ApiError::from_response(response, &request.method, &request.path).await);
                }
                StatusClass::ServerError => {
                    if request.retries >= retry_limit {
                        log::warn!(
                            "Giving up on {} {} after {} retries: {status}",
                            request.method,
                            request.path,
                            request.retries
                        );
                        return Err(TransportError::new(
                            TransportErrorKind::ServerError,
                            &request.method,
                            &request.path,
                            Some(status.as_u16()),
                            status.canonical_reason().unwrap_or("Server Error"),
                        )
                        .into());
                    }
                    self.retry(&mut request, &status.to_string());
                }
                StatusClass::Other => return Ok(ResponseBody::Empty),
            }
        }
    }

    /// Suspend until neither the global gate nor this bucket's own window
    /// holds the request back
    async fn wait_until_clear(&self, throttle: &Throttle, request: &ApiRequest, dispatch: Dispatch<'_>) {
        loop {
            if let Some((timeout, countdown)) = dispatch.gate.active() {
                dispatch
                    .sink
                    .rate_limit(&self.event(throttle, request, timeout, true));
                countdown.await;
                continue;
            }

            if let Some(wait) = throttle.limited_for(Instant::now()) {
                let timeout = wait.saturating_add(dispatch.config.time_offset);
                dispatch
                    .sink
                    .rate_limit(&self.event(throttle, request, timeout, false));
                log::debug!(
                    "Bucket {} exhausted, waiting {}ms",
                    self.key,
                    timeout.as_millis()
                );
                tokio::time::sleep(timeout).await;
                continue;
            }

            return;
        }
    }

    fn retry(&self, request: &mut ApiRequest, reason: &str) {
        request.retries += 1;
        self.stats_mut().record_retry();
        log::debug!(
            "Retrying {} {} ({reason}), attempt {}",
            request.method,
            request.path,
            request.retries + 1
        );
    }

    fn event(&self, throttle: &Throttle, request: &ApiRequest, timeout: Duration, global: bool) -> RateLimitEvent {
        RateLimitEvent {
            timeout,
            limit: throttle.limit,
            method: request.method.clone(),
            path: request.path.clone(),
            route: self.key.clone(),
            global,
        }
    }
}
