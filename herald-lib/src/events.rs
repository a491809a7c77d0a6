//! Notifications emitted by the dispatch pipeline.
//!
//! Nothing here affects dispatch; sinks are purely observational.

use http::Method;
use std::fmt::Debug;
use std::time::Duration;

use crate::BucketKey;

/// Emitted whenever a request is held back by a rate limit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitEvent {
    /// How long the request is expected to wait
    pub timeout: Duration,
    /// The bucket's request limit, if the server reported one
    pub limit: Option<u64>,
    /// HTTP method of the held request
    pub method: Method,
    /// Path of the held request
    pub path: String,
    /// Bucket of the held request
    pub route: BucketKey,
    /// `true` if the global limit is the cause
    pub global: bool,
}

/// Receives rate limit and debug notifications
pub trait EventSink: Debug + Send + Sync {
    /// A request is waiting on a rate limit
    fn rate_limit(&self, event: &RateLimitEvent);

    /// Free-form diagnostics
    fn debug(&self, message: &str) {
        log::debug!("{message}");
    }
}

/// Forwards all events to the `log` facade
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn rate_limit(&self, event: &RateLimitEvent) {
        log::info!(
            "Rate limited{} on {} {} (bucket {}, limit {:?}), waiting {}ms",
            if event.global { " globally" } else { "" },
            event.method,
            event.path,
            event.route,
            event.limit,
            event.timeout.as_millis()
        );
    }
}
