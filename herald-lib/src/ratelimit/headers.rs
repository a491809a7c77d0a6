//! Handle rate limiting headers.
//!
//! Reset times are reported as absolute Unix timestamps. To tolerate skew
//! between the local clock and the server's, they are measured against the
//! server's own `Date` header rather than local time.

use http::{HeaderMap, HeaderValue};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

const LIMIT: &str = "x-ratelimit-limit";
const REMAINING: &str = "x-ratelimit-remaining";
const RESET: &str = "x-ratelimit-reset";
const GLOBAL: &str = "x-ratelimit-global";
const RETRY_AFTER: &str = "retry-after";
const DATE: &str = "date";

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum RetryAfterParseError {
    #[error("Unable to parse value '{0}'")]
    ValueError(String),

    #[error("Header value contains invalid chars")]
    HeaderValueError,
}

/// Parse the "Retry-After" header.
///
/// The API reports the delay in milliseconds. An HTTP-date, as allowed by
/// [RFC 7231 section 7.1.3](https://www.rfc-editor.org/rfc/rfc7231#section-7.1.3),
/// is accepted as well.
pub(crate) fn parse_retry_after(value: &HeaderValue) -> Result<Duration, RetryAfterParseError> {
    let value = value
        .to_str()
        .map_err(|_| RetryAfterParseError::HeaderValueError)?
        .trim();

    match value.parse::<f64>() {
        Ok(millis) => Duration::try_from_secs_f64(millis / 1000.0)
            .map_err(|_| RetryAfterParseError::ValueError(value.into())),
        Err(_) => httpdate::parse_http_date(value)
            .map(|s| {
                s.duration_since(SystemTime::now())
                    // if date is in the past, we can use ZERO
                    .unwrap_or(Duration::ZERO)
            })
            .map_err(|_| RetryAfterParseError::ValueError(value.into())),
    }
}

/// Rate limit information carried by a single response
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct RateLimitHeaders {
    /// Maximum number of requests per window
    pub(crate) limit: Option<u64>,
    /// Requests left in the current window
    pub(crate) remaining: Option<i64>,
    /// Unix timestamp in seconds at which the window resets
    pub(crate) reset: Option<f64>,
    /// Delay before retrying, after a 429
    pub(crate) retry_after: Option<Duration>,
    /// The limit applies to all buckets
    pub(crate) global: bool,
    /// The server's clock at the time of the response
    pub(crate) server_date: Option<SystemTime>,
}

impl RateLimitHeaders {
    pub(crate) fn from_headers(headers: &HeaderMap) -> Self {
        let retry_after = headers.get(RETRY_AFTER).and_then(|value| {
            parse_retry_after(value)
                .inspect_err(|e| log::debug!("Ignoring retry-after header: {e}"))
                .ok()
        });

        Self {
            limit: parse_header_value(headers, LIMIT),
            remaining: parse_header_value(headers, REMAINING),
            reset: parse_header_value::<f64>(headers, RESET).filter(|r| r.is_finite() && *r >= 0.0),
            retry_after,
            global: headers
                .get(GLOBAL)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v.trim().eq_ignore_ascii_case("true") || v.trim() == "1"),
            server_date: headers
                .get(DATE)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| httpdate::parse_http_date(v).ok()),
        }
    }

    /// The server's notion of "now", falling back to the local clock
    pub(crate) fn server_now(&self) -> SystemTime {
        self.server_date.unwrap_or_else(SystemTime::now)
    }

    /// Time from the response until the window resets, measured on the
    /// server's clock. `None` if no reset was reported.
    pub(crate) fn reset_after(&self) -> Option<Duration> {
        let reset = UNIX_EPOCH.checked_add(Duration::try_from_secs_f64(self.reset?).ok()?)?;
        Some(
            reset
                .duration_since(self.server_now())
                .unwrap_or(Duration::ZERO),
        )
    }
}

/// Helper method to parse numeric header values
fn parse_header_value<T: std::str::FromStr>(headers: &HeaderMap, header_name: &str) -> Option<T> {
    headers
        .get(header_name)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<T>().ok())
}
