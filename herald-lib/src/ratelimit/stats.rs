use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Record and report statistics for a [`crate::ratelimit::Bucket`]
#[derive(Debug, Clone, Default)]
pub struct BucketStats {
    /// Total number of responses received in this bucket
    pub total_requests: u64,
    /// Number of successful requests (2xx status)
    pub successful_requests: u64,
    /// Number of rate limit responses (429)
    pub rate_limited: u64,
    /// Number of client error responses (4xx, excluding 429)
    pub client_errors: u64,
    /// Number of server error responses (5xx)
    pub server_errors: u64,
    /// Number of network failures and timeouts, retried or not
    pub transport_errors: u64,
    /// Number of retries after network failures, timeouts and 5xx responses
    pub retries: u64,
    /// Timestamp of the last response or transport failure
    pub last_activity: Option<Instant>,
    /// Request times of the last responses
    request_times: VecDeque<Duration>,
}

/// Number of request times kept for the average
const REQUEST_TIME_WINDOW: usize = 100;

impl BucketStats {
    /// Record a response with status code and request duration
    pub fn record_response(&mut self, status_code: u16, request_time: Duration) {
        self.total_requests += 1;
        self.last_activity = Some(Instant::now());

        match status_code {
            200..=299 => self.successful_requests += 1,
            429 => self.rate_limited += 1,
            400..=499 => self.client_errors += 1,
            500..=599 => self.server_errors += 1,
            _ => {}
        }

        if self.request_times.len() >= REQUEST_TIME_WINDOW {
            self.request_times.pop_front();
        }
        self.request_times.push_back(request_time);
    }

    /// Record a request that failed without a response
    pub fn record_transport_error(&mut self) {
        self.transport_errors += 1;
        self.last_activity = Some(Instant::now());
    }

    /// Record a transport-level retry
    pub fn record_retry(&mut self) {
        self.retries += 1;
        self.last_activity = Some(Instant::now());
    }

    /// Get the current success rate (0.0 to 1.0)
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            1.0 // Assume success until proven otherwise
        } else {
            #[allow(clippy::cast_precision_loss)]
            let success_rate = self.successful_requests as f64 / self.total_requests as f64;
            success_rate
        }
    }

    /// Get average request time
    #[must_use]
    pub fn average_request_time(&self) -> Option<Duration> {
        if self.request_times.is_empty() {
            return None;
        }

        let total: Duration = self.request_times.iter().sum();
        #[allow(clippy::cast_possible_truncation)]
        Some(total / (self.request_times.len() as u32))
    }

    /// Get human-readable summary of the stats
    #[must_use]
    pub fn summary(&self) -> String {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let success_pct = (self.success_rate() * 100.0) as u64;

        let avg_time = self
            .average_request_time()
            .map_or_else(|| "N/A".to_string(), |d| format!("{}ms", d.as_millis()));

        format!(
            "{} requests ({}% success, {} rate limited, {} retries), avg: {}",
            self.total_requests, success_pct, self.rate_limited, self.retries, avg_time
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_stats_tracking() {
        let mut stats = BucketStats::default();
        assert!((stats.success_rate() - 1.0).abs() < f64::EPSILON);
        assert!(stats.last_activity.is_none());

        stats.record_response(200, Duration::from_millis(100));
        stats.record_response(429, Duration::from_millis(200));
        stats.record_response(400, Duration::from_millis(100));
        stats.record_response(503, Duration::from_millis(200));
        stats.record_retry();

        assert_eq!(stats.total_requests, 4);
        assert_eq!(stats.successful_requests, 1);
        assert_eq!(stats.rate_limited, 1);
        assert_eq!(stats.client_errors, 1);
        assert_eq!(stats.server_errors, 1);
        assert_eq!(stats.retries, 1);
        assert!((stats.success_rate() - 0.25).abs() < f64::EPSILON);
        assert_eq!(
            stats.average_request_time(),
            Some(Duration::from_millis(150))
        );
        assert!(stats.last_activity.is_some());
    }

    #[test]
    fn test_transport_error_marks_activity() {
        let mut stats = BucketStats::default();
        stats.record_transport_error();
        assert_eq!(stats.transport_errors, 1);
        assert_eq!(stats.total_requests, 0);
        assert!(stats.last_activity.is_some());
    }

    #[test]
    fn test_request_time_window() {
        let mut stats = BucketStats::default();
        for _ in 0..REQUEST_TIME_WINDOW {
            stats.record_response(200, Duration::from_millis(10));
        }
        stats.record_response(200, Duration::from_millis(10 + REQUEST_TIME_WINDOW as u64));
        assert_eq!(stats.request_times.len(), REQUEST_TIME_WINDOW);
        assert_eq!(
            stats.average_request_time(),
            Some(Duration::from_millis(11))
        );
    }

    #[test]
    fn test_summary_formatting() {
        let mut stats = BucketStats::default();
        stats.record_response(200, Duration::from_millis(150));
        stats.record_response(500, Duration::from_millis(200));

        let summary = stats.summary();
        assert!(summary.contains("2 requests"));
        assert!(summary.contains("50% success"));
        assert!(summary.contains("175ms"));
    }
}
