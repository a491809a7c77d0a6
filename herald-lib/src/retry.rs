use http::StatusCode;

/// What to do with a response, based on its status code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StatusClass {
    /// 2xx: decode and hand back the body
    Success,
    /// 429: wait for the server-provided delay and try again,
    /// without counting against the retry limit
    RateLimited,
    /// Other 4xx: the server rejected the request, don't retry
    Rejected,
    /// 5xx: transient, retry up to the configured limit
    ServerError,
    /// Anything else (1xx, 3xx): nothing to decode
    Other,
}

/// An extension trait to classify responses for the dispatch loop.
///
/// Inspired by `Retryable` from
/// [reqwest-middleware](https://github.com/TrueLayer/reqwest-middleware/blob/f854725791ccf4a02c401a26cab3d9db753f468c/reqwest-retry/src/retryable.rs)
pub(crate) trait RetryExt {
    fn classify(&self) -> StatusClass;
}

impl RetryExt for StatusCode {
    fn classify(&self) -> StatusClass {
        let status = *self;
        if status.is_success() {
            StatusClass::Success
        } else if status == StatusCode::TOO_MANY_REQUESTS {
            StatusClass::RateLimited
        } else if status.is_client_error() {
            StatusClass::Rejected
        } else if status.is_server_error() {
            StatusClass::ServerError
        } else {
            StatusClass::Other
        }
    }
}

#[cfg(test)]
mod tests {
    use http::StatusCode;
    use rstest::rstest;

    use super::{RetryExt, StatusClass};

    #[rstest]
    #[case(StatusCode::OK, StatusClass::Success)]
    #[case(StatusCode::NO_CONTENT, StatusClass::Success)]
    #[case(StatusCode::TOO_MANY_REQUESTS, StatusClass::RateLimited)]
    #[case(StatusCode::BAD_REQUEST, StatusClass::Rejected)]
    #[case(StatusCode::REQUEST_TIMEOUT, StatusClass::Rejected)]
    #[case(StatusCode::INTERNAL_SERVER_ERROR, StatusClass::ServerError)]
    #[case(StatusCode::SERVICE_UNAVAILABLE, StatusClass::ServerError)]
    #[case(StatusCode::NOT_MODIFIED, StatusClass::Other)]
    fn test_classify(#[case] status: StatusCode, #[case] expected: StatusClass) {
        assert_eq!(status.classify(), expected);
    }
}
