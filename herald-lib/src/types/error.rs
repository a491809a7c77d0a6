use http::{Method, StatusCode};
use std::fmt;
use thiserror::Error;

/// Possible errors when dispatching requests through `herald_lib`
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The server rejected a well-formed request (any 4xx except 429)
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The request could not be completed: network failures, timeouts,
    /// undecodable responses and 5xx responses after exhausting all retries
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Neither a token nor an access token is configured
    #[error("Request to use a token, but token was unavailable to the client")]
    MissingToken,

    /// A header value could not be built from the given string
    #[error("Header could not be parsed.")]
    InvalidHeader(#[from] http::header::InvalidHeaderValue),

    /// The configured base URL, or a URL built from it, is invalid
    #[error("Cannot parse URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The underlying HTTP client could not be built
    #[error("Failed to build HTTP client")]
    BuildClient(#[source] reqwest::Error),

    /// The configuration file is not valid TOML or contains unknown keys
    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] toml::de::Error),

    /// The configuration file could not be read
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// A successful payload could not be decoded into the requested type
    #[error("Cannot decode payload: {0}")]
    Json(#[from] serde_json::Error),
}

impl ErrorKind {
    /// Returns `true` if the server rejected the request
    #[must_use]
    pub const fn is_api(&self) -> bool {
        matches!(self, Self::Api(_))
    }

    /// Returns `true` if the request failed in transit
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// The HTTP status associated with this error, if one is known
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Api(e) => StatusCode::from_u16(e.http_status).ok(),
            Self::Transport(e) => e.status.and_then(|s| StatusCode::from_u16(s).ok()),
            _ => None,
        }
    }
}

/// A structured rejection returned by the API.
///
/// Produced for every 4xx response other than 429. These are never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ApiError {
    /// Path of the request, including the query string
    pub path: String,
    /// HTTP method of the request
    pub method: Method,
    /// HTTP status code of the response
    pub http_status: u16,
    /// API error code from the response body
    pub code: u64,
    /// Top-level message followed by one line per field error
    pub message: String,
    /// Field errors, formatted as `<path>: <message>`
    pub field_errors: Vec<String>,
}

/// A failure to complete the HTTP exchange
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} on {method} {path}: {message}")]
pub struct TransportError {
    /// Path of the request, including the query string
    pub path: String,
    /// HTTP method of the request
    pub method: Method,
    /// What went wrong
    pub kind: TransportErrorKind,
    /// HTTP status code, if a response was received
    pub status: Option<u16>,
    /// Human-readable detail
    pub message: String,
}

/// Classification of a [`TransportError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::IntoStaticStr)]
pub enum TransportErrorKind {
    /// The connection failed or was interrupted
    #[strum(serialize = "NetworkError")]
    Network,
    /// The per-request timeout fired before a response arrived
    #[strum(serialize = "TimeoutError")]
    Timeout,
    /// The response body could not be read or parsed
    #[strum(serialize = "DecodeError")]
    Decode,
    /// The server kept answering with 5xx until retries ran out
    #[strum(serialize = "ServerError")]
    ServerError,
}

impl TransportErrorKind {
    /// The classification name, e.g. `TimeoutError`
    #[must_use]
    pub fn name(self) -> &'static str {
        self.into()
    }
}

impl TransportError {
    pub(crate) fn new(
        kind: TransportErrorKind,
        method: &Method,
        path: &str,
        status: Option<u16>,
        message: impl fmt::Display,
    ) -> Self {
        Self {
            path: path.to_string(),
            method: method.clone(),
            kind,
            status,
            message: message.to_string(),
        }
    }

    pub(crate) fn from_reqwest(error: &reqwest::Error, method: &Method, path: &str) -> Self {
        let kind = if error.is_timeout() {
            TransportErrorKind::Timeout
        } else if error.is_decode() || error.is_body() {
            TransportErrorKind::Decode
        } else {
            TransportErrorKind::Network
        };
        Self::new(
            kind,
            method,
            path,
            error.status().map(|s| s.as_u16()),
            error,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_kind_names() {
        assert_eq!(TransportErrorKind::Network.name(), "NetworkError");
        assert_eq!(TransportErrorKind::Timeout.name(), "TimeoutError");
        assert_eq!(TransportErrorKind::ServerError.to_string(), "ServerError");
    }

    #[test]
    fn test_error_status() {
        let err = ErrorKind::from(TransportError::new(
            TransportErrorKind::ServerError,
            &Method::GET,
            "/gateway",
            Some(503),
            "Service Unavailable",
        ));
        assert!(err.is_transport());
        assert_eq!(err.status(), Some(StatusCode::SERVICE_UNAVAILABLE));
        assert_eq!(
            err.to_string(),
            "ServerError on GET /gateway: Service Unavailable"
        );
        assert_eq!(ErrorKind::MissingToken.status(), None);
    }
}
