//! Request descriptors.
//!
//! An [`ApiRequest`] is an immutable description of a single API call. It
//! is built once per call and turned into a fresh [`reqwest::Request`] for
//! every attempt, so retries resend exactly the same request.

use bytes::Bytes;
use http::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use http::Method;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use std::time::Duration;
use typed_builder::TypedBuilder;
use url::Url;

use crate::{
    AuthProvider, BucketKey, Result, Route, TransportError, TransportErrorKind,
    config::RestConfig,
};

/// Header carrying the reason shown in the guild audit log
pub const AUDIT_LOG_REASON: HeaderName = HeaderName::from_static("x-audit-log-reason");

/// Characters left alone by JavaScript's `encodeURIComponent`
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// A named binary attachment, sent as multipart form data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    /// Form field name, also used as file name
    pub name: String,
    /// File contents
    pub data: Bytes,
}

impl FilePart {
    /// Create a new file part
    #[must_use]
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

/// Per-call options.
///
/// ```
/// use herald_lib::RequestOptions;
/// use serde_json::json;
///
/// let options = RequestOptions::builder()
///     .data(json!({"content": "hello"}))
///     .reason("cleanup")
///     .build();
/// assert!(options.versioned);
/// ```
#[derive(TypedBuilder, Debug, Clone)]
#[builder(field_defaults(default, setter(into)))]
pub struct RequestOptions {
    /// Query parameters, in order. `null` values and the strings `"null"`
    /// and `"undefined"` are dropped; arrays expand to repeated keys.
    pub query: Vec<(String, Value)>,

    /// Prefix the path with the API version
    #[builder(default = true)]
    pub versioned: bool,

    /// Send the `Authorization` header
    #[builder(default = true)]
    pub auth: bool,

    /// Reason recorded in the audit log
    #[builder(setter(strip_option))]
    pub reason: Option<String>,

    /// Extra headers, applied last so they override the defaults
    pub headers: HeaderMap,

    /// Structured payload. Sent as JSON, or as `payload_json` next to files
    #[builder(setter(strip_option))]
    pub data: Option<Value>,

    /// Binary attachments. When present the body is multipart form data.
    pub files: Vec<FilePart>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[derive(Debug, Clone)]
enum Body {
    Empty,
    Json(Bytes),
    Multipart {
        files: Vec<FilePart>,
        payload_json: Option<String>,
    },
}

/// An immutable description of one API call.
///
/// Only `retries` changes, once per transient failure.
#[derive(Debug, Clone)]
pub(crate) struct ApiRequest {
    pub(crate) method: Method,
    /// Path including the query string, used for errors and events
    pub(crate) path: String,
    pub(crate) bucket: BucketKey,
    pub(crate) retries: u32,
    url: Url,
    headers: HeaderMap,
    body: Body,
}

impl ApiRequest {
    /// Build a descriptor.
    ///
    /// # Errors
    ///
    /// Fails before any network activity if authorization is requested but
    /// no credential is configured, or if a header or URL is invalid.
    pub(crate) fn new(
        method: Method,
        route: &Route,
        options: RequestOptions,
        config: &RestConfig,
        auth: &dyn AuthProvider,
    ) -> Result<Self> {
        let path = format!("{}{}", route.path(), query_string(&options.query));
        let url = Url::parse(&format!("{}{path}", config.base_url(options.versioned)))?;

        let mut headers = HeaderMap::new();
        if options.auth {
            let mut value = HeaderValue::from_str(&auth.authorization()?)?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }
        if let Some(reason) = options.reason.as_deref() {
            headers.insert(
                AUDIT_LOG_REASON,
                HeaderValue::from_str(&utf8_percent_encode(reason, URI_COMPONENT).to_string())?,
            );
        }
        headers.insert(USER_AGENT, HeaderValue::from_str(&config.user_agent)?);

        let body = if options.files.is_empty() {
            match options.data {
                Some(data) => {
                    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                    Body::Json(Bytes::from(serde_json::to_vec(&data)?))
                }
                None => Body::Empty,
            }
        } else {
            Body::Multipart {
                files: options.files,
                payload_json: options.data.map(|data| data.to_string()),
            }
        };

        // Caller headers replace the defaults, keeping every value
        for name in options.headers.keys() {
            headers.remove(name);
        }
        for (name, value) in &options.headers {
            headers.append(name, value.clone());
        }

        log::trace!("Built request {method} {url}");

        Ok(Self {
            bucket: route.bucket_key(),
            method,
            path,
            retries: 0,
            url,
            headers,
            body,
        })
    }

    /// Create a fresh [`reqwest::Request`] for one attempt
    fn to_reqwest(&self, http: &reqwest::Client) -> reqwest::Result<reqwest::Request> {
        let builder = http
            .request(self.method.clone(), self.url.clone())
            .headers(self.headers.clone());

        let builder = match &self.body {
            Body::Empty => builder,
            Body::Json(bytes) => builder.body(bytes.clone()),
            Body::Multipart {
                files,
                payload_json,
            } => {
                let mut form = Form::new();
                for file in files {
                    form = form.part(
                        file.name.clone(),
                        Part::bytes(file.data.to_vec()).file_name(file.name.clone()),
                    );
                }
                if let Some(payload) = payload_json {
                    form = form.text("payload_json", payload.clone());
                }
                builder.multipart(form)
            }
        };

        builder.build()
    }

    /// Run one attempt under a timeout.
    ///
    /// The timer is dropped on every exit path. A timeout cancels the
    /// in-flight call and is reported as a [`TransportError`].
    pub(crate) async fn execute(
        &self,
        http: &reqwest::Client,
        timeout: Duration,
    ) -> std::result::Result<reqwest::Response, TransportError> {
        let request = self
            .to_reqwest(http)
            .map_err(|e| TransportError::from_reqwest(&e, &self.method, &self.path))?;

        match tokio::time::timeout(timeout, http.execute(request)).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => Err(TransportError::from_reqwest(&e, &self.method, &self.path)),
            Err(_) => Err(TransportError::new(
                TransportErrorKind::Timeout,
                &self.method,
                &self.path,
                None,
                format!("Request timed out after {}ms", timeout.as_millis()),
            )),
        }
    }
}

/// Build the query string, including the leading `?`, or an empty string
fn query_string(query: &[(String, Value)]) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    let mut any = false;
    for (key, value) in query {
        let values: Vec<&Value> = match value {
            Value::Array(items) => items.iter().collect(),
            other => vec![other],
        };
        for value in values.into_iter().filter_map(query_value) {
            serializer.append_pair(key, &value);
            any = true;
        }
    }

    if any {
        format!("?{}", serializer.finish())
    } else {
        String::new()
    }
}

fn query_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s == "null" || s == "undefined" => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
