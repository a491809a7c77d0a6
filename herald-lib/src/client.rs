//! Handler for REST API requests.
//!
//! [`RestClient`] owns the HTTP client, the credentials and the bucket
//! registry. Each call resolves its route to a bucket and waits its turn
//! there; see [`crate::ratelimit`] for how buckets schedule requests.
use http::Method;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use typed_builder::TypedBuilder;
use url::Url;

use crate::{
    AuthProvider, BucketKey, Endpoint, ErrorKind, EventSink, LogSink, RequestOptions, Result, Route,
    Token,
    config::RestConfig,
    ratelimit::{Bucket, BucketPool, BucketStats, Dispatch},
    request::ApiRequest,
    types::ResponseBody,
};

/// Builder for [`RestClient`].
///
/// See crate-level documentation for usage example.
#[derive(TypedBuilder, Debug, Clone)]
#[builder(field_defaults(default, setter(into)))]
#[builder(builder_method(doc = "
Create a builder for building `RestClientBuilder`.

On the builder call, call methods with same name as its fields to set their values.

Finally, call `.build()` to create the instance of `RestClientBuilder`.
"))]
pub struct RestClientBuilder {
    /// Endpoints, retry policy and timing.
    config: RestConfig,

    /// Source of the `Authorization` header.
    ///
    /// Defaults to no credential, so only requests with `auth(false)`
    /// succeed.
    #[builder(default_code = "Arc::new(Token::none())", setter(!into))]
    auth: Arc<dyn AuthProvider>,

    /// Receiver of rate limit and debug notifications.
    ///
    /// Defaults to [`LogSink`].
    #[builder(default_code = "Arc::new(LogSink)", setter(!into))]
    sink: Arc<dyn EventSink>,

    /// A preconfigured HTTP client.
    ///
    /// If unset, a client with the configured user agent is created.
    #[builder(setter(strip_option))]
    http: Option<reqwest::Client>,
}

impl Default for RestClientBuilder {
    #[inline]
    fn default() -> Self {
        Self::builder().build()
    }
}

impl RestClientBuilder {
    /// Instantiates a [`RestClient`].
    ///
    /// When called inside a Tokio runtime and `sweep_interval` is not zero,
    /// a background task periodically removes idle buckets. It stops when
    /// the last clone of the client is dropped.
    ///
    /// # Errors
    ///
    /// Returns an `Err` if the HTTP client cannot be built.
    pub fn client(self) -> Result<RestClient> {
        let http = match self.http {
            Some(http) => http,
            None => reqwest::ClientBuilder::new()
                .user_agent(self.config.user_agent.clone())
                .build()
                .map_err(ErrorKind::BuildClient)?,
        };

        let pool = Arc::new(BucketPool::default());
        let sweeper = spawn_sweeper(&pool, self.config.sweep_interval);

        Ok(RestClient {
            inner: Arc::new(Inner {
                http,
                config: self.config,
                auth: self.auth,
                sink: self.sink,
                pool,
                sweeper,
            }),
        })
    }
}

fn spawn_sweeper(pool: &Arc<BucketPool>, every: Duration) -> Option<JoinHandle<()>> {
    if every.is_zero() {
        return None;
    }
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
        log::warn!("No Tokio runtime available, idle buckets are only removed by explicit sweeps");
        return None;
    };

    let pool = pool.clone();
    Some(runtime.spawn(async move {
        let mut interval = tokio::time::interval(every);
        // The first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            pool.sweep();
        }
    }))
}

/// Rate-limited handle to the REST API.
///
/// Cloning is cheap; all clones share the same buckets, global gate and
/// HTTP connection pool.
#[derive(Debug, Clone)]
pub struct RestClient {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    http: reqwest::Client,
    config: RestConfig,
    auth: Arc<dyn AuthProvider>,
    sink: Arc<dyn EventSink>,
    pool: Arc<BucketPool>,
    sweeper: Option<JoinHandle<()>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(sweeper) = self.sweeper.take() {
            sweeper.abort();
        }
    }
}

impl RestClient {
    /// Send a request to `route` and wait for its decoded response body.
    ///
    /// The request joins the queue of its bucket and is executed once every
    /// earlier request of that bucket has completed, the bucket's window
    /// allows it and the global limit is not engaged. Rate limited
    /// responses are retried transparently. Network failures, timeouts and
    /// server errors are retried up to `retry_limit` times.
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::MissingToken`] before anything is sent, if the request
    ///   needs authorization and no credential is configured
    /// - [`ErrorKind::Api`] if the server rejected the request with a 4xx
    ///   status other than 429
    /// - [`ErrorKind::Transport`] if the request failed after all retries
    pub async fn request(
        &self,
        method: Method,
        route: impl Into<Route>,
        options: RequestOptions,
    ) -> Result<ResponseBody> {
        let inner = &self.inner;
        let request = ApiRequest::new(
            method,
            &route.into(),
            options,
            &inner.config,
            inner.auth.as_ref(),
        )?;

        let ticket = inner.pool.enqueue(request.bucket.clone());
        ticket.bucket().push(request, self.dispatch()).await
    }

    /// Send a request to a prepared [`Endpoint`].
    ///
    /// # Errors
    ///
    /// See [`RestClient::request`].
    pub async fn execute(&self, endpoint: Endpoint, options: RequestOptions) -> Result<ResponseBody> {
        let (method, route) = endpoint.into_parts();
        self.request(method, route, options).await
    }

    /// `GET` a route.
    ///
    /// # Errors
    ///
    /// See [`RestClient::request`].
    pub async fn get(&self, route: impl Into<Route>, options: RequestOptions) -> Result<ResponseBody> {
        self.request(Method::GET, route, options).await
    }

    /// `POST` to a route.
    ///
    /// # Errors
    ///
    /// See [`RestClient::request`].
    pub async fn post(&self, route: impl Into<Route>, options: RequestOptions) -> Result<ResponseBody> {
        self.request(Method::POST, route, options).await
    }

    /// `PATCH` a route.
    ///
    /// # Errors
    ///
    /// See [`RestClient::request`].
    pub async fn patch(&self, route: impl Into<Route>, options: RequestOptions) -> Result<ResponseBody> {
        self.request(Method::PATCH, route, options).await
    }

    /// `PUT` to a route.
    ///
    /// # Errors
    ///
    /// See [`RestClient::request`].
    pub async fn put(&self, route: impl Into<Route>, options: RequestOptions) -> Result<ResponseBody> {
        self.request(Method::PUT, route, options).await
    }

    /// `DELETE` a route.
    ///
    /// # Errors
    ///
    /// See [`RestClient::request`].
    pub async fn delete(&self, route: impl Into<Route>, options: RequestOptions) -> Result<ResponseBody> {
        self.request(Method::DELETE, route, options).await
    }

    /// The `Authorization` header value sent with requests
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::MissingToken`] if no credential is configured.
    pub fn auth(&self) -> Result<String> {
        self.inner.auth.authorization()
    }

    /// Base URL of the API, without version
    #[must_use]
    pub fn api(&self) -> &Url {
        &self.inner.config.api
    }

    /// Base URL of the CDN
    #[must_use]
    pub fn cdn(&self) -> &Url {
        &self.inner.config.cdn
    }

    /// The configuration this client was built with
    #[must_use]
    pub fn config(&self) -> &RestConfig {
        &self.inner.config
    }

    /// Number of buckets currently tracked
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.inner.pool.len()
    }

    /// The bucket for `key`, if one is currently tracked
    #[must_use]
    pub fn bucket(&self, key: &BucketKey) -> Option<Arc<Bucket>> {
        self.inner.pool.get(key)
    }

    /// Remove all idle buckets now. Returns the number of removed buckets.
    ///
    /// A bucket is idle if nothing is queued on it and its window is not
    /// exhausted.
    pub fn sweep(&self) -> usize {
        self.inner.pool.sweep()
    }

    /// Statistics of all tracked buckets
    #[must_use]
    pub fn bucket_stats(&self) -> HashMap<BucketKey, BucketStats> {
        self.inner.pool.stats()
    }

    fn dispatch(&self) -> Dispatch<'_> {
        Dispatch {
            http: &self.inner.http,
            config: &self.inner.config,
            gate: self.inner.pool.gate(),
            sink: self.inner.sink.as_ref(),
        }
    }
}
