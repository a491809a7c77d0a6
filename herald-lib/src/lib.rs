//! `herald` is a rate-limited dispatcher for a chat platform's REST API.
//!
//! Requests are grouped into buckets by route. Each bucket runs its
//! requests one at a time, in the order they were submitted, and respects
//! the rate limit windows the server reports. A global rate limit pauses
//! all buckets at once.
//!
//! ```no_run
//! use herald_lib::{RequestOptions, RestClientBuilder, Result, Route, Token};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = RestClientBuilder::builder()
//!         .auth(Arc::new(Token::bot("my-token")))
//!         .build()
//!         .client()?;
//!
//!     let channel = Route::new().join("channels").join("81384788765712384");
//!     let options = RequestOptions::builder()
//!         .data(json!({"content": "Hello!"}))
//!         .build();
//!     let message = client.post(channel.join("messages"), options).await?;
//!     println!("{message:?}");
//!     Ok(())
//! }
//! ```
//!
//! Configuration can also be loaded from a TOML file with
//! [`RestConfig::load`].
#![warn(clippy::all, clippy::pedantic)]
#![warn(
    absolute_paths_not_starting_with_crate,
    rustdoc::invalid_html_tags,
    missing_copy_implementations,
    missing_debug_implementations,
    semicolon_in_expressions_from_macros,
    unreachable_pub,
    unused_extern_crates,
    variant_size_differences,
    clippy::missing_const_for_fn
)]
#![deny(anonymous_parameters, macro_use_extern_crate)]
#![deny(missing_docs)]

mod auth;
mod client;
mod events;
mod request;
mod retry;
mod route;
mod types;

pub mod config;
pub mod ratelimit;

pub use crate::{
    auth::{AuthProvider, DEFAULT_TOKEN_PREFIX, Token},
    client::{RestClient, RestClientBuilder},
    config::RestConfig,
    events::{EventSink, LogSink, RateLimitEvent},
    ratelimit::{Bucket, BucketStats},
    request::{AUDIT_LOG_REASON, FilePart, RequestOptions},
    route::{BucketKey, Endpoint, Route},
    types::{
        ApiError, ErrorKind, ResponseBody, Result, TransportError, TransportErrorKind,
        flatten_errors,
    },
};
