//! Configuration of the dispatch pipeline.
//!
//! Every field has a default, so a configuration file only needs the keys
//! it changes. Durations are written in human-readable form, e.g. `"15s"`
//! or `"500ms"`.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::Result;

/// Default base URL of the API
pub const DEFAULT_API: &str = "https://discord.com/api";
/// Default base URL of the CDN
pub const DEFAULT_CDN: &str = "https://cdn.discordapp.com";
/// Default API version, appended to the base URL as `/v<version>`
pub const DEFAULT_VERSION: u8 = 7;
/// Default number of retries for transient failures, 1.
pub const DEFAULT_RETRY_LIMIT: u32 = 1;
/// Default user agent, `herald/<PKG_VERSION>`.
pub const DEFAULT_USER_AGENT: &str = concat!("herald/", env!("CARGO_PKG_VERSION"));

/// Default time after which a single request attempt is cancelled
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Default cushion added on top of a bucket's reset time
const DEFAULT_TIME_OFFSET: Duration = Duration::from_millis(500);

/// Default interval between sweeps of idle buckets
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Configuration of the REST dispatch pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RestConfig {
    /// Base URL of the API, without version
    #[serde(default = "default_api")]
    pub api: Url,

    /// Base URL of the CDN
    #[serde(default = "default_cdn")]
    pub cdn: Url,

    /// API version used for versioned requests
    #[serde(default = "default_version")]
    pub version: u8,

    /// How often a request is retried after a network failure,
    /// a timeout or a 5xx response. 429 responses don't count.
    #[serde(default = "default_retry_limit")]
    pub retry_limit: u32,

    /// Time after which a single attempt is cancelled
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Extra time to wait past a bucket's reset before executing
    #[serde(default = "default_time_offset", with = "humantime_serde")]
    pub time_offset: Duration,

    /// How often idle buckets are swept. Zero disables sweeping.
    #[serde(default = "default_sweep_interval", with = "humantime_serde")]
    pub sweep_interval: Duration,

    /// User agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            api: default_api(),
            cdn: default_cdn(),
            version: default_version(),
            retry_limit: default_retry_limit(),
            request_timeout: default_request_timeout(),
            time_offset: default_time_offset(),
            sweep_interval: default_sweep_interval(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_api() -> Url {
    Url::parse(DEFAULT_API).expect("default API URL is valid")
}

fn default_cdn() -> Url {
    Url::parse(DEFAULT_CDN).expect("default CDN URL is valid")
}

const fn default_version() -> u8 {
    DEFAULT_VERSION
}

const fn default_retry_limit() -> u32 {
    DEFAULT_RETRY_LIMIT
}

const fn default_request_timeout() -> Duration {
    DEFAULT_REQUEST_TIMEOUT
}

const fn default_time_offset() -> Duration {
    DEFAULT_TIME_OFFSET
}

const fn default_sweep_interval() -> Duration {
    DEFAULT_SWEEP_INTERVAL
}

fn default_user_agent() -> String {
    String::from(DEFAULT_USER_AGENT)
}

impl RestConfig {
    /// Parse a configuration from a TOML string.
    /// Missing keys fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or contains unknown keys.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Load a configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid config.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// The base URL for a request, with the version prefix unless
    /// `versioned` is `false`.
    #[must_use]
    pub fn base_url(&self, versioned: bool) -> String {
        let api = self.api.as_str().trim_end_matches('/');
        if versioned {
            format!("{api}/v{}", self.version)
        } else {
            api.to_string()
        }
    }
}
