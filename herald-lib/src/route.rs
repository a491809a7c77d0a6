//! Typed route construction and bucket resolution.
//!
//! A [`Route`] is built segment by segment and turned into an [`Endpoint`]
//! by choosing an HTTP method. Every route also resolves to a [`BucketKey`],
//! the identity of the rate limit domain its requests share.
//!
//! ```
//! use herald_lib::Route;
//!
//! let endpoint = Route::new()
//!     .join("channels")
//!     .join(123_456_789_012_345_678u64)
//!     .join("messages")
//!     .join(987_654_321_098_765_432u64)
//!     .get();
//!
//! assert_eq!(
//!     endpoint.route().path(),
//!     "/channels/123456789012345678/messages/987654321098765432"
//! );
//! assert_eq!(
//!     endpoint.bucket_key().as_str(),
//!     "/channels/123456789012345678/messages/:id"
//! );
//! ```

use http::Method;
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// Matches snowflake-shaped identifiers
static SNOWFLAKE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{16,19}$").expect("snowflake regex is valid"));

/// Segments whose following identifier partitions the rate limit
const MAJOR_PARAMETERS: [&str; 2] = ["channels", "guilds"];

/// Segment after which all sub-routes share one bucket
const REACTIONS: &str = "reactions";

/// Placeholder for collapsed identifiers
const ID_PLACEHOLDER: &str = ":id";

/// A concrete API path, built from literal segments
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Route {
    segments: Vec<String>,
}

impl Route {
    /// Create an empty route (the API root)
    #[must_use]
    pub const fn new() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    /// Append a segment
    #[must_use]
    pub fn join(mut self, segment: impl fmt::Display) -> Self {
        self.segments.push(segment.to_string());
        self
    }

    /// The segments of this route, without the leading root
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The path of this route, e.g. `/channels/1/messages`
    #[must_use]
    pub fn path(&self) -> String {
        let mut path = String::new();
        for segment in &self.segments {
            path.push('/');
            path.push_str(segment);
        }
        path
    }

    /// Resolve the bucket this route belongs to
    #[must_use]
    pub fn bucket_key(&self) -> BucketKey {
        BucketKey::from(self)
    }

    /// Pair this route with an HTTP method
    #[must_use]
    pub const fn method(self, method: Method) -> Endpoint {
        Endpoint {
            method,
            route: self,
        }
    }

    /// `GET` this route
    #[must_use]
    pub const fn get(self) -> Endpoint {
        self.method(Method::GET)
    }

    /// `POST` to this route
    #[must_use]
    pub const fn post(self) -> Endpoint {
        self.method(Method::POST)
    }

    /// `PATCH` this route
    #[must_use]
    pub const fn patch(self) -> Endpoint {
        self.method(Method::PATCH)
    }

    /// `PUT` this route
    #[must_use]
    pub const fn put(self) -> Endpoint {
        self.method(Method::PUT)
    }

    /// `DELETE` this route
    #[must_use]
    pub const fn delete(self) -> Endpoint {
        self.method(Method::DELETE)
    }
}

impl From<&str> for Route {
    /// Split a path like `/channels/1/messages` into segments.
    /// Empty segments are skipped.
    fn from(path: &str) -> Self {
        Self {
            segments: path
                .split('/')
                .filter(|s| !s.is_empty())
                .map(ToString::to_string)
                .collect(),
        }
    }
}

impl From<String> for Route {
    fn from(path: String) -> Self {
        Self::from(path.as_str())
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// A route together with the HTTP method used to call it
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    method: Method,
    route: Route,
}

impl Endpoint {
    /// Create an endpoint from its parts
    #[must_use]
    pub const fn new(method: Method, route: Route) -> Self {
        Self { method, route }
    }

    /// The HTTP method
    #[must_use]
    pub const fn http_method(&self) -> &Method {
        &self.method
    }

    /// The route
    #[must_use]
    pub const fn route(&self) -> &Route {
        &self.route
    }

    /// Resolve the bucket this endpoint belongs to
    #[must_use]
    pub fn bucket_key(&self) -> BucketKey {
        self.route.bucket_key()
    }

    pub(crate) fn into_parts(self) -> (Method, Route) {
        (self.method, self.route)
    }
}

/// The identity of a rate limit bucket.
///
/// Derived from a route by collapsing identifiers that don't partition the
/// server's rate limits into `:id`, while keeping channel and guild ids
/// (the *major parameters*) literal. Everything after a `reactions` segment
/// is dropped, so all reaction sub-routes share one bucket.
///
/// Two routes that reduce to the same key share a bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketKey(String);

impl BucketKey {
    /// Get the key as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if this key denotes a reactions route
    #[must_use]
    pub fn is_reactions(&self) -> bool {
        self.0.split('/').any(|s| s == REACTIONS)
    }
}

impl From<&Route> for BucketKey {
    fn from(route: &Route) -> Self {
        Self(resolve(route.segments()))
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reduce route segments to a bucket key
fn resolve(segments: &[String]) -> String {
    let mut key = String::new();
    // The root segment is empty, so the first real segment's predecessor is ""
    let mut previous = "";
    for segment in segments {
        if previous == REACTIONS {
            break;
        }
        key.push('/');
        if SNOWFLAKE.is_match(segment) && !MAJOR_PARAMETERS.contains(&previous) {
            key.push_str(ID_PLACEHOLDER);
        } else {
            key.push_str(segment);
        }
        previous = segment;
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(
        "/channels/123456789012345678/messages/987654321098765432",
        "/channels/123456789012345678/messages/:id"
    )]
    #[case(
        "/channels/123/messages/456/reactions/%F0%9F%91%8D/%40me",
        "/channels/123/messages/456/reactions"
    )]
    #[case(
        "/channels/123456789012345678/messages/987654321098765432/reactions/%F0%9F%91%8D/876543210987654321",
        "/channels/123456789012345678/messages/:id/reactions"
    )]
    #[case(
        "/guilds/223456789012345678/members/323456789012345678",
        "/guilds/223456789012345678/members/:id"
    )]
    #[case(
        "/users/123456789012345678/channels",
        "/users/:id/channels"
    )]
    #[case("/gateway/bot", "/gateway/bot")]
    #[case("/channels/12345/messages", "/channels/12345/messages")]
    #[case("", "")]
    fn test_bucket_resolution(#[case] path: &str, #[case] expected: &str) {
        assert_eq!(Route::from(path).bucket_key().as_str(), expected);
    }

    #[test]
    fn test_major_parameters_partition_buckets() {
        let a = Route::from("/channels/123456789012345678/messages").bucket_key();
        let b = Route::from("/channels/223456789012345678/messages").bucket_key();
        assert_ne!(a, b);

        let c = Route::from("/channels/1/messages/123456789012345678").bucket_key();
        let d = Route::from("/channels/1/messages/223456789012345678").bucket_key();
        assert_eq!(c, d);
    }

    #[test]
    fn test_identifier_length_bounds() {
        // 15 and 20 digits are not snowflake-shaped
        assert_eq!(
            Route::from("/users/123456789012345").bucket_key().as_str(),
            "/users/123456789012345"
        );
        assert_eq!(
            Route::from("/users/12345678901234567890").bucket_key().as_str(),
            "/users/12345678901234567890"
        );
        assert_eq!(
            Route::from("/users/1234567890123456").bucket_key().as_str(),
            "/users/:id"
        );
    }

    #[test]
    fn test_only_ascii_digits_collapse() {
        // 18 Arabic-Indic digits
        let segment = "\u{661}".repeat(18);
        let key = Route::from(format!("/users/{segment}")).bucket_key();
        assert_eq!(key.as_str(), format!("/users/{segment}"));
    }

    #[test]
    fn test_reactions_key() {
        let key = Route::from("/channels/1/messages/2/reactions/x/@me").bucket_key();
        assert!(key.is_reactions());
        assert!(!Route::from("/channels/1/messages").bucket_key().is_reactions());
    }

    #[test]
    fn test_builder_matches_parsed_path() {
        let built = Route::new()
            .join("guilds")
            .join(223_456_789_012_345_678u64)
            .join("roles");
        assert_eq!(built, Route::from("/guilds/223456789012345678/roles/"));
        assert_eq!(built.to_string(), "/guilds/223456789012345678/roles");
    }

    #[test]
    fn test_endpoint_methods() {
        let endpoint = Route::from("/channels/1").delete();
        assert_eq!(endpoint.http_method(), &Method::DELETE);
        assert_eq!(endpoint.route().path(), "/channels/1");
    }
}
