//! Per-route rate limiting.
//!
//! Every request belongs to a bucket, identified by the [`BucketKey`] of its
//! route. A bucket runs its requests one at a time, in submission order, and
//! holds them back while the window it learned from response headers is
//! exhausted. On top of that, a global gate pauses all buckets after the
//! server reports a global rate limit.
//!
//! # Architecture
//!
//! - [`Bucket`]: FIFO queue and throttle state of one bucket
//! - [`BucketStats`]: Statistics tracking for each bucket
//! - `BucketPool`: Creates buckets on demand and sweeps idle ones
//! - `GlobalGate`: The single cross-bucket countdown
//!
//! [`BucketKey`]: crate::BucketKey

use std::time::Duration;
use tokio::time::Instant;

mod bucket;
mod global;
mod headers;
mod pool;
mod stats;

pub use bucket::Bucket;
pub(crate) use bucket::Dispatch;
pub(crate) use pool::BucketPool;
pub use stats::BucketStats;

/// Stand-in for an unreachable deadline, about 30 years out
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// `now + duration`, or a far-future instant if that would overflow.
/// Servers may send arbitrarily large `retry-after` and reset values.
pub(crate) fn deadline_after(now: Instant, duration: Duration) -> Instant {
    now.checked_add(duration)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}
