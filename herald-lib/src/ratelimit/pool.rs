use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use super::global::GlobalGate;
use super::{Bucket, BucketStats};
use crate::BucketKey;

/// Registry of buckets, keyed by [`BucketKey`].
///
/// Buckets are created lazily on first use and removed again by
/// [`BucketPool::sweep`] once they are idle. The pool also owns the
/// [`GlobalGate`] shared by all of its buckets.
#[derive(Debug, Default)]
pub(crate) struct BucketPool {
    buckets: DashMap<BucketKey, Arc<Bucket>>,
    gate: GlobalGate,
}

/// A place in a bucket's queue.
///
/// While a ticket exists the bucket counts as active and is never swept.
#[derive(Debug)]
pub(crate) struct QueueTicket {
    bucket: Arc<Bucket>,
}

impl QueueTicket {
    fn new(bucket: &Arc<Bucket>) -> Self {
        bucket.enter();
        Self {
            bucket: bucket.clone(),
        }
    }

    pub(crate) fn bucket(&self) -> &Bucket {
        &self.bucket
    }
}

impl Drop for QueueTicket {
    fn drop(&mut self) {
        self.bucket.leave();
    }
}

impl BucketPool {
    /// Take a place in the queue of the bucket for `key`, creating the
    /// bucket if it doesn't exist yet
    pub(crate) fn enqueue(&self, key: BucketKey) -> QueueTicket {
        // The ticket is taken while the shard is locked, so a concurrent
        // sweep cannot remove the bucket between lookup and enqueue
        match self.buckets.entry(key) {
            Entry::Occupied(entry) => QueueTicket::new(entry.get()),
            Entry::Vacant(entry) => {
                log::debug!("Creating bucket {}", entry.key());
                let bucket = Arc::new(Bucket::new(entry.key().clone()));
                QueueTicket::new(entry.insert(bucket).value())
            }
        }
    }

    /// Remove every bucket with an empty queue that isn't limited.
    /// Returns the number of removed buckets.
    pub(crate) fn sweep(&self) -> usize {
        let before = self.buckets.len();
        self.buckets.retain(|_, bucket| !bucket.is_inactive());
        let removed = before.saturating_sub(self.buckets.len());
        if removed > 0 {
            log::debug!("Swept {removed} idle buckets");
        }
        removed
    }

    pub(crate) fn gate(&self) -> &GlobalGate {
        &self.gate
    }

    pub(crate) fn len(&self) -> usize {
        self.buckets.len()
    }

    pub(crate) fn get(&self, key: &BucketKey) -> Option<Arc<Bucket>> {
        self.buckets.get(key).map(|entry| entry.value().clone())
    }

    pub(crate) fn stats(&self) -> HashMap<BucketKey, BucketStats> {
        self.buckets
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().stats()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Route;

    fn key(path: &str) -> BucketKey {
        Route::from(path).bucket_key()
    }

    #[test]
    fn test_bucket_creation_on_demand() {
        let pool = BucketPool::default();
        assert_eq!(pool.len(), 0);

        let ticket = pool.enqueue(key("/channels/1/messages"));
        assert_eq!(pool.len(), 1);
        assert_eq!(ticket.bucket().pending(), 1);
        assert_eq!(ticket.bucket().key.as_str(), "/channels/1/messages");
    }

    #[test]
    fn test_bucket_reuse() {
        let pool = BucketPool::default();
        let first = pool.enqueue(key("/channels/1/messages/123456789012345678"));
        let second = pool.enqueue(key("/channels/1/messages/223456789012345678"));

        assert_eq!(pool.len(), 1);
        assert!(std::ptr::eq(first.bucket(), second.bucket()));
        assert_eq!(first.bucket().pending(), 2);

        drop(first);
        assert_eq!(second.bucket().pending(), 1);
    }

    #[test]
    fn test_sweep_removes_only_idle_buckets() {
        let pool = BucketPool::default();
        drop(pool.enqueue(key("/gateway")));
        let busy = pool.enqueue(key("/users/@me"));
        assert_eq!(pool.len(), 2);

        assert_eq!(pool.sweep(), 1);
        assert_eq!(pool.len(), 1);
        assert!(pool.get(&key("/gateway")).is_none());
        assert!(pool.get(&key("/users/@me")).is_some());

        drop(busy);
        assert_eq!(pool.sweep(), 1);
        assert_eq!(pool.len(), 0);
    }

    #[tokio::test]
    async fn test_sweep_keeps_limited_bucket() {
        let pool = BucketPool::default();
        let ticket = pool.enqueue(key("/gateway"));
        let bucket = pool.get(&key("/gateway")).unwrap();
        drop(ticket);

        let mut throttle = bucket.throttle_for_test().await;
        throttle.remaining = 0;
        throttle.reset_at = Some(tokio::time::Instant::now() + std::time::Duration::from_secs(60));
        drop(throttle);

        assert!(bucket.is_limited());
        assert_eq!(pool.sweep(), 0);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_stats_snapshot() {
        let pool = BucketPool::default();
        let _ticket = pool.enqueue(key("/gateway"));
        let stats = pool.stats();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[&key("/gateway")].total_requests, 0);
    }
}
