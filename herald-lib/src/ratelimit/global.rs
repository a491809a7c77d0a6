use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// A countdown that any number of waiters can await
pub(crate) type Countdown = Shared<BoxFuture<'static, ()>>;

/// The cross-bucket throttle.
///
/// While engaged, no bucket may execute. Only one countdown exists at a
/// time: engaging an already engaged gate hands out the pending countdown
/// instead of starting a new one.
#[derive(Default)]
pub(crate) struct GlobalGate {
    countdown: Mutex<Option<(Instant, Countdown)>>,
    /// Number of countdowns started over the gate's lifetime
    started: AtomicUsize,
}

impl fmt::Debug for GlobalGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobalGate")
            .field("engaged", &self.is_engaged())
            .field("started", &self.countdowns_started())
            .finish()
    }
}

impl GlobalGate {
    /// Engage the gate for `duration`, unless a countdown is already pending
    pub(crate) fn engage(&self, duration: Duration) -> Countdown {
        let mut slot = self.countdown.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        if let Some((deadline, countdown)) = slot.as_ref()
            && *deadline > now
        {
            return countdown.clone();
        }

        let deadline = super::deadline_after(now, duration);
        let countdown = tokio::time::sleep_until(deadline).boxed().shared();
        *slot = Some((deadline, countdown.clone()));
        self.started.fetch_add(1, Ordering::Relaxed);
        log::warn!(
            "Global rate limit engaged for {}ms",
            duration.as_millis()
        );
        countdown
    }

    /// The pending countdown and its remaining time, if the gate is engaged
    pub(crate) fn active(&self) -> Option<(Duration, Countdown)> {
        let mut slot = self.countdown.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        match slot.as_ref() {
            Some((deadline, countdown)) if *deadline > now => {
                Some((*deadline - now, countdown.clone()))
            }
            Some(_) => {
                *slot = None;
                None
            }
            None => None,
        }
    }

    /// Returns `true` while a countdown is pending
    pub(crate) fn is_engaged(&self) -> bool {
        self.active().is_some()
    }

    /// Wait until the gate is released
    #[cfg(test)]
    pub(crate) async fn wait(&self) {
        while let Some((_, countdown)) = self.active() {
            countdown.await;
        }
    }

    pub(crate) fn countdowns_started(&self) -> usize {
        self.started.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_single_countdown() {
        let gate = GlobalGate::default();
        assert!(!gate.is_engaged());

        gate.engage(Duration::from_millis(1000));
        // A second trigger while pending joins the first countdown
        gate.engage(Duration::from_millis(5000));
        assert_eq!(gate.countdowns_started(), 1);

        let start = Instant::now();
        gate.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(1000));
        assert!(start.elapsed() < Duration::from_millis(5000));
        assert!(!gate.is_engaged());
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiters_share_countdown() {
        let gate = Arc::new(GlobalGate::default());
        gate.engage(Duration::from_millis(300));

        let start = Instant::now();
        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let gate = gate.clone();
                tokio::spawn(async move { gate.wait().await })
            })
            .collect();
        for waiter in waiters {
            waiter.await.unwrap();
        }

        assert!(start.elapsed() >= Duration::from_millis(300));
        assert_eq!(gate.countdowns_started(), 1);
    }

    #[tokio::test]
    async fn test_huge_duration_does_not_overflow() {
        let gate = GlobalGate::default();
        gate.engage(Duration::from_secs(u64::MAX));
        let (remaining, _) = gate.active().unwrap();
        assert!(remaining > Duration::from_secs(86400 * 365));
        assert_eq!(gate.countdowns_started(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reengage_after_release() {
        let gate = GlobalGate::default();
        gate.engage(Duration::from_millis(10));
        gate.wait().await;
        gate.engage(Duration::from_millis(10));
        assert_eq!(gate.countdowns_started(), 2);
    }
}
