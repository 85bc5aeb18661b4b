//! A cooperative cancellation handle shared by every suspension point in a
//! run: HTTP I/O, sleep, backoff waits, DLQ writes, budget lock acquisition.
//!
//! Grounded on the signaling style of `robustness.rs`'s `TimeoutManager` and
//! `CircuitBreaker` (`Arc<AtomicBool>` state plus `tokio::sync::Notify` for
//! wake-up), generalized into one reusable type instead of being
//! re-implemented ad hoc per suspension point.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

struct Inner {
    cancelled: AtomicBool,
    notify: Notify,
    deadline: Option<Instant>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                notify: Notify::new(),
                deadline: None,
            }),
        }
    }

    /// A token that also auto-cancels once `timeout` elapses.
    pub fn with_deadline(timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                notify: Notify::new(),
                deadline: Some(Instant::now() + timeout),
            }),
        }
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        if self.inner.cancelled.load(Ordering::SeqCst) {
            return true;
        }
        if let Some(deadline) = self.inner.deadline {
            if Instant::now() >= deadline {
                return true;
            }
        }
        false
    }

    /// Sleeps for `duration`, returning early with `true` if cancelled
    /// before the duration elapsed.
    pub async fn sleep(&self, duration: Duration) -> bool {
        if self.is_cancelled() {
            return true;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => false,
            _ = self.inner.notify.notified() => true,
            _ = self.wait_for_deadline() => true,
        }
    }

    /// Races `fut` against cancellation; `None` means cancellation won.
    pub async fn race<F, T>(&self, fut: F) -> Option<T>
    where
        F: std::future::Future<Output = T>,
    {
        if self.is_cancelled() {
            return None;
        }
        tokio::select! {
            result = fut => Some(result),
            _ = self.inner.notify.notified() => None,
            _ = self.wait_for_deadline() => None,
        }
    }

    async fn wait_for_deadline(&self) {
        match self.inner.deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancel_interrupts_sleep() {
        let token = CancellationToken::new();
        let token2 = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            token2.cancel();
        });
        let cancelled = token.sleep(Duration::from_secs(10)).await;
        assert!(cancelled);
    }

    #[tokio::test]
    async fn deadline_marks_cancelled_without_explicit_cancel() {
        let token = CancellationToken::with_deadline(Duration::from_millis(5));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn race_returns_value_when_not_cancelled() {
        let token = CancellationToken::new();
        let result = token.race(async { 42 }).await;
        assert_eq!(result, Some(42));
    }
}
