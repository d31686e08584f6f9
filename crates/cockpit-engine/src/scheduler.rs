//! Single-flight delayed tasks
//!
//! Aircraft identification arrives as a burst of three variables. The first
//! update starts a delayed resolution; updates arriving while it is pending
//! are absorbed by it instead of starting or restarting another one.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

/// At most one pending task at a time
#[derive(Debug, Default)]
pub struct SingleFlight {
    pending: AtomicBool,
}

/// Held by the pending task; releases the slot when dropped
#[derive(Debug)]
pub struct FlightGuard {
    flight: Arc<SingleFlight>,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.flight.pending.store(false, Ordering::Release);
    }
}

impl SingleFlight {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Claim the slot, or `None` when a task is already pending
    pub fn try_begin(self: &Arc<Self>) -> Option<FlightGuard> {
        self.pending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightGuard {
                flight: Arc::clone(self),
            })
    }

    /// Run `task` after `delay` unless a task is already pending
    ///
    /// Returns `false` when the request was absorbed by the pending task.
    /// Cancelling `cancel` during the delay drops the task; the slot is
    /// released once the task finishes either way.
    pub fn schedule<F, Fut>(
        self: &Arc<Self>,
        delay: Duration,
        cancel: &CancellationToken,
        task: F,
    ) -> bool
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let Some(guard) = self.try_begin() else {
            return false;
        };
        let cancel = cancel.child_token();
        tokio::spawn(async move {
            let _guard = guard;
            tokio::select! {
                _ = cancel.cancelled() => debug!("Scheduled task cancelled"),
                _ = tokio::time::sleep(delay) => {
                    tokio::select! {
                        _ = cancel.cancelled() => debug!("Scheduled task cancelled while running"),
                        _ = task() => {}
                    }
                }
            }
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_guard_releases_slot() {
        let flight = SingleFlight::new();
        let guard = flight.try_begin();
        assert!(guard.is_some());
        assert!(flight.is_pending());
        assert!(flight.try_begin().is_none());
        drop(guard);
        assert!(!flight.is_pending());
        assert!(flight.try_begin().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_runs_once_from_first_request() {
        let flight = SingleFlight::new();
        let cancel = CancellationToken::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let start = tokio::time::Instant::now();
        let ran_at = Arc::new(parking_lot::Mutex::new(None));

        for i in 0..3 {
            let runs = Arc::clone(&runs);
            let ran_at = Arc::clone(&ran_at);
            let scheduled = flight.schedule(Duration::from_secs(3), &cancel, move || async move {
                runs.fetch_add(1, Ordering::SeqCst);
                *ran_at.lock() = Some(tokio::time::Instant::now());
            });
            assert_eq!(scheduled, i == 0);
            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        let elapsed = ran_at.lock().map(|at| at - start).unwrap();
        assert!(elapsed >= Duration::from_secs(3) && elapsed < Duration::from_millis(3500));
        assert!(!flight.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_drops_pending_task() {
        let flight = SingleFlight::new();
        let cancel = CancellationToken::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        flight.schedule(Duration::from_secs(3), &cancel, move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        cancel.cancel();
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert!(!flight.is_pending());
    }
}
