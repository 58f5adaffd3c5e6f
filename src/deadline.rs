//! Invocation deadline tracking
//!
//! A [`DeadlineWatcher`] turns the host's remaining-time budget into an
//! absolute instant, answers "has it passed?" without side effects, and fires
//! a one-shot callback from a background timer when it does. The runner uses
//! the callback to cancel whichever task is in flight at that moment.
//!
//! Time is read from `tokio::time::Instant`, so tests can drive the deadline
//! with a paused clock.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::types::CancellationSignal;

type Trigger = Box<dyn FnOnce(CancellationSignal) + Send>;

/// One-shot deadline timer with a cheap expiry check
///
/// The trigger runs at most once. After [`clear`](Self::clear) returns it is
/// guaranteed not to start; a trigger already running when `clear` is called
/// finishes before `clear` returns. Dropping the watcher clears it.
pub struct DeadlineWatcher {
    deadline: Instant,
    timer: CancellationToken,
    trigger: Arc<Mutex<TriggerSlot>>,
}

struct TriggerSlot {
    callback: Option<Trigger>,
    fired: bool,
}

fn lock(slot: &Mutex<TriggerSlot>) -> MutexGuard<'_, TriggerSlot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

impl DeadlineWatcher {
    /// Arm a watcher that calls `on_trigger(signal)` once `budget` has elapsed
    ///
    /// Must be called from within a Tokio runtime; the timer runs as a spawned
    /// task. A zero budget is already expired.
    pub fn arm<F>(budget: Duration, signal: CancellationSignal, on_trigger: F) -> Self
    where
        F: FnOnce(CancellationSignal) + Send + 'static,
    {
        let deadline = Instant::now() + budget;
        let timer = CancellationToken::new();
        let trigger = Arc::new(Mutex::new(TriggerSlot {
            callback: Some(Box::new(on_trigger)),
            fired: false,
        }));

        let timer_task = timer.clone();
        let trigger_task = Arc::clone(&trigger);
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = timer_task.cancelled() => {}
                _ = tokio::time::sleep_until(deadline) => {
                    // The callback runs under the slot lock so clear() cannot
                    // return while it is executing.
                    let mut slot = lock(&trigger_task);
                    if let Some(callback) = slot.callback.take() {
                        slot.fired = true;
                        tracing::warn!(
                            budget_ms = budget.as_millis() as u64,
                            "Invocation deadline reached"
                        );
                        callback(signal);
                    }
                }
            }
        });

        tracing::debug!(budget_ms = budget.as_millis() as u64, "Deadline watcher armed");

        Self {
            deadline,
            timer,
            trigger,
        }
    }

    /// Whether the deadline instant has passed
    ///
    /// Independent of whether the timer callback has run yet.
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Time left before the deadline (zero once expired)
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// The absolute deadline
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Whether the trigger callback has run
    pub fn has_fired(&self) -> bool {
        lock(&self.trigger).fired
    }

    /// Disarm the timer
    ///
    /// Idempotent, and safe to call after the trigger already fired.
    pub fn clear(&self) {
        let mut slot = lock(&self.trigger);
        if slot.callback.take().is_some() {
            tracing::debug!("Deadline watcher cleared before firing");
        }
        drop(slot);
        self.timer.cancel();
    }
}

impl Drop for DeadlineWatcher {
    fn drop(&mut self) {
        self.clear();
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_watcher(budget: Duration) -> (DeadlineWatcher, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        let watcher = DeadlineWatcher::arm(budget, CancellationSignal::timeout(), move |signal| {
            assert_eq!(signal.reason(), "task is timeout");
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        (watcher, count)
    }

    #[tokio::test(start_paused = true)]
    async fn fires_once_after_budget() {
        let (watcher, count) = counting_watcher(Duration::from_secs(5));

        assert!(!watcher.is_expired());
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert!(!watcher.is_expired());
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(watcher.is_expired());
        assert!(watcher.has_fired());
        assert_eq!(count.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1, "trigger must be one-shot");
    }

    #[tokio::test(start_paused = true)]
    async fn clear_before_deadline_prevents_trigger() {
        let (watcher, count) = counting_watcher(Duration::from_secs(1));

        watcher.clear();
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(!watcher.has_fired());
        // the expiry check is independent of the timer
        assert!(watcher.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn clear_is_idempotent_and_safe_after_firing() {
        let (watcher, count) = counting_watcher(Duration::from_millis(100));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        watcher.clear();
        watcher.clear();
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(count.load(Ordering::SeqCst), 1, "no duplicate trigger");
    }

    #[tokio::test(start_paused = true)]
    async fn zero_budget_is_expired_immediately() {
        let (watcher, count) = counting_watcher(Duration::ZERO);

        assert!(watcher.is_expired());
        assert_eq!(watcher.remaining(), Duration::ZERO);

        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_watcher_disarms_it() {
        let (watcher, count) = counting_watcher(Duration::from_secs(1));

        drop(watcher);
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn remaining_counts_down() {
        let (watcher, _count) = counting_watcher(Duration::from_secs(10));

        tokio::time::sleep(Duration::from_secs(3)).await;

        assert_eq!(watcher.remaining(), Duration::from_secs(7));
    }
}
