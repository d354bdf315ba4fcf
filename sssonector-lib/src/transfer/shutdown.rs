use std::sync::atomic::{AtomicU8, Ordering};

use tokio::sync::Notify;

const RUNNING: u8 = 0;
const STOPPING: u8 = 1;
const STOPPED: u8 = 2;

/// An idempotent shutdown state machine shared by a Transfer Engine's two
/// directions (spec §4.5 "Shutdown races", §9 "Bidirectional shutdown
/// without leaks").
///
/// The historical defect this replaces was closing the same signal channel
/// twice. Here, `Running -> Stopping` is a single compare-and-swap: exactly
/// one caller observes `true` from [`ShutdownSignal::trigger`] and is
/// responsible for releasing resources; every other concurrent or
/// subsequent caller observes `false` and returns without action.
pub struct ShutdownSignal {
    state: AtomicU8,
    notify: Notify,
    abort: AtomicU8,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self { state: AtomicU8::new(RUNNING), notify: Notify::new(), abort: AtomicU8::new(0) }
    }

    /// Request a graceful stop. Returns `true` exactly once across all
    /// concurrent callers -- the caller that wins is the one that should
    /// perform the state transition's side effects (flush, close, release).
    pub fn trigger(&self) -> bool {
        let won = self
            .state
            .compare_exchange(RUNNING, STOPPING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        self.notify.notify_waiters();
        won
    }

    /// A second, stronger signal: abandon the graceful drain and abort
    /// immediately. Idempotent like `trigger`.
    pub fn abort(&self) {
        self.trigger();
        self.abort.store(1, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub fn is_aborting(&self) -> bool {
        self.abort.load(Ordering::Acquire) == 1
    }

    pub fn is_triggered(&self) -> bool {
        self.state.load(Ordering::Acquire) != RUNNING
    }

    pub fn mark_stopped(&self) {
        self.state.store(STOPPED, Ordering::Release);
    }

    /// Resolves the next time the signal transitions (graceful or abort).
    /// Suspension point observed by both Transfer Engine activities (spec
    /// §5 "Suspension points", item (f)).
    ///
    /// The `Notified` future is created before the `is_triggered` check:
    /// `notify_waiters` only wakes futures that already exist at the time
    /// it is called, so checking first and constructing the future after
    /// would miss a `trigger`/`abort` landing in between and hang forever.
    pub async fn wait(&self) {
        let notified = self.notify.notified();
        if self.is_triggered() {
            return;
        }
        notified.await;
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn only_one_caller_wins_the_transition() {
        let sig = Arc::new(ShutdownSignal::new());
        let wins: Vec<bool> = (0..8).map(|_| sig.trigger()).collect();
        assert_eq!(wins.iter().filter(|w| **w).count(), 1);
    }

    #[tokio::test]
    async fn wait_resolves_immediately_once_triggered() {
        let sig = ShutdownSignal::new();
        sig.trigger();
        sig.wait().await;
    }
}
