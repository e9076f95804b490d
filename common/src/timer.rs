//! Interruptible sleep for long-lived background loops.
//!
//! A [`CancellableTimer`] sleeps in small fixed steps and checks a shared
//! flag between steps, so cancelling it wakes any sleeper within one step.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Granularity at which sleepers notice cancellation.
pub const SLEEP_STEP: Duration = Duration::from_millis(500);

/// Cloneable handle; all clones share the same armed/cancelled flag.
#[derive(Debug, Clone)]
pub struct CancellableTimer {
    active: Arc<AtomicBool>,
    step: Duration,
}

impl Default for CancellableTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellableTimer {
    /// A new timer starts armed.
    pub fn new() -> Self {
        Self {
            active: Arc::new(AtomicBool::new(true)),
            step: SLEEP_STEP,
        }
    }

    pub fn with_step(mut self, step: Duration) -> Self {
        self.step = step.max(Duration::from_millis(1));
        self
    }

    pub fn step(&self) -> Duration {
        self.step
    }

    pub fn arm(&self) {
        self.active.store(true, Ordering::SeqCst);
    }

    /// Wake every sleeper within one step; later sleeps return at once.
    pub fn cancel(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Sleep for `duration` in steps.
    ///
    /// Returns `true` if the whole duration elapsed, `false` if the timer
    /// was cancelled before or during the sleep.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if !self.is_active() {
                return false;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return true;
            }
            std::thread::sleep(remaining.min(self.step));
        }
    }
}
