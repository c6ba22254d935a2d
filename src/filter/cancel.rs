use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Longest stretch a worker sleeps without looking at its token.
const SLEEP_SLICE: Duration = Duration::from_millis(10);

/// Stop flag shared between a background worker and its owner.
///
/// Clones observe the same flag.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Pause between chunks for `pause`.
    ///
    /// Returns `false` as soon as the token is cancelled, `true` once the
    /// whole pause has elapsed.
    pub fn sleep(&self, pause: Duration) -> bool {
        let wake_at = Instant::now() + pause;
        while !self.is_cancelled() {
            let left = wake_at.saturating_duration_since(Instant::now());
            if left.is_zero() {
                return true;
            }
            thread::sleep(left.min(SLEEP_SLICE));
        }
        false
    }
}
