use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Longest uninterrupted sleep; Stop and Pause are noticed within this bound.
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

pub trait Clock: Send {
    fn sleep(&mut self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Returns immediately and only accounts for the time that was asked for.
///
/// Clones share the same total.
#[derive(Debug, Default, Clone)]
pub struct ManualClock {
    slept_micros: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_micros(self.slept_micros.load(Ordering::SeqCst))
    }
}

impl Clock for ManualClock {
    fn sleep(&mut self, duration: Duration) {
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        self.slept_micros.fetch_add(micros, Ordering::SeqCst);
        std::thread::yield_now();
    }
}
