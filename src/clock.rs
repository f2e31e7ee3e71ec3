//! Time source used by the capture loop.
//!
//! The loop only needs "how long since X" and "wait this long". Keeping both
//! behind a trait lets tests run forty-second sections in virtual time.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Monotonic time plus a blocking sleep
pub trait Clock {
    /// Time elapsed since the clock's origin
    fn now(&self) -> Duration;

    /// Suspend the current task for `d`
    fn sleep(&self, d: Duration);
}

/// Wall clock backed by `Instant` and `std::thread::sleep`
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, d: Duration) {
        std::thread::sleep(d);
    }
}

/// Virtual clock: `sleep` advances time instantly
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward without sleeping
    pub fn advance(&self, d: Duration) {
        let mut g = self.now.lock().unwrap();
        *g += d;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.now.lock().unwrap()
    }

    fn sleep(&self, d: Duration) {
        self.advance(d);
    }
}
