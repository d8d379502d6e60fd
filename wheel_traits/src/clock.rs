use std::thread;
use std::time::{Duration, Instant};

/// Monotonic clock abstraction for motion timing and the movement watchdog.
///
/// - now(): returns a monotonic Instant
/// - sleep(): blocks for the provided duration (implementations may simulate)
/// - ms_since(): elapsed milliseconds from an epoch Instant
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, d: Duration);

    /// Milliseconds elapsed since `epoch`, saturating at 0 on underflow.
    fn ms_since(&self, epoch: Instant) -> u64 {
        let dur = self.now().saturating_duration_since(epoch);
        u64::try_from(dur.as_millis()).unwrap_or(u64::MAX)
    }

    /// Sleep for `ms` milliseconds; zero returns immediately.
    fn sleep_ms(&self, ms: u64) {
        if ms > 0 {
            self.sleep(Duration::from_millis(ms));
        }
    }
}

/// Real-time monotonic clock backed by std::time::Instant.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl MonotonicClock {
    #[inline]
    pub fn new() -> Self {
        Self
    }
}

impl Clock for MonotonicClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }

    #[inline]
    fn sleep(&self, d: Duration) {
        if d.is_zero() {
            return;
        }
        thread::sleep(d);
    }
}

#[cfg(any(test, feature = "test-util"))]
pub mod test_clock {
    use super::{Clock, Duration, Instant};
    use std::sync::{Arc, Mutex};

    /// Deterministic clock whose time only moves when advanced or slept on.
    ///
    /// `sleep(d)` advances time by `d` and records it, so tests can assert how
    /// long a motion would have blocked without actually waiting.
    #[derive(Debug, Clone)]
    pub struct TestClock {
        origin: Instant,
        inner: Arc<Mutex<Inner>>,
    }

    #[derive(Debug, Default)]
    struct Inner {
        offset: Duration,
        slept: Duration,
        sleeps: usize,
    }

    impl Default for TestClock {
        fn default() -> Self {
            Self::new()
        }
    }

    impl TestClock {
        pub fn new() -> Self {
            Self {
                origin: Instant::now(),
                inner: Arc::new(Mutex::new(Inner::default())),
            }
        }

        /// Move time forward without counting it as a sleep.
        pub fn advance(&self, d: Duration) {
            if let Ok(mut g) = self.inner.lock() {
                g.offset = g.offset.saturating_add(d);
            }
        }

        /// Total time spent in `sleep` calls.
        pub fn slept(&self) -> Duration {
            self.inner.lock().map(|g| g.slept).unwrap_or(Duration::ZERO)
        }

        /// Number of non-zero `sleep` calls.
        pub fn sleep_count(&self) -> usize {
            self.inner.lock().map(|g| g.sleeps).unwrap_or(0)
        }
    }

    impl Clock for TestClock {
        fn now(&self) -> Instant {
            let off = self.inner.lock().map(|g| g.offset).unwrap_or(Duration::ZERO);
            self.origin + off
        }

        fn sleep(&self, d: Duration) {
            if d.is_zero() {
                return;
            }
            if let Ok(mut g) = self.inner.lock() {
                g.offset = g.offset.saturating_add(d);
                g.slept = g.slept.saturating_add(d);
                g.sleeps += 1;
            }
        }
    }

}
