use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// Wall-clock source consulted for nonce expiry.
///
/// Injected rather than read from a global so TTL behavior can be tested
/// deterministically; see [`MockClock`].
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// The real clock. This is what a server uses in production.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
///
/// Time starts at construction and advances by [`sleep`](MockClock::sleep),
/// letting tests cross TTL boundaries without wall-clock waits.
pub struct MockClock {
    base: Instant,
    offset: Mutex<Duration>,
}

impl MockClock {
    pub fn new() -> Self {
        MockClock {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    /// Advance simulated time by `duration`.
    pub fn sleep(&self, duration: Duration) {
        *self.offset.lock() += duration;
    }
}

impl Default for MockClock {
    fn default() -> Self {
        MockClock::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.base + *self.offset.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_clock_advances_only_on_sleep() {
        let clock = MockClock::new();
        let t0 = clock.now();
        assert_eq!(clock.now(), t0);

        clock.sleep(Duration::from_millis(500));
        assert_eq!(clock.now() - t0, Duration::from_millis(500));

        clock.sleep(Duration::from_millis(250));
        assert_eq!(clock.now() - t0, Duration::from_millis(750));
    }
}
