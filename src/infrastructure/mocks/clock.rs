//! Mock clock for testing.

use crate::application::ports::Clock;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Manually driven clock.
///
/// Lets tests step time explicitly, so TTL expiry and LRU ordering can be
/// exercised without sleeping.
///
/// # Examples
///
/// ```
/// use request_governor::infrastructure::mocks::MockClock;
/// use request_governor::application::ports::Clock;
/// use std::time::{Duration, Instant};
///
/// let start = Instant::now();
/// let clock = MockClock::new(start);
///
/// clock.advance(Duration::from_millis(1500));
/// assert_eq!(clock.now(), start + Duration::from_millis(1500));
/// assert_eq!(clock.elapsed(), Duration::from_millis(1500));
/// ```
///
/// Clones share the same time value, so a clone handed to a cache can be
/// advanced from the test body.
#[derive(Debug, Clone)]
pub struct MockClock {
    start: Instant,
    current: Arc<Mutex<Instant>>,
}

impl MockClock {
    /// Create a mock clock starting at a specific instant.
    pub fn new(start: Instant) -> Self {
        Self {
            start,
            current: Arc::new(Mutex::new(start)),
        }
    }

    /// Create a mock clock starting at the real current instant.
    pub fn starting_now() -> Self {
        Self::new(Instant::now())
    }

    /// Advance the clock by a duration.
    pub fn advance(&self, duration: Duration) {
        *self.lock() += duration;
    }

    /// Advance the clock by a number of milliseconds.
    pub fn advance_millis(&self, millis: u64) {
        self.advance(Duration::from_millis(millis));
    }

    /// Set the clock to a specific instant.
    pub fn set(&self, instant: Instant) {
        *self.lock() = instant;
    }

    /// Time advanced since the clock was created.
    pub fn elapsed(&self) -> Duration {
        self.lock().saturating_duration_since(self.start)
    }

    fn lock(&self) -> MutexGuard<'_, Instant> {
        self.current
            .lock()
            .expect("MockClock mutex poisoned - a test thread panicked while holding the lock")
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::starting_now()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        *self.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_clock() {
        let start = Instant::now();
        let clock = MockClock::new(start);
        assert_eq!(clock.now(), start);

        clock.advance_millis(250);
        assert_eq!(clock.now(), start + Duration::from_millis(250));

        let new_time = start + Duration::from_secs(100);
        clock.set(new_time);
        assert_eq!(clock.now(), new_time);
        assert_eq!(clock.elapsed(), Duration::from_secs(100));
    }

    #[test]
    fn test_clones_share_time() {
        let clock = MockClock::starting_now();
        let shared = clock.clone();
        let before = clock.now();

        let handle = std::thread::spawn(move || shared.advance(Duration::from_secs(5)));
        handle.join().unwrap();

        assert_eq!(clock.now(), before + Duration::from_secs(5));
    }
}
