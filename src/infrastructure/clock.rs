//! Clock adapters for time operations.
//!
//! - [`SystemClock`] reads `std::time::Instant::now()`.
//! - [`TokioClock`] reads tokio's clock, which follows paused and advanced
//!   time in `#[tokio::test(start_paused = true)]` tests. Pair it with the
//!   [`RateLimiter`](crate::RateLimiter) so its sleeps and its refill
//!   arithmetic observe the same clock.
//!
//! See `MockClock` (in `crate::infrastructure::mocks`) for a manually driven
//! test clock, available with the `test-helpers` feature or in test builds.

use crate::application::ports::Clock;
use std::time::Instant;

/// System clock implementation using `Instant::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    /// Create a new system clock.
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock backed by `tokio::time::Instant`.
///
/// Identical to [`SystemClock`] in production; under a paused tokio runtime
/// it only moves when the runtime auto-advances or `tokio::time::advance` is
/// called.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl TokioClock {
    /// Create a new tokio clock.
    pub fn new() -> Self {
        Self
    }
}

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }
}
