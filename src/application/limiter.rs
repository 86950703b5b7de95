//! Token-bucket rate limiter for outbound calls.
//!
//! A wrapper module awaits [`RateLimiter::acquire`] before each network call.
//! The bucket starts full, so an idle limiter allows a burst of `requests`
//! calls; after that callers are paced at `requests / period`.

use crate::application::metrics::Metrics;
use crate::application::ports::Clock;
use crate::domain::bucket::{LimiterError, TokenBucket};
use crate::infrastructure::clock::TokioClock;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

/// Gates outbound calls to at most `requests` per `period`.
///
/// # Concurrency
///
/// Waiting callers queue on a FIFO async mutex: the refill, check, wait and
/// decrement sequence runs for one caller at a time, so concurrent callers can
/// never both observe the same token. The bucket state itself sits behind a
/// short synchronous lock that is never held across an `await`.
///
/// # Clock
///
/// `acquire` sleeps on tokio's timer, so the limiter's clock must advance with
/// it. The default [`TokioClock`] does, including under paused test time.
#[derive(Debug)]
pub struct RateLimiter {
    bucket: Mutex<TokenBucket>,
    queue: tokio::sync::Mutex<()>,
    clock: Arc<dyn Clock>,
    metrics: Metrics,
}

impl RateLimiter {
    /// Create a limiter allowing `requests` calls per `period`.
    ///
    /// # Errors
    /// Returns `LimiterError` if `requests` or `period` is zero.
    ///
    /// # Example
    /// ```
    /// use request_governor::RateLimiter;
    /// use std::time::Duration;
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let limiter = RateLimiter::new(2, Duration::from_secs(1)).unwrap();
    /// limiter.acquire().await; // immediate
    /// limiter.acquire().await; // immediate
    /// assert!(!limiter.try_acquire()); // bucket empty
    /// # }
    /// ```
    pub fn new(requests: u32, period: Duration) -> Result<Self, LimiterError> {
        Self::with_clock(requests, period, Arc::new(TokioClock::new()))
    }

    /// Create a limiter reading time from `clock`.
    ///
    /// # Errors
    /// Returns `LimiterError` if `requests` or `period` is zero.
    pub fn with_clock(
        requests: u32,
        period: Duration,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, LimiterError> {
        let bucket = TokenBucket::new(requests, period, clock.now())?;
        Ok(Self {
            bucket: Mutex::new(bucket),
            queue: tokio::sync::Mutex::new(()),
            clock,
            metrics: Metrics::new(),
        })
    }

    /// Report into a shared metrics handle.
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Wait until a token is available, then consume it.
    ///
    /// Resolves immediately while the bucket holds a whole token. Otherwise
    /// sleeps for the computed refill time and re-checks after waking.
    /// Dropping the future gives up the place in the queue without
    /// consuming a token.
    pub async fn acquire(&self) {
        let _turn = self.queue.lock().await;
        let mut throttled = false;

        loop {
            let wait = {
                let mut bucket = self.lock_bucket();
                if bucket.try_consume(self.clock.now()) {
                    break;
                }
                bucket.time_until_available()
            };

            throttled = true;
            debug!(
                wait_ms = wait.as_secs_f64() * 1000.0,
                "rate limit reached, waiting for refill"
            );
            tokio::time::sleep(wait).await;
        }

        self.metrics.record_acquisition(throttled);
    }

    /// Consume a token without waiting.
    ///
    /// Returns `false` if the bucket is empty or other callers are already
    /// queued in `acquire`.
    pub fn try_acquire(&self) -> bool {
        let Ok(_turn) = self.queue.try_lock() else {
            return false;
        };

        let granted = self.lock_bucket().try_consume(self.clock.now());
        if granted {
            self.metrics.record_acquisition(false);
        }
        granted
    }

    /// Tokens available right now, after accounting for refill.
    pub fn available_tokens(&self) -> f64 {
        let mut bucket = self.lock_bucket();
        bucket.refill(self.clock.now());
        bucket.tokens()
    }

    /// Time a caller arriving now would wait, ignoring queued callers.
    pub fn time_until_available(&self) -> Duration {
        let mut bucket = self.lock_bucket();
        bucket.refill(self.clock.now());
        bucket.time_until_available()
    }

    /// Reset to full capacity with a fresh refill timestamp.
    ///
    /// In-flight waits are not cancelled; they re-check the bucket when they
    /// wake and find it full.
    pub fn destroy(&self) {
        self.lock_bucket().reset(self.clock.now());
    }

    /// Capacity ceiling (the configured `requests`).
    pub fn max_tokens(&self) -> f64 {
        self.lock_bucket().max_tokens()
    }

    /// Refill rate in tokens per second.
    pub fn refill_rate(&self) -> f64 {
        self.lock_bucket().refill_rate()
    }

    /// Get a reference to the metrics.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    // Every critical section leaves the bucket consistent, so a poisoned
    // lock still guards valid state.
    fn lock_bucket(&self) -> MutexGuard<'_, TokenBucket> {
        self.bucket.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
