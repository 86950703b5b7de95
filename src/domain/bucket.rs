//! Token bucket arithmetic.
//!
//! Pure state machine behind the [`RateLimiter`](crate::RateLimiter). Capacity
//! refills continuously at a fixed rate up to a ceiling; each permitted request
//! consumes one token. All time inputs are explicit so the math can be tested
//! without a clock.

use std::time::{Duration, Instant};

/// Slack absorbed when comparing accrued tokens against a whole token, so
/// float rounding after an exactly computed wait never forces a second wait.
const TOKEN_EPSILON: f64 = 1e-9;

/// Error returned when a limiter is configured with an unusable rate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LimiterError {
    /// The request budget must be greater than zero
    ZeroRequests,
    /// The refill period must be greater than zero
    ZeroPeriod,
}

impl std::fmt::Display for LimiterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LimiterError::ZeroRequests => write!(f, "requests per period must be greater than 0"),
            LimiterError::ZeroPeriod => write!(f, "rate limit period must be greater than 0"),
        }
    }
}

impl std::error::Error for LimiterError {}

/// Token bucket state.
///
/// # Example
/// ```
/// use request_governor::TokenBucket;
/// use std::time::{Duration, Instant};
///
/// let start = Instant::now();
/// let mut bucket = TokenBucket::new(2, Duration::from_secs(1), start).unwrap();
///
/// // Full bucket allows a burst
/// assert!(bucket.try_consume(start));
/// assert!(bucket.try_consume(start));
/// assert!(!bucket.try_consume(start));
///
/// // Two tokens per second: one token is back after 500ms
/// assert_eq!(bucket.time_until_available(), Duration::from_millis(500));
/// assert!(bucket.try_consume(start + Duration::from_millis(500)));
/// ```
#[derive(Debug, Clone)]
pub struct TokenBucket {
    tokens: f64,
    max_tokens: f64,
    refill_rate: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// Create a full bucket allowing `requests` per `period`.
    ///
    /// # Errors
    /// Returns `LimiterError` if either argument is zero.
    pub fn new(requests: u32, period: Duration, now: Instant) -> Result<Self, LimiterError> {
        if requests == 0 {
            return Err(LimiterError::ZeroRequests);
        }
        if period.is_zero() {
            return Err(LimiterError::ZeroPeriod);
        }

        let max_tokens = f64::from(requests);
        Ok(Self {
            tokens: max_tokens,
            max_tokens,
            refill_rate: max_tokens / period.as_secs_f64(),
            last_refill: now,
        })
    }

    /// Add the tokens accrued since the last refill, clamped at capacity.
    ///
    /// A `now` earlier than the last refill adds nothing.
    pub fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        self.tokens = (self.tokens + elapsed.as_secs_f64() * self.refill_rate).min(self.max_tokens);
        if now > self.last_refill {
            self.last_refill = now;
        }
    }

    /// Refill, then take one token if a whole token is available.
    pub fn try_consume(&mut self, now: Instant) -> bool {
        self.refill(now);
        if self.has_token() {
            self.tokens = (self.tokens - 1.0).max(0.0);
            true
        } else {
            false
        }
    }

    /// Time until one whole token is available, based on the last refill.
    ///
    /// Returns zero when a token is already available.
    pub fn time_until_available(&self) -> Duration {
        if self.has_token() {
            return Duration::ZERO;
        }
        // Round up to whole nanoseconds, ignoring float noise below a femtosecond
        let nanos = ((1.0 - self.tokens) / self.refill_rate * 1e9 - 1e-6).ceil();
        Duration::from_nanos(nanos.max(0.0) as u64)
    }

    fn has_token(&self) -> bool {
        self.tokens + TOKEN_EPSILON >= 1.0
    }

    /// Restore full capacity as of `now`.
    pub fn reset(&mut self, now: Instant) {
        self.tokens = self.max_tokens;
        self.last_refill = now;
    }

    /// Tokens available as of the last refill.
    pub fn tokens(&self) -> f64 {
        self.tokens
    }

    /// Capacity ceiling.
    pub fn max_tokens(&self) -> f64 {
        self.max_tokens
    }

    /// Refill rate in tokens per second.
    pub fn refill_rate(&self) -> f64 {
        self.refill_rate
    }

    /// Instant of the last refill computation.
    pub fn last_refill(&self) -> Instant {
        self.last_refill
    }
}
