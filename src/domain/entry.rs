//! Cache entries and statistics.

use serde::Serialize;
use std::time::{Duration, Instant};

/// Error returned when a cache value cannot be measured.
#[derive(Debug)]
pub enum CacheError {
    /// The value could not be serialized to compute its size
    Serialization(serde_json::Error),
}

impl std::fmt::Display for CacheError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheError::Serialization(e) => write!(f, "failed to measure cache value: {}", e),
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CacheError::Serialization(e) => Some(e),
        }
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(e: serde_json::Error) -> Self {
        CacheError::Serialization(e)
    }
}

/// Size of a value in bytes, measured as its compact JSON encoding.
///
/// A string of `n` ASCII characters measures `n + 2` bytes (the quotes).
///
/// # Example
/// ```
/// use request_governor::domain::entry::measure;
///
/// assert_eq!(measure(&"hello").unwrap(), 7);
/// assert_eq!(measure(&vec![1, 2, 3]).unwrap(), 7);
/// ```
pub fn measure<V: Serialize + ?Sized>(value: &V) -> Result<usize, serde_json::Error> {
    serde_json::to_vec(value).map(|bytes| bytes.len())
}

/// A cached value with its bookkeeping.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The cached value
    pub value: V,
    /// Measured size in bytes
    pub size: usize,
    /// When the entry stops being served
    pub expires_at: Instant,
    /// Last insert or read
    pub last_accessed: Instant,
    /// Cache-wide touch counter at the last insert or read, breaks LRU ties
    pub touch: u64,
}

/// Lifetime used when `now + ttl` is not representable.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

fn expiry(now: Instant, ttl: Duration) -> Instant {
    now.checked_add(ttl)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

impl<V> CacheEntry<V> {
    /// Create an entry stored at `now` that lives for `ttl`.
    pub fn new(value: V, size: usize, now: Instant, ttl: Duration, touch: u64) -> Self {
        Self {
            value,
            size,
            expires_at: expiry(now, ttl),
            last_accessed: now,
            touch,
        }
    }

    /// Whether the entry is expired at `now`.
    ///
    /// An entry is expired from its expiry instant onwards.
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    /// Record a read at `now`.
    pub fn touch(&mut self, now: Instant, touch: u64) {
        self.last_accessed = now;
        self.touch = touch;
    }
}

/// Point-in-time view of cache occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStats {
    /// Number of stored entries (expired entries count until removed)
    pub item_count: usize,
    /// Sum of stored entry sizes in bytes
    pub current_size: usize,
    /// Configured byte budget
    pub max_size_bytes: usize,
    /// `current_size / max_size_bytes`
    pub utilization: f64,
}

impl CacheStats {
    pub(crate) fn new(item_count: usize, current_size: usize, max_size_bytes: usize) -> Self {
        let utilization = if max_size_bytes == 0 {
            0.0
        } else {
            current_size as f64 / max_size_bytes as f64
        };
        Self {
            item_count,
            current_size,
            max_size_bytes,
            utilization,
        }
    }
}
