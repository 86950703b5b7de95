//! Size-bounded response cache with TTL expiry and LRU eviction.
//!
//! Entries are measured by their compact JSON encoding when stored. A value
//! larger than the whole budget is skipped, not an error; otherwise the least
//! recently used entries are evicted until the new value fits. Expired entries
//! are removed lazily when read, or in bulk by [`Cache::cleanup`].

use crate::application::metrics::Metrics;
use crate::application::ports::{Clock, EvictionCandidate, EvictionPolicy};
use crate::application::sweeper::{self, CleanupHandle, SweeperError};
use crate::domain::entry::{measure, CacheEntry, CacheError, CacheStats};
use crate::infrastructure::clock::SystemClock;
use crate::infrastructure::eviction::LruEviction;

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Error returned when building a cache fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// Time to live must be greater than zero
    ZeroTtl,
    /// Maximum size must be greater than zero
    ZeroMaxSize,
}

impl std::fmt::Display for BuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildError::ZeroTtl => write!(f, "cache ttl must be greater than 0"),
            BuildError::ZeroMaxSize => write!(f, "cache max_size_bytes must be greater than 0"),
        }
    }
}

impl std::error::Error for BuildError {}

/// Result of [`Cache::set`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    /// The value was stored after evicting `evicted` other entries
    Stored { size: usize, evicted: usize },
    /// The value alone exceeds the cache budget and was not stored
    Rejected { size: usize },
}

impl SetOutcome {
    /// Check if the value was stored.
    pub fn is_stored(&self) -> bool {
        matches!(self, SetOutcome::Stored { .. })
    }

    /// Measured size of the value in bytes.
    pub fn size(&self) -> usize {
        match self {
            SetOutcome::Stored { size, .. } | SetOutcome::Rejected { size } => *size,
        }
    }
}

/// Builder for constructing a [`Cache`].
pub struct CacheBuilder {
    ttl: Duration,
    max_size_bytes: usize,
    clock: Option<Arc<dyn Clock>>,
    eviction_policy: Option<Arc<dyn EvictionPolicy<String>>>,
    metrics: Option<Metrics>,
}

impl CacheBuilder {
    /// Set how long an entry is served after it is stored.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the byte budget shared by all entries.
    pub fn with_max_size_bytes(mut self, max_size_bytes: usize) -> Self {
        self.max_size_bytes = max_size_bytes;
        self
    }

    /// Set a custom clock (mainly for testing).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Replace the default LRU victim selection.
    pub fn with_eviction_policy(mut self, policy: Arc<dyn EvictionPolicy<String>>) -> Self {
        self.eviction_policy = Some(policy);
        self
    }

    /// Report into a shared metrics handle.
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Build the cache.
    ///
    /// # Errors
    /// Returns `BuildError` if the ttl or the size budget is zero.
    pub fn build<V>(self) -> Result<Cache<V>, BuildError> {
        if self.ttl.is_zero() {
            return Err(BuildError::ZeroTtl);
        }
        if self.max_size_bytes == 0 {
            return Err(BuildError::ZeroMaxSize);
        }

        Ok(Cache {
            state: Mutex::new(CacheState::new()),
            ttl: self.ttl,
            max_size_bytes: self.max_size_bytes,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock::new())),
            eviction_policy: self
                .eviction_policy
                .unwrap_or_else(|| Arc::new(LruEviction::new())),
            metrics: self.metrics.unwrap_or_default(),
        })
    }
}

#[derive(Debug)]
struct CacheState<V> {
    entries: HashMap<String, CacheEntry<V>, ahash::RandomState>,
    current_size: usize,
    touches: u64,
}

impl<V> CacheState<V> {
    fn new() -> Self {
        Self {
            entries: HashMap::default(),
            current_size: 0,
            touches: 0,
        }
    }

    fn next_touch(&mut self) -> u64 {
        self.touches += 1;
        self.touches
    }

    fn remove(&mut self, key: &str) -> Option<CacheEntry<V>> {
        let entry = self.entries.remove(key)?;
        self.current_size -= entry.size;
        Some(entry)
    }

    fn fits(&self, incoming: usize, max_bytes: usize) -> bool {
        self.current_size.saturating_add(incoming) <= max_bytes
    }

    fn candidates(&self) -> Vec<EvictionCandidate<String>> {
        self.entries
            .iter()
            .map(|(key, entry)| EvictionCandidate {
                key: key.clone(),
                size: entry.size,
                last_access: entry.last_accessed,
                touch: entry.touch,
            })
            .collect()
    }
}

/// Response cache bounded by total size, with per-entry expiry.
///
/// # Invariants
/// - the reported size always equals the sum of stored entry sizes
/// - after every `set` the reported size is within `max_size_bytes`
/// - `get` never returns an entry at or past its expiry instant
///
/// All operations take one internal lock, so the measured insert, evict and
/// account sequence of `set` is atomic with respect to other callers.
///
/// # Example
/// ```
/// use request_governor::Cache;
/// use std::time::Duration;
///
/// let cache: Cache<String> = Cache::new(Duration::from_secs(1), 100).unwrap();
///
/// // Each value measures 60 bytes (58 characters plus JSON quotes)
/// cache.set("a", "x".repeat(58)).unwrap();
/// cache.set("b", "y".repeat(58)).unwrap();
///
/// // 60 + 60 > 100, so the least recently used entry was evicted
/// assert_eq!(cache.get("a"), None);
/// assert!(cache.get("b").is_some());
/// assert_eq!(cache.stats().current_size, 60);
/// ```
#[derive(Debug)]
pub struct Cache<V> {
    state: Mutex<CacheState<V>>,
    ttl: Duration,
    max_size_bytes: usize,
    clock: Arc<dyn Clock>,
    eviction_policy: Arc<dyn EvictionPolicy<String>>,
    metrics: Metrics,
}

impl Cache<()> {
    /// Create a builder for configuring a cache.
    ///
    /// Defaults:
    /// - TTL: 5 minutes
    /// - Max size: 5 MiB
    /// - Eviction: LRU
    pub fn builder() -> CacheBuilder {
        CacheBuilder {
            ttl: Duration::from_secs(300),
            max_size_bytes: 5 * 1024 * 1024,
            clock: None,
            eviction_policy: None,
            metrics: None,
        }
    }
}

impl<V> Cache<V> {
    /// Create a cache with the given ttl and byte budget.
    ///
    /// # Errors
    /// Returns `BuildError` if either argument is zero.
    pub fn new(ttl: Duration, max_size_bytes: usize) -> Result<Self, BuildError> {
        Cache::builder()
            .with_ttl(ttl)
            .with_max_size_bytes(max_size_bytes)
            .build()
    }

    /// Look up a value.
    ///
    /// An expired entry is removed and reported as a miss. A hit refreshes the
    /// entry's recency but not its expiry.
    pub fn get(&self, key: &str) -> Option<V>
    where
        V: Clone,
    {
        let now = self.clock.now();
        let mut state = self.lock_state();

        let expired = match state.entries.get(key) {
            None => {
                trace!(key, "cache miss");
                self.metrics.record_miss();
                return None;
            }
            Some(entry) => entry.is_expired(now),
        };

        if expired {
            state.remove(key);
            trace!(key, "cache entry expired");
            self.metrics.record_expirations(1);
            self.metrics.record_miss();
            return None;
        }

        let touch = state.next_touch();
        let entry = state.entries.get_mut(key)?;
        entry.touch(now, touch);
        trace!(key, "cache hit");
        self.metrics.record_hit();
        Some(entry.value.clone())
    }

    /// Store a value, evicting least recently used entries to make room.
    ///
    /// A value larger than `max_size_bytes` is skipped and the cache is left
    /// unchanged; callers must not assume a later `get` hits. Storing under an
    /// existing key replaces the old value and releases its size first.
    ///
    /// # Errors
    /// Returns `CacheError::Serialization` if the value cannot be measured.
    pub fn set(&self, key: impl Into<String>, value: V) -> Result<SetOutcome, CacheError>
    where
        V: Serialize,
    {
        let key = key.into();
        let size = measure(&value)?;

        if size > self.max_size_bytes {
            warn!(
                key = %key,
                size,
                max_size_bytes = self.max_size_bytes,
                "value larger than cache budget, not cached"
            );
            self.metrics.record_rejection();
            return Ok(SetOutcome::Rejected { size });
        }

        let now = self.clock.now();
        let mut state = self.lock_state();
        state.remove(&key);

        let mut evicted = 0;
        let mut candidates: Option<Vec<EvictionCandidate<String>>> = None;
        while !state.fits(size, self.max_size_bytes) {
            let pool = candidates.get_or_insert_with(|| state.candidates());
            let Some(position) = self.pick_victim(pool) else {
                break;
            };
            let victim = pool.swap_remove(position).key;
            let Some(entry) = state.remove(&victim) else {
                continue;
            };
            debug!(key = %victim, size = entry.size, "evicted cache entry");
            self.metrics.record_eviction();
            evicted += 1;
        }

        let touch = state.next_touch();
        state
            .entries
            .insert(key, CacheEntry::new(value, size, now, self.ttl, touch));
        state.current_size += size;

        Ok(SetOutcome::Stored { size, evicted })
    }

    /// Remove an entry. Returns whether one was present.
    pub fn delete(&self, key: &str) -> bool {
        self.lock_state().remove(key).is_some()
    }

    /// Remove every entry.
    pub fn clear(&self) {
        let mut state = self.lock_state();
        state.entries.clear();
        state.current_size = 0;
    }

    /// Whether an unexpired entry exists, without refreshing its recency.
    pub fn contains_key(&self, key: &str) -> bool {
        let now = self.clock.now();
        self.lock_state()
            .entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired(now))
    }

    /// Remove every expired entry. Returns how many were removed.
    pub fn cleanup(&self) -> usize {
        let now = self.clock.now();
        let mut guard = self.lock_state();
        let state = &mut *guard;

        let mut freed = 0;
        let before = state.entries.len();
        state.entries.retain(|_, entry| {
            if entry.is_expired(now) {
                freed += entry.size;
                false
            } else {
                true
            }
        });
        state.current_size -= freed;
        let removed = before - state.entries.len();
        drop(guard);

        if removed > 0 {
            debug!(removed, freed_bytes = freed, "swept expired cache entries");
            self.metrics.record_expirations(removed as u64);
        }
        removed
    }

    /// Start a background task that calls [`cleanup`](Self::cleanup) every `interval`.
    ///
    /// The task holds only a weak reference and stops by itself once the
    /// cache is dropped.
    ///
    /// # Errors
    /// Returns `SweeperError::ZeroInterval` if `interval` is zero.
    ///
    /// # Panics
    /// Panics if called outside a tokio runtime.
    pub fn spawn_cleanup(self: &Arc<Self>, interval: Duration) -> Result<CleanupHandle, SweeperError>
    where
        V: Send + 'static,
    {
        sweeper::spawn(Arc::downgrade(self), interval)
    }

    /// Occupancy statistics. Has no side effects.
    pub fn stats(&self) -> CacheStats {
        let state = self.lock_state();
        CacheStats::new(state.entries.len(), state.current_size, self.max_size_bytes)
    }

    /// Number of stored entries, including expired ones not yet removed.
    pub fn len(&self) -> usize {
        self.lock_state().entries.len()
    }

    /// Check if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.lock_state().entries.is_empty()
    }

    /// Configured time to live.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Configured byte budget.
    pub fn max_size_bytes(&self) -> usize {
        self.max_size_bytes
    }

    /// Expiry instant of an entry, if present.
    pub fn expires_at(&self, key: &str) -> Option<Instant> {
        self.lock_state().entries.get(key).map(|e| e.expires_at)
    }

    /// Get a reference to the metrics.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Position of the next victim in `pool`, as chosen by the policy.
    ///
    /// Falls back to least recently used when the policy declines or names a
    /// key that is not a candidate.
    fn pick_victim(&self, pool: &[EvictionCandidate<String>]) -> Option<usize> {
        self.eviction_policy
            .select_victim(pool)
            .and_then(|key| pool.iter().position(|candidate| candidate.key == key))
            .or_else(|| {
                let key = LruEviction::new().select_victim(pool)?;
                pool.iter().position(|candidate| candidate.key == key)
            })
    }

    fn lock_state(&self) -> MutexGuard<'_, CacheState<V>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
