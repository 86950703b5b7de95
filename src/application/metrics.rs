//! Observability metrics for request governance.
//!
//! One `Metrics` handle can be shared by a limiter, a cache and a bus so a
//! wrapper module reports a single set of counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counters tracking limiter, cache and bus activity.
///
/// All metrics use atomic operations for thread-safe updates and reads.
/// Clones share the same counters.
#[derive(Debug, Clone, Default)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug, Default)]
struct MetricsInner {
    acquisitions: AtomicU64,
    throttled_acquisitions: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    cache_expirations: AtomicU64,
    cache_evictions: AtomicU64,
    cache_rejections: AtomicU64,
    events_published: AtomicU64,
    handler_failures: AtomicU64,
}

impl Metrics {
    /// Create a new metrics tracker.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_acquisition(&self, throttled: bool) {
        self.inner.acquisitions.fetch_add(1, Ordering::Relaxed);
        if throttled {
            self.inner
                .throttled_acquisitions
                .fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_hit(&self) {
        self.inner.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.inner.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_expirations(&self, count: u64) {
        self.inner
            .cache_expirations
            .fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_eviction(&self) {
        self.inner.cache_evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejection(&self) {
        self.inner.cache_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_published(&self) {
        self.inner.events_published.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_handler_failure(&self) {
        self.inner.handler_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Tokens granted by `acquire`/`try_acquire`.
    pub fn acquisitions(&self) -> u64 {
        self.inner.acquisitions.load(Ordering::Relaxed)
    }

    /// Acquisitions that had to wait for a refill.
    pub fn throttled_acquisitions(&self) -> u64 {
        self.inner.throttled_acquisitions.load(Ordering::Relaxed)
    }

    /// Cache reads that returned a value.
    pub fn cache_hits(&self) -> u64 {
        self.inner.cache_hits.load(Ordering::Relaxed)
    }

    /// Cache reads that returned nothing (absent or expired).
    pub fn cache_misses(&self) -> u64 {
        self.inner.cache_misses.load(Ordering::Relaxed)
    }

    /// Entries removed because their TTL elapsed.
    pub fn cache_expirations(&self) -> u64 {
        self.inner.cache_expirations.load(Ordering::Relaxed)
    }

    /// Entries removed to make room for new ones.
    pub fn cache_evictions(&self) -> u64 {
        self.inner.cache_evictions.load(Ordering::Relaxed)
    }

    /// Values not stored because they exceed the whole cache budget.
    pub fn cache_rejections(&self) -> u64 {
        self.inner.cache_rejections.load(Ordering::Relaxed)
    }

    /// Events passed to `publish`.
    pub fn events_published(&self) -> u64 {
        self.inner.events_published.load(Ordering::Relaxed)
    }

    /// Handler invocations that returned an error or panicked.
    pub fn handler_failures(&self) -> u64 {
        self.inner.handler_failures.load(Ordering::Relaxed)
    }

    /// Get a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            acquisitions: self.acquisitions(),
            throttled_acquisitions: self.throttled_acquisitions(),
            cache_hits: self.cache_hits(),
            cache_misses: self.cache_misses(),
            cache_expirations: self.cache_expirations(),
            cache_evictions: self.cache_evictions(),
            cache_rejections: self.cache_rejections(),
            events_published: self.events_published(),
            handler_failures: self.handler_failures(),
        }
    }

    /// Reset all metrics to zero.
    pub fn reset(&self) {
        let inner = &self.inner;
        for counter in [
            &inner.acquisitions,
            &inner.throttled_acquisitions,
            &inner.cache_hits,
            &inner.cache_misses,
            &inner.cache_expirations,
            &inner.cache_evictions,
            &inner.cache_rejections,
            &inner.events_published,
            &inner.handler_failures,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// A point-in-time snapshot of metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct MetricsSnapshot {
    pub acquisitions: u64,
    pub throttled_acquisitions: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_expirations: u64,
    pub cache_evictions: u64,
    pub cache_rejections: u64,
    pub events_published: u64,
    pub handler_failures: u64,
}

impl MetricsSnapshot {
    /// Fraction of cache reads that hit (0.0 to 1.0).
    ///
    /// Returns 0.0 if the cache has not been read.
    pub fn hit_rate(&self) -> f64 {
        let total = self.cache_hits.saturating_add(self.cache_misses);
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }

    /// Fraction of acquisitions that had to wait (0.0 to 1.0).
    pub fn throttle_rate(&self) -> f64 {
        if self.acquisitions == 0 {
            0.0
        } else {
            self.throttled_acquisitions as f64 / self.acquisitions as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_initial_state() {
        assert_eq!(Metrics::new().snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_record_acquisition() {
        let metrics = Metrics::new();
        metrics.record_acquisition(false);
        metrics.record_acquisition(true);
        metrics.record_acquisition(true);
        assert_eq!(metrics.acquisitions(), 3);
        assert_eq!(metrics.throttled_acquisitions(), 2);
    }

    #[test]
    fn test_hit_rate() {
        let metrics = Metrics::new();
        assert_eq!(metrics.snapshot().hit_rate(), 0.0);

        metrics.record_hit();
        metrics.record_miss();
        assert!((metrics.snapshot().hit_rate() - 0.5).abs() < f64::EPSILON);

        metrics.record_hit();
        metrics.record_hit();
        assert!((metrics.snapshot().hit_rate() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_throttle_rate() {
        let metrics = Metrics::new();
        assert_eq!(metrics.snapshot().throttle_rate(), 0.0);
        metrics.record_acquisition(false);
        metrics.record_acquisition(true);
        assert!((metrics.snapshot().throttle_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_snapshot_and_reset() {
        let metrics = Metrics::new();
        metrics.record_expirations(3);
        metrics.record_eviction();
        metrics.record_rejection();
        metrics.record_published();
        metrics.record_handler_failure();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.cache_expirations, 3);
        assert_eq!(snapshot.cache_evictions, 1);
        assert_eq!(snapshot.cache_rejections, 1);
        assert_eq!(snapshot.events_published, 1);
        assert_eq!(snapshot.handler_failures, 1);

        metrics.reset();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_metrics_clone_shares_counters() {
        let metrics1 = Metrics::new();
        let metrics2 = metrics1.clone();
        metrics1.record_hit();
        metrics2.record_hit();
        assert_eq!(metrics1.cache_hits(), 2);
    }

    #[test]
    fn test_concurrent_updates() {
        use std::thread;

        let metrics = Metrics::new();
        let mut handles = vec![];

        for _ in 0..10 {
            let m = metrics.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    m.record_published();
                    m.record_miss();
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(metrics.events_published(), 1000);
        assert_eq!(metrics.cache_misses(), 1000);
    }
}
