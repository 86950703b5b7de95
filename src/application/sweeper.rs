//! Periodic removal of expired cache entries.
//!
//! Reads already drop expired entries lazily; the sweeper reclaims the space
//! held by entries nobody reads again.

use crate::application::cache::Cache;
use std::sync::Weak;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

/// Error returned when the cleanup task cannot be started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweeperError {
    /// Cleanup interval must be greater than zero
    ZeroInterval,
}

impl std::fmt::Display for SweeperError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SweeperError::ZeroInterval => write!(f, "cleanup interval must be greater than 0"),
        }
    }
}

impl std::error::Error for SweeperError {}

/// Error returned when the cleanup task does not stop cleanly.
#[derive(Debug)]
pub enum ShutdownError {
    /// The task panicked while sweeping
    TaskPanicked,
    /// The task was cancelled by the runtime
    TaskCancelled,
}

impl std::fmt::Display for ShutdownError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownError::TaskPanicked => write!(f, "cleanup task panicked"),
            ShutdownError::TaskCancelled => write!(f, "cleanup task was cancelled"),
        }
    }
}

impl std::error::Error for ShutdownError {}

/// Handle to a running cleanup task.
///
/// Dropping the handle does not stop the task. Call
/// [`shutdown`](Self::shutdown), or drop the cache, which ends the task at
/// its next tick.
#[derive(Debug)]
pub struct CleanupHandle {
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl CleanupHandle {
    /// Stop the task and wait for it to finish.
    ///
    /// # Errors
    /// Returns `ShutdownError` if the task panicked or was cancelled.
    pub async fn shutdown(self) -> Result<(), ShutdownError> {
        // The task may already have exited because the cache was dropped
        let _ = self.shutdown_tx.send(());

        self.task.await.map_err(|e| {
            if e.is_panic() {
                ShutdownError::TaskPanicked
            } else {
                ShutdownError::TaskCancelled
            }
        })
    }

    /// Check if the task is still running.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

pub(crate) fn spawn<V>(cache: Weak<Cache<V>>, period: Duration) -> Result<CleanupHandle, SweeperError>
where
    V: Send + 'static,
{
    if period.is_zero() {
        return Err(SweeperError::ZeroInterval);
    }

    let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

    let task = tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = &mut shutdown_rx => break,
                _ = ticker.tick() => {
                    let Some(cache) = cache.upgrade() else {
                        debug!("cache dropped, stopping cleanup task");
                        break;
                    };
                    cache.cleanup();
                }
            }
        }
    });

    Ok(CleanupHandle { shutdown_tx, task })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::mocks::MockClock;
    use std::sync::Arc;

    fn cache(clock: &MockClock) -> Arc<Cache<String>> {
        Arc::new(
            Cache::builder()
                .with_ttl(Duration::from_millis(100))
                .with_max_size_bytes(1024)
                .with_clock(Arc::new(clock.clone()))
                .build()
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_zero_interval_rejected() {
        let clock = MockClock::starting_now();
        let cache = cache(&clock);
        assert_eq!(
            cache.spawn_cleanup(Duration::ZERO).unwrap_err(),
            SweeperError::ZeroInterval
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeps_expired_entries() {
        let clock = MockClock::starting_now();
        let cache = cache(&clock);
        cache.set("a", "1".to_string()).unwrap();
        cache.set("b", "2".to_string()).unwrap();

        let handle = cache.spawn_cleanup(Duration::from_secs(1)).unwrap();
        clock.advance_millis(150);

        // Nothing runs before the first period elapses
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(cache.len(), 2);

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.stats().current_size, 0);

        assert!(handle.is_running());
        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_task() {
        let clock = MockClock::starting_now();
        let cache = cache(&clock);
        let handle = cache.spawn_cleanup(Duration::from_secs(1)).unwrap();

        handle.shutdown().await.unwrap();

        cache.set("a", "1".to_string()).unwrap();
        clock.advance_millis(150);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_ends_when_cache_dropped() {
        let clock = MockClock::starting_now();
        let cache = cache(&clock);
        let handle = cache.spawn_cleanup(Duration::from_secs(1)).unwrap();

        drop(cache);
        tokio::time::sleep(Duration::from_millis(1100)).await;
        tokio::task::yield_now().await;

        assert!(!handle.is_running());
        handle.shutdown().await.unwrap();
    }
}
