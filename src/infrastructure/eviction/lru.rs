//! LRU (Least Recently Used) eviction adapter.

use crate::application::ports::{EvictionCandidate, EvictionPolicy};

/// Evicts the entry whose last access is oldest.
///
/// Ties on the access instant go to the entry with the lower touch counter,
/// that is the one inserted or read earliest. The choice is therefore
/// deterministic even when the clock has not advanced between operations.
#[derive(Debug, Clone, Copy, Default)]
pub struct LruEviction;

impl LruEviction {
    /// Create a new LRU eviction policy.
    pub fn new() -> Self {
        Self
    }
}

impl<K> EvictionPolicy<K> for LruEviction
where
    K: Clone,
{
    fn select_victim(&self, candidates: &[EvictionCandidate<K>]) -> Option<K> {
        candidates
            .iter()
            .min_by_key(|candidate| (candidate.last_access, candidate.touch))
            .map(|candidate| candidate.key.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn candidate(key: &str, last_access: Instant, touch: u64) -> EvictionCandidate<String> {
        EvictionCandidate {
            key: key.to_string(),
            size: 10,
            last_access,
            touch,
        }
    }

    #[test]
    fn test_lru_select_oldest() {
        let policy = LruEviction::new();
        let now = Instant::now();

        let candidates = vec![
            candidate("key1", now + Duration::from_secs(10), 2),
            candidate("key2", now, 0),
            candidate("key3", now + Duration::from_secs(5), 1),
        ];

        assert_eq!(policy.select_victim(&candidates), Some("key2".to_string()));
    }

    #[test]
    fn test_lru_empty_candidates() {
        let policy = LruEviction::new();
        let candidates: Vec<EvictionCandidate<String>> = vec![];

        assert_eq!(policy.select_victim(&candidates), None);
    }

    #[test]
    fn test_lru_tie_broken_by_touch() {
        let policy = LruEviction::new();
        let now = Instant::now();

        // Same instant: the lowest touch counter loses regardless of slice order
        let candidates = vec![
            candidate("read_later", now, 7),
            candidate("read_earlier", now, 3),
            candidate("inserted_last", now, 9),
        ];

        assert_eq!(
            policy.select_victim(&candidates),
            Some("read_earlier".to_string())
        );
    }

    #[test]
    fn test_lru_instant_dominates_touch() {
        let policy = LruEviction::new();
        let now = Instant::now();

        let candidates = vec![
            candidate("old_high_touch", now, 100),
            candidate("new_low_touch", now + Duration::from_millis(1), 1),
        ];

        assert_eq!(
            policy.select_victim(&candidates),
            Some("old_high_touch".to_string())
        );
    }

    #[test]
    fn test_lru_many_candidates() {
        let policy = LruEviction::new();
        let now = Instant::now();

        let candidates: Vec<_> = (0..100u64)
            .map(|i| candidate(&format!("key{}", i), now + Duration::from_secs(100 - i), i))
            .collect();

        assert_eq!(policy.select_victim(&candidates), Some("key99".to_string()));
    }
}
