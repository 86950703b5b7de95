//! Ports (interfaces) for the application layer.
//!
//! In hexagonal architecture, ports define the interfaces that the application
//! layer needs. Infrastructure adapters implement these ports.

use std::fmt::Debug;
use std::time::Instant;

/// Candidate entry for eviction consideration.
///
/// Carries only the bookkeeping an eviction decision needs, so policies never
/// see (or clone) cached values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvictionCandidate<K> {
    /// The key of the entry
    pub key: K,
    /// Measured size of the entry in bytes
    pub size: usize,
    /// Last insert or read
    pub last_access: Instant,
    /// Touch counter at the last insert or read
    pub touch: u64,
}

/// Port for eviction policy decisions.
///
/// The cache delegates victim selection to a pluggable policy while it owns
/// the size accounting and the budget check. Infrastructure provides concrete
/// implementations (`LruEviction`).
pub trait EvictionPolicy<K>: Send + Sync + Debug
where
    K: Clone,
{
    /// Select a victim from the given candidates.
    ///
    /// Called only while the cache is over budget. The cache decides when to
    /// stop evicting; a `None` or a key not among the candidates makes it fall
    /// back to least recently used.
    fn select_victim(&self, candidates: &[EvictionCandidate<K>]) -> Option<K>;
}

/// Port for obtaining current time.
///
/// This abstraction allows the application layer to work with time
/// without depending on system clock implementation details.
/// Infrastructure provides concrete implementations (SystemClock, TokioClock, MockClock).
pub trait Clock: Send + Sync + Debug {
    /// Get the current instant.
    fn now(&self) -> Instant;
}
