//! Cache-then-limit composition used by outbound wrapper modules.
//!
//! A wrapper module routes every provider call through
//! [`RequestGovernor::execute`]: repeated calls are answered from the cache
//! without spending a rate-limit token, and fresh calls wait for a token
//! before reaching the provider.

use crate::application::cache::Cache;
use crate::application::limiter::RateLimiter;
use crate::application::metrics::Metrics;
use crate::domain::key::CacheKey;
use crate::infrastructure::config::{ConfigError, GovernorConfig};
use serde::Serialize;
use std::future::Future;
use tracing::{trace, warn};

/// Error returned by [`RequestGovernor::execute`].
#[derive(Debug)]
pub enum GovernorError<E> {
    /// The call parameters could not be encoded into a cache key
    Key(serde_json::Error),
    /// The provider call failed; the error is passed through unchanged
    Upstream(E),
}

impl<E: std::fmt::Display> std::fmt::Display for GovernorError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GovernorError::Key(e) => write!(f, "failed to derive cache key: {}", e),
            GovernorError::Upstream(e) => write!(f, "upstream call failed: {}", e),
        }
    }
}

impl<E> std::error::Error for GovernorError<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GovernorError::Key(e) => Some(e),
            GovernorError::Upstream(e) => Some(e),
        }
    }
}

impl<E> GovernorError<E> {
    /// The provider error, if the call reached the provider and failed.
    pub fn upstream(&self) -> Option<&E> {
        match self {
            GovernorError::Upstream(e) => Some(e),
            GovernorError::Key(_) => None,
        }
    }
}

/// Rate limiter and response cache for one provider.
///
/// Both components report into the same [`Metrics`].
#[derive(Debug)]
pub struct RequestGovernor<V> {
    limiter: RateLimiter,
    cache: Cache<V>,
    metrics: Metrics,
}

impl<V> RequestGovernor<V> {
    /// Build a governor from validated settings.
    ///
    /// # Errors
    /// Returns `ConfigError` if any setting is zero.
    pub fn from_config(config: &GovernorConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let metrics = Metrics::new();
        let limiter = config.rate_limit.build()?.with_metrics(metrics.clone());
        let cache = Cache::builder()
            .with_ttl(config.cache.ttl())
            .with_max_size_bytes(config.cache.max_size_bytes)
            .with_metrics(metrics.clone())
            .build()?;

        Ok(Self {
            limiter,
            cache,
            metrics,
        })
    }

    /// Combine an existing limiter and cache.
    ///
    /// The limiter is re-pointed at the cache's metrics so both report
    /// together.
    pub fn from_parts(limiter: RateLimiter, cache: Cache<V>) -> Self {
        let metrics = cache.metrics().clone();
        Self {
            limiter: limiter.with_metrics(metrics.clone()),
            cache,
            metrics,
        }
    }

    /// Run `fetch` unless an identical call is cached.
    ///
    /// The key is derived from `action` and `params`. On a hit the cached
    /// value is returned and no token is consumed. On a miss the caller waits
    /// for a token, runs `fetch`, and caches a successful result. Provider
    /// errors are never cached. A value that cannot be cached is still
    /// returned.
    ///
    /// # Errors
    /// Returns `GovernorError::Key` if `params` cannot be serialized, or
    /// `GovernorError::Upstream` with the error returned by `fetch`.
    pub async fn execute<P, F, Fut, E>(
        &self,
        action: &str,
        params: &P,
        fetch: F,
    ) -> Result<V, GovernorError<E>>
    where
        P: Serialize + ?Sized,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        V: Clone + Serialize,
    {
        let key = CacheKey::derive(action, params).map_err(GovernorError::Key)?;

        if let Some(value) = self.cache.get(key.as_str()) {
            trace!(action, "served from cache");
            return Ok(value);
        }

        self.limiter.acquire().await;
        let value = fetch().await.map_err(GovernorError::Upstream)?;

        if let Err(e) = self.cache.set(key.into_string(), value.clone()) {
            warn!(action, error = %e, "response not cached");
        }
        Ok(value)
    }

    /// Get a reference to the rate limiter.
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Get a reference to the response cache.
    pub fn cache(&self) -> &Cache<V> {
        &self.cache
    }

    /// Get a reference to the shared metrics.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}
