//! Serializable settings for a [`RequestGovernor`](crate::RequestGovernor).
//!
//! Wrapper modules usually read these from a JSON settings blob. Every field
//! has a default, so `{}` is a valid configuration.

use crate::application::cache::{BuildError, Cache};
use crate::application::limiter::RateLimiter;
use crate::domain::bucket::LimiterError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Error returned when configuration cannot be loaded or is invalid.
#[derive(Debug)]
pub enum ConfigError {
    /// The input was not valid configuration JSON
    Parse(serde_json::Error),
    /// Rate limit settings are invalid
    Limiter(LimiterError),
    /// Cache settings are invalid
    Cache(BuildError),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Parse(e) => write!(f, "invalid configuration: {}", e),
            ConfigError::Limiter(e) => write!(f, "invalid rate limit: {}", e),
            ConfigError::Cache(e) => write!(f, "invalid cache settings: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Parse(e) => Some(e),
            ConfigError::Limiter(e) => Some(e),
            ConfigError::Cache(e) => Some(e),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse(e)
    }
}

impl From<LimiterError> for ConfigError {
    fn from(e: LimiterError) -> Self {
        ConfigError::Limiter(e)
    }
}

impl From<BuildError> for ConfigError {
    fn from(e: BuildError) -> Self {
        ConfigError::Cache(e)
    }
}

/// Rate limit: `requests` calls per `period_ms` milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RateLimitConfig {
    pub requests: u32,
    pub period_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests: 60,
            period_ms: 60_000,
        }
    }
}

impl RateLimitConfig {
    /// Refill period as a duration.
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    /// Build a limiter from these settings.
    ///
    /// # Errors
    /// Returns `LimiterError` if `requests` or `period_ms` is zero.
    pub fn build(&self) -> Result<RateLimiter, LimiterError> {
        RateLimiter::new(self.requests, self.period())
    }
}

/// Cache: entries live `ttl_ms` milliseconds within `max_size_bytes` total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheConfig {
    pub ttl_ms: u64,
    pub max_size_bytes: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_ms: 300_000,
            max_size_bytes: 5 * 1024 * 1024,
        }
    }
}

impl CacheConfig {
    /// Time to live as a duration.
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    /// Build a cache from these settings.
    ///
    /// # Errors
    /// Returns `BuildError` if `ttl_ms` or `max_size_bytes` is zero.
    pub fn build<V>(&self) -> Result<Cache<V>, BuildError> {
        Cache::new(self.ttl(), self.max_size_bytes)
    }
}

/// Settings for one wrapper module.
///
/// # Example
/// ```
/// use request_governor::GovernorConfig;
///
/// let config = GovernorConfig::from_json(r#"{"rateLimit": {"requests": 10}}"#).unwrap();
/// assert_eq!(config.rate_limit.requests, 10);
/// assert_eq!(config.rate_limit.period_ms, 60_000);
/// assert_eq!(config.cache.ttl_ms, 300_000);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GovernorConfig {
    pub rate_limit: RateLimitConfig,
    pub cache: CacheConfig,
}

impl GovernorConfig {
    /// Parse and validate configuration from JSON.
    ///
    /// # Errors
    /// Returns `ConfigError::Parse` for malformed input, or the validation
    /// error for zero-valued settings.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every setting is usable.
    ///
    /// # Errors
    /// Returns the first invalid setting found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rate_limit.requests == 0 {
            return Err(LimiterError::ZeroRequests.into());
        }
        if self.rate_limit.period_ms == 0 {
            return Err(LimiterError::ZeroPeriod.into());
        }
        if self.cache.ttl_ms == 0 {
            return Err(BuildError::ZeroTtl.into());
        }
        if self.cache.max_size_bytes == 0 {
            return Err(BuildError::ZeroMaxSize.into());
        }
        Ok(())
    }
}
