//! # request-governor
//!
//! Request governance for outbound provider calls: a token-bucket rate
//! limiter, a size-bounded TTL + LRU response cache, and an in-process event
//! bus with hierarchical wildcard topics.
//!
//! Wrapper modules around third-party APIs (image generation, speech,
//! search, ...) use these primitives to stay under provider quotas, avoid
//! paying twice for identical calls, and announce lifecycle events to the
//! rest of the application.
//!
//! ## Quick Start
//!
//! ```rust
//! use request_governor::{GovernorConfig, RequestGovernor};
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let config = GovernorConfig::from_json(r#"{
//!     "rateLimit": { "requests": 10, "periodMs": 1000 },
//!     "cache": { "ttlMs": 60000, "maxSizeBytes": 1048576 }
//! }"#).unwrap();
//! let governor: RequestGovernor<String> = RequestGovernor::from_config(&config).unwrap();
//!
//! let params = json!({ "prompt": "a lighthouse at dusk" });
//! let image = governor
//!     .execute("generate_image", &params, || async {
//!         // Call the provider here
//!         Ok::<_, std::io::Error>("https://cdn.example/1.png".to_string())
//!     })
//!     .await
//!     .unwrap();
//!
//! // An identical call is answered from the cache without spending a token
//! let again = governor
//!     .execute("generate_image", &params, || async {
//!         Ok::<_, std::io::Error>(String::new())
//!     })
//!     .await
//!     .unwrap();
//! assert_eq!(image, again);
//! # }
//! ```
//!
//! ## Rate Limiting
//!
//! [`RateLimiter`] holds up to `requests` tokens and refills continuously at
//! `requests / period`. An idle limiter allows a full burst; after that
//! callers of [`RateLimiter::acquire`] wait in arrival order for the next
//! token. Partial tokens carry over between calls.
//!
//! ## Caching
//!
//! [`Cache`] stores values for a fixed TTL within a byte budget. Sizes are
//! the length of each value's compact JSON encoding. When a new value does
//! not fit, least recently used entries are evicted first; a value larger
//! than the whole budget is skipped. Expired entries are dropped on read, by
//! [`Cache::cleanup`], or by a background task from [`Cache::spawn_cleanup`].
//!
//! ## Events
//!
//! [`EventBus`] delivers [`Event`]s to handlers subscribed by topic pattern:
//!
//! | Pattern        | Matches                                |
//! |----------------|----------------------------------------|
//! | `task.created` | exactly `task.created`                 |
//! | `task.*`       | `task.created`, not `task.1.done`      |
//! | `task.**`      | `task`, `task.created`, `task.1.done`  |
//! | `**.done`      | `done`, `task.done`, `task.1.done`     |
//! | `**`           | everything                             |
//!
//! Handlers are isolated: an error or panic in one is logged at `warn` and
//! the remaining handlers still run.
//!
//! ```rust
//! use request_governor::{handler, EventBus};
//!
//! let bus: EventBus<u64> = EventBus::new();
//! bus.subscribe("task.*.completed", handler(|event| {
//!     println!("task finished in {}ms", event.data);
//!     Ok(())
//! }));
//!
//! let report = bus.emit("task.42.completed", "scheduler", 1200);
//! assert_eq!(report.delivered, 1);
//! ```
//!
//! ## Logging
//!
//! The crate logs through `tracing` and never installs a subscriber.
//! Throttled acquisitions, evictions and sweeps are logged at `debug`;
//! skipped cache values and failing handlers at `warn`; cache hits and
//! misses at `trace`.
//!
//! ## Testing
//!
//! Enable the `test-helpers` feature for `infrastructure::mocks`: a
//! hand-driven `MockClock` and a `MockCaptureLayer` that records log output.

// Domain layer - pure business logic
pub mod domain;

// Application layer - orchestration
pub mod application;

// Infrastructure layer - external adapters
pub mod infrastructure;

// Re-export commonly used types for convenience
pub use domain::{
    bucket::{LimiterError, TokenBucket},
    entry::{CacheError, CacheStats},
    event::Event,
    key::CacheKey,
    pattern::TopicPattern,
};

pub use application::{
    bus::{handler, EventBus, Handler, HandlerError, PublishReport},
    cache::{BuildError, Cache, CacheBuilder, SetOutcome},
    governor::{GovernorError, RequestGovernor},
    limiter::RateLimiter,
    metrics::{Metrics, MetricsSnapshot},
    ports::{Clock, EvictionCandidate, EvictionPolicy},
    sweeper::{CleanupHandle, ShutdownError, SweeperError},
};

pub use infrastructure::{
    clock::{SystemClock, TokioClock},
    config::{CacheConfig, ConfigError, GovernorConfig, RateLimitConfig},
    eviction::LruEviction,
};
