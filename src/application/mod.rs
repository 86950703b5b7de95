//! Application layer - orchestration of domain logic.
//!
//! This layer turns the pure domain types into shareable, thread-safe
//! services:
//! - Rate limiter (async token acquisition)
//! - Response cache and its cleanup task
//! - Event bus (topic matching and handler isolation)
//! - Request governor (cache-then-limit composition)
//!
//! ## Ports
//!
//! The application layer defines ports (traits) that infrastructure
//! adapters must implement. This keeps the application layer independent
//! from infrastructure details.

pub mod bus;
pub mod cache;
pub mod governor;
pub mod limiter;
pub mod metrics;
pub mod ports;
pub mod sweeper;
