//! Domain layer - pure logic with no clocks, locks or I/O.
//!
//! This layer contains the core concepts of request governance:
//! - Token bucket arithmetic
//! - Cache entries, size measurement and statistics
//! - Event envelopes and wildcard topic patterns
//! - Cache key derivation
//!
//! Every time-dependent function takes the current instant as an argument,
//! so all types in this layer are deterministic and easily testable.

pub mod bucket;
pub mod entry;
pub mod event;
pub mod key;
pub mod pattern;
