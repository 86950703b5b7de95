//! Test doubles for infrastructure adapters.
//!
//! `MockClock` drives time by hand; `MockCaptureLayer` records log output.

pub mod clock;
pub mod layer;

pub use clock::MockClock;
pub use layer::{CapturedEvent, MockCaptureLayer};
