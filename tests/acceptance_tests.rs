//! Acceptance tests for the wind pulse meter.
//!
//! These tests drive the public API end to end:
//! - Scripted edge trains on a manual clock (deterministic)
//! - Configuration files feeding the sampler
//! - The threaded simulated sensor on the system clock (real time)

mod acceptance;
