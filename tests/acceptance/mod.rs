//! Integration tests for wind pulse acceptance testing.
//!
//! Deterministic tests replay edge intervals through a scripted delay, so a
//! sixty-second window completes instantly. Threaded tests use short real
//! windows and assert with tolerances.

mod common;
mod config_test;
mod measurement_test;
mod threaded_test;
