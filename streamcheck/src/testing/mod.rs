//! Testing utilities for streamcheck harnesses.
//!
//! This module provides:
//! - Assertions over conditions and completions
//! - Mock clocks and a recording observer
//! - Fixtures for random counts and test logging

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{assert_invalid, assert_pending, assert_settled, assert_timed_out, assert_valid};
pub use fixtures::{init_test_tracing, random_count, RANDOM_COUNT_RANGE};
pub use mocks::{BlockingObserver, FailingClock, ManualClock, RecordingObserver};
