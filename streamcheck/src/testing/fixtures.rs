//! Test fixtures.

use crate::observability::{init_tracing, LogFormat};
use rand::Rng;
use std::ops::RangeInclusive;

/// Range of the random counts used by scenario tests.
pub const RANDOM_COUNT_RANGE: RangeInclusive<u64> = 37..=1036;

/// Picks a random count in [`RANDOM_COUNT_RANGE`].
#[must_use]
pub fn random_count() -> u64 {
    rand::thread_rng().gen_range(RANDOM_COUNT_RANGE)
}

/// Installs a text subscriber for tests, honouring `RUST_LOG`.
pub fn init_test_tracing() {
    let _ = init_tracing(LogFormat::Text, "streamcheck=debug");
}
