//! Utility functions for clocks and identifiers.

pub mod clock;

pub use clock::{Clock, SystemClock};

/// Generates a new random UUID (v4) for job identifiers.
#[must_use]
pub fn generate_uuid() -> uuid::Uuid {
    uuid::Uuid::new_v4()
}
