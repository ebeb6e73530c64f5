//! Wall-clock sampling for record timestamps.

use crate::errors::HarnessError;
use chrono::Utc;
use std::fmt::Debug;

/// A source of millisecond timestamps.
#[cfg_attr(test, mockall::automock)]
pub trait Clock: Send + Sync + Debug {
    /// Returns the current time in milliseconds since the Unix epoch.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::ClockUnavailable` if the time cannot be read.
    fn now_millis(&self) -> Result<i64, HarnessError>;
}

/// The host wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> Result<i64, HarnessError> {
        let millis = Utc::now().timestamp_millis();
        if millis <= 0 {
            // A zero timestamp means "not captured" downstream.
            return Err(HarnessError::ClockUnavailable(format!(
                "host clock reads {millis}ms, before the Unix epoch"
            )));
        }
        Ok(millis)
    }
}
