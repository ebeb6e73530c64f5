//! A single execution of a sequence generator.

use crate::core::Record;
use crate::errors::HarnessError;
use crate::utils::Clock;
use std::sync::Arc;

/// The live cursor of one generator execution.
///
/// Yields `Ok(record)` until the limit is reached. A failed clock read
/// yields one `Err` and fuses the run; no partial record is produced.
#[derive(Debug)]
pub struct GeneratorRun {
    clock: Arc<dyn Clock>,
    limit: Option<u64>,
    next_sequence: u64,
    last_timestamp: i64,
    failed: bool,
}

impl GeneratorRun {
    /// Starts a run, probing the clock once before anything is emitted.
    pub fn start(clock: Arc<dyn Clock>, limit: Option<u64>) -> Result<Self, HarnessError> {
        let last_timestamp = clock.now_millis()?;
        Ok(Self {
            clock,
            limit,
            next_sequence: 0,
            last_timestamp,
            failed: false,
        })
    }

    /// Sequence number the next record will carry.
    #[must_use]
    pub const fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// Returns true once the run will emit nothing more.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.failed || self.limit.is_some_and(|limit| self.next_sequence >= limit)
    }
}

impl Iterator for GeneratorRun {
    type Item = Result<Record, HarnessError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.is_exhausted() {
            return None;
        }

        let now = match self.clock.now_millis() {
            Ok(now) => now,
            Err(e) => {
                self.failed = true;
                return Some(Err(e));
            }
        };
        // Host clocks can step backwards; timestamps within a run must not.
        self.last_timestamp = self.last_timestamp.max(now);

        let record = Record::new(self.next_sequence, self.last_timestamp);
        self.next_sequence += 1;
        Some(Ok(record))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self.limit {
            _ if self.failed => (0, Some(0)),
            Some(limit) => {
                let remaining = usize::try_from(limit - self.next_sequence).unwrap_or(usize::MAX);
                (0, Some(remaining))
            }
            None => (0, None),
        }
    }
}
