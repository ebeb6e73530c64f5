//! Consecutive-record ordering rules for a generator's output.

use crate::core::Record;
use thiserror::Error;

/// A broken ordering rule between consecutive records.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderViolation {
    /// The first record does not start the run.
    #[error("first record has sequence {0}, expected 0")]
    FirstNotZero(u64),
    /// The sequence skipped or repeated.
    #[error("sequence {current} follows {previous}, expected {}", previous + 1)]
    Gap {
        /// Previous sequence.
        previous: u64,
        /// Current sequence.
        current: u64,
    },
    /// The record does not compare after its predecessor.
    #[error("record {current} is not ordered after {previous}")]
    NotAfter {
        /// Previous record.
        previous: Record,
        /// Current record.
        current: Record,
    },
    /// The timestamp went backwards.
    #[error("timestamp {current} is earlier than {previous}")]
    TimeReversed {
        /// Previous timestamp.
        previous: i64,
        /// Current timestamp.
        current: i64,
    },
    /// The timestamp was never captured.
    #[error("record {0} has a zero timestamp")]
    ZeroTimestamp(u64),
    /// The partitioning key differs from the sequence.
    #[error("record key {key} differs from sequence {sequence}")]
    KeyMismatch {
        /// The key.
        key: u64,
        /// The sequence.
        sequence: u64,
    },
}

/// Stateful checker for a generator's output, fed records in delivery order.
///
/// Each record must be the successor of the previous one, must not carry
/// an earlier timestamp, must have a captured (non-zero) timestamp and a
/// key equal to its sequence. The ordering comparison between consecutive
/// records is checked on its own, alongside the field-level rules.
#[derive(Debug, Clone, Default)]
pub struct OrderingCheck {
    previous: Option<Record>,
    checked: u64,
}

impl OrderingCheck {
    /// Creates a checker expecting the first record of a run.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks `current` against the previous record, then remembers it.
    pub fn check(&mut self, current: &Record) -> Result<(), OrderViolation> {
        let verdict = self.evaluate(current);
        self.previous = Some(*current);
        self.checked += 1;
        verdict
    }

    /// Returns the last record seen.
    #[must_use]
    pub const fn previous(&self) -> Option<&Record> {
        self.previous.as_ref()
    }

    /// Returns the number of records checked.
    #[must_use]
    pub const fn checked(&self) -> u64 {
        self.checked
    }

    fn evaluate(&self, current: &Record) -> Result<(), OrderViolation> {
        match &self.previous {
            None if current.sequence != 0 => return Err(OrderViolation::FirstNotZero(current.sequence)),
            None => {}
            Some(previous) => {
                if previous >= current {
                    return Err(OrderViolation::NotAfter {
                        previous: *previous,
                        current: *current,
                    });
                }
                if previous.timestamp > current.timestamp {
                    return Err(OrderViolation::TimeReversed {
                        previous: previous.timestamp,
                        current: current.timestamp,
                    });
                }
                if previous.sequence.checked_add(1) != Some(current.sequence) {
                    return Err(OrderViolation::Gap {
                        previous: previous.sequence,
                        current: current.sequence,
                    });
                }
            }
        }

        if current.timestamp == 0 {
            return Err(OrderViolation::ZeroTimestamp(current.sequence));
        }
        if current.key() != current.sequence {
            return Err(OrderViolation::KeyMismatch {
                key: current.key(),
                sequence: current.sequence,
            });
        }
        Ok(())
    }
}
