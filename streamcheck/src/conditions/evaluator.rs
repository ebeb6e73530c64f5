//! Per-shape evaluation logic behind a condition.

use super::FailureReason;
use crate::core::{Record, Tuple};
use std::fmt;

/// A stateful check over each tuple.
pub type TupleCheck = Box<dyn FnMut(&Tuple) -> Result<(), String> + Send>;

/// A stateful check over each decoded record.
pub type RecordCheck = Box<dyn FnMut(&Record) -> Result<(), String> + Send>;

/// Outcome of feeding one tuple to an evaluator.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// No verdict yet.
    Continue,
    /// The target is met and no later tuple can change that.
    Satisfied,
    /// The target can no longer be met.
    Failed(FailureReason),
}

/// The shape of a condition.
pub enum Evaluator {
    /// Exactly `n` tuples by the time the stream closes.
    ExactCount {
        /// Target count.
        n: u64,
    },
    /// At least `n` tuples.
    AtLeastCount {
        /// Minimum count.
        n: u64,
    },
    /// Exactly these tuples, in order.
    ExactContents {
        /// Expected tuples.
        expected: Vec<Tuple>,
    },
    /// Every tuple passes a check.
    TuplePredicate(TupleCheck),
    /// Every tuple decodes into a record that passes a check.
    RecordPredicate(RecordCheck),
}

impl Evaluator {
    /// Returns true if the target holds before any tuple arrives.
    #[must_use]
    pub const fn satisfied_initially(&self) -> bool {
        matches!(self, Self::AtLeastCount { n: 0 })
    }

    /// Feeds the tuple at zero-based `position`.
    pub fn on_tuple(&mut self, position: u64, tuple: &Tuple) -> Step {
        match self {
            Self::ExactCount { n } => {
                if position >= *n {
                    Step::Failed(FailureReason::Overflow {
                        expected: *n,
                        position,
                    })
                } else {
                    Step::Continue
                }
            }
            Self::AtLeastCount { n } => {
                if position + 1 >= *n {
                    Step::Satisfied
                } else {
                    Step::Continue
                }
            }
            Self::ExactContents { expected } => {
                let Some(want) = usize::try_from(position).ok().and_then(|i| expected.get(i)) else {
                    return Step::Failed(FailureReason::Overflow {
                        expected: expected.len() as u64,
                        position,
                    });
                };
                if want == tuple {
                    Step::Continue
                } else {
                    Step::Failed(FailureReason::Mismatch {
                        position,
                        expected: want.clone(),
                        actual: tuple.clone(),
                    })
                }
            }
            Self::TuplePredicate(check) => match check(tuple) {
                Ok(()) => Step::Continue,
                Err(detail) => Step::Failed(FailureReason::Rejected {
                    position,
                    tuple: tuple.clone(),
                    detail,
                }),
            },
            Self::RecordPredicate(check) => match tuple.to_record() {
                Err(error) => Step::Failed(FailureReason::Decode { position, error }),
                Ok(record) => match check(&record) {
                    Ok(()) => Step::Continue,
                    Err(detail) => Step::Failed(FailureReason::Rejected {
                        position,
                        tuple: tuple.clone(),
                        detail,
                    }),
                },
            },
        }
    }

    /// Produces the verdict once no more tuples will arrive.
    pub fn on_close(&self, observed: u64) -> Result<(), FailureReason> {
        match self {
            Self::ExactCount { n } if observed == *n => Ok(()),
            Self::ExactCount { n } => Err(FailureReason::Incomplete {
                expected: *n,
                observed,
            }),
            Self::AtLeastCount { n } if observed >= *n => Ok(()),
            Self::AtLeastCount { n } => Err(FailureReason::BelowMinimum {
                minimum: *n,
                observed,
            }),
            Self::ExactContents { expected } if observed == expected.len() as u64 => Ok(()),
            Self::ExactContents { expected } => Err(FailureReason::Incomplete {
                expected: expected.len() as u64,
                observed,
            }),
            Self::TuplePredicate(_) | Self::RecordPredicate(_) if observed == 0 => Err(FailureReason::NoTuples),
            Self::TuplePredicate(_) | Self::RecordPredicate(_) => Ok(()),
        }
    }

    /// Describes the target, for reports.
    #[must_use]
    pub fn target(&self) -> String {
        match self {
            Self::ExactCount { n } => format!("exactly {n} tuples"),
            Self::AtLeastCount { n } => format!("at least {n} tuples"),
            Self::ExactContents { expected } => format!("exact contents of {} tuples", expected.len()),
            Self::TuplePredicate(_) => "every tuple passes the predicate".to_string(),
            Self::RecordPredicate(_) => "every record passes the predicate".to_string(),
        }
    }
}

impl fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExactCount { n } => f.debug_struct("ExactCount").field("n", n).finish(),
            Self::AtLeastCount { n } => f.debug_struct("AtLeastCount").field("n", n).finish(),
            Self::ExactContents { expected } => f
                .debug_struct("ExactContents")
                .field("expected", &expected.len())
                .finish(),
            Self::TuplePredicate(_) => f.write_str("TuplePredicate"),
            Self::RecordPredicate(_) => f.write_str("RecordPredicate"),
        }
    }
}
