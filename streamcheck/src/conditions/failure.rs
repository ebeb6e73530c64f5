//! Why a condition settled as invalid.

use crate::core::Tuple;
use crate::errors::DecodeError;
use std::fmt;

/// The reason a condition is invalid.
#[derive(Debug, Clone, PartialEq)]
pub enum FailureReason {
    /// More tuples arrived than the target allows.
    Overflow {
        /// The expected count.
        expected: u64,
        /// Position of the first excess tuple.
        position: u64,
    },
    /// The stream closed with fewer tuples than expected.
    Incomplete {
        /// The expected count.
        expected: u64,
        /// The observed count.
        observed: u64,
    },
    /// The stream closed before reaching a minimum count.
    BelowMinimum {
        /// The minimum count.
        minimum: u64,
        /// The observed count.
        observed: u64,
    },
    /// A tuple differs from the expected one at the same position.
    Mismatch {
        /// Zero-based position.
        position: u64,
        /// The expected tuple.
        expected: Tuple,
        /// The observed tuple.
        actual: Tuple,
    },
    /// A tuple could not be decoded into a record.
    Decode {
        /// Zero-based position.
        position: u64,
        /// The decode failure.
        error: DecodeError,
    },
    /// A predicate rejected a tuple.
    Rejected {
        /// Zero-based position.
        position: u64,
        /// The rejected tuple.
        tuple: Tuple,
        /// The predicate's explanation.
        detail: String,
    },
    /// A predicate panicked while checking a tuple.
    Panicked {
        /// Zero-based position.
        position: u64,
        /// The panic message.
        message: String,
    },
    /// The stream closed without delivering anything to check.
    NoTuples,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overflow { expected, position } => {
                write!(f, "expected {expected}, observed {} at position {position}", position + 1)
            }
            Self::Incomplete { expected, observed } => {
                write!(f, "expected {expected}, observed only {observed}")
            }
            Self::BelowMinimum { minimum, observed } => {
                write!(f, "expected at least {minimum}, observed {observed}")
            }
            Self::Mismatch {
                position,
                expected,
                actual,
            } => write!(f, "expected {expected} at position {position}, observed {actual}"),
            Self::Decode { position, error } => write!(f, "decode failed at position {position}: {error}"),
            Self::Rejected {
                position,
                tuple,
                detail,
            } => write!(f, "rejected {tuple} at position {position}: {detail}"),
            Self::Panicked { position, message } => {
                write!(f, "predicate panicked at position {position}: {message}")
            }
            Self::NoTuples => write!(f, "no tuples observed"),
        }
    }
}
