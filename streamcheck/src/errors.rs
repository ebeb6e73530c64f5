//! Error types for the streamcheck harness.
//!
//! Only failures that abort a whole run are errors. A condition that
//! disagrees with its target is not an error: it settles as invalid and
//! carries a [`FailureReason`](crate::conditions::FailureReason). A
//! timeout is not an error either; it is a completion outcome.

use thiserror::Error;

/// Longest input excerpt kept inside a [`DecodeError`].
const EXCERPT_LIMIT: usize = 64;

/// The main error type for harness operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HarnessError {
    /// The generator could not timestamp a record.
    #[error("Clock unavailable: {0}")]
    ClockUnavailable(String),

    /// A delivered value could not be decoded into a record.
    #[error("{0}")]
    Decode(#[from] DecodeError),

    /// The job did not acknowledge a stop request within the grace period.
    #[error("Job '{job}' did not stop within {grace_ms}ms")]
    StopFailure {
        /// The job name.
        job: String,
        /// The grace period that elapsed.
        grace_ms: u64,
    },

    /// A transform rejected a tuple.
    #[error("Transform on stream {stream} failed: {message}")]
    Transform {
        /// The stream the transform produces.
        stream: usize,
        /// The transform's message.
        message: String,
    },

    /// A topology refers to a stream it does not contain.
    #[error("Invalid topology: {0}")]
    InvalidTopology(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error raised when a delivered value cannot be decoded into a record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Cannot decode '{input}': {message}")]
pub struct DecodeError {
    /// A truncated excerpt of the offending input.
    pub input: String,
    /// The parser's message.
    pub message: String,
}

impl DecodeError {
    /// Creates a new decode error, truncating long inputs.
    #[must_use]
    pub fn new(input: &str, message: impl Into<String>) -> Self {
        let input = if input.chars().count() > EXCERPT_LIMIT {
            let mut excerpt: String = input.chars().take(EXCERPT_LIMIT).collect();
            excerpt.push_str("...");
            excerpt
        } else {
            input.to_string()
        };
        Self {
            input,
            message: message.into(),
        }
    }

    /// Wraps a `serde_json` failure for the given input.
    #[must_use]
    pub fn from_json(input: &str, err: &serde_json::Error) -> Self {
        Self::new(input, err.to_string())
    }
}

/// Result alias used throughout the crate.
pub type HarnessResult<T> = Result<T, HarnessError>;
