//! The numbered record produced by a sequence generator.

use crate::errors::DecodeError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// One numbered record: a sequence number plus the time it was produced.
///
/// Records are ordered by `sequence` alone. Within one generator run no two
/// records share a sequence number, so this is a total order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Record {
    /// Position in the run, starting at 0.
    pub sequence: u64,
    /// Milliseconds since the Unix epoch when the record was produced.
    #[serde(rename = "time")]
    pub timestamp: i64,
}

impl Record {
    /// Creates a record.
    #[must_use]
    pub const fn new(sequence: u64, timestamp: i64) -> Self {
        Self {
            sequence,
            timestamp,
        }
    }

    /// Partitioning key. Always equal to the sequence number.
    #[must_use]
    pub const fn key(&self) -> u64 {
        self.sequence
    }

    /// Renders the record as a structured document with `sequence` and `time` fields.
    #[must_use]
    pub fn to_document(&self) -> serde_json::Value {
        serde_json::json!({
            "sequence": self.sequence,
            "time": self.timestamp,
        })
    }

    /// Rebuilds a record from a structured document.
    pub fn from_document(doc: &serde_json::Value) -> Result<Self, DecodeError> {
        Self::deserialize(doc).map_err(|e| DecodeError::new(&doc.to_string(), e.to_string()))
    }

    /// Renders the record as canonical document text.
    #[must_use]
    pub fn to_text(&self) -> String {
        self.to_document().to_string()
    }

    /// Parses document text back into a record.
    pub fn from_text(text: &str) -> Result<Self, DecodeError> {
        serde_json::from_str(text).map_err(|e| DecodeError::from_json(text, &e))
    }
}

impl PartialOrd for Record {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Record {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sequence.cmp(&other.sequence)
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}@{}", self.sequence, self.timestamp)
    }
}
