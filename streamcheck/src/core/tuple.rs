//! Values flowing along a stream.

use super::Record;
use crate::errors::DecodeError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One value delivered on a stream.
///
/// Sources emit [`Tuple::Record`] or [`Tuple::Sequence`]; transforms turn
/// them into documents and text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Tuple {
    /// A numbered record.
    Record(Record),
    /// A bare sequence number.
    Sequence(u64),
    /// A text value.
    Text(String),
    /// A structured document.
    Document(serde_json::Value),
}

impl Tuple {
    /// Creates a text tuple.
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Returns the text value, if this is a text tuple.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the kind name, used in logs and failure descriptions.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Record(_) => "record",
            Self::Sequence(_) => "sequence",
            Self::Text(_) => "text",
            Self::Document(_) => "document",
        }
    }

    /// Decodes this tuple into a record.
    ///
    /// Documents and document text are parsed; a bare sequence number has
    /// no timestamp and cannot be decoded.
    pub fn to_record(&self) -> Result<Record, DecodeError> {
        match self {
            Self::Record(record) => Ok(*record),
            Self::Document(doc) => Record::from_document(doc),
            Self::Text(text) => Record::from_text(text),
            Self::Sequence(seq) => Err(DecodeError::new(
                &seq.to_string(),
                "a bare sequence number carries no timestamp",
            )),
        }
    }
}

impl From<Record> for Tuple {
    fn from(record: Record) -> Self {
        Self::Record(record)
    }
}

impl From<&str> for Tuple {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Tuple {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Record(record) => write!(f, "{record}"),
            Self::Sequence(seq) => write!(f, "{seq}"),
            Self::Text(text) => write!(f, "{text:?}"),
            Self::Document(doc) => write!(f, "{doc}"),
        }
    }
}
