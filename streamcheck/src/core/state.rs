//! Condition verdict states.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The verdict of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionState {
    /// Not enough evidence yet.
    #[default]
    Pending,
    /// The evidence satisfies the target.
    Valid,
    /// The evidence contradicts the target.
    Invalid,
}

impl fmt::Display for ConditionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Valid => write!(f, "valid"),
            Self::Invalid => write!(f, "invalid"),
        }
    }
}

impl ConditionState {
    /// Returns true if the state is a verdict rather than pending.
    #[must_use]
    pub const fn is_decided(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}
