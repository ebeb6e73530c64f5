//! Conditions attached to streams.
//!
//! A [`Condition`] observes one stream and settles to `Valid` or `Invalid`.
//! The shapes are:
//! - exact count, which fails fast on overflow
//! - minimum count, which settles as soon as the threshold is reached
//! - exact contents, compared position by position
//! - predicates over tuples or decoded records
//!
//! [`OrderingCheck`] packages the ordering rules for a generator's output.

mod condition;
mod evaluator;
mod failure;
mod ordering;

pub use condition::{Condition, ConditionReport};
pub use evaluator::{Evaluator, RecordCheck, Step, TupleCheck};
pub use failure::FailureReason;
pub use ordering::{OrderViolation, OrderingCheck};
