//! Completion controller.
//!
//! A [`Tester`] attaches conditions to a topology, submits it to an engine
//! and waits until the evidence is in or a deadline passes. The returned
//! [`Completion`] keeps a timeout distinct from a failed condition.

mod completion;
mod controller;
mod integration_tests;

pub use completion::{Completion, CompletionOutcome};
pub use controller::Tester;
