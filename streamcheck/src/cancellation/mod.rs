//! Cooperative cancellation for running jobs.

mod token;

pub use token::{CancelCallback, CancellationToken};
