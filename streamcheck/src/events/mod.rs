//! Lifecycle event emission.
//!
//! The engine and the tester report job and condition lifecycle changes to
//! an [`EventSink`]. The default sink discards everything.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

use std::sync::Arc;

/// Job submitted to the engine.
pub const JOB_SUBMITTED: &str = "job.submitted";
/// Job ran to natural completion.
pub const JOB_COMPLETED: &str = "job.completed";
/// Job stopped on request.
pub const JOB_STOPPED: &str = "job.stopped";
/// Job aborted with an error.
pub const JOB_FAILED: &str = "job.failed";
/// A condition reached a verdict.
pub const CONDITION_SETTLED: &str = "condition.settled";
/// The tester finished with a settled outcome.
pub const TESTER_COMPLETED: &str = "tester.completed";
/// The tester's deadline elapsed.
pub const TESTER_TIMED_OUT: &str = "tester.timed_out";

/// Returns the default sink.
#[must_use]
pub fn default_sink() -> Arc<dyn EventSink> {
    Arc::new(NoOpEventSink)
}
