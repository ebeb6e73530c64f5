//! # Streamcheck
//!
//! Conditions and a completion controller for testing stream jobs that run
//! asynchronously.
//!
//! A test builds a [`pipeline::Topology`] from a sequence generator and
//! transforms, attaches conditions to its streams through a
//! [`tester::Tester`], then lets the tester run the job on a
//! [`pipeline::LocalEngine`] until:
//!
//! - every end condition has settled,
//! - the job has run out of input, or
//! - the deadline passes.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use streamcheck::prelude::*;
//!
//! let mut tester = Tester::new();
//! let mut topology = Topology::new("beacon");
//! let source = topology.add_source(SequenceGenerator::unbounded());
//! let enough = tester.at_least_tuple_count(&mut topology, source, 100);
//!
//! let completion = tester
//!     .complete(&LocalEngine::new(), topology, &[&enough], Duration::from_secs(20))
//!     .await?;
//! assert!(completion.is_settled());
//! assert!(enough.is_valid());
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod conditions;
pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod generator;
pub mod observability;
pub mod pipeline;
pub mod tester;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::conditions::{Condition, ConditionReport, FailureReason, OrderingCheck};
    pub use crate::config::{EngineConfig, HarnessConfig, TesterConfig};
    pub use crate::core::{ConditionState, Record, Tuple};
    pub use crate::errors::{DecodeError, HarnessError, HarnessResult};
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::generator::SequenceGenerator;
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::pipeline::{Job, JobStatus, LocalEngine, StreamHandle, Topology, TupleObserver};
    pub use crate::tester::{Completion, CompletionOutcome, Tester};
    pub use crate::utils::{Clock, SystemClock};
}
