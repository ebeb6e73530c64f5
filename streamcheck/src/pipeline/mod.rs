//! Pipeline description and in-process execution.
//!
//! This module provides:
//! - [`Topology`]: sources, transforms and observer attachment points
//! - [`LocalEngine`]: runs a topology as a [`Job`] on tokio
//! - Stock transforms between records, documents and text

mod engine;
mod job;
mod topology;
pub mod transforms;

pub use engine::LocalEngine;
pub use job::{Job, JobStatus};
pub use topology::{StreamHandle, Topology, TransformFn, TupleObserver};
