//! Numbered record generation at the head of a pipeline.
//!
//! A [`SequenceGenerator`] describes a source: how many records to emit
//! (or none for an unbounded run), which clock stamps them, and whether
//! emission is throttled. Each execution creates a fresh [`GeneratorRun`]
//! that owns the only mutable state, the cursor, so concurrent runs of the
//! same generator are independent.

mod run;

pub use run::GeneratorRun;

use crate::cancellation::CancellationToken;
use crate::core::{Record, Tuple};
use crate::errors::HarnessError;
use crate::utils::{Clock, SystemClock};
use futures::stream::{self, BoxStream, StreamExt};
use std::sync::Arc;
use std::time::Duration;

/// What a generator emits for each record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputShape {
    /// Emit the full [`Record`].
    #[default]
    Records,
    /// Emit only the sequence number.
    Sequences,
}

/// A source of numbered records.
#[derive(Debug, Clone)]
pub struct SequenceGenerator {
    limit: Option<u64>,
    clock: Arc<dyn Clock>,
    period: Option<Duration>,
    shape: OutputShape,
}

impl SequenceGenerator {
    /// Creates a generator that emits exactly `count` records then ends.
    #[must_use]
    pub fn bounded(count: u64) -> Self {
        Self::new(Some(count))
    }

    /// Creates a generator that emits until its job is stopped.
    #[must_use]
    pub fn unbounded() -> Self {
        Self::new(None)
    }

    /// Creates a generator from an optional count.
    #[must_use]
    pub fn new(limit: Option<u64>) -> Self {
        Self {
            limit,
            clock: Arc::new(SystemClock),
            period: None,
            shape: OutputShape::Records,
        }
    }

    /// Sets the clock that stamps records.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Waits `period` between consecutive emissions.
    #[must_use]
    pub const fn with_period(mut self, period: Duration) -> Self {
        self.period = Some(period);
        self
    }

    /// Emits bare sequence numbers instead of records.
    #[must_use]
    pub const fn sequences(mut self) -> Self {
        self.shape = OutputShape::Sequences;
        self
    }

    /// Returns the record limit, `None` when unbounded.
    #[must_use]
    pub const fn limit(&self) -> Option<u64> {
        self.limit
    }

    /// Starts a fresh run.
    ///
    /// # Errors
    ///
    /// Returns `ClockUnavailable` if the clock cannot be read; nothing has
    /// been emitted in that case.
    pub fn run(&self) -> Result<GeneratorRun, HarnessError> {
        GeneratorRun::start(self.clock.clone(), self.limit)
    }

    /// Wraps a record in the tuple shape this generator emits.
    #[must_use]
    pub const fn to_tuple(&self, record: Record) -> Tuple {
        match self.shape {
            OutputShape::Records => Tuple::Record(record),
            OutputShape::Sequences => Tuple::Sequence(record.sequence),
        }
    }

    /// Starts a run as an async stream that ends when the run is exhausted,
    /// a clock read fails, or `token` is cancelled.
    ///
    /// Cancellation is checked between emissions, never mid-record. A
    /// throttled generator's sleep is cut short by cancellation.
    pub fn stream(
        &self,
        token: Arc<CancellationToken>,
    ) -> Result<BoxStream<'static, Result<Record, HarnessError>>, HarnessError> {
        let run = self.run()?;
        let period = self.period;

        let records = stream::unfold((run, token, true), move |(mut run, token, first)| async move {
            if let (Some(period), false) = (period, first) {
                tokio::select! {
                    () = tokio::time::sleep(period) => {}
                    () = token.cancelled() => return None,
                }
            }
            if token.is_cancelled() {
                return None;
            }
            let item = run.next()?;
            Some((item, (run, token, false)))
        });
        Ok(records.boxed())
    }
}
