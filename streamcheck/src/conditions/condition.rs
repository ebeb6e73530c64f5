//! Conditions: observers that accumulate evidence from one stream.

use super::{Evaluator, FailureReason, OrderingCheck, Step};
use crate::core::{ConditionState, Record, Tuple};
use crate::events::{self, EventSink};
use crate::pipeline::TupleObserver;
use parking_lot::Mutex;
use serde::Serialize;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

#[derive(Debug)]
struct ConditionInner {
    observed: u64,
    state: ConditionState,
    settled: bool,
    sealed: bool,
    failure: Option<FailureReason>,
}

/// A snapshot of one condition's verdict.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConditionReport {
    /// Condition name.
    pub name: String,
    /// Verdict.
    pub state: ConditionState,
    /// Whether the verdict is final.
    pub settled: bool,
    /// Tuples observed.
    pub observed: u64,
    /// Human-readable explanation.
    pub description: String,
}

/// A test-owned observer that turns a stream into a verdict.
///
/// Tuples are evaluated one at a time, so a fail-fast verdict is visible to
/// readers as soon as the offending tuple is processed. Once settled, the
/// verdict never changes: later tuples are still counted but not evaluated.
/// After [`seal`](Self::seal) nothing is counted.
///
/// The evaluator has its own lock, separate from the verdict. A predicate
/// may read its own condition's state while it runs.
pub struct Condition {
    name: String,
    target: String,
    evaluator: Mutex<Evaluator>,
    inner: Mutex<ConditionInner>,
    settled_tx: watch::Sender<bool>,
    events: Arc<dyn EventSink>,
}

impl Condition {
    /// Creates a condition with the given shape.
    pub fn new(name: impl Into<String>, evaluator: Evaluator) -> Self {
        let (state, settled) = if evaluator.satisfied_initially() {
            (ConditionState::Valid, true)
        } else {
            (ConditionState::Pending, false)
        };
        let (settled_tx, _) = watch::channel(settled);
        Self {
            name: name.into(),
            target: evaluator.target(),
            evaluator: Mutex::new(evaluator),
            inner: Mutex::new(ConditionInner {
                observed: 0,
                state,
                settled,
                sealed: false,
                failure: None,
            }),
            settled_tx,
            events: events::default_sink(),
        }
    }

    /// Valid iff exactly `n` tuples arrive. Fails fast on tuple `n + 1`.
    pub fn exact_count(name: impl Into<String>, n: u64) -> Self {
        Self::new(name, Evaluator::ExactCount { n })
    }

    /// Valid, and settled, as soon as `n` tuples arrive.
    pub fn at_least_count(name: impl Into<String>, n: u64) -> Self {
        Self::new(name, Evaluator::AtLeastCount { n })
    }

    /// Valid iff the stream carries exactly `expected`, in order.
    pub fn exact_contents(name: impl Into<String>, expected: Vec<Tuple>) -> Self {
        Self::new(name, Evaluator::ExactContents { expected })
    }

    /// Exact contents of a text stream.
    pub fn string_contents<I, S>(name: impl Into<String>, expected: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let expected = expected.into_iter().map(|s| Tuple::Text(s.into())).collect();
        Self::exact_contents(name, expected)
    }

    /// Valid iff `predicate` holds for every tuple.
    ///
    /// A panic inside `predicate` settles the condition as invalid.
    pub fn tuple_predicate<F>(name: impl Into<String>, mut predicate: F) -> Self
    where
        F: FnMut(&Tuple) -> bool + Send + 'static,
    {
        Self::new(
            name,
            Evaluator::TuplePredicate(Box::new(move |tuple: &Tuple| {
                if predicate(tuple) {
                    Ok(())
                } else {
                    Err("predicate returned false".to_string())
                }
            })),
        )
    }

    /// Valid iff every tuple decodes to a record and `predicate` holds for it.
    pub fn record_predicate<F>(name: impl Into<String>, mut predicate: F) -> Self
    where
        F: FnMut(&Record) -> bool + Send + 'static,
    {
        Self::record_check(name, move |record: &Record| {
            if predicate(record) {
                Ok(())
            } else {
                Err("predicate returned false")
            }
        })
    }

    /// Like [`record_predicate`](Self::record_predicate), with the check
    /// explaining each rejection.
    pub fn record_check<F, E>(name: impl Into<String>, mut check: F) -> Self
    where
        F: FnMut(&Record) -> Result<(), E> + Send + 'static,
        E: fmt::Display,
    {
        Self::new(
            name,
            Evaluator::RecordPredicate(Box::new(move |record: &Record| check(record).map_err(|e| e.to_string()))),
        )
    }

    /// Valid iff the stream is a generator run in order, see [`OrderingCheck`].
    pub fn ordered_records(name: impl Into<String>) -> Self {
        let mut ordering = OrderingCheck::new();
        Self::record_check(name, move |record: &Record| ordering.check(record))
    }

    /// Routes settlement events to `sink`.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = sink;
        self
    }

    /// Returns the condition name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the current verdict.
    pub fn state(&self) -> ConditionState {
        self.inner.lock().state
    }

    /// Returns true once the verdict is final.
    pub fn is_settled(&self) -> bool {
        self.inner.lock().settled
    }

    /// Returns true only for a `Valid` verdict. Pending is not valid.
    pub fn is_valid(&self) -> bool {
        self.inner.lock().state == ConditionState::Valid
    }

    /// Returns the number of tuples observed.
    pub fn observed(&self) -> u64 {
        self.inner.lock().observed
    }

    /// Returns why the condition is invalid, if it is.
    pub fn failure(&self) -> Option<FailureReason> {
        self.inner.lock().failure.clone()
    }

    /// Describes the verdict, e.g. "expected 7, observed 9 at position 8".
    pub fn describe(&self) -> String {
        self.describe_inner(&self.inner.lock())
    }

    /// Returns a snapshot of the verdict.
    pub fn report(&self) -> ConditionReport {
        let inner = self.inner.lock();
        ConditionReport {
            name: self.name.clone(),
            state: inner.state,
            settled: inner.settled,
            observed: inner.observed,
            description: self.describe_inner(&inner),
        }
    }

    /// Waits until the verdict is final.
    pub async fn wait_settled(&self) {
        let mut settled = self.settled_tx.subscribe();
        // The sender lives as long as `self`.
        let _ = settled.wait_for(|settled| *settled).await;
    }

    /// Finalizes the verdict and stops accepting tuples.
    ///
    /// A pending condition is decided as if its stream had ended. Sealing a
    /// settled condition only stops further counting.
    pub fn seal(&self) {
        self.close(true);
    }

    fn close(&self, seal: bool) {
        let settled_now = {
            let evaluator = self.evaluator.lock();
            let mut inner = self.inner.lock();
            if inner.sealed {
                return;
            }
            inner.sealed = seal;
            if inner.settled {
                None
            } else {
                match evaluator.on_close(inner.observed) {
                    Ok(()) => Self::settle(&mut inner, ConditionState::Valid, None),
                    Err(reason) => Self::settle(&mut inner, ConditionState::Invalid, Some(reason)),
                }
                Some(self.describe_inner(&inner))
            }
        };
        if let Some(description) = settled_now {
            self.announce(&description);
        }
    }

    fn settle(inner: &mut ConditionInner, state: ConditionState, failure: Option<FailureReason>) {
        inner.state = state;
        inner.failure = failure;
        inner.settled = true;
    }

    fn announce(&self, description: &str) {
        let (state, observed) = {
            let inner = self.inner.lock();
            (inner.state, inner.observed)
        };
        if state == ConditionState::Invalid {
            warn!(condition = %self.name, observed, reason = %description, "Condition invalid");
        } else {
            debug!(condition = %self.name, %state, observed, "Condition settled");
        }
        self.settled_tx.send_replace(true);
        self.events.try_emit(
            events::CONDITION_SETTLED,
            Some(serde_json::json!({
                "condition": self.name,
                "state": state,
                "observed": observed,
                "description": description,
            })),
        );
    }

    fn describe_inner(&self, inner: &ConditionInner) -> String {
        if let Some(failure) = &inner.failure {
            return failure.to_string();
        }
        match inner.state {
            ConditionState::Valid => format!("{}: observed {}", self.target, inner.observed),
            ConditionState::Pending => format!("pending {}: observed {} so far", self.target, inner.observed),
            ConditionState::Invalid => format!("{}: invalid", self.target),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

impl TupleObserver for Condition {
    fn on_tuple(&self, tuple: &Tuple) {
        // Held across evaluation so a concurrent seal waits for this tuple.
        let mut evaluator = self.evaluator.lock();
        let position = {
            let mut inner = self.inner.lock();
            if inner.sealed {
                return;
            }
            let position = inner.observed;
            inner.observed += 1;
            if inner.settled {
                return;
            }
            position
        };

        let step = panic::catch_unwind(AssertUnwindSafe(|| evaluator.on_tuple(position, tuple)))
            .unwrap_or_else(|payload| {
                Step::Failed(FailureReason::Panicked {
                    position,
                    message: panic_message(payload.as_ref()),
                })
            });

        let settled_now = {
            let mut inner = self.inner.lock();
            match step {
                Step::Continue => return,
                Step::Satisfied => Self::settle(&mut inner, ConditionState::Valid, None),
                Step::Failed(reason) => Self::settle(&mut inner, ConditionState::Invalid, Some(reason)),
            }
            self.describe_inner(&inner)
        };
        drop(evaluator);
        self.announce(&settled_now);
    }

    fn on_end(&self) {
        self.close(false);
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Condition")
            .field("name", &self.name)
            .field("target", &self.target)
            .field("state", &inner.state)
            .field("observed", &inner.observed)
            .field("settled", &inner.settled)
            .finish_non_exhaustive()
    }
}
