//! The completion controller.

use super::{Completion, CompletionOutcome};
use crate::conditions::Condition;
use crate::config::{HarnessConfig, TesterConfig};
use crate::core::{Record, Tuple};
use crate::errors::HarnessError;
use crate::events::{self, EventSink};
use crate::pipeline::{LocalEngine, StreamHandle, Topology};
use futures::future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Registers conditions against a topology and drives one run to completion.
///
/// ```rust,ignore
/// let mut tester = Tester::new();
/// let mut topology = Topology::new("beacon");
/// let source = topology.add_source(SequenceGenerator::bounded(7));
/// let count = tester.tuple_count(&mut topology, source, 7);
///
/// let completion = tester
///     .complete(&LocalEngine::new(), topology, &[&count], Duration::from_secs(20))
///     .await?;
/// assert!(completion.is_settled() && count.is_valid());
/// ```
pub struct Tester {
    config: TesterConfig,
    events: Arc<dyn EventSink>,
    conditions: Vec<Arc<Condition>>,
}

impl Default for Tester {
    fn default() -> Self {
        Self {
            config: TesterConfig::default(),
            events: events::default_sink(),
            conditions: Vec::new(),
        }
    }
}

impl Tester {
    /// Creates a tester with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a tester with the given configuration.
    pub fn with_config(config: TesterConfig) -> Result<Self, HarnessError> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::default()
        })
    }

    /// Creates a tester from the tester section of a harness configuration.
    pub fn from_config(config: &HarnessConfig) -> Result<Self, HarnessError> {
        Self::with_config(config.tester.clone())
    }

    /// Sets the sink for tester and condition events.
    ///
    /// Applies to conditions registered afterwards.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = sink;
        self
    }

    /// Returns the registered conditions, in registration order.
    pub fn conditions(&self) -> &[Arc<Condition>] {
        &self.conditions
    }

    /// Attaches `condition` to `stream` and registers it for the run.
    pub fn add_condition(
        &mut self,
        topology: &mut Topology,
        stream: StreamHandle,
        condition: Condition,
    ) -> Arc<Condition> {
        let condition = Arc::new(condition.with_event_sink(self.events.clone()));
        topology.on_tuple(stream, condition.clone());
        self.conditions.push(condition.clone());
        condition
    }

    fn next_name(&self, kind: &str) -> String {
        format!("{kind}#{}", self.conditions.len())
    }

    /// Exactly `n` tuples on `stream`.
    pub fn tuple_count(&mut self, topology: &mut Topology, stream: StreamHandle, n: u64) -> Arc<Condition> {
        let condition = Condition::exact_count(self.next_name("tuple_count"), n);
        self.add_condition(topology, stream, condition)
    }

    /// At least `n` tuples on `stream`. Settles at the threshold.
    pub fn at_least_tuple_count(
        &mut self,
        topology: &mut Topology,
        stream: StreamHandle,
        n: u64,
    ) -> Arc<Condition> {
        let condition = Condition::at_least_count(self.next_name("at_least_tuple_count"), n);
        self.add_condition(topology, stream, condition)
    }

    /// Exactly these strings on `stream`, in order.
    pub fn string_contents<I, S>(
        &mut self,
        topology: &mut Topology,
        stream: StreamHandle,
        expected: I,
    ) -> Arc<Condition>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let condition = Condition::string_contents(self.next_name("string_contents"), expected);
        self.add_condition(topology, stream, condition)
    }

    /// Exactly these tuples on `stream`, in order.
    pub fn contents(&mut self, topology: &mut Topology, stream: StreamHandle, expected: Vec<Tuple>) -> Arc<Condition> {
        let condition = Condition::exact_contents(self.next_name("contents"), expected);
        self.add_condition(topology, stream, condition)
    }

    /// Every tuple on `stream` satisfies `predicate`.
    pub fn tuple_predicate<F>(&mut self, topology: &mut Topology, stream: StreamHandle, predicate: F) -> Arc<Condition>
    where
        F: FnMut(&Tuple) -> bool + Send + 'static,
    {
        let condition = Condition::tuple_predicate(self.next_name("tuple_predicate"), predicate);
        self.add_condition(topology, stream, condition)
    }

    /// Every tuple on `stream` decodes to a record satisfying `predicate`.
    pub fn record_predicate<F>(&mut self, topology: &mut Topology, stream: StreamHandle, predicate: F) -> Arc<Condition>
    where
        F: FnMut(&Record) -> bool + Send + 'static,
    {
        let condition = Condition::record_predicate(self.next_name("record_predicate"), predicate);
        self.add_condition(topology, stream, condition)
    }

    /// The records on `stream` form one in-order generator run.
    pub fn ordered_records(&mut self, topology: &mut Topology, stream: StreamHandle) -> Arc<Condition> {
        let condition = Condition::ordered_records(self.next_name("ordered_records"));
        self.add_condition(topology, stream, condition)
    }

    /// Runs `topology` until every end condition settles, the job finishes
    /// on its own, or `timeout` elapses, whichever comes first.
    ///
    /// The job is then stopped and drained, and every registered condition
    /// is sealed, so the returned reports are final. With no end conditions
    /// the run waits for the job to finish or the deadline. Clock failures
    /// and stop failures are returned as errors; a timeout is not an error.
    pub async fn complete(
        &self,
        engine: &LocalEngine,
        topology: Topology,
        end_conditions: &[&Arc<Condition>],
        timeout: Duration,
    ) -> Result<Completion, HarnessError> {
        let started = Instant::now();
        let deadline = tokio::time::Instant::now() + timeout;
        let job = engine.submit(topology)?;

        info!(
            job = %job.name(),
            conditions = self.conditions.len(),
            end_conditions = end_conditions.len(),
            timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            "Waiting for completion"
        );

        let settled = async {
            if end_conditions.is_empty() {
                future::pending::<()>().await;
            } else {
                future::join_all(end_conditions.iter().map(|c| c.wait_settled())).await;
            }
        };
        let outcome = tokio::select! {
            () = settled => CompletionOutcome::ConditionsSettled,
            _ = job.wait_finished() => CompletionOutcome::JobCompleted,
            () = tokio::time::sleep_until(deadline) => CompletionOutcome::TimedOut,
        };

        let stopped = job.stop().await;
        for condition in self.conditions.iter().chain(end_conditions.iter().copied()) {
            condition.seal();
        }
        let elapsed = started.elapsed();
        let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);

        let job_status = match stopped {
            Ok(status) => status,
            Err(err) => {
                error!(job = %job.name(), elapsed_ms, error = %err, "Run aborted");
                return Err(err);
            }
        };

        let mut reports: Vec<_> = self.conditions.iter().map(|c| c.report()).collect();
        for extra in end_conditions {
            if !self.conditions.iter().any(|c| Arc::ptr_eq(c, extra)) {
                reports.push(extra.report());
            }
        }
        let completion = Completion {
            outcome,
            elapsed,
            job_status,
            reports,
        };

        let payload = serde_json::json!({
            "job": job.name(),
            "outcome": completion.outcome,
            "elapsed_ms": elapsed_ms,
            "all_valid": completion.all_valid(),
        });
        if completion.is_timed_out() {
            warn!(job = %job.name(), elapsed_ms, "Run timed out before conditions settled");
            self.events.try_emit(events::TESTER_TIMED_OUT, Some(payload));
        } else {
            info!(
                job = %job.name(),
                outcome = ?completion.outcome,
                elapsed_ms,
                all_valid = completion.all_valid(),
                "Run complete"
            );
            self.events.try_emit(events::TESTER_COMPLETED, Some(payload));
        }

        Ok(completion)
    }

    /// [`complete`](Self::complete) with the configured default timeout.
    pub async fn complete_default(
        &self,
        engine: &LocalEngine,
        topology: Topology,
        end_conditions: &[&Arc<Condition>],
    ) -> Result<Completion, HarnessError> {
        self.complete(engine, topology, end_conditions, self.config.default_timeout())
            .await
    }
}

impl std::fmt::Debug for Tester {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tester")
            .field("config", &self.config)
            .field("conditions", &self.conditions)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::SequenceGenerator;

    #[test]
    fn test_registration_names_and_attachment() {
        let mut tester = Tester::new();
        let mut topology = Topology::new("names");
        let source = topology.add_source(SequenceGenerator::bounded(3));

        let count = tester.tuple_count(&mut topology, source, 3);
        let enough = tester.at_least_tuple_count(&mut topology, source, 1);

        assert_eq!(count.name(), "tuple_count#0");
        assert_eq!(enough.name(), "at_least_tuple_count#1");
        assert_eq!(tester.conditions().len(), 2);
        assert_eq!(topology.observer_count(), 2);
    }

    #[test]
    fn test_add_named_condition() {
        let mut tester = Tester::new();
        let mut topology = Topology::new("named");
        let source = topology.add_source(SequenceGenerator::bounded(3));

        let condition = tester.add_condition(&mut topology, source, Condition::exact_count("three", 3));
        assert_eq!(condition.name(), "three");
    }

    #[test]
    fn test_from_config() {
        let config = HarnessConfig::from_json_str(r#"{"tester": {"default_timeout_ms": 750}}"#).unwrap();
        let tester = Tester::from_config(&config).unwrap();
        assert_eq!(tester.config.default_timeout(), Duration::from_millis(750));

        let zero = TesterConfig {
            default_timeout_ms: 0,
        };
        assert!(matches!(Tester::with_config(zero), Err(HarnessError::Config(_))));
    }

    #[tokio::test]
    async fn test_default_timeout_is_used() {
        let tester =
            Tester::with_config(TesterConfig::default().with_default_timeout(Duration::from_millis(50))).unwrap();
        let mut topology = Topology::new("forever");
        topology.add_source(SequenceGenerator::unbounded().with_period(Duration::from_millis(5)));

        let completion = tester
            .complete_default(&LocalEngine::new(), topology, &[])
            .await
            .unwrap();
        assert!(completion.is_timed_out());
    }
}
