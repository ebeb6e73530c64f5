//! In-process execution engine.
//!
//! Each source runs in its own task. Every produced record is pushed
//! through the source's transforms, then handed to each attached observer
//! through a bounded FIFO queue drained by one task per observer. A full
//! queue stalls the producer, so delivery never reorders and memory stays
//! bounded for unbounded sources.

use super::job::{Job, JobStatus};
use super::topology::{Node, Topology, TransformFn, TupleObserver};
use crate::cancellation::CancellationToken;
use crate::config::{EngineConfig, HarnessConfig};
use crate::core::Tuple;
use crate::errors::HarnessError;
use crate::events::{self, EventSink};
use crate::generator::SequenceGenerator;
use crate::utils::generate_uuid;
use futures::stream::StreamExt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

enum Delivery {
    Tuple(Tuple),
    End,
}

/// Result of one source task.
#[derive(Debug, Clone, Copy)]
struct SourceOutcome {
    produced: u64,
    exhausted: bool,
}

/// The part of a topology fed by one source.
struct SourcePlan {
    source: usize,
    generator: SequenceGenerator,
    stream_count: usize,
    /// `(stream, parent, func)` in topological order.
    transforms: Vec<(usize, usize, TransformFn)>,
    observers: Vec<(usize, Arc<dyn TupleObserver>)>,
}

impl SourcePlan {
    fn split(topology: Topology) -> Vec<Self> {
        let roots = topology.roots();
        let stream_count = topology.nodes.len();
        let mut plans: Vec<Self> = topology
            .nodes
            .iter()
            .enumerate()
            .filter_map(|(index, node)| match node {
                Node::Source(generator) => Some(Self {
                    source: index,
                    generator: generator.clone(),
                    stream_count,
                    transforms: Vec::new(),
                    observers: Vec::new(),
                }),
                Node::Transform { .. } => None,
            })
            .collect();

        let plan_for = |plans: &[Self], stream: usize| {
            let root = roots[stream];
            plans.iter().position(|p| p.source == root)
        };

        for (index, node) in topology.nodes.iter().enumerate() {
            if let Node::Transform { parent, func, .. } = node {
                if let Some(pos) = plan_for(&plans, index) {
                    plans[pos].transforms.push((index, *parent, func.clone()));
                }
            }
        }
        for (stream, observer) in topology.observers {
            if let Some(pos) = plan_for(&plans, stream) {
                plans[pos].observers.push((stream, observer));
            }
        }
        plans
    }

    /// Computes the value on every stream this source feeds.
    fn evaluate(&self, tuple: Tuple) -> Vec<Option<Tuple>> {
        let mut values: Vec<Option<Tuple>> = vec![None; self.stream_count];
        values[self.source] = Some(tuple);
        for (stream, parent, func) in &self.transforms {
            let Some(input) = values[*parent].clone() else {
                continue;
            };
            match func(input) {
                Ok(output) => values[*stream] = Some(output),
                Err(message) => {
                    let err = HarnessError::Transform {
                        stream: *stream,
                        message,
                    };
                    warn!(error = %err, "Dropping tuple");
                }
            }
        }
        values
    }
}

/// Runs topologies as jobs on the current tokio runtime.
#[derive(Clone)]
pub struct LocalEngine {
    config: EngineConfig,
    events: Arc<dyn EventSink>,
}

impl Default for LocalEngine {
    fn default() -> Self {
        Self {
            config: EngineConfig::default(),
            events: events::default_sink(),
        }
    }
}

impl LocalEngine {
    /// Creates an engine with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an engine with the given configuration.
    pub fn with_config(config: EngineConfig) -> Result<Self, HarnessError> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::default()
        })
    }

    /// Creates an engine from the engine section of a harness configuration.
    pub fn from_config(config: &HarnessConfig) -> Result<Self, HarnessError> {
        Self::with_config(config.engine.clone())
    }

    /// Sets the sink for job lifecycle events.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = sink;
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Starts running a topology.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit(&self, topology: Topology) -> Result<Job, HarnessError> {
        topology.validate()?;

        let id = generate_uuid();
        let name = topology.name().to_string();
        let token = Arc::new(CancellationToken::new());
        let halt = Arc::new(CancellationToken::new());
        let (status_tx, status_rx) = watch::channel(JobStatus::Running);

        info!(
            job = %name,
            job_id = %id,
            streams = topology.stream_count(),
            observers = topology.observer_count(),
            "Submitting job"
        );
        self.events.try_emit(
            events::JOB_SUBMITTED,
            Some(serde_json::json!({ "job": &name, "job_id": id.to_string() })),
        );

        let plans = SourcePlan::split(topology);
        let supervisor = tokio::spawn(supervise(
            name.clone(),
            plans,
            token.clone(),
            halt.clone(),
            self.config.delivery_buffer,
            self.events.clone(),
            status_tx,
        ));

        Ok(Job::new(id, name, token, halt, status_rx, supervisor, self.config.stop_grace()))
    }

    /// Stops a job. Equivalent to [`Job::stop`].
    pub async fn stop(&self, job: &Job) -> Result<JobStatus, HarnessError> {
        job.stop().await
    }
}

impl std::fmt::Debug for LocalEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

async fn supervise(
    job: String,
    plans: Vec<SourcePlan>,
    token: Arc<CancellationToken>,
    halt: Arc<CancellationToken>,
    buffer: usize,
    sink: Arc<dyn EventSink>,
    status: watch::Sender<JobStatus>,
) {
    let start = Instant::now();
    // Owned here so that aborting the supervisor aborts every source.
    let mut sources = JoinSet::new();
    for plan in plans {
        sources.spawn(run_source(job.clone(), plan, token.clone(), halt.clone(), buffer));
    }

    let mut produced = 0;
    let mut exhausted = true;
    let mut first_error: Option<HarnessError> = None;

    while let Some(joined) = sources.join_next().await {
        let result = joined.unwrap_or_else(|e| Err(HarnessError::Internal(format!("source task join error: {e}"))));
        match result {
            Ok(outcome) => {
                produced += outcome.produced;
                exhausted &= outcome.exhausted;
            }
            Err(err) => {
                // One failed source aborts the whole job.
                token.cancel(err.to_string());
                first_error.get_or_insert(err);
            }
        }
    }

    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
    let final_status = match first_error {
        Some(err) => {
            warn!(job = %job, error = %err, elapsed_ms, "Job failed");
            sink.try_emit(
                events::JOB_FAILED,
                Some(serde_json::json!({ "job": &job, "error": err.to_string() })),
            );
            JobStatus::Failed(err)
        }
        None if exhausted => {
            info!(job = %job, produced, elapsed_ms, "Job completed");
            sink.try_emit(
                events::JOB_COMPLETED,
                Some(serde_json::json!({ "job": &job, "produced": produced })),
            );
            JobStatus::Completed { produced }
        }
        None => {
            info!(job = %job, produced, elapsed_ms, "Job stopped");
            sink.try_emit(
                events::JOB_STOPPED,
                Some(serde_json::json!({ "job": &job, "produced": produced })),
            );
            JobStatus::Stopped { produced }
        }
    };
    let _ = status.send(final_status);
}

async fn run_source(
    job: String,
    plan: SourcePlan,
    token: Arc<CancellationToken>,
    halt: Arc<CancellationToken>,
    buffer: usize,
) -> Result<SourceOutcome, HarnessError> {
    let mut records = plan.generator.stream(token.clone())?;

    let mut lanes = Vec::with_capacity(plan.observers.len());
    let mut deliveries = JoinSet::new();
    for (stream, observer) in &plan.observers {
        let (tx, rx) = mpsc::channel(buffer);
        deliveries.spawn(deliver(rx, observer.clone(), halt.clone()));
        lanes.push((*stream, tx));
    }

    let mut produced: u64 = 0;
    let mut failure = None;
    let mut interrupted = false;

    'produce: while let Some(item) = records.next().await {
        let record = match item {
            Ok(record) => record,
            Err(err) => {
                failure = Some(err);
                break;
            }
        };
        produced += 1;

        let values = plan.evaluate(plan.generator.to_tuple(record));
        for (stream, lane) in &lanes {
            let Some(tuple) = &values[*stream] else {
                continue;
            };
            tokio::select! {
                sent = lane.send(Delivery::Tuple(tuple.clone())) => {
                    if sent.is_err() {
                        warn!(job = %job, stream, "Delivery task gone");
                    }
                }
                () = token.cancelled() => {
                    interrupted = true;
                    break 'produce;
                }
            }
        }
        tokio::task::yield_now().await;
    }

    let exhausted = failure.is_none()
        && !interrupted
        && plan.generator.limit().is_some_and(|limit| produced >= limit);
    if exhausted {
        for (_, lane) in &lanes {
            let _ = lane.send(Delivery::End).await;
        }
    }

    // Closing the lanes lets each delivery task drain what is queued and exit.
    drop(lanes);
    while let Some(joined) = deliveries.join_next().await {
        if let Err(e) = joined {
            warn!(job = %job, error = %e, "Delivery task failed");
        }
    }
    debug!(job = %job, source = plan.source, produced, exhausted, "Source finished");

    match failure {
        Some(err) => Err(err),
        None => Ok(SourceOutcome { produced, exhausted }),
    }
}

async fn deliver(mut rx: mpsc::Receiver<Delivery>, observer: Arc<dyn TupleObserver>, halt: Arc<CancellationToken>) {
    while let Some(delivery) = rx.recv().await {
        if halt.is_cancelled() {
            break;
        }
        match delivery {
            Delivery::Tuple(tuple) => observer.on_tuple(&tuple),
            Delivery::End => observer.on_end(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CollectingEventSink;
    use crate::testing::{BlockingObserver, FailingClock, RecordingObserver};
    use std::time::Duration;

    #[tokio::test]
    async fn test_bounded_job_delivers_in_order_then_ends() {
        let mut topology = Topology::new("bounded");
        let source = topology.add_source(SequenceGenerator::bounded(25));
        let observer = Arc::new(RecordingObserver::new());
        topology.on_tuple(source, observer.clone());

        let job = LocalEngine::new().submit(topology).unwrap();
        assert_eq!(job.wait_finished().await, JobStatus::Completed { produced: 25 });

        let sequences: Vec<u64> = observer
            .tuples()
            .iter()
            .map(|t| t.to_record().unwrap().sequence)
            .collect();
        assert_eq!(sequences, (0..25).collect::<Vec<_>>());
        assert!(observer.ended());
    }

    #[tokio::test]
    async fn test_transforms_feed_observers() {
        let mut topology = Topology::new("chain");
        let source = topology.add_source(SequenceGenerator::bounded(3).sequences());
        let text = topology.to_text(source);
        let raw = Arc::new(RecordingObserver::new());
        let rendered = Arc::new(RecordingObserver::new());
        topology.on_tuple(source, raw.clone());
        topology.on_tuple(text, rendered.clone());

        let job = LocalEngine::new().submit(topology).unwrap();
        job.wait_finished().await;

        assert_eq!(raw.tuples(), vec![Tuple::Sequence(0), Tuple::Sequence(1), Tuple::Sequence(2)]);
        assert_eq!(rendered.tuples(), vec![Tuple::text("0"), Tuple::text("1"), Tuple::text("2")]);
    }

    #[tokio::test]
    async fn test_failing_transform_drops_branch_only() {
        let mut topology = Topology::new("lossy");
        let source = topology.add_source(SequenceGenerator::bounded(4).sequences());
        let odd = topology.add_transform(source, "odd_only", |t| match t {
            Tuple::Sequence(n) if n % 2 == 1 => Ok(t),
            _ => Err("even".to_string()),
        });
        let all = Arc::new(RecordingObserver::new());
        let odds = Arc::new(RecordingObserver::new());
        topology.on_tuple(source, all.clone());
        topology.on_tuple(odd, odds.clone());

        let job = LocalEngine::new().submit(topology).unwrap();
        job.wait_finished().await;

        assert_eq!(all.len(), 4);
        assert_eq!(odds.tuples(), vec![Tuple::Sequence(1), Tuple::Sequence(3)]);
    }

    #[tokio::test]
    async fn test_unbounded_job_stops_and_drains() {
        let mut topology = Topology::new("forever");
        let source = topology.add_source(SequenceGenerator::unbounded());
        let observer = Arc::new(RecordingObserver::new());
        topology.on_tuple(source, observer.clone());

        let engine = LocalEngine::with_config(EngineConfig::new().with_delivery_buffer(8)).unwrap();
        let job = engine.submit(topology).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let status = engine.stop(&job).await.unwrap();
        let produced = status.produced().unwrap();
        let delivered = observer.len();

        assert!(matches!(status, JobStatus::Stopped { .. }));
        assert!(!observer.ended());
        // Nothing arrives after stop returns.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(observer.len(), delivered);
        assert!(delivered as u64 <= produced);
        // Delivered tuples are a gap-free prefix.
        for (i, tuple) in observer.tuples().iter().enumerate() {
            assert_eq!(tuple.to_record().unwrap().sequence, i as u64);
        }
    }

    #[tokio::test]
    async fn test_clock_failure_fails_job() {
        let mut topology = Topology::new("no-clock");
        let source = topology.add_source(SequenceGenerator::bounded(10).with_clock(Arc::new(FailingClock::new())));
        let observer = Arc::new(RecordingObserver::new());
        topology.on_tuple(source, observer.clone());

        let job = LocalEngine::new().submit(topology).unwrap();
        let status = job.wait_finished().await;

        assert!(matches!(status, JobStatus::Failed(HarnessError::ClockUnavailable(_))));
        assert!(observer.is_empty());
        assert!(matches!(job.stop().await, Err(HarnessError::ClockUnavailable(_))));
    }

    #[tokio::test]
    async fn test_clock_failure_in_one_source_cancels_others() {
        let mut topology = Topology::new("mixed");
        topology.add_source(SequenceGenerator::unbounded());
        topology.add_source(SequenceGenerator::bounded(10).with_clock(Arc::new(FailingClock::after(3))));

        let job = LocalEngine::new().submit(topology).unwrap();
        let status = tokio::time::timeout(Duration::from_secs(5), job.wait_finished())
            .await
            .unwrap();
        assert!(matches!(status, JobStatus::Failed(_)));
    }

    #[tokio::test]
    async fn test_lifecycle_events() {
        let sink = Arc::new(CollectingEventSink::new());
        let engine = LocalEngine::new().with_event_sink(sink.clone());

        let mut topology = Topology::new("events");
        topology.add_source(SequenceGenerator::bounded(2));
        let job = engine.submit(topology).unwrap();
        job.wait_finished().await;

        assert_eq!(sink.event_types(), vec![events::JOB_SUBMITTED, events::JOB_COMPLETED]);
        let payload = sink.payload(events::JOB_COMPLETED).unwrap();
        assert_eq!(payload["produced"], serde_json::json!(2));
    }

    #[test]
    fn test_with_config_rejects_zero_buffer() {
        let err = LocalEngine::with_config(EngineConfig::new().with_delivery_buffer(0)).unwrap_err();
        assert!(matches!(err, HarnessError::Config(_)));
    }

    #[test]
    fn test_split_assigns_streams_to_sources() {
        let mut topology = Topology::new("split");
        let a = topology.add_source(SequenceGenerator::bounded(1));
        let b = topology.add_source(SequenceGenerator::bounded(1));
        let a_text = topology.to_text(a);
        topology.on_tuple(a_text, Arc::new(RecordingObserver::new()));
        topology.on_tuple(b, Arc::new(RecordingObserver::new()));

        let plans = SourcePlan::split(topology);
        assert_eq!(plans.len(), 2);
        assert_eq!(plans[0].transforms.len(), 1);
        assert_eq!(plans[0].observers[0].0, a_text.index());
        assert_eq!(plans[1].observers[0].0, b.index());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stop_failure_halts_deliveries() {
        let mut topology = Topology::new("slow");
        let source = topology.add_source(SequenceGenerator::unbounded());
        let observer = Arc::new(BlockingObserver::new(Duration::from_millis(200)));
        topology.on_tuple(source, observer.clone());

        let config = EngineConfig::new()
            .with_delivery_buffer(4)
            .with_stop_grace(Duration::from_millis(30));
        let job = LocalEngine::with_config(config).unwrap().submit(topology).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let err = job.stop().await.unwrap_err();
        assert!(matches!(err, HarnessError::StopFailure { grace_ms: 30, .. }));

        let started = observer.started();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(observer.started(), started);
    }

    #[test]
    fn test_from_config() {
        let config = HarnessConfig::from_json_str(r#"{"engine": {"delivery_buffer": 3}}"#).unwrap();
        let engine = LocalEngine::from_config(&config).unwrap();
        assert_eq!(engine.config().delivery_buffer, 3);
    }
}
