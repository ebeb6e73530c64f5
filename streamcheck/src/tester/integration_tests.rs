//! End-to-end scenarios: generator, engine, conditions and tester together.

#[cfg(test)]
mod tests {
    use crate::conditions::FailureReason;
    use crate::config::EngineConfig;
    use crate::core::{ConditionState, Record, Tuple};
    use crate::errors::HarnessError;
    use crate::events::{self, CollectingEventSink};
    use crate::generator::SequenceGenerator;
    use crate::pipeline::{JobStatus, LocalEngine, Topology};
    use crate::tester::{CompletionOutcome, Tester};
    use crate::testing::{
        assert_invalid, assert_settled, assert_timed_out, assert_valid, init_test_tracing, random_count,
        BlockingObserver, FailingClock, RecordingObserver,
    };
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_secs(20);

    fn engine() -> LocalEngine {
        LocalEngine::new()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_bounded_run_counts_exactly() {
        init_test_tracing();
        for n in [0, 1, random_count()] {
            let mut tester = Tester::new();
            let mut topology = Topology::new("bounded");
            let source = topology.add_source(SequenceGenerator::bounded(n));
            let observer = Arc::new(RecordingObserver::new());
            topology.on_tuple(source, observer.clone());
            let count = tester.tuple_count(&mut topology, source, n);

            let completion = tester.complete(&engine(), topology, &[&count], TIMEOUT).await.unwrap();

            assert_settled(&completion);
            assert_valid(&count);
            assert_eq!(completion.job_status, JobStatus::Completed { produced: n });

            let records: Vec<Record> = observer.tuples().iter().map(|t| t.to_record().unwrap()).collect();
            assert_eq!(records.len() as u64, n);
            for (i, record) in records.iter().enumerate() {
                assert_eq!(record.sequence, i as u64);
            }
            assert!(records.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[tokio::test]
    async fn test_sequence_text_contents() {
        let mut tester = Tester::new();
        let mut topology = Topology::new("long-beacon");
        let source = topology.add_source(SequenceGenerator::bounded(7).sequences());
        let text = topology.to_text(source);
        let contents = tester.string_contents(&mut topology, text, ["0", "1", "2", "3", "4", "5", "6"]);

        let completion = tester.complete(&engine(), topology, &[&contents], TIMEOUT).await.unwrap();

        assert_settled(&completion);
        assert_valid(&contents);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_unbounded_stops_at_threshold() {
        let n = random_count();
        let mut tester = Tester::new();
        let mut topology = Topology::new("unbounded");
        let source = topology.add_source(SequenceGenerator::unbounded());
        let enough = tester.at_least_tuple_count(&mut topology, source, n);

        let completion = tester.complete(&engine(), topology, &[&enough], TIMEOUT).await.unwrap();

        assert_eq!(completion.outcome, CompletionOutcome::ConditionsSettled);
        assert!(completion.elapsed < TIMEOUT);
        assert_valid(&enough);
        assert!(enough.observed() >= n);
        assert!(matches!(completion.job_status, JobStatus::Stopped { produced } if produced >= n));
    }

    #[tokio::test]
    async fn test_records_survive_encoding() {
        let n = random_count();
        let mut topology = Topology::new("round-trip");
        let source = topology.add_source(SequenceGenerator::bounded(n));
        let document = topology.to_document(source);
        let text = topology.serialize(document);

        let raw = Arc::new(RecordingObserver::new());
        let encoded = Arc::new(RecordingObserver::new());
        topology.on_tuple(source, raw.clone());
        topology.on_tuple(text, encoded.clone());

        let completion = Tester::new().complete(&engine(), topology, &[], TIMEOUT).await.unwrap();
        assert_eq!(completion.outcome, CompletionOutcome::JobCompleted);

        let raw = raw.tuples();
        let encoded = encoded.tuples();
        assert_eq!(raw.len() as u64, n);
        assert_eq!(encoded.len(), raw.len());
        for (original, text) in raw.iter().zip(&encoded) {
            assert!(matches!(text, Tuple::Text(_)));
            assert_eq!(text.to_record().unwrap(), original.to_record().unwrap());
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_ordering_and_count_on_decoded_documents() {
        let c = random_count();
        let mut tester = Tester::new();
        let mut topology = Topology::new("ordered");
        let source = topology.add_source(SequenceGenerator::bounded(c));
        let document = topology.to_document(source);
        let text = topology.serialize(document);

        let ordered = tester.ordered_records(&mut topology, document);
        let ordered_text = tester.ordered_records(&mut topology, text);
        let count = tester.tuple_count(&mut topology, document, c);

        let completion = tester
            .complete(&engine(), topology, &[&ordered, &ordered_text, &count], TIMEOUT)
            .await
            .unwrap();

        assert_settled(&completion);
        assert!(completion.all_valid(), "failures: {:?}", completion.failures());
        assert_eq!(ordered.observed(), c);
        assert_eq!(ordered_text.observed(), c);
    }

    #[tokio::test]
    async fn test_exact_count_fails_before_timeout() {
        let mut tester = Tester::new();
        let mut topology = Topology::new("overflow");
        let source = topology.add_source(SequenceGenerator::unbounded());
        let count = tester.tuple_count(&mut topology, source, 5);

        let completion = tester.complete(&engine(), topology, &[&count], TIMEOUT).await.unwrap();

        assert_eq!(completion.outcome, CompletionOutcome::ConditionsSettled);
        assert!(completion.elapsed < TIMEOUT);
        assert_invalid(&count);
        assert_eq!(
            count.failure(),
            Some(FailureReason::Overflow {
                expected: 5,
                position: 5
            })
        );
        assert_eq!(count.describe(), "expected 5, observed 6 at position 5");
    }

    #[tokio::test]
    async fn test_bounded_overflow_is_invalid() {
        let mut tester = Tester::new();
        let mut topology = Topology::new("six");
        let source = topology.add_source(SequenceGenerator::bounded(6));
        let count = tester.tuple_count(&mut topology, source, 5);

        let completion = tester.complete(&engine(), topology, &[&count], TIMEOUT).await.unwrap();

        assert_settled(&completion);
        assert_invalid(&count);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_timeout_is_distinct_from_failure() {
        let timeout = Duration::from_millis(300);
        let mut tester = Tester::new();
        let mut topology = Topology::new("never");
        let source = topology.add_source(SequenceGenerator::unbounded());
        let enough = tester.at_least_tuple_count(&mut topology, source, u64::MAX);
        let exact = tester.tuple_count(&mut topology, source, u64::MAX);

        let completion = tester.complete(&engine(), topology, &[&enough, &exact], timeout).await.unwrap();

        assert_timed_out(&completion);
        assert!(completion.elapsed >= timeout);
        assert!(!enough.is_valid());
        assert!(!exact.is_valid());
        assert!(matches!(completion.job_status, JobStatus::Stopped { .. }));

        // Sealed: the verdicts are frozen after the run.
        let observed = exact.observed();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(exact.observed(), observed);
    }

    #[tokio::test]
    async fn test_decode_failure_stays_local() {
        let mut tester = Tester::new();
        let mut topology = Topology::new("undecodable");
        let source = topology.add_source(SequenceGenerator::bounded(4).sequences());
        let text = topology.to_text(source);
        let records = tester.record_predicate(&mut topology, text, |_| true);
        let count = tester.tuple_count(&mut topology, text, 4);

        let completion = tester.complete(&engine(), topology, &[&count], TIMEOUT).await.unwrap();

        assert_settled(&completion);
        assert_valid(&count);
        assert_invalid(&records);
        assert!(matches!(
            records.failure(),
            Some(FailureReason::Decode { position: 0, .. })
        ));
        assert_eq!(completion.job_status, JobStatus::Completed { produced: 4 });
    }

    #[tokio::test]
    async fn test_clock_failure_aborts_run() {
        let mut tester = Tester::new();
        let mut topology = Topology::new("no-clock");
        let source = topology.add_source(SequenceGenerator::bounded(5).with_clock(Arc::new(FailingClock::new())));
        let observer = Arc::new(RecordingObserver::new());
        topology.on_tuple(source, observer.clone());
        let count = tester.tuple_count(&mut topology, source, 5);

        let err = tester.complete(&engine(), topology, &[&count], TIMEOUT).await.unwrap_err();

        assert!(matches!(err, HarnessError::ClockUnavailable(_)));
        assert!(observer.is_empty());
        assert_eq!(count.state(), ConditionState::Invalid);
    }

    #[tokio::test]
    async fn test_stop_after_natural_completion() {
        let mut tester = Tester::new();
        let mut topology = Topology::new("finished");
        let source = topology.add_source(SequenceGenerator::bounded(3));
        let exact = tester.tuple_count(&mut topology, source, 3);
        let sequences = tester.contents(
            &mut topology,
            source,
            vec![Tuple::Sequence(0), Tuple::Sequence(1), Tuple::Sequence(2)],
        );

        let completion = tester.complete(&engine(), topology, &[], TIMEOUT).await.unwrap();

        assert_eq!(completion.outcome, CompletionOutcome::JobCompleted);
        assert_valid(&exact);
        // Record tuples never equal bare sequence numbers.
        assert_invalid(&sequences);
        assert_eq!(completion.reports.len(), 2);
    }

    #[tokio::test]
    async fn test_lifecycle_events() {
        let sink = Arc::new(CollectingEventSink::new());
        let engine = LocalEngine::with_config(EngineConfig::default().with_delivery_buffer(4))
            .unwrap()
            .with_event_sink(sink.clone());
        let mut tester = Tester::new().with_event_sink(sink.clone());
        let mut topology = Topology::new("events");
        let source = topology.add_source(SequenceGenerator::bounded(10));
        let count = tester.tuple_count(&mut topology, source, 10);

        tester.complete(&engine, topology, &[&count], TIMEOUT).await.unwrap();

        let types = sink.event_types();
        assert_eq!(types.first().map(String::as_str), Some(events::JOB_SUBMITTED));
        assert!(types.iter().any(|t| t == events::CONDITION_SETTLED));
        assert_eq!(types.last().map(String::as_str), Some(events::TESTER_COMPLETED));
        let payload = sink.payload(events::TESTER_COMPLETED).unwrap();
        assert_eq!(payload["all_valid"], true);
    }

    #[tokio::test]
    async fn test_timeout_event() {
        let sink = Arc::new(CollectingEventSink::new());
        let tester = Tester::new().with_event_sink(sink.clone());
        let mut topology = Topology::new("slow");
        topology.add_source(SequenceGenerator::unbounded().with_period(Duration::from_millis(10)));

        let completion = tester
            .complete(&engine(), topology, &[], Duration::from_millis(50))
            .await
            .unwrap();

        assert_timed_out(&completion);
        assert!(sink.payload(events::TESTER_TIMED_OUT).is_some());
        assert!(sink.payload(events::TESTER_COMPLETED).is_none());
    }

    #[tokio::test]
    async fn test_panicking_predicate_is_invalid() {
        let mut tester = Tester::new();
        let mut topology = Topology::new("panicky");
        let source = topology.add_source(SequenceGenerator::bounded(3).sequences());
        let text = topology.to_text(source);
        let parsed = tester.tuple_predicate(&mut topology, text, |t| t.to_record().unwrap().sequence < 3);
        let count = tester.tuple_count(&mut topology, text, 3);

        let completion = tester.complete(&engine(), topology, &[&count], TIMEOUT).await.unwrap();

        assert_settled(&completion);
        assert_valid(&count);
        assert_invalid(&parsed);
        assert!(matches!(
            parsed.failure(),
            Some(FailureReason::Panicked { position: 0, .. })
        ));
        assert!(!completion.all_valid());
        assert_eq!(completion.job_status, JobStatus::Completed { produced: 3 });
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_stop_failure_seals_conditions() {
        let engine = LocalEngine::with_config(
            EngineConfig::default()
                .with_delivery_buffer(4)
                .with_stop_grace(Duration::from_millis(20)),
        )
        .unwrap();
        let mut tester = Tester::new();
        let mut topology = Topology::new("stuck");
        let source = topology.add_source(SequenceGenerator::unbounded());
        let blocker = Arc::new(BlockingObserver::new(Duration::from_millis(200)));
        topology.on_tuple(source, blocker.clone());
        let exact = tester.tuple_count(&mut topology, source, u64::MAX);

        let err = tester
            .complete(&engine, topology, &[&exact], Duration::from_millis(50))
            .await
            .unwrap_err();

        assert!(matches!(err, HarnessError::StopFailure { grace_ms: 20, .. }));
        assert!(exact.is_settled());
        assert_eq!(exact.state(), ConditionState::Invalid);

        let observed = exact.observed();
        let started = blocker.started();
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(exact.observed(), observed);
        assert_eq!(blocker.started(), started);
    }
}
