use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use motionql::{
    decision_channel, ClassifiedExercise, DecisionFn, DecisionStream, ExhaustiveBackend, Fact,
    GroundFact, Location, MonitorPipeline, MotionError, MotionResult, PipelineConfig,
    PipelineError, Proposition, Query, QueryValue, SensorNet, SensorNetValue, SensorStream,
    SensorValue, SensorWorkflow, ValidationError, WatchedQuery,
};

const RATE: u32 = 100;

fn gesture(name: &str) -> GroundFact {
    GroundFact::gesture(name, 0.8, Location::LeftWrist)
}

fn holds(name: &str) -> Query {
    Query::formula(Proposition::assert(gesture(name)))
}

/// Maps accelerometer x-values to gesture facts: 1.0 => "a", 2.0 => "b",
/// 3.0 => workflow error. Anything else produces no facts.
fn test_workflow() -> Arc<dyn SensorWorkflow> {
    Arc::new(|value: &SensorNetValue| -> MotionResult<HashSet<GroundFact>> {
        let mut facts = HashSet::new();
        for samples in value.map.values() {
            for sample in samples {
                let SensorValue::Accelerometer { x, .. } = sample else {
                    continue;
                };
                if (*x - 1.0).abs() < f64::EPSILON {
                    facts.insert(gesture("a"));
                } else if (*x - 2.0).abs() < f64::EPSILON {
                    facts.insert(gesture("b"));
                } else if (*x - 3.0).abs() < f64::EPSILON {
                    return Err(MotionError::Pipeline(PipelineError::Workflow {
                        message: "unclassifiable sample".to_string(),
                    }));
                }
            }
        }
        Ok(facts)
    })
}

/// Decision transform that reports every verdict, encoding it in the
/// confidence: stable true => 1.0, unstable => 0.5, stable false => 0.0.
fn verdict_probe() -> DecisionFn {
    Arc::new(|value: &QueryValue| {
        let confidence = match value {
            QueryValue::Stable(true) => 1.0,
            QueryValue::Unstable(_) => 0.5,
            QueryValue::Stable(false) => 0.0,
        };
        Some(ClassifiedExercise::new(confidence, None))
    })
}

/// One snapshot with a single wrist stream carrying the given x-samples.
fn snapshot(xs: &[f64]) -> SensorNet {
    let mut map = HashMap::new();
    map.insert(
        Location::LeftWrist,
        vec![SensorStream {
            sampling_rate: RATE,
            values: xs
                .iter()
                .map(|x| SensorValue::Accelerometer { x: *x, y: 0.0, z: 0.0 })
                .collect(),
        }],
    );
    SensorNet::new(map)
}

fn drain(stream: &DecisionStream) -> Vec<f64> {
    let mut out = Vec::new();
    while let Some(decision) = stream.try_recv() {
        out.push(decision.confidence);
    }
    out
}

fn spawn_watching(queries: Vec<Query>, buffer: usize) -> MonitorPipeline {
    MonitorPipeline::spawn(
        PipelineConfig {
            max_buffer_size: buffer,
            sampling_rate: RATE,
        },
        queries
            .into_iter()
            .map(|q| WatchedQuery::new(q, verdict_probe()))
            .collect(),
        test_workflow(),
        Arc::new(ExhaustiveBackend::new()),
    )
    .unwrap()
}

/// Runs one trace end to end and returns the per-event verdict confidences.
async fn run_trace(query: Query, xs: &[f64]) -> Vec<f64> {
    let pipeline = spawn_watching(vec![query], 64);
    let (listener, stream) = decision_channel(64);

    for x in xs {
        pipeline.ingest(&snapshot(&[*x]), &listener).unwrap();
    }
    pipeline.stop();
    pipeline.join().await;

    drain(&stream)
}

#[tokio::test]
async fn eventually_matches_on_second_event() {
    let verdicts = run_trace(Query::eventually(holds("a")), &[0.0, 1.0]).await;
    assert_eq!(verdicts, vec![0.5, 1.0]);
}

#[tokio::test]
async fn always_fails_when_fact_disappears() {
    let verdicts = run_trace(Query::always(holds("a")), &[1.0, 0.0]).await;
    assert_eq!(verdicts, vec![0.5, 0.0]);
}

#[tokio::test]
async fn next_on_single_event_trace_is_false() {
    let verdicts = run_trace(Query::next(Query::TT), &[0.0]).await;
    assert_eq!(verdicts, vec![0.0]);
}

#[tokio::test]
async fn last_on_single_event_trace_is_true() {
    let verdicts = run_trace(Query::last(), &[0.0]).await;
    assert_eq!(verdicts, vec![1.0]);
}

#[tokio::test]
async fn until_holds_through_goal() {
    let query = Query::until(holds("a"), holds("b"));
    let verdicts = run_trace(query, &[1.0, 1.0, 2.0]).await;
    assert_eq!(verdicts, vec![0.5, 0.5, 1.0]);
}

#[tokio::test]
async fn contradiction_fails_on_first_event() {
    let query = Query::and(vec![
        holds("a"),
        Query::formula(Proposition::Assert(Fact::Negated(gesture("a")))),
    ]);
    let verdicts = run_trace(query, &[1.0, 0.0]).await;
    assert_eq!(verdicts, vec![0.0, 0.0]);
}

#[tokio::test]
async fn verdicts_latch_once_stable() {
    let verdicts = run_trace(Query::eventually(holds("a")), &[0.0, 1.0, 0.0, 0.0]).await;
    assert_eq!(verdicts, vec![0.5, 1.0, 1.0, 1.0]);
}

#[tokio::test]
async fn outputs_are_one_to_one_with_events_after_reshaping() {
    // A single snapshot carrying a three-sample block becomes three events.
    let pipeline = spawn_watching(vec![Query::eventually(holds("a"))], 64);
    let (listener, stream) = decision_channel(64);

    let accepted = pipeline.ingest(&snapshot(&[0.0, 0.0, 1.0]), &listener).unwrap();
    assert_eq!(accepted, 3);

    pipeline.stop();
    pipeline.join().await;

    assert_eq!(drain(&stream), vec![0.5, 0.5, 1.0]);
    let stats = pipeline.stats();
    assert_eq!(stats.events_ingested, 3);
    assert_eq!(stats.decisions_delivered, 3);
}

#[tokio::test]
async fn monitors_watch_the_same_trace_independently() {
    let pipeline = spawn_watching(
        vec![Query::eventually(holds("a")), Query::always(holds("a"))],
        64,
    );
    let (listener, stream) = decision_channel(64);

    pipeline.ingest(&snapshot(&[1.0, 1.0]), &listener).unwrap();
    pipeline.stop();
    pipeline.join().await;

    // Per event, decisions arrive in registration order.
    assert_eq!(drain(&stream), vec![1.0, 0.5, 1.0, 1.0]);
}

#[tokio::test]
async fn full_buffer_drops_events_and_continues() {
    // The worker task has not run yet on this single-threaded runtime, so
    // everything beyond the buffer capacity is dropped at ingress.
    let pipeline = spawn_watching(vec![Query::eventually(holds("a"))], 2);
    let (listener, stream) = decision_channel(64);

    let accepted = pipeline
        .ingest(&snapshot(&[0.0, 0.0, 0.0, 1.0]), &listener)
        .unwrap();
    assert_eq!(accepted, 2);

    let stats = pipeline.stats();
    assert_eq!(stats.events_ingested, 2);
    assert_eq!(stats.events_dropped, 2);

    pipeline.stop();
    pipeline.join().await;
    // The surviving two-event trace still completes: pending, then failed
    // at the final position.
    assert_eq!(drain(&stream), vec![0.5, 0.0]);
}

#[tokio::test]
async fn workflow_failure_drops_the_event() {
    let verdicts = run_trace(Query::eventually(holds("a")), &[3.0, 0.0, 1.0]).await;
    assert_eq!(verdicts, vec![0.5, 1.0]);
}

#[tokio::test]
async fn workflow_failures_are_counted() {
    let pipeline = spawn_watching(vec![Query::eventually(holds("a"))], 64);
    let (listener, _stream) = decision_channel(64);

    pipeline.ingest(&snapshot(&[3.0, 0.0]), &listener).unwrap();
    pipeline.stop();
    pipeline.join().await;

    assert_eq!(pipeline.stats().workflow_failures, 1);
}

#[tokio::test]
async fn slow_listener_drops_decisions_without_stalling() {
    let pipeline = spawn_watching(vec![Query::eventually(holds("a"))], 64);
    let (listener, stream) = decision_channel(1);

    pipeline.ingest(&snapshot(&[0.0, 0.0, 0.0]), &listener).unwrap();
    pipeline.stop();
    pipeline.join().await;

    let stats = pipeline.stats();
    assert_eq!(stats.decisions_delivered, 1);
    assert_eq!(stats.decisions_dropped, 2);
    assert_eq!(drain(&stream), vec![0.5]);
}

#[tokio::test]
async fn ingress_validation_is_fatal() {
    let pipeline = spawn_watching(vec![Query::eventually(holds("a"))], 64);
    let (listener, _stream) = decision_channel(64);

    let err = pipeline.ingest(&SensorNet::default(), &listener).unwrap_err();
    assert!(matches!(
        err,
        MotionError::Validation(ValidationError::EmptySnapshot)
    ));

    let mut map = HashMap::new();
    map.insert(
        Location::Waist,
        vec![SensorStream {
            sampling_rate: RATE + 1,
            values: vec![SensorValue::Accelerometer { x: 0.0, y: 0.0, z: 0.0 }],
        }],
    );
    let err = pipeline.ingest(&SensorNet::new(map), &listener).unwrap_err();
    assert!(matches!(
        err,
        MotionError::Validation(ValidationError::SamplingRateMismatch { .. })
    ));
}

#[tokio::test]
async fn stop_is_idempotent_and_rejects_new_events() {
    let pipeline = spawn_watching(vec![Query::eventually(holds("a"))], 64);
    let (listener, _stream) = decision_channel(64);

    pipeline.stop();
    pipeline.stop();
    pipeline.join().await;
    pipeline.join().await;

    let err = pipeline.ingest(&snapshot(&[0.0]), &listener).unwrap_err();
    assert!(matches!(
        err,
        MotionError::Pipeline(PipelineError::Stopped)
    ));
}

#[tokio::test]
async fn malformed_watched_query_is_rejected_at_spawn() {
    use motionql::Path;

    let bad = Query::exists(
        Path::repeat(Path::choice(vec![Path::test(Query::TT), Path::step()])),
        Query::TT,
    );
    let err = MonitorPipeline::spawn(
        PipelineConfig::default(),
        vec![WatchedQuery::new(bad, verdict_probe())],
        test_workflow(),
        Arc::new(ExhaustiveBackend::new()),
    )
    .unwrap_err();
    assert!(err.is_validation());
}
