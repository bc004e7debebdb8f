//! Streaming pipeline driver.
//!
//! Owns the bounded ingress buffer and the worker task. Snapshots are
//! reshaped into per-step events at ingress and enqueued without blocking;
//! the worker labels each event with facts, maintains the two-element
//! sliding window that detects the end of the trace, steps every monitor,
//! and delivers decisions to the originating listener.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

use crate::error::{MotionResult, PipelineError};
use crate::solver::SolverBackend;

use super::decision::{ListenerRef, WatchedQuery};
use super::monitor::QueryMonitor;
use super::sensor::{SensorNet, SensorNetValue};
use super::workflow::{BindToSensors, SensorWorkflow};

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Max buffered events before ingress drops with an error log.
    pub max_buffer_size: usize,
    /// Sampling rate every ingested stream must report, in Hz.
    pub sampling_rate: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_buffer_size: 1024,
            sampling_rate: 100,
        }
    }
}

/// Snapshot of pipeline activity.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineStats {
    /// Events accepted into the buffer.
    pub events_ingested: u64,
    /// Events dropped because the buffer was full.
    pub events_dropped: u64,
    /// Events dropped because the workflow failed.
    pub workflow_failures: u64,
    /// Decisions delivered to listeners.
    pub decisions_delivered: u64,
    /// Decisions dropped on slow or gone listeners.
    pub decisions_dropped: u64,
}

#[derive(Debug, Default)]
struct PipelineCounters {
    events_ingested: AtomicU64,
    events_dropped: AtomicU64,
    workflow_failures: AtomicU64,
    decisions_delivered: AtomicU64,
    decisions_dropped: AtomicU64,
}

impl PipelineCounters {
    fn snapshot(&self) -> PipelineStats {
        PipelineStats {
            events_ingested: self.events_ingested.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
            workflow_failures: self.workflow_failures.load(Ordering::Relaxed),
            decisions_delivered: self.decisions_delivered.load(Ordering::Relaxed),
            decisions_dropped: self.decisions_dropped.load(Ordering::Relaxed),
        }
    }
}

struct IngestEvent {
    value: SensorNetValue,
    listener: ListenerRef,
}

/// The streaming monitor pipeline.
///
/// One worker task per pipeline; monitors for the same event evaluate
/// concurrently while each monitor's own state updates stay serialized.
#[derive(Debug)]
pub struct MonitorPipeline {
    cfg: PipelineConfig,
    ingest_tx: Mutex<Option<mpsc::Sender<IngestEvent>>>,
    counters: Arc<PipelineCounters>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl MonitorPipeline {
    /// Validates the watched queries and spawns the worker task.
    ///
    /// Must be called within a tokio runtime.
    pub fn spawn(
        cfg: PipelineConfig,
        watched: Vec<WatchedQuery>,
        workflow: Arc<dyn SensorWorkflow>,
        solver: Arc<dyn SolverBackend>,
    ) -> MotionResult<Self> {
        for w in &watched {
            w.query().validate()?;
        }

        let (tx, rx) = mpsc::channel(cfg.max_buffer_size.max(1));
        let counters = Arc::new(PipelineCounters::default());
        let monitors: Vec<QueryMonitor> = watched.into_iter().map(QueryMonitor::new).collect();

        let worker_counters = Arc::clone(&counters);
        let handle = tokio::spawn(worker_loop(rx, monitors, workflow, solver, worker_counters));

        Ok(Self {
            cfg,
            ingest_tx: Mutex::new(Some(tx)),
            counters,
            worker: Mutex::new(Some(handle)),
        })
    }

    /// Reshapes a snapshot into per-step events and enqueues them in block
    /// order, tagged with the listener identity for reply routing.
    ///
    /// Validation violations are fatal. A full buffer drops the event with
    /// an error log and the stream continues; the number of accepted events
    /// is returned.
    pub fn ingest(&self, net: &SensorNet, listener: &ListenerRef) -> MotionResult<usize> {
        let blocks = net.split_blocks(self.cfg.sampling_rate)?;

        let guard = self
            .ingest_tx
            .lock()
            .map_err(|_| PipelineError::Disconnected)?;
        let Some(tx) = guard.as_ref() else {
            return Err(PipelineError::Stopped.into());
        };

        let mut accepted = 0;
        for value in blocks {
            let event = IngestEvent {
                value,
                listener: listener.clone(),
            };
            match tx.try_send(event) {
                Ok(()) => {
                    accepted += 1;
                    self.counters.events_ingested.fetch_add(1, Ordering::Relaxed);
                }
                Err(TrySendError::Full(_)) => {
                    self.counters.events_dropped.fetch_add(1, Ordering::Relaxed);
                    tracing::error!(
                        capacity = self.cfg.max_buffer_size,
                        listener = %listener.id(),
                        "dropping sensor event: pipeline buffer full"
                    );
                }
                Err(TrySendError::Closed(_)) => {
                    return Err(PipelineError::Disconnected.into());
                }
            }
        }
        Ok(accepted)
    }

    /// Marks the stream as draining: no new events are accepted, buffered
    /// events are delivered, the trailing window element is evaluated as
    /// the final position, and the worker completes.
    ///
    /// Stopping an already stopped pipeline is silently ignored.
    pub fn stop(&self) {
        if let Ok(mut guard) = self.ingest_tx.lock() {
            guard.take();
        }
    }

    /// Waits for the worker to finish draining after [`MonitorPipeline::stop`].
    pub async fn join(&self) {
        let handle = match self.worker.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    /// Observability snapshot.
    #[must_use]
    pub fn stats(&self) -> PipelineStats {
        self.counters.snapshot()
    }
}

async fn worker_loop(
    rx: mpsc::Receiver<IngestEvent>,
    mut monitors: Vec<QueryMonitor>,
    workflow: Arc<dyn SensorWorkflow>,
    solver: Arc<dyn SolverBackend>,
    counters: Arc<PipelineCounters>,
) {
    // Demand-driven drain of the ingress buffer.
    let mut events = ReceiverStream::new(rx);

    // Two-element sliding window: the held event is processed once its
    // successor arrives (not last) or the stream ends (last).
    let mut window: Option<(BindToSensors, ListenerRef)> = None;

    while let Some(event) = events.next().await {
        let facts = match workflow.bind(&event.value) {
            Ok(facts) => facts,
            Err(e) => {
                counters.workflow_failures.fetch_add(1, Ordering::Relaxed);
                tracing::error!(error = %e, "workflow failed; dropping event");
                continue;
            }
        };
        let bound = BindToSensors {
            facts,
            value: event.value,
        };

        if let Some((prev, prev_listener)) = window.replace((bound, event.listener)) {
            process_event(
                &mut monitors,
                &prev,
                &prev_listener,
                false,
                solver.as_ref(),
                &counters,
            )
            .await;
        }
    }

    if let Some((last_event, listener)) = window.take() {
        process_event(
            &mut monitors,
            &last_event,
            &listener,
            true,
            solver.as_ref(),
            &counters,
        )
        .await;
    }
}

async fn process_event(
    monitors: &mut [QueryMonitor],
    event: &BindToSensors,
    listener: &ListenerRef,
    last: bool,
    solver: &dyn SolverBackend,
    counters: &PipelineCounters,
) {
    // Monitors evaluate concurrently for the same event; each round holds
    // its monitor's state exclusively for its whole extent.
    let rounds = monitors
        .iter_mut()
        .map(|monitor| monitor.step(&event.facts, last, solver));
    let values = futures::future::join_all(rounds).await;

    for (monitor, value) in monitors.iter().zip(values) {
        let Some(decision) = monitor.decide(&value) else {
            continue;
        };
        if listener.deliver(decision) {
            counters.decisions_delivered.fetch_add(1, Ordering::Relaxed);
        } else {
            counters.decisions_dropped.fetch_add(1, Ordering::Relaxed);
            tracing::error!(
                listener = %listener.id(),
                monitor = %monitor.id(),
                "failed to deliver decision"
            );
        }
    }
}
