//! Decision layer: mapping monitor verdicts to classified exercises and
//! delivering them to listeners.
//!
//! A [`DecisionStream`] is the subscriber-facing handle; deliveries from
//! the pipeline side never block and are dropped (with an error log) when
//! the subscriber is slow.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{MotionResult, PipelineError};
use crate::query::{Query, QueryValue};

/// A recognized exercise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    /// Exercise name, e.g. `"biceps-curl"`.
    pub name: String,
    /// Optional intensity estimate in `[0, 1]`.
    pub intensity: Option<f64>,
}

/// A classification decision delivered to a listener.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedExercise {
    /// Classifier confidence in `[0, 1]`.
    pub confidence: f64,
    /// The recognized exercise, if any.
    pub exercise: Option<Exercise>,
    /// When the decision was made.
    pub timestamp: DateTime<Utc>,
}

impl ClassifiedExercise {
    /// Creates a decision stamped with the current time.
    #[must_use]
    pub fn new(confidence: f64, exercise: Option<Exercise>) -> Self {
        Self {
            confidence,
            exercise,
            timestamp: Utc::now(),
        }
    }
}

/// Maps each monitor verdict to an optional decision.
pub type DecisionFn = Arc<dyn Fn(&QueryValue) -> Option<ClassifiedExercise> + Send + Sync>;

/// A query registered for monitoring, with its decision transform.
#[derive(Clone)]
pub struct WatchedQuery {
    pub(crate) query: Query,
    pub(crate) decide: DecisionFn,
}

impl WatchedQuery {
    /// Pairs a query with a decision transform.
    #[must_use]
    pub fn new(query: Query, decide: DecisionFn) -> Self {
        Self { query, decide }
    }

    /// The watched query.
    #[must_use]
    pub const fn query(&self) -> &Query {
        &self.query
    }
}

impl fmt::Debug for WatchedQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchedQuery")
            .field("query", &self.query)
            .finish_non_exhaustive()
    }
}

/// The decision transform the upstream exercise classifier registers:
/// emit the named exercise once the verdict stabilizes to true.
#[must_use]
pub fn gesture_decision(name: impl Into<String>, confidence: f64) -> DecisionFn {
    let name = name.into();
    Arc::new(move |value| match value {
        QueryValue::Stable(true) => Some(ClassifiedExercise::new(
            confidence,
            Some(Exercise {
                name: name.clone(),
                intensity: None,
            }),
        )),
        _ => None,
    })
}

/// Unique identifier for a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListenerId(Uuid);

impl ListenerId {
    /// Creates a new random listener id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cloneable listener identity carried alongside sensor events for reply
/// routing.
#[derive(Debug, Clone)]
pub struct ListenerRef {
    id: ListenerId,
    tx: Sender<ClassifiedExercise>,
}

impl ListenerRef {
    /// The listener id backing this handle.
    #[must_use]
    pub const fn id(&self) -> ListenerId {
        self.id
    }

    /// Non-blocking delivery; returns false when the decision was dropped.
    pub(crate) fn deliver(&self, decision: ClassifiedExercise) -> bool {
        match self.tx.try_send(decision) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// A subscription stream for classification decisions.
#[derive(Debug)]
pub struct DecisionStream {
    id: ListenerId,
    rx: Receiver<ClassifiedExercise>,
}

impl DecisionStream {
    /// The listener id backing this stream.
    #[must_use]
    pub const fn id(&self) -> ListenerId {
        self.id
    }

    /// Receive the next decision (blocking).
    pub fn recv(&self) -> MotionResult<ClassifiedExercise> {
        self.rx
            .recv()
            .map_err(|_| PipelineError::Disconnected.into())
    }

    /// Receive the next decision with a timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> MotionResult<ClassifiedExercise> {
        self.rx.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => PipelineError::Timeout {
                duration_ms: timeout.as_millis().min(u128::from(u64::MAX)) as u64,
            }
            .into(),
            RecvTimeoutError::Disconnected => PipelineError::Disconnected.into(),
        })
    }

    /// Non-blocking receive.
    #[must_use]
    pub fn try_recv(&self) -> Option<ClassifiedExercise> {
        self.rx.try_recv().ok()
    }
}

/// Creates a listener handle and its decision stream.
#[must_use]
pub fn decision_channel(capacity: usize) -> (ListenerRef, DecisionStream) {
    let id = ListenerId::new();
    let (tx, rx) = bounded(capacity.max(1));
    (ListenerRef { id, tx }, DecisionStream { id, rx })
}
