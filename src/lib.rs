//! # MotionQL - Streaming LDLf Monitoring for Sensor Traces
//!
//! MotionQL watches finite traces of classified sensor events against
//! queries written in linear-time dynamic logic. A monitor consumes one
//! trace position at a time and either commits to a verdict or carries a
//! residual query forward; an SMT-style solver backend collapses residuals
//! that are already decided and keeps their size bounded.
//!
//! ## Core Concepts
//!
//! - **GroundFact**: a named predicate holding at one trace position
//! - **Query**: an LDLf formula over propositions and regular paths
//! - **QueryValue**: a committed verdict or a pending residual
//! - **MonitorPipeline**: the streaming driver from sensor snapshots to
//!   classification decisions
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use motionql::{
//!     decision_channel, gesture_decision, ExhaustiveBackend, GroundFact, Location,
//!     MonitorPipeline, PipelineConfig, Proposition, Query, WatchedQuery,
//! };
//!
//! // Fire once a high-confidence curl gesture shows up anywhere in the trace.
//! let curl = GroundFact::gesture("biceps-curl", 0.8, Location::LeftWrist);
//! let query = Query::eventually(Query::formula(Proposition::assert(curl)));
//!
//! let (listener, decisions) = decision_channel(64);
//! let pipeline = MonitorPipeline::spawn(
//!     PipelineConfig::default(),
//!     vec![WatchedQuery::new(query, gesture_decision("biceps-curl", 0.8))],
//!     workflow,
//!     Arc::new(ExhaustiveBackend::new()),
//! )?;
//! pipeline.ingest(&snapshot, &listener)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core types
pub mod error;
pub mod fact;
pub mod query;

// Evaluation and solving
pub mod evaluator;
pub mod solver;

// Streaming pipeline
pub mod pipeline;

// Re-export primary types at crate root for convenience
pub use error::{MotionError, MotionResult, PipelineError, SolverError, ValidationError};
pub use evaluator::{eval_proposition, evaluate};
pub use fact::{AttributeValue, Fact, GroundFact, Location};
pub use pipeline::{
    decision_channel, gesture_decision, BindToSensors, ClassifiedExercise, DecisionFn,
    DecisionStream, Exercise, ListenerId, ListenerRef, MonitorId, MonitorPipeline, PipelineConfig,
    PipelineStats, SensorNet, SensorNetValue, SensorStream, SensorValue, SensorWorkflow,
    WatchedQuery,
};
pub use query::{Connective, Path, Proposition, Query, QueryValue};
pub use solver::{ExhaustiveBackend, SmtProcessBackend, SolverBackend, SolverConfig, SolverStats};
