//! Streaming monitor pipeline.
//!
//! Accepts heterogeneous sensor snapshots, splits them into per-time-step
//! events, tags each event with ground facts via a configurable workflow,
//! maintains per-query monitors, and emits classification decisions to the
//! listener identity that accompanied the originating event.

/// Decision types, transforms, and the subscriber stream.
pub mod decision;
/// Pipeline driver and worker task.
mod dispatcher;
/// Per-query monitor state machine.
mod monitor;
/// Sensor snapshot types and ingress reshaping.
pub mod sensor;
/// Workflow plug-in interface.
pub mod workflow;

pub use decision::{
    decision_channel, gesture_decision, ClassifiedExercise, DecisionFn, DecisionStream, Exercise,
    ListenerId, ListenerRef, WatchedQuery,
};
pub use dispatcher::{MonitorPipeline, PipelineConfig, PipelineStats};
pub use monitor::MonitorId;
pub use sensor::{SensorNet, SensorNetValue, SensorStream, SensorValue};
pub use workflow::{BindToSensors, SensorWorkflow};
