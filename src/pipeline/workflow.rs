//! Workflow plug-in: labelling sensor events with ground facts.

use std::collections::HashSet;

use crate::error::MotionResult;
use crate::fact::GroundFact;

use super::sensor::SensorNetValue;

/// Maps a sensor event to the set of ground facts holding at that position.
///
/// Typically backed by a gesture classifier; probability thresholds are
/// encoded into fact names so the evaluator compares facts structurally.
/// Implementations must be total: an `Err` drops the event.
pub trait SensorWorkflow: Send + Sync {
    /// Produces the fact set for one sensor event.
    fn bind(&self, value: &SensorNetValue) -> MotionResult<HashSet<GroundFact>>;
}

impl<F> SensorWorkflow for F
where
    F: Fn(&SensorNetValue) -> MotionResult<HashSet<GroundFact>> + Send + Sync,
{
    fn bind(&self, value: &SensorNetValue) -> MotionResult<HashSet<GroundFact>> {
        self(value)
    }
}

/// A sensor event paired with the facts the workflow inferred for it.
#[derive(Debug, Clone)]
pub struct BindToSensors {
    /// Ground facts holding at this position.
    pub facts: HashSet<GroundFact>,
    /// The raw sensor event.
    pub value: SensorNetValue,
}
