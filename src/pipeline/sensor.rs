//! Sensor snapshot types and ingress reshaping.
//!
//! Upstream produces [`SensorNet`] snapshots: per location, a list of
//! sensor-point streams each carrying a uniform block of samples. Ingress
//! splits a snapshot into per-time-step [`SensorNetValue`] events, in block
//! order.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::fact::Location;

/// One sensor sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SensorValue {
    /// Accelerometer sample in g.
    Accelerometer {
        /// X axis.
        x: f64,
        /// Y axis.
        y: f64,
        /// Z axis.
        z: f64,
    },
    /// Rotation sample in deg/s.
    Rotation {
        /// X axis.
        x: f64,
        /// Y axis.
        y: f64,
        /// Z axis.
        z: f64,
    },
}

/// A block of samples from one sensor point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorStream {
    /// Samples per second.
    pub sampling_rate: u32,
    /// The sample block.
    pub values: Vec<SensorValue>,
}

/// A snapshot of all sensor points, grouped by location.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SensorNet {
    /// Point streams per location.
    pub map: HashMap<Location, Vec<SensorStream>>,
}

/// The samples of every sensor point at one time step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorNetValue {
    /// Per location, the step's sample from each of its points.
    pub map: HashMap<Location, Vec<SensorValue>>,
}

impl SensorNet {
    /// Creates a snapshot from a location map.
    #[must_use]
    pub fn new(map: HashMap<Location, Vec<SensorStream>>) -> Self {
        Self { map }
    }

    /// Splits the snapshot into one [`SensorNetValue`] per block index.
    ///
    /// Preconditions (violations are fatal; the caller is buggy):
    /// every location has at least one stream, every stream at least one
    /// value, all streams share one block size, and all streams report the
    /// configured sampling rate.
    pub fn split_blocks(&self, sampling_rate: u32) -> Result<Vec<SensorNetValue>, ValidationError> {
        if self.map.is_empty() {
            return Err(ValidationError::EmptySnapshot);
        }

        let mut block_size: Option<usize> = None;
        for (location, streams) in &self.map {
            if streams.is_empty() {
                return Err(ValidationError::EmptyLocation { location: *location });
            }
            for stream in streams {
                if stream.values.is_empty() {
                    return Err(ValidationError::EmptyStream { location: *location });
                }
                if stream.sampling_rate != sampling_rate {
                    return Err(ValidationError::SamplingRateMismatch {
                        location: *location,
                        expected: sampling_rate,
                        actual: stream.sampling_rate,
                    });
                }
                match block_size {
                    None => block_size = Some(stream.values.len()),
                    Some(expected) if expected != stream.values.len() => {
                        return Err(ValidationError::BlockSizeMismatch {
                            location: *location,
                            expected,
                            actual: stream.values.len(),
                        });
                    }
                    Some(_) => {}
                }
            }
        }

        let block_size = block_size.unwrap_or(0);
        let mut out = Vec::with_capacity(block_size);
        for i in 0..block_size {
            let map = self
                .map
                .iter()
                .map(|(location, streams)| {
                    let samples = streams.iter().map(|s| s.values[i].clone()).collect();
                    (*location, samples)
                })
                .collect();
            out.push(SensorNetValue { map });
        }
        Ok(out)
    }
}
