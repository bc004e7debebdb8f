//! Error types for MotionQL.
//!
//! All errors are strongly typed using thiserror. This enables pattern
//! matching on specific error conditions and provides clear error messages.

use thiserror::Error;

use crate::fact::Location;

/// Validation errors raised at pipeline ingress or query registration.
///
/// These are precondition violations (caller bugs); the pipeline does not
/// attempt recovery from them.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A sensor location carried no point streams.
    #[error("Location {location} has no sensor streams")]
    EmptyLocation {
        /// The offending location.
        location: Location,
    },

    /// A sensor stream carried no samples.
    #[error("Sensor stream at {location} has no values")]
    EmptyStream {
        /// The offending location.
        location: Location,
    },

    /// Streams within one snapshot disagree on block size.
    #[error("Inconsistent block size at {location}: stream has {actual} values, expected {expected}")]
    BlockSizeMismatch {
        /// The offending location.
        location: Location,
        /// Block size observed on the first stream.
        expected: usize,
        /// Block size observed on this stream.
        actual: usize,
    },

    /// A stream's sampling rate differs from the configured rate.
    #[error("Sampling rate mismatch at {location}: stream reports {actual} Hz, configured {expected} Hz")]
    SamplingRateMismatch {
        /// The offending location.
        location: Location,
        /// Configured rate.
        expected: u32,
        /// Observed rate.
        actual: u32,
    },

    /// A snapshot contained no locations at all.
    #[error("Sensor snapshot is empty")]
    EmptySnapshot,

    /// A watched query failed structural validation.
    #[error("Invalid query: {reason}")]
    InvalidQuery {
        /// Reason the query was rejected.
        reason: String,
    },

    /// Required field missing from a configuration document.
    #[error("Required field '{field}' is missing")]
    MissingField {
        /// Name of missing field.
        field: String,
    },

    /// A configuration document could not be parsed.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// Reason the document was rejected.
        reason: String,
    },
}

/// Errors surfaced by solver backends.
#[derive(Debug, Error)]
pub enum SolverError {
    /// The solver subprocess could not be spawned.
    #[error("Failed to spawn solver '{path}': {message}")]
    Spawn {
        /// Executable path.
        path: String,
        /// Underlying error.
        message: String,
    },

    /// I/O with the solver subprocess failed.
    #[error("Solver I/O error: {message}")]
    Io {
        /// Error details.
        message: String,
    },

    /// The solver did not answer within the per-call timeout.
    #[error("Solver call timed out after {duration_ms}ms")]
    Timeout {
        /// Duration before timeout.
        duration_ms: u64,
    },

    /// The solver produced output we could not interpret.
    #[error("Unexpected solver output: {output:?}")]
    UnexpectedOutput {
        /// The raw output line.
        output: String,
    },

    /// The backend could not decide the query within its unrolling bound.
    #[error("Verdict unknown within unrolling bound {bound}")]
    Unknown {
        /// Configured unrolling bound.
        bound: usize,
    },

    /// Too many consecutive failures; calls fail fast until a success.
    #[error("Solver circuit breaker is open after {failures} consecutive failures")]
    CircuitOpen {
        /// Consecutive failure count.
        failures: u32,
    },
}

/// Errors raised by the streaming pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The ingress buffer is full; the event was dropped.
    #[error("Pipeline buffer is full (capacity={capacity})")]
    BufferFull {
        /// Buffer capacity.
        capacity: usize,
    },

    /// The pipeline worker is gone.
    #[error("Pipeline worker disconnected")]
    Disconnected,

    /// The pipeline has been stopped; no new events are accepted.
    #[error("Pipeline is stopped")]
    Stopped,

    /// A workflow plug-in rejected an event.
    #[error("Workflow failed: {message}")]
    Workflow {
        /// Error details.
        message: String,
    },

    /// A receive on a decision stream timed out.
    #[error("Decision stream timed out after {duration_ms}ms")]
    Timeout {
        /// Duration before timeout.
        duration_ms: u64,
    },
}

/// Top-level error type for MotionQL.
#[derive(Debug, Error)]
pub enum MotionError {
    /// Input validation failed.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Solver backend failure.
    #[error("Solver error: {0}")]
    Solver(#[from] SolverError),

    /// Pipeline failure.
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Internal system error.
    #[error("Internal error: {message}")]
    Internal {
        /// Error description.
        message: String,
    },
}

impl MotionError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is a solver error.
    #[must_use]
    pub const fn is_solver(&self) -> bool {
        matches!(self, Self::Solver(_))
    }

    /// Returns true if this error leaves the monitor with an unknown solver
    /// verdict.
    ///
    /// Unknown verdicts are treated as "not valid, satisfiable": evaluation
    /// continues with an unsimplified residual.
    #[must_use]
    pub const fn is_unknown_verdict(&self) -> bool {
        matches!(self, Self::Solver(_))
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            // Validation errors won't change on retry.
            Self::Validation(_) | Self::Internal { .. } => false,
            Self::Solver(e) => matches!(
                e,
                SolverError::Timeout { .. } | SolverError::Io { .. } | SolverError::Unknown { .. }
            ),
            Self::Pipeline(e) => matches!(e, PipelineError::BufferFull { .. } | PipelineError::Timeout { .. }),
        }
    }
}

/// Result type alias for MotionQL operations.
pub type MotionResult<T> = Result<T, MotionError>;
