//! Error types for orchestration operations.

use crucible_training::{ConnectorError, JobState, TrainingError};
use thiserror::Error;

/// Result type for orchestration operations.
pub type OrchestratorResult<T> = std::result::Result<T, OrchestratorError>;

/// Errors that can occur while coordinating fine-tuning jobs.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// A job with this id already exists.
    #[error("duplicate job id: {0}")]
    DuplicateJob(String),

    /// No job registered under this id.
    #[error("job not found: {0}")]
    JobNotFound(String),

    /// The requested transition is not allowed from the job's current state.
    #[error("invalid state transition for job {job_id}: {from} -> {requested}")]
    InvalidTransition { job_id: String, from: JobState, requested: JobState },

    /// The job has no recorded progress yet and cannot be checkpointed.
    #[error("job {0} has no progress to pause")]
    NoProgress(String),

    /// No connector registered under this provider id.
    #[error("connector not found: {0}")]
    ConnectorNotFound(String),

    /// The operation requires a job delegated to a remote provider.
    #[error("job {0} is not running on a provider")]
    NotRemoteJob(String),

    /// The local runtime failed to start or control a worker.
    #[error("local runtime error: {0}")]
    Runtime(String),

    /// Connector registry error.
    #[error("connector registry error: {0}")]
    Registry(String),

    /// Error surfaced by a provider connector.
    #[error(transparent)]
    Connector(#[from] ConnectorError),

    /// Error from the training primitives (checkpoints, metrics, artifacts).
    #[error(transparent)]
    Training(#[from] TrainingError),

    /// I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl OrchestratorError {
    /// Whether retrying the same operation may succeed.
    ///
    /// Only transient connector failures qualify; validation errors never do.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connector(e) if e.is_retryable())
    }
}
