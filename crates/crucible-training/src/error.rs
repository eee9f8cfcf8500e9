use thiserror::Error;

pub type TrainingResult<T> = std::result::Result<T, TrainingError>;

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("invalid training config: {0}")]
    InvalidConfig(String),

    #[error("metrics error: {0}")]
    Metrics(String),

    #[error("no checkpoint found for job: {0}")]
    CheckpointNotFound(String),

    #[error("checkpoint belongs to job {found}, expected {expected}")]
    CheckpointMismatch { expected: String, found: String },

    #[error("artifact error: {0}")]
    Artifact(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
