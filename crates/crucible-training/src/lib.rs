//! Crucible Training
//!
//! Backend-agnostic fine-tuning primitives for:
//! - Defining training jobs and their lifecycle (`TrainingJob`, `JobState`)
//! - Recording per-job metric history (`MetricsHistory`)
//! - Durable pause/resume checkpoints (`CheckpointManager`)
//! - Hash-verified artifact records (`ArtifactInfo`)
//! - Implementing provider connectors (`Connector`)

pub mod artifacts;
pub mod checkpoint;
pub mod connector;
pub mod error;
pub mod job;
pub mod layout;
pub mod metrics;

pub use artifacts::{persist_artifact, sha256_bytes, sha256_file, ArtifactInfo, ArtifactMetadata};
pub use checkpoint::{Checkpoint, CheckpointManager};
pub use connector::{
    Connector, ConnectorError, ConnectorResult, ProviderJobStatus, LOCAL_PROVIDER,
};
pub use error::{TrainingError, TrainingResult};
pub use job::{
    DatasetRef, HyperParams, JobId, JobState, TrainingConfig, TrainingJob, TuningMethod,
};
pub use layout::JobLayout;
pub use metrics::{MetricSnapshot, MetricsHistory};
