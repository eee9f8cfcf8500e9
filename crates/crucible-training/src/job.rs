//! Job data structures for Crucible.
//!
//! This module defines the core data structures for fine-tuning jobs,
//! including the `TrainingJob` record itself, its immutable configuration,
//! the lifecycle state machine, and validation utilities.

use crate::artifacts::ArtifactInfo;
use crate::checkpoint::Checkpoint;
use crate::error::{TrainingError, TrainingResult};
use crate::metrics::{MetricSnapshot, MetricsHistory};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Identifier for a fine-tuning job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub String);

impl JobId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Reference to the dataset a job trains on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DatasetRef {
    /// A local JSONL file of training examples.
    Jsonl { path: PathBuf },
    /// A dataset registered by name with the execution target.
    Named { name: String },
}

/// Fine-tuning method requested for the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TuningMethod {
    Sft,
    Lora,
    QLora,
}

impl std::fmt::Display for TuningMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sft => write!(f, "sft"),
            Self::Lora => write!(f, "lora"),
            Self::QLora => write!(f, "qlora"),
        }
    }
}

/// Training hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HyperParams {
    pub seed: u64,
    pub epochs: u32,
    pub learning_rate: f64,
    pub batch_size: u32,
    pub max_seq_len: u32,
}

impl Default for HyperParams {
    fn default() -> Self {
        Self { seed: 42, epochs: 1, learning_rate: 2e-5, batch_size: 1, max_seq_len: 2048 }
    }
}

impl HyperParams {
    pub fn validate(&self) -> TrainingResult<()> {
        if self.epochs == 0 {
            return Err(TrainingError::InvalidConfig("epochs must be >= 1".to_string()));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(TrainingError::InvalidConfig("learning_rate must be > 0".to_string()));
        }
        if self.batch_size == 0 {
            return Err(TrainingError::InvalidConfig("batch_size must be >= 1".to_string()));
        }
        if self.max_seq_len == 0 {
            return Err(TrainingError::InvalidConfig("max_seq_len must be >= 1".to_string()));
        }
        Ok(())
    }
}

/// Immutable configuration snapshot for a fine-tuning job.
///
/// Captured once at job creation; never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Base model identifier (engine-specific).
    pub model_id: String,
    /// Dataset the job trains on.
    pub dataset: DatasetRef,
    /// Fine-tuning method.
    pub method: TuningMethod,
    /// Training hyperparameters.
    pub hyperparams: HyperParams,
    /// Steps between automatic checkpoints during active training.
    pub checkpoint_interval: u64,
    /// Optional hard step limit.
    pub max_steps: Option<u64>,
    /// Optional override for the artifact output directory.
    pub output_dir: Option<PathBuf>,
}

impl TrainingConfig {
    #[must_use]
    pub fn new(model_id: String, dataset: DatasetRef, method: TuningMethod) -> Self {
        Self {
            model_id,
            dataset,
            method,
            hyperparams: HyperParams::default(),
            checkpoint_interval: 100,
            max_steps: None,
            output_dir: None,
        }
    }

    pub fn validate(&self) -> TrainingResult<()> {
        if self.model_id.trim().is_empty() {
            return Err(TrainingError::InvalidConfig("model_id is required".to_string()));
        }
        if self.checkpoint_interval == 0 {
            return Err(TrainingError::InvalidConfig(
                "checkpoint_interval must be >= 1".to_string(),
            ));
        }
        if let Some(max_steps) = self.max_steps {
            if max_steps == 0 {
                return Err(TrainingError::InvalidConfig("max_steps must be >= 1".to_string()));
            }
        }
        self.hyperparams.validate()?;
        Ok(())
    }
}

/// Lifecycle state of a fine-tuning job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum JobState {
    /// Created but not yet submitted to any execution target.
    #[default]
    Created,
    /// Local runtime is starting; transient.
    Initializing,
    /// Actively training, locally or delegated to a provider.
    Running,
    /// Checkpointed and suspended; resumable.
    Paused,
    /// Terminated by explicit user request.
    Stopped,
    /// Finished successfully.
    Completed,
    /// Finished unsuccessfully; the job's `error` field is populated.
    Failed,
    /// Provider-side cancellation acknowledged.
    Cancelled,
}

impl JobState {
    /// Whether this state admits no further transitions.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether the job is executing (or about to execute).
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Initializing | Self::Running)
    }

    /// Transition guard table for the job state machine.
    ///
    /// Every non-terminal state admits `Failed`: submission and polling
    /// escalation can fail a job before, during, or between runs.
    #[must_use]
    pub fn can_transition_to(self, next: JobState) -> bool {
        match self {
            Self::Created => matches!(next, Self::Initializing | Self::Running | Self::Failed),
            Self::Initializing => matches!(next, Self::Running | Self::Stopped | Self::Failed),
            Self::Running => matches!(
                next,
                Self::Paused | Self::Stopped | Self::Completed | Self::Failed | Self::Cancelled
            ),
            Self::Paused => matches!(next, Self::Running | Self::Stopped | Self::Failed),
            Self::Stopped | Self::Completed | Self::Failed | Self::Cancelled => false,
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Initializing => "initializing",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{name}")
    }
}

/// One fine-tuning run.
///
/// The job registry is the sole owner of these records; every job owns its
/// metric history, checkpoint, and artifact record exclusively.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingJob {
    /// Unique identifier, assigned at creation.
    pub job_id: JobId,
    /// Immutable configuration snapshot.
    pub config: TrainingConfig,
    /// Current lifecycle state.
    pub state: JobState,
    /// Execution target ("local" or a connector id); set once at submission.
    pub provider: Option<String>,
    /// Identifier returned by the provider; `None` for local jobs.
    pub provider_job_id: Option<String>,
    /// Ordered, append-only metric history owned by this job.
    pub metrics: MetricsHistory,
    /// Most recent metric snapshot.
    pub current_metrics: Option<MetricSnapshot>,
    /// Last durable checkpoint.
    pub checkpoint: Option<Checkpoint>,
    /// Result of the most recent successful artifact download.
    pub artifact_info: Option<ArtifactInfo>,
    /// Timestamp when the job was created.
    pub created_at: DateTime<Utc>,
    /// Timestamp when the job was first submitted.
    pub started_at: Option<DateTime<Utc>>,
    /// Timestamp of the last pause.
    pub paused_at: Option<DateTime<Utc>>,
    /// Timestamp when the job reached a terminal state.
    pub completed_at: Option<DateTime<Utc>>,
    /// Last fatal error message.
    pub error: Option<String>,
}

impl TrainingJob {
    /// Creates a new job in the `Created` state.
    #[must_use]
    pub fn new(config: TrainingConfig) -> Self {
        Self {
            job_id: JobId::new(),
            config,
            state: JobState::Created,
            provider: None,
            provider_job_id: None,
            metrics: MetricsHistory::new(),
            current_metrics: None,
            checkpoint: None,
            artifact_info: None,
            created_at: Utc::now(),
            started_at: None,
            paused_at: None,
            completed_at: None,
            error: None,
        }
    }

    /// Appends a metric snapshot and updates `current_metrics`.
    ///
    /// # Errors
    /// Returns an error if the snapshot's step regresses.
    pub fn record_metrics(&mut self, snapshot: MetricSnapshot) -> TrainingResult<()> {
        self.metrics.append(snapshot.clone())?;
        self.current_metrics = Some(snapshot);
        Ok(())
    }

    /// Moves the job into `Failed` and records the error message.
    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.state = JobState::Failed;
        self.error = Some(error.into());
        self.completed_at = Some(Utc::now());
    }

    /// Whether the job was delegated to a remote provider.
    #[must_use]
    pub fn is_remote(&self) -> bool {
        matches!(&self.provider, Some(p) if p != crate::connector::LOCAL_PROVIDER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TrainingConfig {
        TrainingConfig::new(
            "llama-3-8b".to_string(),
            DatasetRef::Jsonl { path: PathBuf::from("data/train.jsonl") },
            TuningMethod::Lora,
        )
    }

    #[test]
    fn test_config_validate_requires_model_id() {
        let mut cfg = config();
        cfg.model_id = "  ".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_config_validate_rejects_zero_checkpoint_interval() {
        let mut cfg = config();
        cfg.checkpoint_interval = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_hyperparams_validate_rejects_bad_learning_rate() {
        let mut hp = HyperParams::default();
        hp.learning_rate = 0.0;
        assert!(hp.validate().is_err());
        hp.learning_rate = f64::NAN;
        assert!(hp.validate().is_err());
    }

    #[test]
    fn test_state_machine_guards() {
        use JobState::*;
        assert!(Created.can_transition_to(Running));
        assert!(Created.can_transition_to(Initializing));
        assert!(Running.can_transition_to(Paused));
        assert!(Paused.can_transition_to(Running));
        assert!(Paused.can_transition_to(Stopped));
        assert!(!Created.can_transition_to(Paused));
        assert!(!Paused.can_transition_to(Completed));
        for active in [Created, Initializing, Running, Paused] {
            assert!(active.can_transition_to(Failed));
        }
        for terminal in [Stopped, Completed, Failed, Cancelled] {
            assert!(terminal.is_terminal());
            assert!(!terminal.can_transition_to(Running));
            assert!(!terminal.can_transition_to(Failed));
        }
    }

    #[test]
    fn test_new_job_starts_created() {
        let job = TrainingJob::new(config());
        assert_eq!(job.state, JobState::Created);
        assert!(job.provider.is_none());
        assert!(job.current_metrics.is_none());
        assert!(!job.is_remote());
    }

    #[test]
    fn test_record_failure_is_terminal() {
        let mut job = TrainingJob::new(config());
        job.record_failure("provider exploded");
        assert_eq!(job.state, JobState::Failed);
        assert_eq!(job.error.as_deref(), Some("provider exploded"));
        assert!(job.completed_at.is_some());
    }
}
