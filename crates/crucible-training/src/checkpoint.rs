//! Durable pause/resume checkpoints.
//!
//! A checkpoint is the minimal resumable state of a job: step, epoch, loss,
//! and the bit-exact learning rate. Checkpoints are persisted as JSON under
//! job-scoped paths and reloaded verbatim on resume.

use crate::error::{TrainingError, TrainingResult};
use crate::job::{JobId, TrainingJob};
use crate::layout::JobLayout;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Minimal durable snapshot of training progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub job_id: JobId,
    /// Monotonically non-decreasing within a job.
    pub step: u64,
    pub epoch: u32,
    pub loss: f64,
    pub learning_rate: f64,
    pub created_at: DateTime<Utc>,
}

/// Converts a job's in-memory progress into a durable, reloadable
/// representation and back.
#[derive(Debug, Clone)]
pub struct CheckpointManager {
    layout: JobLayout,
}

impl CheckpointManager {
    #[must_use]
    pub fn new(layout: JobLayout) -> Self {
        Self { layout }
    }

    /// Derives a checkpoint from the job's current metrics and persists it.
    ///
    /// The caller must hold the job's lock so the captured step, epoch,
    /// loss, and learning rate come from a single snapshot.
    ///
    /// # Errors
    /// Returns an error if the job has no recorded progress, if the step
    /// would regress below the previous checkpoint, or if the write fails.
    pub fn save(&self, job: &TrainingJob) -> TrainingResult<Checkpoint> {
        let snapshot = job.current_metrics.as_ref().ok_or_else(|| {
            TrainingError::Metrics(format!("job {} has no recorded progress", job.job_id))
        })?;

        if let Some(prev) = &job.checkpoint {
            if snapshot.step < prev.step {
                return Err(TrainingError::Metrics(format!(
                    "checkpoint step regression for job {}: {} after {}",
                    job.job_id, snapshot.step, prev.step
                )));
            }
        }

        let checkpoint = Checkpoint {
            job_id: job.job_id.clone(),
            step: snapshot.step,
            epoch: snapshot.epoch,
            loss: snapshot.loss,
            learning_rate: snapshot.learning_rate,
            created_at: Utc::now(),
        };

        self.layout.ensure_job_dirs(&job.job_id)?;
        let path = self.layout.checkpoint_path(&job.job_id);
        let tmp = path.with_extension("json.tmp");

        // Write-then-rename so a reader never observes a half-written file.
        let json = serde_json::to_string_pretty(&checkpoint)?;
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &path)?;

        debug!(job_id = %job.job_id, step = checkpoint.step, "Saved checkpoint");
        Ok(checkpoint)
    }

    /// Loads the last persisted checkpoint for a job.
    ///
    /// # Errors
    /// Returns `CheckpointNotFound` if no checkpoint exists, and
    /// `CheckpointMismatch` if the stored checkpoint belongs to another job.
    pub fn load(&self, job_id: &JobId) -> TrainingResult<Checkpoint> {
        let path = self.layout.checkpoint_path(job_id);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TrainingError::CheckpointNotFound(job_id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let checkpoint: Checkpoint = serde_json::from_slice(&bytes)?;
        if &checkpoint.job_id != job_id {
            return Err(TrainingError::CheckpointMismatch {
                expected: job_id.to_string(),
                found: checkpoint.job_id.to_string(),
            });
        }
        Ok(checkpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{DatasetRef, TrainingConfig, TuningMethod};
    use crate::metrics::MetricSnapshot;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn job_with_progress(step: u64) -> TrainingJob {
        let config = TrainingConfig::new(
            "base-model".to_string(),
            DatasetRef::Jsonl { path: PathBuf::from("train.jsonl") },
            TuningMethod::Sft,
        );
        let mut job = TrainingJob::new(config);
        job.record_metrics(MetricSnapshot::new(step, 1, 0.42, 3.0e-5)).unwrap();
        job
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let temp = TempDir::new().unwrap();
        let manager = CheckpointManager::new(JobLayout::for_storage_root(temp.path()));
        let job = job_with_progress(17);

        let saved = manager.save(&job).unwrap();
        assert_eq!(saved.step, 17);

        let loaded = manager.load(&job.job_id).unwrap();
        assert_eq!(loaded.step, saved.step);
        assert_eq!(loaded.epoch, saved.epoch);
        // Learning rate must survive persistence bit-exactly.
        assert_eq!(loaded.learning_rate.to_bits(), saved.learning_rate.to_bits());
    }

    #[test]
    fn test_save_requires_progress() {
        let temp = TempDir::new().unwrap();
        let manager = CheckpointManager::new(JobLayout::for_storage_root(temp.path()));
        let config = TrainingConfig::new(
            "base-model".to_string(),
            DatasetRef::Named { name: "alpaca".to_string() },
            TuningMethod::Sft,
        );
        let job = TrainingJob::new(config);

        assert!(manager.save(&job).is_err());
    }

    #[test]
    fn test_save_rejects_step_regression() {
        let temp = TempDir::new().unwrap();
        let manager = CheckpointManager::new(JobLayout::for_storage_root(temp.path()));
        let mut job = job_with_progress(20);
        job.checkpoint = Some(manager.save(&job).unwrap());

        // Force an older snapshot into current_metrics; save must refuse.
        job.current_metrics = Some(MetricSnapshot::new(5, 0, 0.9, 3.0e-5));
        assert!(manager.save(&job).is_err());
    }

    #[test]
    fn test_load_missing_checkpoint() {
        let temp = TempDir::new().unwrap();
        let manager = CheckpointManager::new(JobLayout::for_storage_root(temp.path()));

        let result = manager.load(&JobId("nonexistent".to_string()));
        assert!(matches!(result, Err(TrainingError::CheckpointNotFound(_))));
    }

    #[test]
    fn test_checkpoints_are_isolated_per_job() {
        let temp = TempDir::new().unwrap();
        let manager = CheckpointManager::new(JobLayout::for_storage_root(temp.path()));
        let a = job_with_progress(3);
        let b = job_with_progress(900);

        manager.save(&a).unwrap();
        manager.save(&b).unwrap();

        assert_eq!(manager.load(&a.job_id).unwrap().step, 3);
        assert_eq!(manager.load(&b.job_id).unwrap().step, 900);
    }
}
