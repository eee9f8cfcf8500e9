//! Job registry: the authoritative owner of every job record.
//!
//! The outer lock guards only the shape of the map (insert, lookup). Each
//! job record sits behind its own lock, so mutating job A never blocks or
//! exposes partial writes to readers of job B.

use crate::error::{OrchestratorError, OrchestratorResult};
use crucible_training::{JobId, TrainingJob};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Shared handle to one job's record.
pub type JobHandle = Arc<RwLock<TrainingJob>>;

/// Registry mapping job ids to job records.
#[derive(Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<String, JobHandle>>,
}

impl JobRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self { jobs: RwLock::new(HashMap::new()) }
    }

    /// Inserts a new job.
    ///
    /// # Errors
    /// Returns `DuplicateJob` if a job with this id already exists.
    pub async fn insert(&self, job: TrainingJob) -> OrchestratorResult<()> {
        let id = job.job_id.0.clone();
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&id) {
            return Err(OrchestratorError::DuplicateJob(id));
        }
        debug!(job_id = %id, "Registered job");
        jobs.insert(id, Arc::new(RwLock::new(job)));
        Ok(())
    }

    /// Gets the handle for a job's record.
    ///
    /// # Errors
    /// Returns `JobNotFound` if no job is registered under `job_id`.
    pub async fn handle(&self, job_id: &JobId) -> OrchestratorResult<JobHandle> {
        let jobs = self.jobs.read().await;
        jobs.get(job_id.0.as_str())
            .cloned()
            .ok_or_else(|| OrchestratorError::JobNotFound(job_id.to_string()))
    }

    /// Returns a point-in-time copy of a job's record.
    pub async fn snapshot(&self, job_id: &JobId) -> OrchestratorResult<TrainingJob> {
        let handle = self.handle(job_id).await?;
        let job = handle.read().await;
        Ok(job.clone())
    }

    /// Returns point-in-time copies of all job records.
    pub async fn list(&self) -> Vec<TrainingJob> {
        let handles: Vec<JobHandle> = {
            let jobs = self.jobs.read().await;
            jobs.values().cloned().collect()
        };
        let mut out = Vec::with_capacity(handles.len());
        for handle in handles {
            out.push(handle.read().await.clone());
        }
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        out
    }

    /// Checks if a job is registered.
    pub async fn contains(&self, job_id: &JobId) -> bool {
        self.jobs.read().await.contains_key(job_id.0.as_str())
    }

    /// Gets the number of registered jobs.
    pub async fn count(&self) -> usize {
        self.jobs.read().await.len()
    }
}
