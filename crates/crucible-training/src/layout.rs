use crate::error::TrainingResult;
use crate::job::JobId;
use std::path::{Path, PathBuf};

/// Filesystem layout for durable job state.
///
/// Default layout is under `<storage_root>/jobs/<job_id>/...`. Every path is
/// job-scoped; two jobs never share a file.
#[derive(Debug, Clone)]
pub struct JobLayout {
    root: PathBuf,
}

impl JobLayout {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Create a layout rooted in a Crucible storage directory.
    #[must_use]
    pub fn for_storage_root(storage_root: &Path) -> Self {
        Self::new(storage_root.join("jobs"))
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn job_dir(&self, job_id: &JobId) -> PathBuf {
        self.root.join(job_id.0.as_str())
    }

    #[must_use]
    pub fn checkpoint_path(&self, job_id: &JobId) -> PathBuf {
        self.job_dir(job_id).join("checkpoint.json")
    }

    #[must_use]
    pub fn artifacts_dir(&self, job_id: &JobId) -> PathBuf {
        self.job_dir(job_id).join("artifacts")
    }

    #[must_use]
    pub fn artifact_path(&self, job_id: &JobId) -> PathBuf {
        self.artifacts_dir(job_id).join("model.bin")
    }

    pub fn ensure_job_dirs(&self, job_id: &JobId) -> TrainingResult<()> {
        std::fs::create_dir_all(self.job_dir(job_id))?;
        std::fs::create_dir_all(self.artifacts_dir(job_id))?;
        Ok(())
    }
}
