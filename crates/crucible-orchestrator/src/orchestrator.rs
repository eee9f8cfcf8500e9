//! Orchestrator core: the single writer of job state transitions.
//!
//! Owns the job registry and drives the lifecycle state machine. Operations
//! are safe to call concurrently for different job ids; all mutation of one
//! job's record happens under that job's own lock. Network calls to
//! providers are the only suspension points, and state is only mutated
//! after they succeed, so a failed submission leaves no partial state.

use crate::config::OrchestratorConfig;
use crate::connectors::ConnectorManager;
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::local::{LocalRuntime, RuntimeStatus};
use crate::registry::JobRegistry;
use crate::verifier::ArtifactVerifier;
use chrono::Utc;
use crucible_training::{
    ArtifactInfo, Checkpoint, CheckpointManager, JobId, JobLayout, JobState, MetricSnapshot,
    ProviderJobStatus, TrainingConfig, TrainingJob, LOCAL_PROVIDER,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Coordinates fine-tuning jobs across the local runtime and registered
/// provider connectors.
pub struct Orchestrator {
    config: OrchestratorConfig,
    registry: JobRegistry,
    connectors: ConnectorManager,
    runtime: Arc<dyn LocalRuntime>,
    checkpoints: CheckpointManager,
    verifier: ArtifactVerifier,
}

impl Orchestrator {
    /// Creates an orchestrator with the given configuration and local runtime.
    #[must_use]
    pub fn new(config: OrchestratorConfig, runtime: Arc<dyn LocalRuntime>) -> Self {
        let layout = JobLayout::for_storage_root(&config.storage_root);
        Self {
            config,
            registry: JobRegistry::new(),
            connectors: ConnectorManager::new(),
            runtime,
            checkpoints: CheckpointManager::new(layout.clone()),
            verifier: ArtifactVerifier::new(layout),
        }
    }

    /// The connector registry, for registering provider connectors.
    #[must_use]
    pub fn connectors(&self) -> &ConnectorManager {
        &self.connectors
    }

    #[must_use]
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    fn invalid(job: &TrainingJob, requested: JobState) -> OrchestratorError {
        OrchestratorError::InvalidTransition {
            job_id: job.job_id.to_string(),
            from: job.state,
            requested,
        }
    }

    /// Moves a job to `next`, enforcing the transition table.
    ///
    /// Every state mutation in this module goes through here (or through
    /// `record_failure`, whose edges the table also admits), so the guard
    /// table and the observed behavior cannot drift apart.
    fn transition(job: &mut TrainingJob, next: JobState) -> OrchestratorResult<()> {
        if !job.state.can_transition_to(next) {
            return Err(Self::invalid(job, next));
        }
        job.state = next;
        Ok(())
    }

    /// Creates a job in the `Created` state.
    ///
    /// # Errors
    /// Returns an error if the config is invalid or the generated id
    /// collides with an existing job.
    pub async fn create_job(&self, config: TrainingConfig) -> OrchestratorResult<JobId> {
        config.validate().map_err(OrchestratorError::Training)?;
        let job = TrainingJob::new(config);
        let job_id = job.job_id.clone();
        self.registry.insert(job).await?;
        info!(job_id = %job_id, "Created job");
        Ok(job_id)
    }

    /// Submits a job to the local runtime or a registered provider.
    ///
    /// On any failure the job remains `Created` with no partial state.
    pub async fn submit_job(&self, job_id: &JobId, provider: &str) -> OrchestratorResult<()> {
        let handle = self.registry.handle(job_id).await?;
        let mut job = handle.write().await;
        if job.state != JobState::Created {
            return Err(Self::invalid(&job, JobState::Running));
        }

        if provider == LOCAL_PROVIDER {
            Self::transition(&mut job, JobState::Initializing)?;
            if let Err(e) = self.runtime.start(job_id, &job.config, None).await {
                // Roll back the transition nobody outside this lock observed.
                job.state = JobState::Created;
                return Err(e);
            }
            job.provider = Some(LOCAL_PROVIDER.to_string());
        } else {
            // Resolve and call the connector before touching the record.
            let connector = self.connectors.get(provider)?;
            connector.validate_config(&job.config).await?;
            let provider_job_id = connector.submit_job(&job.config).await?;
            job.provider = Some(provider.to_string());
            job.provider_job_id = Some(provider_job_id);
        }

        Self::transition(&mut job, JobState::Running)?;
        job.started_at = Some(Utc::now());
        info!(job_id = %job_id, provider = %provider, "Submitted job");
        Ok(())
    }

    /// Pauses a running job, writing a durable checkpoint.
    ///
    /// Idempotent on an already-paused job: returns the existing checkpoint
    /// without creating a duplicate.
    ///
    /// # Errors
    /// Returns `NoProgress` if the job has produced no metrics yet, and
    /// `InvalidTransition` from any state other than `Running`/`Paused`.
    pub async fn pause_training(&self, job_id: &JobId) -> OrchestratorResult<Checkpoint> {
        let handle = self.registry.handle(job_id).await?;
        let mut job = handle.write().await;

        match job.state {
            JobState::Paused => {
                return job
                    .checkpoint
                    .clone()
                    .ok_or_else(|| OrchestratorError::NoProgress(job_id.to_string()));
            }
            JobState::Running => {}
            _ => return Err(Self::invalid(&job, JobState::Paused)),
        }

        let checkpoint = if job.is_remote() {
            if job.current_metrics.is_none() {
                return Err(OrchestratorError::NoProgress(job_id.to_string()));
            }
            // Durable checkpoint before the provider call: if the write
            // fails, the provider job is untouched and still running.
            let checkpoint = self.checkpoints.save(&job).map_err(OrchestratorError::Training)?;
            // Best-effort remote cancellation; resume re-submits the config.
            if let (Some(provider), Some(pjid)) = (&job.provider, &job.provider_job_id) {
                let connector = self.connectors.get(provider)?;
                if let Err(e) = connector.cancel_job(pjid).await {
                    warn!(job_id = %job_id, error = %e, "Cancel during pause failed");
                }
            }
            checkpoint
        } else {
            let pending = self.runtime.latest_metrics(job_id).await;
            if job.current_metrics.is_none() && pending.is_none() {
                return Err(OrchestratorError::NoProgress(job_id.to_string()));
            }
            // Halt first so the checkpoint step bounds every observed step.
            self.runtime.halt(job_id).await?;
            if let Some(snapshot) = self.runtime.latest_metrics(job_id).await {
                if Self::is_fresh(job.current_metrics.as_ref(), &snapshot) {
                    job.record_metrics(snapshot).map_err(OrchestratorError::Training)?;
                }
            }
            self.checkpoints.save(&job).map_err(OrchestratorError::Training)?
        };

        job.checkpoint = Some(checkpoint.clone());
        Self::transition(&mut job, JobState::Paused)?;
        job.paused_at = Some(Utc::now());
        info!(job_id = %job_id, step = checkpoint.step, "Paused job");
        Ok(checkpoint)
    }

    /// Resumes a paused job from its last durable checkpoint.
    pub async fn resume_training(&self, job_id: &JobId) -> OrchestratorResult<()> {
        let handle = self.registry.handle(job_id).await?;
        let mut job = handle.write().await;
        if job.state != JobState::Paused {
            return Err(Self::invalid(&job, JobState::Running));
        }

        let checkpoint = self.checkpoints.load(job_id).map_err(OrchestratorError::Training)?;

        match job.provider.clone() {
            Some(provider) if provider != LOCAL_PROVIDER => {
                // Connectors only expose submit, so a remote resume is a
                // fresh submission recorded under a new provider job id.
                let connector = self.connectors.get(&provider)?;
                let provider_job_id = connector.submit_job(&job.config).await?;
                job.provider_job_id = Some(provider_job_id);
            }
            _ => {
                self.runtime.start(job_id, &job.config, Some(checkpoint.clone())).await?;
            }
        }

        Self::transition(&mut job, JobState::Running)?;
        job.paused_at = None;
        info!(job_id = %job_id, step = checkpoint.step, "Resumed job");
        Ok(())
    }

    /// Stops a running or paused job at the user's request.
    ///
    /// Always sets `completed_at`. Provider/runtime cancellation is
    /// best-effort; the stop itself never fails because of it.
    pub async fn stop_training(&self, job_id: &JobId) -> OrchestratorResult<()> {
        let handle = self.registry.handle(job_id).await?;
        let mut job = handle.write().await;
        if !matches!(job.state, JobState::Running | JobState::Paused) {
            return Err(Self::invalid(&job, JobState::Stopped));
        }

        if job.state == JobState::Running {
            if job.is_remote() {
                if let (Some(provider), Some(pjid)) = (&job.provider, &job.provider_job_id) {
                    let connector = self.connectors.get(provider)?;
                    if let Err(e) = connector.cancel_job(pjid).await {
                        warn!(job_id = %job_id, error = %e, "Provider cancel failed during stop");
                    }
                }
            } else if let Err(e) = self.runtime.halt(job_id).await {
                warn!(job_id = %job_id, error = %e, "Runtime halt failed during stop");
            }
        }

        Self::transition(&mut job, JobState::Stopped)?;
        job.completed_at = Some(Utc::now());
        info!(job_id = %job_id, "Stopped job");
        Ok(())
    }

    /// Explicit provider-side cancellation of a delegated running job.
    ///
    /// # Errors
    /// Returns `NotRemoteJob` for local jobs; if the provider declines the
    /// cancellation the job state is left untouched.
    pub async fn cancel_provider_job(&self, job_id: &JobId) -> OrchestratorResult<()> {
        let handle = self.registry.handle(job_id).await?;
        let mut job = handle.write().await;
        if job.state != JobState::Running {
            return Err(Self::invalid(&job, JobState::Cancelled));
        }
        if !job.is_remote() {
            return Err(OrchestratorError::NotRemoteJob(job_id.to_string()));
        }

        let provider = job
            .provider
            .clone()
            .ok_or_else(|| OrchestratorError::NotRemoteJob(job_id.to_string()))?;
        let pjid = job
            .provider_job_id
            .clone()
            .ok_or_else(|| OrchestratorError::NotRemoteJob(job_id.to_string()))?;

        let connector = self.connectors.get(&provider)?;
        let acknowledged = connector.cancel_job(&pjid).await?;
        if !acknowledged {
            return Err(OrchestratorError::Connector(
                crucible_training::ConnectorError::Rejected(
                    "provider declined cancellation".to_string(),
                ),
            ));
        }

        Self::transition(&mut job, JobState::Cancelled)?;
        job.completed_at = Some(Utc::now());
        info!(job_id = %job_id, "Cancelled provider job");
        Ok(())
    }

    /// Downloads and verifies the artifact of a delegated job.
    ///
    /// On success the resulting `ArtifactInfo` replaces the job's previous
    /// record wholesale; on failure the previous record is preserved.
    pub async fn download_artifact(&self, job_id: &JobId) -> OrchestratorResult<ArtifactInfo> {
        let snapshot = self.registry.snapshot(job_id).await?;
        let provider = snapshot
            .provider
            .clone()
            .filter(|p| p != LOCAL_PROVIDER)
            .ok_or_else(|| OrchestratorError::NotRemoteJob(job_id.to_string()))?;

        let connector = self.connectors.get(&provider)?;
        let info = self.verifier.download(connector.as_ref(), &snapshot).await?;

        let handle = self.registry.handle(job_id).await?;
        handle.write().await.artifact_info = Some(info.clone());
        Ok(info)
    }

    /// Appends a metric snapshot to a job's ledger.
    pub async fn record_metrics(
        &self,
        job_id: &JobId,
        snapshot: MetricSnapshot,
    ) -> OrchestratorResult<()> {
        let handle = self.registry.handle(job_id).await?;
        let mut job = handle.write().await;
        job.record_metrics(snapshot).map_err(OrchestratorError::Training)
    }

    /// The most recent metric snapshot for a job.
    pub async fn latest_metrics(&self, job_id: &JobId) -> OrchestratorResult<Option<MetricSnapshot>> {
        Ok(self.registry.snapshot(job_id).await?.current_metrics)
    }

    /// A point-in-time copy of a job's record.
    pub async fn get_status(&self, job_id: &JobId) -> OrchestratorResult<TrainingJob> {
        self.registry.snapshot(job_id).await
    }

    /// Point-in-time copies of all jobs, oldest first.
    pub async fn list_jobs(&self) -> Vec<TrainingJob> {
        self.registry.list().await
    }

    /// Probes a connector's liveness under the configured deadline.
    pub async fn verify_connector(&self, id: &str) -> OrchestratorResult<bool> {
        self.connectors.verify(id, self.config.verify_timeout()).await
    }

    /// Marks a job failed, recording the reason. No-op on terminal jobs.
    pub async fn fail_job(&self, job_id: &JobId, reason: &str) -> OrchestratorResult<JobState> {
        let handle = self.registry.handle(job_id).await?;
        let mut job = handle.write().await;
        if !job.state.is_terminal() {
            job.record_failure(reason);
            warn!(job_id = %job_id, reason = %reason, "Job failed");
        }
        Ok(job.state)
    }

    /// Observes a job's execution once and advances its state machine.
    ///
    /// Inactive jobs are left untouched; a state change that happened
    /// between the status read and the record update (pause, stop, cancel)
    /// takes priority over the stale observation.
    pub async fn poll_job(&self, job_id: &JobId) -> OrchestratorResult<JobState> {
        let snapshot = self.registry.snapshot(job_id).await?;
        if !snapshot.state.is_active() {
            return Ok(snapshot.state);
        }
        if snapshot.is_remote() {
            self.poll_remote(job_id, &snapshot).await
        } else {
            self.poll_local(job_id).await
        }
    }

    async fn poll_local(&self, job_id: &JobId) -> OrchestratorResult<JobState> {
        let status = self.runtime.status(job_id).await;
        let latest = self.runtime.latest_metrics(job_id).await;

        let handle = self.registry.handle(job_id).await?;
        let mut job = handle.write().await;
        if !job.state.is_active() {
            return Ok(job.state);
        }

        if let Some(snapshot) = latest {
            if Self::is_fresh(job.current_metrics.as_ref(), &snapshot) {
                job.record_metrics(snapshot).map_err(OrchestratorError::Training)?;
                self.maybe_autocheckpoint(&mut job);
            }
        }

        match status {
            RuntimeStatus::Finished => {
                Self::transition(&mut job, JobState::Completed)?;
                job.completed_at = Some(Utc::now());
                info!(job_id = %job_id, "Job completed");
            }
            RuntimeStatus::Failed(error) => {
                job.record_failure(error);
            }
            RuntimeStatus::Running => {
                if job.state == JobState::Initializing {
                    Self::transition(&mut job, JobState::Running)?;
                }
            }
            // Halted means pause/stop already moved the state elsewhere.
            RuntimeStatus::Halted | RuntimeStatus::Initializing | RuntimeStatus::Idle => {}
        }
        Ok(job.state)
    }

    async fn poll_remote(
        &self,
        job_id: &JobId,
        snapshot: &TrainingJob,
    ) -> OrchestratorResult<JobState> {
        let provider = snapshot
            .provider
            .clone()
            .ok_or_else(|| OrchestratorError::NotRemoteJob(job_id.to_string()))?;
        let pjid = snapshot
            .provider_job_id
            .clone()
            .ok_or_else(|| OrchestratorError::NotRemoteJob(job_id.to_string()))?;

        let connector = self.connectors.get(&provider)?;
        // Network call happens outside the job lock.
        let status = connector.get_job_status(&pjid).await?;

        let handle = self.registry.handle(job_id).await?;
        let mut job = handle.write().await;
        if job.state != JobState::Running {
            // A pause/stop/cancel won the race; the stale poll is dropped.
            return Ok(job.state);
        }

        match status {
            ProviderJobStatus::Pending | ProviderJobStatus::Running => {}
            ProviderJobStatus::Completed => {
                Self::transition(&mut job, JobState::Completed)?;
                job.completed_at = Some(Utc::now());
                info!(job_id = %job_id, provider = %provider, "Provider reported completion");
            }
            ProviderJobStatus::Failed => {
                job.record_failure("provider reported job failure");
            }
            ProviderJobStatus::Cancelled => {
                Self::transition(&mut job, JobState::Cancelled)?;
                job.completed_at = Some(Utc::now());
            }
        }
        Ok(job.state)
    }

    /// A snapshot is fresh when it advances the step, or revises the same
    /// step with different values. Older steps are stale reads.
    fn is_fresh(current: Option<&MetricSnapshot>, snapshot: &MetricSnapshot) -> bool {
        current.map_or(true, |cur| match snapshot.step.cmp(&cur.step) {
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Equal => snapshot != cur,
            std::cmp::Ordering::Less => false,
        })
    }

    /// Writes an interval checkpoint when enough steps have elapsed since
    /// the last one. Failures are logged, not fatal to the poll.
    fn maybe_autocheckpoint(&self, job: &mut TrainingJob) {
        let Some(current) = &job.current_metrics else { return };
        let due = job
            .checkpoint
            .as_ref()
            .map_or(current.step >= job.config.checkpoint_interval, |prev| {
                current.step >= prev.step + job.config.checkpoint_interval
            });
        if !due {
            return;
        }
        match self.checkpoints.save(job) {
            Ok(checkpoint) => job.checkpoint = Some(checkpoint),
            Err(e) => warn!(job_id = %job.job_id, error = %e, "Interval checkpoint failed"),
        }
    }
}
