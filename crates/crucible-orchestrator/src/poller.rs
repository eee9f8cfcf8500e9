//! Per-job polling tasks.
//!
//! Each active job gets one polling task that periodically observes its
//! execution (local runtime or remote provider) and advances the state
//! machine. Tasks are cancellable through a structured token; retryable
//! poll failures are bounded and escalate to a failed job.

use crate::error::OrchestratorResult;
use crate::orchestrator::Orchestrator;
use crucible_training::JobId;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Handle to one job's polling task.
pub struct PollHandle {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl PollHandle {
    /// Requests the task to stop at the next suspension point.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether the task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Cancels the task and waits for it to exit.
    pub async fn shutdown(self) {
        self.token.cancel();
        let _ = self.handle.await;
    }
}

/// Spawner for per-job polling tasks.
pub struct JobPoller;

impl JobPoller {
    /// Spawns the polling task for one job.
    ///
    /// The task exits on its own once the job reaches a terminal state, or
    /// earlier when cancelled through the returned handle. Poll failures on
    /// this job never affect any other job's task.
    pub fn spawn(orchestrator: Arc<Orchestrator>, job_id: JobId) -> PollHandle {
        let token = CancellationToken::new();
        let task_token = token.clone();
        let interval = orchestrator.config().poll_interval();
        let max_failures = orchestrator.config().max_consecutive_poll_failures;

        let handle = tokio::spawn(async move {
            let mut failures: u32 = 0;
            loop {
                tokio::select! {
                    () = task_token.cancelled() => {
                        debug!(job_id = %job_id, "Polling task cancelled");
                        return;
                    }
                    () = tokio::time::sleep(interval) => {}
                }

                match orchestrator.poll_job(&job_id).await {
                    Ok(state) if state.is_terminal() => {
                        debug!(job_id = %job_id, state = %state, "Polling task done");
                        return;
                    }
                    Ok(_) => {
                        failures = 0;
                    }
                    Err(e) if e.is_retryable() => {
                        failures += 1;
                        warn!(
                            job_id = %job_id,
                            error = %e,
                            consecutive = failures,
                            "Retryable poll failure"
                        );
                        if failures >= max_failures {
                            Self::escalate(&orchestrator, &job_id, &e.to_string()).await;
                            return;
                        }
                    }
                    Err(e) => {
                        Self::escalate(&orchestrator, &job_id, &e.to_string()).await;
                        return;
                    }
                }
            }
        });

        PollHandle { token, handle }
    }

    async fn escalate(orchestrator: &Orchestrator, job_id: &JobId, reason: &str) {
        if let Err(e) = Self::try_escalate(orchestrator, job_id, reason).await {
            warn!(job_id = %job_id, error = %e, "Failed to record poll escalation");
        }
    }

    async fn try_escalate(
        orchestrator: &Orchestrator,
        job_id: &JobId,
        reason: &str,
    ) -> OrchestratorResult<()> {
        orchestrator.fail_job(job_id, reason).await?;
        Ok(())
    }
}
