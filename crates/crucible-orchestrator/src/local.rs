//! Local training runtime.
//!
//! The orchestrator treats "run one local training step" as an opaque
//! operation behind the `LocalRuntime` trait: it starts a worker, observes
//! its progress through polling, and halts it on pause/stop. The shipped
//! `StepRunner` drives a background worker per job that advances one
//! simulated step per tick with a deterministic schedule.

use crate::error::{OrchestratorError, OrchestratorResult};
use async_trait::async_trait;
use crucible_training::{Checkpoint, JobId, MetricSnapshot, TrainingConfig};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Steps per simulated epoch.
const STEPS_PER_EPOCH: u64 = 100;

/// Execution state of a local worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeStatus {
    Idle,
    Initializing,
    Running,
    Finished,
    Failed(String),
    Halted,
}

/// Capability interface for local training execution.
#[async_trait]
pub trait LocalRuntime: Send + Sync {
    fn id(&self) -> &'static str;

    /// Starts (or restarts) training for a job, optionally from a checkpoint.
    async fn start(
        &self,
        job_id: &JobId,
        config: &TrainingConfig,
        resume_from: Option<Checkpoint>,
    ) -> OrchestratorResult<()>;

    /// Reports the worker's execution state. `Idle` if never started.
    async fn status(&self, job_id: &JobId) -> RuntimeStatus;

    /// The most recent metric snapshot the worker produced.
    async fn latest_metrics(&self, job_id: &JobId) -> Option<MetricSnapshot>;

    /// Signals the worker to halt. Effective even mid-step.
    async fn halt(&self, job_id: &JobId) -> OrchestratorResult<()>;
}

struct WorkerShared {
    status: RuntimeStatus,
    latest: Option<MetricSnapshot>,
}

struct Worker {
    shared: Arc<Mutex<WorkerShared>>,
    token: CancellationToken,
}

/// In-process local runtime advancing one simulated step per tick.
///
/// Loss decays and gradient norm shrinks as pure functions of the step
/// count; the learning rate is taken verbatim from the config (or from the
/// resume checkpoint), so a pause/resume round trip restores it bit-exactly
/// and the step count never regresses.
#[derive(Clone)]
pub struct StepRunner {
    tick: Duration,
    workers: Arc<Mutex<HashMap<String, Worker>>>,
}

impl StepRunner {
    #[must_use]
    pub fn new(tick: Duration) -> Self {
        Self { tick, workers: Arc::new(Mutex::new(HashMap::new())) }
    }

    fn worker_state(&self, job_id: &JobId) -> Option<(RuntimeStatus, Option<MetricSnapshot>)> {
        let workers = self.workers.lock().ok()?;
        let worker = workers.get(&job_id.0)?;
        let shared = worker.shared.lock().ok()?;
        Some((shared.status.clone(), shared.latest.clone()))
    }

    fn simulate_step(step: u64, learning_rate: f64) -> MetricSnapshot {
        let loss = 2.0 / (1.0 + 0.05 * step as f64);
        let grad_norm = 1.0 / (1.0 + 0.01 * step as f64);
        MetricSnapshot::new(step, (step / STEPS_PER_EPOCH) as u32, loss, learning_rate)
            .with_grad_norm(grad_norm)
    }
}

#[async_trait]
impl LocalRuntime for StepRunner {
    fn id(&self) -> &'static str {
        "step-runner"
    }

    async fn start(
        &self,
        job_id: &JobId,
        config: &TrainingConfig,
        resume_from: Option<Checkpoint>,
    ) -> OrchestratorResult<()> {
        let shared = Arc::new(Mutex::new(WorkerShared {
            status: RuntimeStatus::Initializing,
            latest: None,
        }));
        let token = CancellationToken::new();

        {
            let mut workers = self
                .workers
                .lock()
                .map_err(|e| OrchestratorError::Runtime(format!("worker map poisoned: {e}")))?;
            if let Some(existing) = workers.get(&job_id.0) {
                let running = existing.shared.lock().map_or(false, |s| {
                    matches!(s.status, RuntimeStatus::Initializing | RuntimeStatus::Running)
                });
                if running {
                    return Err(OrchestratorError::Runtime(format!(
                        "worker already running for job {job_id}"
                    )));
                }
            }
            workers.insert(
                job_id.0.clone(),
                Worker { shared: Arc::clone(&shared), token: token.clone() },
            );
        }

        let mut step = resume_from.as_ref().map_or(0, |c| c.step);
        let learning_rate =
            resume_from.as_ref().map_or(config.hyperparams.learning_rate, |c| c.learning_rate);
        let max_steps = config.max_steps;
        let tick = self.tick;
        let id = job_id.clone();

        debug!(job_id = %id, resume_step = step, "Starting local worker");

        tokio::spawn(async move {
            if let Ok(mut s) = shared.lock() {
                s.status = RuntimeStatus::Running;
            }

            loop {
                tokio::select! {
                    () = token.cancelled() => {
                        if let Ok(mut s) = shared.lock() {
                            s.status = RuntimeStatus::Halted;
                        }
                        debug!(job_id = %id, step, "Local worker halted");
                        return;
                    }
                    () = tokio::time::sleep(tick) => {}
                }

                step += 1;
                let snapshot = Self::simulate_step(step, learning_rate);
                if let Ok(mut s) = shared.lock() {
                    s.latest = Some(snapshot);
                }

                if let Some(max) = max_steps {
                    if step >= max {
                        if let Ok(mut s) = shared.lock() {
                            s.status = RuntimeStatus::Finished;
                        }
                        debug!(job_id = %id, step, "Local worker finished");
                        return;
                    }
                }
            }
        });

        Ok(())
    }

    async fn status(&self, job_id: &JobId) -> RuntimeStatus {
        self.worker_state(job_id).map_or(RuntimeStatus::Idle, |(status, _)| status)
    }

    async fn latest_metrics(&self, job_id: &JobId) -> Option<MetricSnapshot> {
        self.worker_state(job_id).and_then(|(_, latest)| latest)
    }

    async fn halt(&self, job_id: &JobId) -> OrchestratorResult<()> {
        let workers = self
            .workers
            .lock()
            .map_err(|e| OrchestratorError::Runtime(format!("worker map poisoned: {e}")))?;

        match workers.get(&job_id.0) {
            Some(worker) => {
                worker.token.cancel();
                if let Ok(mut shared) = worker.shared.lock() {
                    if matches!(
                        shared.status,
                        RuntimeStatus::Initializing | RuntimeStatus::Running
                    ) {
                        shared.status = RuntimeStatus::Halted;
                    }
                }
                Ok(())
            }
            None => {
                warn!(job_id = %job_id, "Halt requested for unknown worker");
                Err(OrchestratorError::Runtime(format!("no worker for job {job_id}")))
            }
        }
    }
}
