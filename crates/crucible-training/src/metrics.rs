//! Per-job metric history.
//!
//! Each job owns exactly one `MetricsHistory`; snapshots are appended in the
//! order they were produced and never removed or reordered.

use crate::error::{TrainingError, TrainingResult};
use serde::{Deserialize, Serialize};

/// One observation of training progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub step: u64,
    pub epoch: u32,
    pub loss: f64,
    pub learning_rate: f64,
    pub grad_norm: f64,
    /// Examples per second, if the runtime reports it.
    pub throughput: Option<f64>,
    pub gpu_utilization: Option<f64>,
    pub cpu_utilization: Option<f64>,
    pub ram_used_mb: Option<u64>,
    pub elapsed_seconds: Option<u64>,
    pub eta_seconds: Option<u64>,
}

impl MetricSnapshot {
    /// Creates a snapshot with the required training fields.
    #[must_use]
    pub fn new(step: u64, epoch: u32, loss: f64, learning_rate: f64) -> Self {
        Self {
            step,
            epoch,
            loss,
            learning_rate,
            grad_norm: 0.0,
            throughput: None,
            gpu_utilization: None,
            cpu_utilization: None,
            ram_used_mb: None,
            elapsed_seconds: None,
            eta_seconds: None,
        }
    }

    /// Sets the gradient norm.
    #[must_use]
    pub fn with_grad_norm(mut self, grad_norm: f64) -> Self {
        self.grad_norm = grad_norm;
        self
    }

    /// Sets the throughput in examples per second.
    #[must_use]
    pub fn with_throughput(mut self, throughput: f64) -> Self {
        self.throughput = Some(throughput);
        self
    }

    /// Sets elapsed time and remaining-time estimate.
    #[must_use]
    pub fn with_timing(mut self, elapsed_seconds: u64, eta_seconds: Option<u64>) -> Self {
        self.elapsed_seconds = Some(elapsed_seconds);
        self.eta_seconds = eta_seconds;
        self
    }
}

/// Append-only, time-ordered sequence of metric snapshots for one job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsHistory {
    samples: Vec<MetricSnapshot>,
}

impl MetricsHistory {
    #[must_use]
    pub fn new() -> Self {
        Self { samples: Vec::new() }
    }

    /// Appends a snapshot.
    ///
    /// # Errors
    /// Returns an error if the snapshot's step is lower than the last
    /// appended step. Steps are monotonically non-decreasing within a job.
    pub fn append(&mut self, snapshot: MetricSnapshot) -> TrainingResult<()> {
        if let Some(last) = self.samples.last() {
            if snapshot.step < last.step {
                return Err(TrainingError::Metrics(format!(
                    "step regression: {} after {}",
                    snapshot.step, last.step
                )));
            }
        }
        self.samples.push(snapshot);
        Ok(())
    }

    /// The most recently appended snapshot.
    #[must_use]
    pub fn latest(&self) -> Option<&MetricSnapshot> {
        self.samples.last()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MetricSnapshot> {
        self.samples.iter()
    }
}
