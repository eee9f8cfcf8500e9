//! Crucible Orchestrator
//!
//! Training orchestration core: owns the authoritative state of every
//! fine-tuning job, drives the lifecycle state machine, delegates execution
//! to the local runtime or registered provider connectors, and verifies
//! downloaded artifacts.
//!
//! # Example
//!
//! ```rust,no_run
//! use crucible_orchestrator::{Orchestrator, OrchestratorConfig, StepRunner};
//! use crucible_training::{DatasetRef, TrainingConfig, TuningMethod, LOCAL_PROVIDER};
//! use std::path::PathBuf;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let runtime = Arc::new(StepRunner::new(Duration::from_millis(100)));
//! let orchestrator = Orchestrator::new(OrchestratorConfig::default(), runtime);
//!
//! let config = TrainingConfig::new(
//!     "llama-3-8b".to_string(),
//!     DatasetRef::Jsonl { path: PathBuf::from("train.jsonl") },
//!     TuningMethod::Lora,
//! );
//! let job_id = orchestrator.create_job(config).await?;
//! orchestrator.submit_job(&job_id, LOCAL_PROVIDER).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connectors;
pub mod error;
pub mod local;
pub mod orchestrator;
pub mod poller;
pub mod registry;
pub mod verifier;

pub use config::OrchestratorConfig;
pub use connectors::ConnectorManager;
pub use error::{OrchestratorError, OrchestratorResult};
pub use local::{LocalRuntime, RuntimeStatus, StepRunner};
pub use orchestrator::Orchestrator;
pub use poller::{JobPoller, PollHandle};
pub use registry::{JobHandle, JobRegistry};
pub use verifier::ArtifactVerifier;
