//! Provider connector capability.
//!
//! The orchestrator never talks to a specific cloud API directly; it depends
//! on this trait and maps the connector's status vocabulary onto its own
//! state machine. Connector errors carry a retryable classification so
//! callers can distinguish "never going to succeed" from "try again".

use crate::job::TrainingConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Provider name used for jobs executed by the local runtime.
pub const LOCAL_PROVIDER: &str = "local";

pub type ConnectorResult<T> = std::result::Result<T, ConnectorError>;

/// Errors surfaced by a provider connector.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// Authentication failed or credentials are missing.
    #[error("connector auth error: {0}")]
    Auth(String),

    /// The provider rejected the job or request.
    #[error("provider rejected request: {0}")]
    Rejected(String),

    /// The config is not valid for this provider.
    #[error("invalid config for provider: {0}")]
    InvalidConfig(String),

    /// Transient network failure; safe to retry.
    #[error("connector network error: {0}")]
    Network(String),

    /// The call exceeded its deadline; safe to retry.
    #[error("connector timed out: {0}")]
    Timeout(String),

    /// Provider-side error with no more specific classification.
    #[error("provider error: {0}")]
    Provider(String),
}

impl ConnectorError {
    /// Whether retrying the same call may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout(_))
    }
}

/// Status vocabulary reported by providers for delegated jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderJobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// Capability interface for one remote compute provider.
///
/// Every method can fail; the orchestrator translates failures into its own
/// error taxonomy and never treats an unreachable connector as a no-op.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Stable connector identifier (e.g. "vastai", "together").
    fn id(&self) -> &str;

    /// Establishes a session with the provider.
    async fn connect(&self, credentials: &serde_json::Value) -> ConnectorResult<bool>;

    /// Tears down the provider session.
    async fn disconnect(&self) -> ConnectorResult<bool>;

    /// Cheap liveness probe. Callers apply their own timeout.
    async fn verify_connection(&self) -> ConnectorResult<bool>;

    /// Checks that a config is runnable on this provider.
    async fn validate_config(&self, config: &TrainingConfig) -> ConnectorResult<()>;

    /// Submits a job; returns the provider's opaque job identifier.
    async fn submit_job(&self, config: &TrainingConfig) -> ConnectorResult<String>;

    /// Reports the provider-side status of a delegated job.
    async fn get_job_status(&self, provider_job_id: &str) -> ConnectorResult<ProviderJobStatus>;

    /// Requests cancellation; returns whether the provider acknowledged it.
    async fn cancel_job(&self, provider_job_id: &str) -> ConnectorResult<bool>;

    /// Retrieves the raw bytes of the trained artifact.
    async fn fetch_artifact(&self, provider_job_id: &str) -> ConnectorResult<Vec<u8>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ConnectorError::Network("reset".to_string()).is_retryable());
        assert!(ConnectorError::Timeout("10s".to_string()).is_retryable());
        assert!(!ConnectorError::Auth("bad key".to_string()).is_retryable());
        assert!(!ConnectorError::Rejected("quota".to_string()).is_retryable());
        assert!(!ConnectorError::InvalidConfig("seq len".to_string()).is_retryable());
    }
}
