//! Configuration for the orchestrator.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

fn default_storage_root() -> PathBuf {
    PathBuf::from(".crucible")
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_max_poll_failures() -> u32 {
    5
}

fn default_verify_timeout_ms() -> u64 {
    10_000
}

/// Root configuration for the orchestrator.
#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorConfig {
    /// Directory under which all job-scoped state is stored.
    #[serde(default = "default_storage_root")]
    pub storage_root: PathBuf,
    /// Delay between status polls for an active job.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Consecutive retryable poll failures before a job is marked failed.
    #[serde(default = "default_max_poll_failures")]
    pub max_consecutive_poll_failures: u32,
    /// Deadline applied to connector verification probes.
    #[serde(default = "default_verify_timeout_ms")]
    pub verify_timeout_ms: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            storage_root: default_storage_root(),
            poll_interval_ms: default_poll_interval_ms(),
            max_consecutive_poll_failures: default_max_poll_failures(),
            verify_timeout_ms: default_verify_timeout_ms(),
        }
    }
}

impl OrchestratorConfig {
    /// Parses a configuration from TOML text.
    ///
    /// # Errors
    /// Returns an error if the TOML is malformed.
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[must_use]
    pub fn verify_timeout(&self) -> Duration {
        Duration::from_millis(self.verify_timeout_ms)
    }
}
