//! Artifact download and integrity verification.

use crate::error::{OrchestratorError, OrchestratorResult};
use chrono::Utc;
use crucible_training::{
    persist_artifact, ArtifactInfo, ArtifactMetadata, Connector, JobLayout, TrainingJob,
};
use tracing::info;

/// Retrieves a delegated job's artifact and certifies its integrity.
///
/// The SHA-256 digest is computed over the exact bytes received from the
/// connector, which are also the bytes persisted to the job-scoped path.
/// Failures propagate without producing a partial `ArtifactInfo`.
#[derive(Debug, Clone)]
pub struct ArtifactVerifier {
    layout: JobLayout,
}

impl ArtifactVerifier {
    #[must_use]
    pub fn new(layout: JobLayout) -> Self {
        Self { layout }
    }

    /// Downloads the artifact for a delegated job.
    ///
    /// # Errors
    /// Returns `NotRemoteJob` if the job has no remote provider and
    /// provider job id; connector and I/O failures propagate unchanged.
    pub async fn download(
        &self,
        connector: &dyn Connector,
        job: &TrainingJob,
    ) -> OrchestratorResult<ArtifactInfo> {
        let provider = job
            .provider
            .clone()
            .filter(|_| job.is_remote())
            .ok_or_else(|| OrchestratorError::NotRemoteJob(job.job_id.to_string()))?;
        let provider_job_id = job
            .provider_job_id
            .clone()
            .ok_or_else(|| OrchestratorError::NotRemoteJob(job.job_id.to_string()))?;

        let bytes = connector.fetch_artifact(&provider_job_id).await?;

        let path = job
            .config
            .output_dir
            .clone()
            .map_or_else(|| self.layout.artifact_path(&job.job_id), |dir| dir.join("model.bin"));
        let (size_bytes, hash_sha256) = persist_artifact(&path, &bytes)?;

        info!(
            job_id = %job.job_id,
            size_bytes,
            hash = %hash_sha256,
            "Downloaded and verified artifact"
        );

        Ok(ArtifactInfo {
            job_id: job.job_id.clone(),
            path,
            size_bytes,
            hash_sha256,
            metadata: ArtifactMetadata {
                provider,
                provider_job_id,
                model_id: job.config.model_id.clone(),
                method: job.config.method.to_string(),
            },
            created_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crucible_training::{
        sha256_bytes, ConnectorError, ConnectorResult, DatasetRef, JobState, ProviderJobStatus,
        TrainingConfig, TuningMethod,
    };
    use std::path::PathBuf;
    use tempfile::TempDir;

    struct FixedArtifactConnector {
        bytes: Option<Vec<u8>>,
    }

    #[async_trait]
    impl Connector for FixedArtifactConnector {
        fn id(&self) -> &str {
            "fixture"
        }

        async fn connect(&self, _credentials: &serde_json::Value) -> ConnectorResult<bool> {
            Ok(true)
        }

        async fn disconnect(&self) -> ConnectorResult<bool> {
            Ok(true)
        }

        async fn verify_connection(&self) -> ConnectorResult<bool> {
            Ok(true)
        }

        async fn validate_config(&self, _config: &TrainingConfig) -> ConnectorResult<()> {
            Ok(())
        }

        async fn submit_job(&self, _config: &TrainingConfig) -> ConnectorResult<String> {
            Ok("remote-1".to_string())
        }

        async fn get_job_status(
            &self,
            _provider_job_id: &str,
        ) -> ConnectorResult<ProviderJobStatus> {
            Ok(ProviderJobStatus::Completed)
        }

        async fn cancel_job(&self, _provider_job_id: &str) -> ConnectorResult<bool> {
            Ok(true)
        }

        async fn fetch_artifact(&self, _provider_job_id: &str) -> ConnectorResult<Vec<u8>> {
            self.bytes
                .clone()
                .ok_or_else(|| ConnectorError::Network("connection reset".to_string()))
        }
    }

    fn remote_job() -> TrainingJob {
        let mut job = TrainingJob::new(TrainingConfig::new(
            "base".to_string(),
            DatasetRef::Jsonl { path: PathBuf::from("d.jsonl") },
            TuningMethod::Lora,
        ));
        job.provider = Some("fixture".to_string());
        job.provider_job_id = Some("remote-1".to_string());
        job.state = JobState::Completed;
        job
    }

    #[tokio::test]
    async fn test_download_hashes_fetched_bytes() {
        let temp = TempDir::new().unwrap();
        let verifier = ArtifactVerifier::new(JobLayout::for_storage_root(temp.path()));
        let data = b"adapter weights".to_vec();
        let connector = FixedArtifactConnector { bytes: Some(data.clone()) };
        let job = remote_job();

        let info = verifier.download(&connector, &job).await.unwrap();
        assert_eq!(info.size_bytes, data.len() as u64);
        assert_eq!(info.hash_sha256, sha256_bytes(&data));
        assert_eq!(info.metadata.provider, "fixture");
        assert_eq!(info.metadata.method, "lora");
        assert_eq!(std::fs::read(&info.path).unwrap(), data);
    }

    #[tokio::test]
    async fn test_download_empty_artifact_is_valid() {
        let temp = TempDir::new().unwrap();
        let verifier = ArtifactVerifier::new(JobLayout::for_storage_root(temp.path()));
        let connector = FixedArtifactConnector { bytes: Some(Vec::new()) };
        let job = remote_job();

        let info = verifier.download(&connector, &job).await.unwrap();
        assert_eq!(info.size_bytes, 0);
        assert_eq!(info.hash_sha256, sha256_bytes(b""));
    }

    #[tokio::test]
    async fn test_download_is_deterministic() {
        let temp = TempDir::new().unwrap();
        let verifier = ArtifactVerifier::new(JobLayout::for_storage_root(temp.path()));
        let connector = FixedArtifactConnector { bytes: Some(vec![7u8; 1024]) };
        let job = remote_job();

        let first = verifier.download(&connector, &job).await.unwrap();
        let second = verifier.download(&connector, &job).await.unwrap();
        assert_eq!(first.hash_sha256, second.hash_sha256);
        assert_eq!(first.size_bytes, second.size_bytes);
    }

    #[tokio::test]
    async fn test_download_requires_remote_job() {
        let temp = TempDir::new().unwrap();
        let verifier = ArtifactVerifier::new(JobLayout::for_storage_root(temp.path()));
        let connector = FixedArtifactConnector { bytes: Some(Vec::new()) };

        let mut job = remote_job();
        job.provider = Some("local".to_string());
        job.provider_job_id = None;
        let result = verifier.download(&connector, &job).await;
        assert!(matches!(result, Err(OrchestratorError::NotRemoteJob(_))));
    }

    #[tokio::test]
    async fn test_fetch_failure_produces_no_artifact() {
        let temp = TempDir::new().unwrap();
        let layout = JobLayout::for_storage_root(temp.path());
        let verifier = ArtifactVerifier::new(layout.clone());
        let connector = FixedArtifactConnector { bytes: None };
        let job = remote_job();

        let result = verifier.download(&connector, &job).await;
        assert!(result.is_err());
        assert!(!layout.artifact_path(&job.job_id).exists());
    }
}
