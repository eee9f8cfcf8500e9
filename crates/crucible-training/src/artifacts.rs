//! Artifact records and content hashing.
//!
//! An `ArtifactInfo` certifies a downloaded model artifact: its job-scoped
//! path on disk, its size, and the SHA-256 digest of exactly the bytes that
//! were persisted.

use crate::error::{TrainingError, TrainingResult};
use crate::job::JobId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Provenance recorded alongside a downloaded artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub provider: String,
    pub provider_job_id: String,
    pub model_id: String,
    pub method: String,
}

/// Result of a successful artifact download.
///
/// Immutable once created; a re-download replaces the whole record so a
/// reader never observes a half-written hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactInfo {
    pub job_id: JobId,
    pub path: PathBuf,
    pub size_bytes: u64,
    /// Hex digest of the artifact bytes as downloaded.
    pub hash_sha256: String,
    pub metadata: ArtifactMetadata,
    pub created_at: DateTime<Utc>,
}

/// SHA-256 hex digest of an in-memory buffer.
#[must_use]
pub fn sha256_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// SHA-256 hex digest of a file's contents.
pub fn sha256_file(path: &Path) -> TrainingResult<String> {
    let bytes = std::fs::read(path)?;
    Ok(sha256_bytes(&bytes))
}

/// Writes artifact bytes to disk and returns `(size_bytes, hash_sha256)`.
///
/// The digest is computed over the same in-memory buffer that is written,
/// never over a re-read that could race with a partial flush. An empty
/// buffer is valid and hashes to the digest of the empty byte string.
pub fn persist_artifact(path: &Path, bytes: &[u8]) -> TrainingResult<(u64, String)> {
    let parent = path.parent().ok_or_else(|| {
        TrainingError::Artifact(format!("artifact path has no parent: {}", path.display()))
    })?;
    std::fs::create_dir_all(parent)?;

    let hash = sha256_bytes(bytes);
    // Write-then-rename so a reader never observes a partial artifact.
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok((bytes.len() as u64, hash))
}
