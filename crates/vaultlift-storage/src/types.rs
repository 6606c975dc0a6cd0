//! Upload types

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use vaultlift_core::MigrationError;
use vaultlift_secrets::ArtifactKind;

/// Properties of a stored object as reported by the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    pub size: u64,
    /// Base64 SHA-256, when the store keeps one
    pub sha256_b64: Option<String>,
}

/// Per-artifact upload state machine
///
/// `Pending -> Uploading -> Verifying -> Verified`, with `Failed` reachable
/// from `Uploading` or `Verifying`. A failed attempt that will be retried
/// goes back to `Uploading`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum UploadState {
    Pending,
    Uploading,
    Verifying,
    Verified,
    Failed,
}

impl fmt::Display for UploadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Uploading => "uploading",
            Self::Verifying => "verifying",
            Self::Verified => "verified",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum UploadStatus {
    Verified,
    Failed,
}

/// How an upload was confirmed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum VerificationMode {
    /// Remote SHA-256 equals the local one
    Digest,
    /// Store reports no digest; remote size equals the local size
    Size,
    NotVerified,
}

/// Result of uploading one artifact
#[derive(Debug, Clone, Serialize)]
pub struct UploadOutcome {
    pub artifact: ArtifactKind,
    pub local_path: PathBuf,
    pub destination_key: String,
    pub attempts: u32,
    pub status: UploadStatus,
    pub verification: VerificationMode,
    /// Base64 SHA-256 of the local file, if it could be read
    pub local_digest: Option<String>,
    pub last_error: Option<String>,
    pub transitions: Vec<UploadState>,
}

impl UploadOutcome {
    pub fn is_verified(&self) -> bool {
        self.status == UploadStatus::Verified
    }

    /// The failure as a file-scoped error, or `None` if verified
    pub fn to_error(&self) -> Option<MigrationError> {
        match self.status {
            UploadStatus::Verified => None,
            UploadStatus::Failed => Some(MigrationError::UploadVerificationFailure {
                key: self.destination_key.clone(),
                attempts: self.attempts,
                reason: self
                    .last_error
                    .clone()
                    .unwrap_or_else(|| "unknown error".to_string()),
            }),
        }
    }
}
