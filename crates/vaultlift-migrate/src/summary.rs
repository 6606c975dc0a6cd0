//! Run results and exit status

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use vaultlift_core::{exit_codes, MigrationError};
use vaultlift_secrets::ArtifactKind;
use vaultlift_storage::UploadOutcome;

/// Where in the per-file pipeline a failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Encrypt,
    Write,
    Upload(ArtifactKind),
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Encrypt => f.write_str("encrypt"),
            Self::Write => f.write_str("write"),
            Self::Upload(kind) => write!(f, "upload:{}", kind),
        }
    }
}

impl Serialize for Stage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum FileStatus {
    Migrated,
    Failed { stage: Stage, reason: String },
    /// Not started because the run was cancelled
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileOutcome {
    pub file: String,
    #[serde(flatten)]
    pub status: FileStatus,
    pub uploads: Vec<UploadOutcome>,
    pub duration_ms: u64,
}

impl FileOutcome {
    pub fn skipped(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            status: FileStatus::Skipped,
            uploads: Vec::new(),
            duration_ms: 0,
        }
    }

    pub fn is_migrated(&self) -> bool {
        self.status == FileStatus::Migrated
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, FileStatus::Failed { .. })
    }
}

/// Aggregate outcome of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RunStatus {
    Success,
    PartialFailure { failed: usize },
    /// Cancelled before every file was processed
    Cancelled { skipped: usize },
    /// Aborted before any file was processed
    Fatal { error: String, exit_code: i32 },
}

impl RunStatus {
    pub fn fatal(err: &MigrationError) -> Self {
        Self::Fatal {
            error: err.to_string(),
            exit_code: err.exit_code(),
        }
    }

    /// Process exit code; a partial failure exits 0 unless `fail_on_partial`
    pub fn exit_code(&self, fail_on_partial: bool) -> i32 {
        match self {
            Self::Success => exit_codes::SUCCESS,
            Self::PartialFailure { .. } if fail_on_partial => exit_codes::PARTIAL_FAILURE,
            Self::PartialFailure { .. } => exit_codes::SUCCESS,
            Self::Cancelled { .. } => exit_codes::CANCELLED,
            Self::Fatal { exit_code, .. } => *exit_code,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub status: RunStatus,
    pub container: String,
    pub prefix: String,
    /// Credential variant used, if the secret was classified
    pub credential: Option<String>,
    pub files: Vec<FileOutcome>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    pub fn migrated(&self) -> usize {
        self.files.iter().filter(|f| f.is_migrated()).count()
    }

    pub fn failed(&self) -> usize {
        self.files.iter().filter(|f| f.is_failed()).count()
    }

    pub fn skipped(&self) -> usize {
        self.files
            .iter()
            .filter(|f| f.status == FileStatus::Skipped)
            .count()
    }

    pub fn exit_code(&self, fail_on_partial: bool) -> i32 {
        self.status.exit_code(fail_on_partial)
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub async fn write_json(&self, path: &Path) -> Result<(), MigrationError> {
        let json = self
            .to_json()
            .map_err(|e| MigrationError::io_write(path, std::io::Error::from(e)))?;
        tokio::fs::write(path, json)
            .await
            .map_err(|e| MigrationError::io_write(path, e))
    }
}
