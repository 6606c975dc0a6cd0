//! Migration orchestrator
//!
//! One run: fetch secret, classify, materialize the credential, build the
//! clients, discover input files, ensure the container exists, then process
//! the files (sequentially or with bounded concurrency). Fatal errors before
//! the first file end the run; per-file errors are recorded and the run
//! continues. The ephemeral credential is released on every path.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use vaultlift_core::{MigrationConfig, MigrationError, Result};
use vaultlift_secrets::{
    sanitize_error, ArtifactWriter, CredentialMaterializer, CredentialPayload, EnvelopeEncryptor,
    EphemeralCredential, KeyWrapper,
};
use vaultlift_storage::{ObjectStore, UploadPipeline};

use crate::factory::{ClientFactory, DefaultClientFactory};
use crate::summary::{FileOutcome, FileStatus, RunStatus, RunSummary, Stage};

/// Credential plus the clients built from it
pub(crate) struct Session {
    pub credential: EphemeralCredential,
    pub store: Arc<dyn ObjectStore>,
    pub wrapper: Arc<dyn KeyWrapper>,
}

pub struct MigrationOrchestrator {
    config: MigrationConfig,
    factory: Arc<dyn ClientFactory>,
}

impl MigrationOrchestrator {
    pub fn new(config: MigrationConfig) -> Self {
        Self::with_factory(config, Arc::new(DefaultClientFactory))
    }

    pub fn with_factory(config: MigrationConfig, factory: Arc<dyn ClientFactory>) -> Self {
        Self { config, factory }
    }

    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    pub(crate) fn factory(&self) -> &Arc<dyn ClientFactory> {
        &self.factory
    }

    /// Execute a full migration run
    ///
    /// Never fails: fatal conditions are reported through
    /// [`RunStatus::Fatal`] in the returned summary.
    pub async fn run(&self, cancel: CancellationToken) -> RunSummary {
        let started_at = Utc::now();
        let mut summary = RunSummary {
            status: RunStatus::Success,
            container: self.config.storage.bucket.clone(),
            prefix: self.config.storage.prefix.clone(),
            credential: None,
            files: Vec::new(),
            started_at,
            finished_at: started_at,
        };

        match self.run_inner(&cancel, &mut summary).await {
            Ok(()) => {
                summary.status = aggregate(&summary.files, cancel.is_cancelled());
            }
            Err(e) => {
                error!(error = %e, exit_code = e.exit_code(), "migration aborted");
                summary.status = RunStatus::fatal(&e);
            }
        }

        summary.finished_at = Utc::now();
        info!(
            status = ?summary.status,
            migrated = summary.migrated(),
            failed = summary.failed(),
            skipped = summary.skipped(),
            "migration run finished"
        );
        summary
    }

    async fn run_inner(&self, cancel: &CancellationToken, summary: &mut RunSummary) -> Result<()> {
        let session = self.connect().await?;
        summary.credential = Some(session.credential.kind().to_string());
        summary.container = session.store.container().to_string();

        // The session (and its credential file) is dropped on every return below
        let files = discover_files(&self.config).await?;
        info!(
            count = files.len(),
            dir = %self.config.input_dir.display(),
            "input files discovered"
        );

        if cancel.is_cancelled() {
            return Err(MigrationError::Cancelled);
        }

        let pipeline = UploadPipeline::new(session.store.clone(), self.config.retry.clone())
            .with_cancellation(cancel.clone());
        pipeline.ensure_container().await?;

        let encryptor = EnvelopeEncryptor::new(session.wrapper.clone());
        let writer = ArtifactWriter::new(&self.config.work_dir);
        let ctx = FileContext {
            encryptor: &encryptor,
            writer: &writer,
            pipeline: &pipeline,
            prefix: &self.config.storage.prefix,
            clean_workdir: self.config.clean_workdir,
            cancel,
        };

        let mut outcomes: Vec<FileOutcome> = stream::iter(files)
            .map(|path| ctx.process(path))
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;
        outcomes.sort_by(|a, b| a.file.cmp(&b.file));
        summary.files = outcomes;

        session.credential.release();
        Ok(())
    }

    /// Fetch and materialize the credential, then build the clients
    pub(crate) async fn connect(&self) -> Result<Session> {
        let secret_store = self.factory.secret_store(&self.config.vault)?;
        let secret = secret_store.fetch(&self.config.vault.secret_path).await?;

        let payload = CredentialPayload::from_secret(&secret)?;
        info!(variant = payload.kind(), "credential classified");

        let materializer = match &self.config.credential_dir {
            Some(dir) => CredentialMaterializer::new(dir),
            None => CredentialMaterializer::default(),
        };
        let credential = materializer.materialize(payload)?;

        let store = self
            .factory
            .object_store(credential.credential(), &self.config.storage)
            .await
            .map_err(|e| as_client_init("object-store", e))?;
        let wrapper = self
            .factory
            .key_wrapper(&self.config.key_wrapper, &self.config.vault)
            .map_err(|e| as_client_init("key-wrapper", e))?;

        info!(
            store = store.kind(),
            container = store.container(),
            key_wrapper = wrapper.name(),
            key_id = wrapper.key_id(),
            "clients initialized"
        );

        Ok(Session {
            credential,
            store,
            wrapper,
        })
    }
}

fn as_client_init(client: &str, err: MigrationError) -> MigrationError {
    match err {
        MigrationError::ClientInitFailure { .. } => err,
        other => MigrationError::client_init(client, sanitize_error(&other.to_string())),
    }
}

fn aggregate(files: &[FileOutcome], cancelled: bool) -> RunStatus {
    let skipped = files
        .iter()
        .filter(|f| f.status == FileStatus::Skipped)
        .count();
    let failed = files.iter().filter(|f| f.is_failed()).count();

    // A cancelled run that finished every file cleanly is still a success
    if cancelled && (skipped > 0 || failed > 0) {
        RunStatus::Cancelled { skipped }
    } else if failed > 0 {
        RunStatus::PartialFailure { failed }
    } else {
        RunStatus::Success
    }
}

/// Regular files in the input directory with a configured extension,
/// sorted by name
pub async fn discover_files(config: &MigrationConfig) -> Result<Vec<PathBuf>> {
    let dir = &config.input_dir;
    let mut entries = tokio::fs::read_dir(dir).await.map_err(|e| {
        MigrationError::config(format!("cannot read input directory {}: {}", dir.display(), e))
    })?;

    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| MigrationError::input_read(dir, e))?
    {
        let path = entry.path();
        let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_file && config.matches_extension(&name) {
            files.push(path);
        }
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

struct FileContext<'a> {
    encryptor: &'a EnvelopeEncryptor,
    writer: &'a ArtifactWriter,
    pipeline: &'a UploadPipeline,
    prefix: &'a str,
    clean_workdir: bool,
    cancel: &'a CancellationToken,
}

impl FileContext<'_> {
    async fn process(&self, path: PathBuf) -> FileOutcome {
        let name = file_name(&path);
        if self.cancel.is_cancelled() {
            return FileOutcome::skipped(name);
        }

        let started = Instant::now();
        let mut uploads = Vec::new();
        let status = self.migrate(&path, &name, &mut uploads).await;

        match &status {
            FileStatus::Migrated => info!(file = %name, "file migrated"),
            FileStatus::Failed { stage, reason } => {
                error!(file = %name, stage = %stage, reason = %reason, "file migration failed")
            }
            FileStatus::Skipped => {}
        }

        FileOutcome {
            file: name,
            status,
            uploads,
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }

    async fn migrate(
        &self,
        path: &Path,
        name: &str,
        uploads: &mut Vec<vaultlift_storage::UploadOutcome>,
    ) -> FileStatus {
        let encrypted = match self.encryptor.encrypt_file(path).await {
            Ok(encrypted) => encrypted,
            Err(e) => return failed(Stage::Encrypt, &e),
        };

        let set = match self.writer.write(name, &encrypted).await {
            Ok(set) => set,
            Err(e) => return failed(Stage::Write, &e),
        };
        drop(encrypted);

        for (kind, local) in set.in_upload_order() {
            let key = kind.remote_key(self.prefix, name);
            let outcome = self.pipeline.upload_verified(kind, local, &key).await;
            let error = outcome.to_error();
            uploads.push(outcome);

            // Later artifacts are not uploaded once one fails
            if let Some(e) = error {
                return failed(Stage::Upload(kind), &e);
            }
        }

        if self.clean_workdir {
            self.writer.remove(&set).await;
        }
        FileStatus::Migrated
    }
}

fn failed(stage: Stage, err: &MigrationError) -> FileStatus {
    if err.is_fatal() {
        warn!(stage = %stage, error = %err, "unexpected run-level error for a single file");
    }
    FileStatus::Failed {
        stage,
        reason: sanitize_error(&err.to_string()),
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_discover_filters_and_sorts() {
        let dir = TempDir::new().unwrap();
        for name in ["zeta.csv", "alpha.csv", "notes.txt", "Mid.CSV"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.csv")).unwrap();

        let config = MigrationConfig {
            input_dir: dir.path().to_path_buf(),
            ..MigrationConfig::default()
        };
        let files = discover_files(&config).await.unwrap();
        let names: Vec<String> = files.iter().map(|p| file_name(p)).collect();

        assert_eq!(names, vec!["Mid.CSV", "alpha.csv", "zeta.csv"]);
    }

    #[tokio::test]
    async fn test_discover_missing_dir_is_config_error() {
        let config = MigrationConfig {
            input_dir: PathBuf::from("/nonexistent/vaultlift-input"),
            ..MigrationConfig::default()
        };
        let err = discover_files(&config).await.unwrap_err();
        assert!(matches!(err, MigrationError::Config { .. }));
    }

    #[test]
    fn test_aggregate() {
        let migrated = FileOutcome {
            file: "a.csv".to_string(),
            status: FileStatus::Migrated,
            uploads: Vec::new(),
            duration_ms: 1,
        };
        assert_eq!(aggregate(&[migrated.clone()], false), RunStatus::Success);
        assert_eq!(aggregate(&[], false), RunStatus::Success);

        let failed = FileOutcome {
            status: FileStatus::Failed {
                stage: Stage::Encrypt,
                reason: "x".to_string(),
            },
            ..migrated.clone()
        };
        assert_eq!(
            aggregate(&[migrated.clone(), failed], false),
            RunStatus::PartialFailure { failed: 1 }
        );

        let skipped = FileOutcome::skipped("c.csv");
        assert_eq!(
            aggregate(&[migrated, skipped], true),
            RunStatus::Cancelled { skipped: 1 }
        );
    }
}
