//! Restore workflow: artifacts back to verified plaintext

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info};
use vaultlift_core::{MigrationError, Result};
use vaultlift_secrets::{sanitize_error, ArtifactKind, ArtifactReader, EnvelopeEncryptor, KeyWrapper};
use vaultlift_storage::ObjectStore;

use crate::orchestrator::MigrationOrchestrator;

#[derive(Debug, Clone)]
pub struct RestoreRequest {
    /// Directory holding (or receiving) the artifact sets
    pub artifact_dir: PathBuf,
    /// Directory receiving the recovered plaintext files
    pub output_dir: PathBuf,
    /// Artifact set names to restore; empty means every set in `artifact_dir`
    pub names: Vec<String>,
    /// Replace existing plaintext files
    pub overwrite: bool,
    /// Fetch the named sets from the bucket before restoring
    pub download: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum RestoreStatus {
    Restored { bytes: u64 },
    /// Output already present and `overwrite` not set
    Skipped,
    Failed { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct RestoreOutcome {
    pub name: String,
    pub output: PathBuf,
    #[serde(flatten)]
    pub status: RestoreStatus,
}

impl RestoreOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self.status, RestoreStatus::Failed { .. })
    }
}

/// Decrypts artifact sets, optionally downloading them first
pub struct Restorer {
    encryptor: EnvelopeEncryptor,
    remote: Option<(Arc<dyn ObjectStore>, String)>,
}

impl Restorer {
    pub fn new(wrapper: Arc<dyn KeyWrapper>) -> Self {
        Self {
            encryptor: EnvelopeEncryptor::new(wrapper),
            remote: None,
        }
    }

    /// Enable downloads from `store` using the artifact layout under `prefix`
    pub fn with_store(mut self, store: Arc<dyn ObjectStore>, prefix: impl Into<String>) -> Self {
        self.remote = Some((store, prefix.into()));
        self
    }

    /// Download the three artifacts of `name` into `dir`
    pub async fn download(&self, name: &str, dir: &Path) -> Result<()> {
        let (store, prefix) = self
            .remote
            .as_ref()
            .ok_or_else(|| MigrationError::config("no object store configured for download"))?;

        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| MigrationError::io_write(dir, e))?;

        for kind in ArtifactKind::UPLOAD_ORDER {
            let key = kind.remote_key(prefix, name);
            let body = store.get(&key).await.map_err(|e| {
                MigrationError::decryption(format!("cannot download {}: {}", key, e))
            })?;
            let path = dir.join(kind.local_file_name(name));
            tokio::fs::write(&path, &body)
                .await
                .map_err(|e| MigrationError::io_write(&path, e))?;
            debug!(key = %key, path = %path.display(), bytes = body.len(), "artifact downloaded");
        }
        Ok(())
    }

    /// Restore every requested set; per-set failures are recorded, not returned
    pub async fn restore(&self, request: &RestoreRequest) -> Result<Vec<RestoreOutcome>> {
        if request.download && request.names.is_empty() {
            return Err(MigrationError::config(
                "downloading requires at least one artifact name",
            ));
        }

        let reader = ArtifactReader::new(&request.artifact_dir);
        let names = if request.names.is_empty() {
            reader.discover().await?
        } else {
            request.names.clone()
        };

        tokio::fs::create_dir_all(&request.output_dir)
            .await
            .map_err(|e| MigrationError::io_write(&request.output_dir, e))?;

        let mut outcomes = Vec::with_capacity(names.len());
        for name in names {
            let output = request.output_dir.join(&name);
            let status = match self.restore_one(&reader, request, &name, &output).await {
                Ok(status) => status,
                Err(e) => {
                    error!(name = %name, error = %e, "restore failed");
                    RestoreStatus::Failed {
                        reason: sanitize_error(&e.to_string()),
                    }
                }
            };
            outcomes.push(RestoreOutcome {
                name,
                output,
                status,
            });
        }
        Ok(outcomes)
    }

    async fn restore_one(
        &self,
        reader: &ArtifactReader,
        request: &RestoreRequest,
        name: &str,
        output: &Path,
    ) -> Result<RestoreStatus> {
        if name.contains(['/', '\\']) || name == ".." {
            return Err(MigrationError::config(format!("invalid artifact name: {}", name)));
        }
        if !request.overwrite && output.exists() {
            info!(name = %name, path = %output.display(), "output exists, skipping");
            return Ok(RestoreStatus::Skipped);
        }

        if request.download {
            self.download(name, &request.artifact_dir).await?;
        }

        let loaded = reader.read(name).await?;
        let plaintext = self
            .encryptor
            .decrypt(&loaded.ciphertext, &loaded.wrapped_dek, &loaded.metadata)
            .await?;

        tokio::fs::write(output, &plaintext)
            .await
            .map_err(|e| MigrationError::io_write(output, e))?;
        info!(name = %name, bytes = plaintext.len(), "file restored");

        Ok(RestoreStatus::Restored {
            bytes: plaintext.len() as u64,
        })
    }
}

impl MigrationOrchestrator {
    /// Restore artifact sets with the configured key wrapper
    ///
    /// With `download` set the credential secret is fetched as for a run,
    /// and released once the restore completes.
    pub async fn restore(&self, request: &RestoreRequest) -> Result<Vec<RestoreOutcome>> {
        if request.download {
            let session = self.connect().await?;
            let restorer = Restorer::new(session.wrapper.clone())
                .with_store(session.store.clone(), &self.config().storage.prefix);
            let outcomes = restorer.restore(request).await;
            session.credential.release();
            outcomes
        } else {
            let wrapper = self
                .factory()
                .key_wrapper(&self.config().key_wrapper, &self.config().vault)?;
            Restorer::new(wrapper).restore(request).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use vaultlift_secrets::{AgeKeyWrapper, ArtifactWriter};

    async fn seal(dir: &Path, wrapper: Arc<dyn KeyWrapper>, name: &str, body: &[u8]) {
        let encrypted = EnvelopeEncryptor::new(wrapper)
            .encrypt_bytes(body, name)
            .await
            .unwrap();
        ArtifactWriter::new(dir).write(name, &encrypted).await.unwrap();
    }

    fn request(artifacts: &TempDir, output: &TempDir) -> RestoreRequest {
        RestoreRequest {
            artifact_dir: artifacts.path().to_path_buf(),
            output_dir: output.path().to_path_buf(),
            names: Vec::new(),
            overwrite: false,
            download: false,
        }
    }

    #[tokio::test]
    async fn test_restores_all_discovered_sets() {
        let artifacts = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let wrapper: Arc<dyn KeyWrapper> = Arc::new(AgeKeyWrapper::generate());
        seal(artifacts.path(), wrapper.clone(), "a.csv", b"id,total\n1,10\n").await;
        seal(artifacts.path(), wrapper.clone(), "b.csv", b"").await;

        let outcomes = Restorer::new(wrapper)
            .restore(&request(&artifacts, &output))
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].status, RestoreStatus::Restored { bytes: 14 });
        assert_eq!(outcomes[1].status, RestoreStatus::Restored { bytes: 0 });
        assert_eq!(
            std::fs::read(output.path().join("a.csv")).unwrap(),
            b"id,total\n1,10\n"
        );
    }

    #[tokio::test]
    async fn test_existing_output_is_skipped_unless_overwrite() {
        let artifacts = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let wrapper: Arc<dyn KeyWrapper> = Arc::new(AgeKeyWrapper::generate());
        seal(artifacts.path(), wrapper.clone(), "a.csv", b"new").await;
        std::fs::write(output.path().join("a.csv"), b"old").unwrap();

        let restorer = Restorer::new(wrapper);
        let mut req = request(&artifacts, &output);
        let outcomes = restorer.restore(&req).await.unwrap();
        assert_eq!(outcomes[0].status, RestoreStatus::Skipped);
        assert_eq!(std::fs::read(output.path().join("a.csv")).unwrap(), b"old");

        req.overwrite = true;
        let outcomes = restorer.restore(&req).await.unwrap();
        assert_eq!(outcomes[0].status, RestoreStatus::Restored { bytes: 3 });
        assert_eq!(std::fs::read(output.path().join("a.csv")).unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_wrong_master_key_is_recorded_as_failure() {
        let artifacts = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        seal(
            artifacts.path(),
            Arc::new(AgeKeyWrapper::generate()),
            "a.csv",
            b"secret rows",
        )
        .await;

        let outcomes = Restorer::new(Arc::new(AgeKeyWrapper::generate()))
            .restore(&request(&artifacts, &output))
            .await
            .unwrap();

        assert!(outcomes[0].is_failed());
        assert!(!output.path().join("a.csv").exists());
    }

    #[tokio::test]
    async fn test_download_without_store_or_names_is_rejected() {
        let artifacts = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let mut req = request(&artifacts, &output);
        req.download = true;

        let err = Restorer::new(Arc::new(AgeKeyWrapper::generate()))
            .restore(&req)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, MigrationError::Config { .. }));
    }
}
