//! Ephemeral credential materialization
//!
//! A service-identity credential is written to a private temporary file for
//! the lifetime of an [`EphemeralCredential`]. The file is removed when the
//! handle is released or dropped, including when a panic unwinds through the
//! caller. Only `std::process::exit` skips the removal. Access key pairs stay
//! in memory and never touch the filesystem.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use vaultlift_core::{MigrationError, Result};

use crate::types::{CredentialPayload, ObjectStoreKeys};

const IDENTITY_FILE_PREFIX: &str = "vaultlift-identity-";

/// Materialized form of a credential, ready to hand to a client factory
#[derive(Debug)]
pub enum MaterializedCredential {
    ObjectStoreKeys(ObjectStoreKeys),
    ServiceIdentity { path: PathBuf },
}

/// Scoped handle over a materialized credential
///
/// Releasing (explicitly or by drop) deletes the backing file if there is
/// one. Release is idempotent; a failed deletion is logged, never raised.
#[derive(Debug)]
pub struct EphemeralCredential {
    credential: MaterializedCredential,
    released: bool,
}

impl EphemeralCredential {
    pub fn credential(&self) -> &MaterializedCredential {
        &self.credential
    }

    /// Path of the backing file, if this credential has one
    pub fn path(&self) -> Option<&Path> {
        match &self.credential {
            MaterializedCredential::ServiceIdentity { path } => Some(path),
            MaterializedCredential::ObjectStoreKeys(_) => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match &self.credential {
            MaterializedCredential::ObjectStoreKeys(_) => "object-store-keys",
            MaterializedCredential::ServiceIdentity { .. } => "service-identity",
        }
    }

    /// Delete the backing file now
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        if let MaterializedCredential::ServiceIdentity { path } = &self.credential {
            match fs::remove_file(path) {
                Ok(()) => debug!(path = %path.display(), "ephemeral credential removed"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to remove ephemeral credential file"
                ),
            }
        }
    }
}

impl Drop for EphemeralCredential {
    fn drop(&mut self) {
        self.release_inner();
    }
}

/// Turns a classified credential into an [`EphemeralCredential`]
#[derive(Debug, Clone)]
pub struct CredentialMaterializer {
    dir: PathBuf,
}

impl Default for CredentialMaterializer {
    fn default() -> Self {
        Self::new(std::env::temp_dir())
    }
}

impl CredentialMaterializer {
    /// Materialize identity files under `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn materialize(&self, payload: CredentialPayload) -> Result<EphemeralCredential> {
        let credential = match payload {
            CredentialPayload::ObjectStoreKeys(keys) => {
                debug!("object store keys kept in memory");
                MaterializedCredential::ObjectStoreKeys(keys)
            }
            CredentialPayload::ServiceIdentity(document) => {
                let body = serde_json::to_vec(&document)
                    .map_err(|e| self.write_failure(std::io::Error::from(e)))?;
                let path = self.write_private_file(&body)?;
                info!(path = %path.display(), "service identity materialized");
                MaterializedCredential::ServiceIdentity { path }
            }
        };

        Ok(EphemeralCredential {
            credential,
            released: false,
        })
    }

    /// Write `body` to a fresh file readable only by the current user
    ///
    /// Until the file is kept, the temp-file guard deletes it on any error.
    fn write_private_file(&self, body: &[u8]) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir).map_err(|e| self.write_failure(e))?;

        let mut file = tempfile::Builder::new()
            .prefix(IDENTITY_FILE_PREFIX)
            .suffix(".json")
            .tempfile_in(&self.dir)
            .map_err(|e| self.write_failure(e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(file.path(), fs::Permissions::from_mode(0o600))
                .map_err(|e| self.write_failure(e))?;
        }

        file.write_all(body).map_err(|e| self.write_failure(e))?;
        file.as_file().sync_all().map_err(|e| self.write_failure(e))?;

        let (_, path) = file.keep().map_err(|e| MigrationError::CredentialWriteFailure {
            path: e.file.path().to_path_buf(),
            source: e.error,
        })?;
        Ok(path)
    }

    fn write_failure(&self, source: std::io::Error) -> MigrationError {
        MigrationError::CredentialWriteFailure {
            path: self.dir.clone(),
            source,
        }
    }
}
