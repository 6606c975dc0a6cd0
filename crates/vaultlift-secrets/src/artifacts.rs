//! Local artifact layout
//!
//! For an input file named `<name>` the writer produces, in the work
//! directory:
//!
//! | Artifact    | Local file               | Remote key                                   |
//! |-------------|--------------------------|----------------------------------------------|
//! | Ciphertext  | `<name>.enc`             | `{prefix}encrypted_files/<name>.enc`         |
//! | Wrapped key | `<name>.dek.enc.b64`     | `{prefix}encrypted_dek/<name>.dek.b64`       |
//! | Metadata    | `<name>.metadata.json`   | `{prefix}metadata/<name>.metadata.json`      |
//!
//! Files are written to a temporary sibling and renamed into place, so a
//! crashed run never leaves a truncated artifact under its final name.

use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::Serialize;
use tracing::{debug, warn};
use vaultlift_core::{MigrationError, Result};

use crate::envelope::{EncryptedFile, EncryptionMetadata};
use crate::keywrap::WrappedDek;

/// One of the three artifacts produced per input file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactKind {
    Ciphertext,
    WrappedKey,
    Metadata,
}

impl ArtifactKind {
    /// Upload order; metadata goes last so its presence implies the others
    pub const UPLOAD_ORDER: [ArtifactKind; 3] = [
        ArtifactKind::Ciphertext,
        ArtifactKind::WrappedKey,
        ArtifactKind::Metadata,
    ];

    pub fn local_file_name(self, name: &str) -> String {
        match self {
            Self::Ciphertext => format!("{}.enc", name),
            Self::WrappedKey => format!("{}.dek.enc.b64", name),
            Self::Metadata => format!("{}.metadata.json", name),
        }
    }

    /// Destination key below `prefix`; `prefix` is used verbatim
    pub fn remote_key(self, prefix: &str, name: &str) -> String {
        match self {
            Self::Ciphertext => format!("{}encrypted_files/{}.enc", prefix, name),
            Self::WrappedKey => format!("{}encrypted_dek/{}.dek.b64", prefix, name),
            Self::Metadata => format!("{}metadata/{}.metadata.json", prefix, name),
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Ciphertext => "application/octet-stream",
            Self::WrappedKey => "text/plain",
            Self::Metadata => "application/json",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Ciphertext => "ciphertext",
            Self::WrappedKey => "wrapped-key",
            Self::Metadata => "metadata",
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Paths of the three local artifacts for one input file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedArtifactSet {
    pub name: String,
    pub ciphertext: PathBuf,
    pub wrapped_key: PathBuf,
    pub metadata: PathBuf,
}

impl EncryptedArtifactSet {
    pub fn new(dir: &Path, name: &str) -> Self {
        Self {
            name: name.to_string(),
            ciphertext: dir.join(ArtifactKind::Ciphertext.local_file_name(name)),
            wrapped_key: dir.join(ArtifactKind::WrappedKey.local_file_name(name)),
            metadata: dir.join(ArtifactKind::Metadata.local_file_name(name)),
        }
    }

    pub fn path(&self, kind: ArtifactKind) -> &Path {
        match kind {
            ArtifactKind::Ciphertext => &self.ciphertext,
            ArtifactKind::WrappedKey => &self.wrapped_key,
            ArtifactKind::Metadata => &self.metadata,
        }
    }

    /// Artifacts paired with their paths, in upload order
    pub fn in_upload_order(&self) -> impl Iterator<Item = (ArtifactKind, &Path)> {
        ArtifactKind::UPLOAD_ORDER
            .into_iter()
            .map(move |kind| (kind, self.path(kind)))
    }
}

/// Writes encrypted artifacts into a work directory
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    dir: PathBuf,
}

impl ArtifactWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Write all three artifacts for `name`, replacing any from a prior run
    ///
    /// Fails with `IoWriteFailure`; artifacts already written by this call
    /// are removed again.
    pub async fn write(&self, name: &str, file: &EncryptedFile) -> Result<EncryptedArtifactSet> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| MigrationError::io_write(&self.dir, e))?;

        let set = EncryptedArtifactSet::new(&self.dir, name);
        let metadata_json = serde_json::to_vec_pretty(&file.metadata)
            .map_err(|e| MigrationError::io_write(&set.metadata, std::io::Error::from(e)))?;
        let wrapped_b64 = BASE64.encode(&file.wrapped_dek.ciphertext);

        let contents: [(&Path, &[u8]); 3] = [
            (&set.ciphertext, &file.ciphertext),
            (&set.wrapped_key, wrapped_b64.as_bytes()),
            (&set.metadata, &metadata_json),
        ];

        for (index, (path, bytes)) in contents.iter().enumerate() {
            if let Err(e) = write_atomic(path, bytes).await {
                for (written, _) in &contents[..index] {
                    let _ = tokio::fs::remove_file(written).await;
                }
                return Err(e);
            }
        }

        debug!(name, dir = %self.dir.display(), "artifacts written");
        Ok(set)
    }

    /// Remove the local artifacts of `set`; missing files are ignored
    pub async fn remove(&self, set: &EncryptedArtifactSet) {
        for (_, path) in set.in_upload_order() {
            match tokio::fs::remove_file(path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "failed to remove artifact"),
            }
        }
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    if let Err(e) = tokio::fs::write(&tmp, bytes).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(MigrationError::io_write(path, e));
    }
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(MigrationError::io_write(path, e));
    }
    Ok(())
}

/// Artifacts loaded back from disk for decryption
#[derive(Debug, Clone)]
pub struct LoadedArtifacts {
    pub ciphertext: Vec<u8>,
    pub wrapped_dek: WrappedDek,
    pub metadata: EncryptionMetadata,
}

/// Reads artifact sets written by [`ArtifactWriter`] (or downloaded from a
/// bucket into the same layout)
#[derive(Debug, Clone)]
pub struct ArtifactReader {
    dir: PathBuf,
}

impl ArtifactReader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Names of all complete artifact sets in the directory, sorted
    ///
    /// A set is complete when its metadata file is present.
    pub async fn discover(&self) -> Result<Vec<String>> {
        let suffix = ArtifactKind::Metadata.local_file_name("");
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| MigrationError::input_read(&self.dir, e))?;

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| MigrationError::input_read(&self.dir, e))?
        {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if let Some(name) = file_name.strip_suffix(&suffix) {
                if !name.is_empty() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    pub async fn read(&self, name: &str) -> Result<LoadedArtifacts> {
        let set = EncryptedArtifactSet::new(&self.dir, name);

        let ciphertext = read(&set.ciphertext).await?;
        let wrapped_b64 = read(&set.wrapped_key).await?;
        let metadata_bytes = read(&set.metadata).await?;

        let metadata: EncryptionMetadata = serde_json::from_slice(&metadata_bytes).map_err(|e| {
            MigrationError::decryption(format!(
                "invalid metadata {}: {}",
                set.metadata.display(),
                e
            ))
        })?;
        let wrapped = BASE64
            .decode(String::from_utf8_lossy(&wrapped_b64).trim())
            .map_err(|_| {
                MigrationError::decryption(format!(
                    "wrapped key {} is not valid base64",
                    set.wrapped_key.display()
                ))
            })?;

        Ok(LoadedArtifacts {
            ciphertext,
            wrapped_dek: WrappedDek {
                key_id: metadata.key_id.clone(),
                ciphertext: wrapped,
            },
            metadata,
        })
    }
}

async fn read(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .map_err(|e| MigrationError::input_read(path, e))
}
