//! Envelope encryption of files
//!
//! Each file is encrypted with AES-256-GCM under a fresh random 256-bit
//! data-encryption key (DEK) and a fresh 96-bit nonce. The DEK is wrapped by
//! a [`KeyWrapper`] and the plaintext copy is zeroed as soon as it has been
//! wrapped. Nothing is written to disk here; see [`crate::artifacts`].

use std::path::Path;
use std::sync::Arc;

use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::Utc;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use vaultlift_core::{MigrationError, Result};
use zeroize::Zeroizing;

use crate::keywrap::{KeyWrapper, WrappedDek};

pub const ALGORITHM: &str = "AES-256-GCM";
pub const METADATA_VERSION: &str = "1.0";

/// Size of the Data Encryption Key (DEK) in bytes (256 bits)
const DEK_SIZE: usize = 32;

/// Size of the nonce in bytes (96 bits for AES-GCM)
const NONCE_SIZE: usize = 12;

/// Metadata describing one encrypted file
///
/// Carries no key material; safe to store next to the ciphertext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionMetadata {
    #[serde(default = "default_version")]
    pub version: String,
    pub algorithm: String,
    pub nonce_b64: String,
    pub plaintext_size: u64,
    pub ciphertext_size: u64,
    /// Hex SHA-256 of the plaintext
    pub plaintext_sha256: String,
    pub key_id: String,
    pub key_wrapper: String,
    pub source_file: String,
    pub created_at: String,
}

fn default_version() -> String {
    METADATA_VERSION.to_string()
}

/// In-memory result of encrypting one file
#[derive(Debug, Clone)]
pub struct EncryptedFile {
    pub ciphertext: Vec<u8>,
    pub wrapped_dek: WrappedDek,
    pub metadata: EncryptionMetadata,
}

pub struct EnvelopeEncryptor {
    wrapper: Arc<dyn KeyWrapper>,
}

impl EnvelopeEncryptor {
    pub fn new(wrapper: Arc<dyn KeyWrapper>) -> Self {
        Self { wrapper }
    }

    /// Read and encrypt the file at `path`
    ///
    /// The DEK is generated before the file is read, so it exists only for
    /// the duration of this call. Fails with `InputReadFailure` or
    /// `KeyWrapFailure`.
    pub async fn encrypt_file(&self, path: &Path) -> Result<EncryptedFile> {
        let dek = generate_dek();

        let plaintext = tokio::fs::read(path)
            .await
            .map_err(|e| MigrationError::input_read(path, e))?;

        let source_file = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        self.seal(dek, &plaintext, &source_file).await
    }

    /// Encrypt an in-memory buffer recorded under `source_file`
    pub async fn encrypt_bytes(&self, plaintext: &[u8], source_file: &str) -> Result<EncryptedFile> {
        self.seal(generate_dek(), plaintext, source_file).await
    }

    async fn seal(
        &self,
        dek: Zeroizing<[u8; DEK_SIZE]>,
        plaintext: &[u8],
        source_file: &str,
    ) -> Result<EncryptedFile> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);

        let ciphertext = {
            let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(dek.as_ref()));
            cipher
                .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
                .map_err(|e| MigrationError::EncryptionFailure {
                    reason: format!("{} encryption of {} failed: {}", ALGORITHM, source_file, e),
                })?
        };

        let wrapped_dek = self.wrapper.wrap(dek.as_ref()).await?;
        drop(dek);

        let metadata = EncryptionMetadata {
            version: default_version(),
            algorithm: ALGORITHM.to_string(),
            nonce_b64: BASE64.encode(nonce_bytes),
            plaintext_size: plaintext.len() as u64,
            ciphertext_size: ciphertext.len() as u64,
            plaintext_sha256: hex::encode(Sha256::digest(plaintext)),
            key_id: wrapped_dek.key_id.clone(),
            key_wrapper: self.wrapper.name().to_string(),
            source_file: source_file.to_string(),
            created_at: Utc::now().to_rfc3339(),
        };

        debug!(
            source_file,
            plaintext_size = metadata.plaintext_size,
            key_id = %metadata.key_id,
            "file encrypted"
        );

        Ok(EncryptedFile {
            ciphertext,
            wrapped_dek,
            metadata,
        })
    }

    /// Recover and verify the plaintext of an encrypted file
    ///
    /// Fails with `KeyWrapFailure` if the DEK cannot be unwrapped, and with
    /// `DecryptionFailure` on authentication failure, a malformed nonce, or
    /// a size or digest mismatch against the metadata.
    pub async fn decrypt(
        &self,
        ciphertext: &[u8],
        wrapped_dek: &WrappedDek,
        metadata: &EncryptionMetadata,
    ) -> Result<Vec<u8>> {
        if metadata.algorithm != ALGORITHM {
            return Err(MigrationError::decryption(format!(
                "unsupported algorithm: {}",
                metadata.algorithm
            )));
        }
        if ciphertext.len() as u64 != metadata.ciphertext_size {
            return Err(MigrationError::decryption(format!(
                "ciphertext size {} does not match metadata ({})",
                ciphertext.len(),
                metadata.ciphertext_size
            )));
        }
        if metadata.key_id != self.wrapper.key_id() {
            warn!(
                expected = %metadata.key_id,
                configured = %self.wrapper.key_id(),
                "metadata names a different key-encryption key"
            );
        }

        let nonce_bytes = BASE64
            .decode(&metadata.nonce_b64)
            .map_err(|_| MigrationError::decryption("nonce is not valid base64"))?;
        if nonce_bytes.len() != NONCE_SIZE {
            return Err(MigrationError::decryption(format!(
                "invalid nonce size: expected {}, got {}",
                NONCE_SIZE,
                nonce_bytes.len()
            )));
        }

        let dek = self.wrapper.unwrap(wrapped_dek).await?;
        if dek.len() != DEK_SIZE {
            return Err(MigrationError::decryption(format!(
                "unwrapped key has wrong size: expected {}, got {}",
                DEK_SIZE,
                dek.len()
            )));
        }

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&dek));
        let plaintext = cipher
            .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext)
            .map_err(|_| MigrationError::decryption("authentication failed"))?;

        if plaintext.len() as u64 != metadata.plaintext_size {
            return Err(MigrationError::decryption(format!(
                "plaintext size {} does not match metadata ({})",
                plaintext.len(),
                metadata.plaintext_size
            )));
        }
        if hex::encode(Sha256::digest(&plaintext)) != metadata.plaintext_sha256 {
            return Err(MigrationError::decryption("plaintext digest mismatch"));
        }

        Ok(plaintext)
    }
}

fn generate_dek() -> Zeroizing<[u8; DEK_SIZE]> {
    let mut dek = Zeroizing::new([0u8; DEK_SIZE]);
    OsRng.fill_bytes(dek.as_mut());
    dek
}
