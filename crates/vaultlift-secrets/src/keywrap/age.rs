//! age (X25519) key wrapper
//!
//! Wraps DEKs to the public key of a local age identity. Suitable for
//! environments without a Transit engine, and for tests.

use std::io::{Read, Write};
use std::path::Path;

use age::secrecy::ExposeSecret;
use async_trait::async_trait;
use vaultlift_core::config::KeyWrapperSettings;
use vaultlift_core::{MigrationError, Result};
use zeroize::Zeroizing;

use super::{KeyWrapper, WrappedDek};

/// Default environment variable holding an age secret key
pub const DEFAULT_AGE_KEY_ENV: &str = "VAULTLIFT_AGE_KEY";

pub struct AgeKeyWrapper {
    identity: age::x25519::Identity,
    recipient: String,
}

impl AgeKeyWrapper {
    pub fn new(identity: age::x25519::Identity) -> Self {
        let recipient = identity.to_public().to_string();
        Self {
            identity,
            recipient,
        }
    }

    /// A wrapper around a freshly generated identity
    pub fn generate() -> Self {
        Self::new(age::x25519::Identity::generate())
    }

    /// Load from the configured key file, falling back to the key env var
    pub fn from_settings(settings: &KeyWrapperSettings) -> Result<Self> {
        match (&settings.age_key_file, &settings.age_key_env) {
            (Some(path), _) => Self::from_key_file(path),
            (None, Some(var)) => Self::from_env(var),
            (None, None) => Self::from_env(DEFAULT_AGE_KEY_ENV),
        }
    }

    /// The file should contain an age secret key in bech32 format
    pub fn from_key_file(path: &Path) -> Result<Self> {
        let expanded_path = shellexpand::tilde(&path.to_string_lossy()).to_string();
        let key_content = Zeroizing::new(std::fs::read_to_string(&expanded_path).map_err(|e| {
            MigrationError::client_init(
                "age",
                format!("failed to read key file {}: {}", expanded_path, e),
            )
        })?);
        Self::parse(&key_content)
    }

    pub fn from_env(env_var: &str) -> Result<Self> {
        let key_content = Zeroizing::new(std::env::var(env_var).map_err(|_| {
            MigrationError::client_init("age", format!("environment variable {} not set", env_var))
        })?);
        Self::parse(&key_content)
    }

    fn parse(key_content: &str) -> Result<Self> {
        // Key files written by age-keygen carry comment lines
        let key_line = key_content
            .lines()
            .map(str::trim)
            .find(|line| line.starts_with("AGE-SECRET-KEY-"))
            .unwrap_or_else(|| key_content.trim());

        key_line
            .parse::<age::x25519::Identity>()
            .map(Self::new)
            .map_err(|e| MigrationError::client_init("age", format!("invalid age identity: {}", e)))
    }

    /// Public key (recipient) for this identity
    pub fn public_key(&self) -> &str {
        &self.recipient
    }

    fn failure(&self, reason: impl std::fmt::Display) -> MigrationError {
        MigrationError::key_wrap(&self.recipient, reason.to_string())
    }
}

#[async_trait]
impl KeyWrapper for AgeKeyWrapper {
    fn name(&self) -> &'static str {
        "age"
    }

    fn key_id(&self) -> &str {
        &self.recipient
    }

    async fn wrap(&self, plaintext_key: &[u8]) -> Result<WrappedDek> {
        let recipient = self.identity.to_public();
        let encryptor =
            age::Encryptor::with_recipients(std::iter::once(&recipient as &dyn age::Recipient))
                .map_err(|e| self.failure(format!("failed to create encryptor: {}", e)))?;

        let mut wrapped = Vec::new();
        let mut writer = encryptor
            .wrap_output(&mut wrapped)
            .map_err(|e| self.failure(format!("failed to create encryption writer: {}", e)))?;
        writer
            .write_all(plaintext_key)
            .map_err(|e| self.failure(format!("failed to write DEK: {}", e)))?;
        writer
            .finish()
            .map_err(|e| self.failure(format!("failed to finalize DEK encryption: {}", e)))?;

        Ok(WrappedDek {
            key_id: self.recipient.clone(),
            ciphertext: wrapped,
        })
    }

    async fn unwrap(&self, wrapped: &WrappedDek) -> Result<Zeroizing<Vec<u8>>> {
        let decryptor = age::Decryptor::new(&wrapped.ciphertext[..])
            .map_err(|e| self.failure(format!("failed to create decryptor: {}", e)))?;

        let mut reader = decryptor
            .decrypt(std::iter::once(&self.identity as &dyn age::Identity))
            .map_err(|e| self.failure(format!("failed to decrypt DEK: {}", e)))?;

        let mut dek = Zeroizing::new(Vec::new());
        reader
            .read_to_end(&mut dek)
            .map_err(|e| self.failure(format!("failed to read decrypted DEK: {}", e)))?;
        Ok(dek)
    }
}

/// Generate a new age identity and write its secret key to `path`
///
/// Returns the public key. Refuses to replace an existing file unless
/// `overwrite` is set.
pub fn generate_key_file(path: &Path, overwrite: bool) -> Result<String> {
    let expanded_path = shellexpand::tilde(&path.to_string_lossy()).to_string();
    let path = Path::new(&expanded_path);

    if path.exists() && !overwrite {
        return Err(MigrationError::config(format!(
            "key file already exists: {}. Use --force to overwrite",
            path.display()
        )));
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| MigrationError::io_write(parent, e))?;
    }

    let identity = age::x25519::Identity::generate();
    let public_key = identity.to_public().to_string();
    let secret_key = identity.to_string();

    std::fs::write(path, secret_key.expose_secret()).map_err(|e| MigrationError::io_write(path, e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .map_err(|e| MigrationError::io_write(path, e))?;
    }

    Ok(public_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_wrap_unwrap_roundtrip() {
        let wrapper = AgeKeyWrapper::generate();
        let dek = [42u8; 32];

        let wrapped = wrapper.wrap(&dek).await.unwrap();
        assert_eq!(wrapped.key_id, wrapper.public_key());
        assert_ne!(wrapped.ciphertext, dek.to_vec());

        let unwrapped = wrapper.unwrap(&wrapped).await.unwrap();
        assert_eq!(unwrapped.as_slice(), &dek);
    }

    #[tokio::test]
    async fn test_other_identity_cannot_unwrap() {
        let owner = AgeKeyWrapper::generate();
        let stranger = AgeKeyWrapper::generate();

        let wrapped = owner.wrap(&[1u8; 32]).await.unwrap();
        let err = stranger.unwrap(&wrapped).await.unwrap_err();
        assert!(matches!(err, MigrationError::KeyWrapFailure { .. }));
    }

    #[test]
    fn test_generate_key_file_roundtrip() {
        let dir = tempdir().unwrap();
        let key_path = dir.path().join("keys/migration.key");

        let public_key = generate_key_file(&key_path, false).unwrap();
        assert!(public_key.starts_with("age1"));

        let wrapper = AgeKeyWrapper::from_key_file(&key_path).unwrap();
        assert_eq!(wrapper.public_key(), public_key);
    }

    #[test]
    fn test_generate_key_file_no_overwrite() {
        let dir = tempdir().unwrap();
        let key_path = dir.path().join("existing.key");

        generate_key_file(&key_path, false).unwrap();
        assert!(generate_key_file(&key_path, false).is_err());
        assert!(generate_key_file(&key_path, true).is_ok());
    }

    #[test]
    fn test_key_file_with_comments() {
        let dir = tempdir().unwrap();
        let key_path = dir.path().join("keygen.txt");
        let identity = age::x25519::Identity::generate();
        let content = format!(
            "# created: 2026-01-01T00:00:00Z\n# public key: {}\n{}\n",
            identity.to_public(),
            identity.to_string().expose_secret()
        );
        std::fs::write(&key_path, content).unwrap();

        let wrapper = AgeKeyWrapper::from_key_file(&key_path).unwrap();
        assert_eq!(wrapper.public_key(), identity.to_public().to_string());
    }

    #[test]
    #[serial]
    fn test_from_env() {
        let identity = age::x25519::Identity::generate();
        std::env::set_var(
            "VAULTLIFT_TEST_AGE_KEY",
            identity.to_string().expose_secret(),
        );

        let wrapper = AgeKeyWrapper::from_env("VAULTLIFT_TEST_AGE_KEY").unwrap();
        assert_eq!(wrapper.public_key(), identity.to_public().to_string());

        std::env::remove_var("VAULTLIFT_TEST_AGE_KEY");
        assert!(AgeKeyWrapper::from_env("VAULTLIFT_TEST_AGE_KEY").is_err());
    }
}
