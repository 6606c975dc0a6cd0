//! Error taxonomy for the migration pipeline
//!
//! Errors fall in two groups. Run-fatal errors happen before any file is
//! processed (secret retrieval, credential materialization, client setup,
//! container provisioning) and abort the run. File-scoped errors (key
//! wrapping, local writes, upload verification) are recorded against a
//! single file and the run continues.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using [`MigrationError`]
pub type Result<T> = std::result::Result<T, MigrationError>;

/// Process exit codes
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL: i32 = 1;
    pub const SECRET_RETRIEVAL: i32 = 2;
    pub const MALFORMED_SECRET: i32 = 3;
    pub const CREDENTIAL_WRITE: i32 = 4;
    pub const CLIENT_INIT: i32 = 5;
    pub const CONTAINER_PROVISIONING: i32 = 6;
    pub const PARTIAL_FAILURE: i32 = 7;
    pub const CANCELLED: i32 = 8;
}

#[derive(Error, Debug)]
pub enum MigrationError {
    /// Secrets store unreachable, auth rejected or non-2xx response
    #[error("Secret store unavailable: {reason}")]
    SecretUnavailable { reason: String },

    /// Secret path does not exist
    #[error("Secret not found at path: {path}")]
    SecretNotFound { path: String },

    /// No (or more than one) recognized credential variant. Only key names are kept.
    #[error("Unrecognized secret shape, keys present: [{}]", keys.join(", "))]
    UnrecognizedSecretShape { keys: Vec<String> },

    #[error("Malformed credential: {reason}")]
    MalformedCredential { reason: String },

    #[error("Failed to write ephemeral credential to {path}: {source}")]
    CredentialWriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to initialize {client} client: {reason}")]
    ClientInitFailure { client: String, reason: String },

    #[error("Key wrapping failed with key '{key_id}': {reason}")]
    KeyWrapFailure { key_id: String, reason: String },

    #[error("Failed to read {path}: {source}")]
    InputReadFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Encryption failed: {reason}")]
    EncryptionFailure { reason: String },

    #[error("Failed to write {path}: {source}")]
    IoWriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to provision container '{container}': {reason}")]
    ContainerProvisioningFailure { container: String, reason: String },

    #[error("Upload of '{key}' not verified after {attempts} attempts: {reason}")]
    UploadVerificationFailure {
        key: String,
        attempts: u32,
        reason: String,
    },

    #[error("Decryption failed: {reason}")]
    DecryptionFailure { reason: String },

    #[error("Invalid configuration: {message}")]
    Config { message: String },

    #[error("Operation cancelled")]
    Cancelled,
}

impl MigrationError {
    pub fn secret_unavailable(reason: impl Into<String>) -> Self {
        Self::SecretUnavailable {
            reason: reason.into(),
        }
    }

    pub fn malformed_credential(reason: impl Into<String>) -> Self {
        Self::MalformedCredential {
            reason: reason.into(),
        }
    }

    pub fn client_init(client: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ClientInitFailure {
            client: client.into(),
            reason: reason.into(),
        }
    }

    pub fn key_wrap(key_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::KeyWrapFailure {
            key_id: key_id.into(),
            reason: reason.into(),
        }
    }

    pub fn io_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::IoWriteFailure {
            path: path.into(),
            source,
        }
    }

    pub fn input_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::InputReadFailure {
            path: path.into(),
            source,
        }
    }

    pub fn container(container: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ContainerProvisioningFailure {
            container: container.into(),
            reason: reason.into(),
        }
    }

    pub fn decryption(reason: impl Into<String>) -> Self {
        Self::DecryptionFailure {
            reason: reason.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether this error aborts the whole run rather than a single file
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::KeyWrapFailure { .. }
                | Self::InputReadFailure { .. }
                | Self::EncryptionFailure { .. }
                | Self::IoWriteFailure { .. }
                | Self::UploadVerificationFailure { .. }
                | Self::DecryptionFailure { .. }
        )
    }

    /// Exit code the process should terminate with for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::SecretUnavailable { .. } | Self::SecretNotFound { .. } => {
                exit_codes::SECRET_RETRIEVAL
            }
            Self::UnrecognizedSecretShape { .. } | Self::MalformedCredential { .. } => {
                exit_codes::MALFORMED_SECRET
            }
            Self::CredentialWriteFailure { .. } => exit_codes::CREDENTIAL_WRITE,
            Self::ClientInitFailure { .. } => exit_codes::CLIENT_INIT,
            Self::ContainerProvisioningFailure { .. } => exit_codes::CONTAINER_PROVISIONING,
            Self::Cancelled => exit_codes::CANCELLED,
            Self::KeyWrapFailure { .. }
            | Self::InputReadFailure { .. }
            | Self::EncryptionFailure { .. }
            | Self::IoWriteFailure { .. }
            | Self::UploadVerificationFailure { .. } => exit_codes::PARTIAL_FAILURE,
            Self::DecryptionFailure { .. } | Self::Config { .. } => exit_codes::GENERAL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unrecognized_shape_lists_only_keys() {
        let err = MigrationError::UnrecognizedSecretShape {
            keys: vec!["password".to_string(), "username".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("password, username"));
        assert_eq!(err.exit_code(), exit_codes::MALFORMED_SECRET);
    }

    #[test]
    fn test_fatal_classification() {
        assert!(MigrationError::secret_unavailable("connection refused").is_fatal());
        assert!(MigrationError::container("bucket", "denied").is_fatal());
        assert!(!MigrationError::key_wrap("kek", "outage").is_fatal());
        assert!(!MigrationError::io_write(
            "/tmp/x.enc",
            std::io::Error::new(std::io::ErrorKind::Other, "disk full")
        )
        .is_fatal());
    }

    #[test]
    fn test_exit_codes_are_distinct_for_fatal_errors() {
        let codes = [
            MigrationError::secret_unavailable("x").exit_code(),
            MigrationError::malformed_credential("x").exit_code(),
            MigrationError::CredentialWriteFailure {
                path: PathBuf::from("/tmp"),
                source: std::io::Error::new(std::io::ErrorKind::Other, "x"),
            }
            .exit_code(),
            MigrationError::client_init("s3", "x").exit_code(),
            MigrationError::container("b", "x").exit_code(),
        ];
        let mut unique = codes.to_vec();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), codes.len());
        assert!(codes.iter().all(|c| *c != exit_codes::SUCCESS));
    }

    #[test]
    fn test_secret_not_found_shares_retrieval_code() {
        let err = MigrationError::SecretNotFound {
            path: "secret/data/erp".to_string(),
        };
        assert_eq!(err.exit_code(), exit_codes::SECRET_RETRIEVAL);
    }
}
