//! Object store capability trait

use async_trait::async_trait;
use thiserror::Error;

use crate::types::RemoteObject;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("object not found: {key}")]
    NotFound { key: String },

    #[error("{operation} is not supported by the {store} store")]
    Unsupported {
        store: &'static str,
        operation: &'static str,
    },

    #[error("{operation} failed: {message}")]
    Request {
        operation: &'static str,
        message: String,
    },

    #[error("verification of '{key}' failed: {reason}")]
    Verification { key: String, reason: String },

    #[error("failed to read {path}: {source}")]
    LocalRead {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    pub fn request(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Request {
            operation,
            message: message.into(),
        }
    }

    /// Whether another attempt could succeed
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Unsupported { .. } | Self::LocalRead { .. })
    }
}

/// Minimal set of object store operations the pipeline needs
///
/// Keys are full object names inside the container; no prefix is added.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store kind for logs (`s3`, `gcs`)
    fn kind(&self) -> &'static str;

    /// Bucket name
    fn container(&self) -> &str;

    async fn container_exists(&self) -> Result<bool, StoreError>;

    /// Create the container; "already owned by you" counts as success
    async fn create_container(&self) -> Result<(), StoreError>;

    /// Upload `body` under `key`, overwriting any existing object
    ///
    /// `sha256_b64` is the base64 SHA-256 of `body`; stores that support it
    /// check it on receipt and report it back from [`ObjectStore::head`].
    async fn put(
        &self,
        key: &str,
        body: &[u8],
        content_type: &str,
        sha256_b64: &str,
    ) -> Result<(), StoreError>;

    /// Object properties, or `None` if there is no object under `key`
    async fn head(&self, key: &str) -> Result<Option<RemoteObject>, StoreError>;

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;
}
