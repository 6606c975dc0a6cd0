//! Google Cloud Storage object store
//!
//! Authenticates with a service-account file. GCS bucket creation needs a
//! project and is not offered here: a missing bucket is reported and the
//! run stops. The store keeps no SHA-256, so uploads are verified by size.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore as RemoteStore;
use tracing::debug;
use vaultlift_core::{MigrationError, Result};

use crate::backend::{ObjectStore, StoreError};
use crate::types::RemoteObject;

pub struct GcsObjectStore {
    inner: Arc<dyn RemoteStore>,
    bucket: String,
}

impl GcsObjectStore {
    pub fn from_service_account(service_account_path: &Path, bucket: &str) -> Result<Self> {
        if bucket.trim().is_empty() {
            return Err(MigrationError::client_init("gcs", "bucket name is empty"));
        }

        let store = GoogleCloudStorageBuilder::new()
            .with_bucket_name(bucket)
            .with_service_account_path(service_account_path.to_string_lossy())
            .build()
            .map_err(|e| MigrationError::client_init("gcs", e.to_string()))?;

        Ok(Self::with_store(Arc::new(store), bucket))
    }

    /// Wrap an already-built store, e.g. `object_store::memory::InMemory`
    pub fn with_store(inner: Arc<dyn RemoteStore>, bucket: &str) -> Self {
        Self {
            inner,
            bucket: bucket.to_string(),
        }
    }
}

fn request_error(operation: &'static str, err: object_store::Error) -> StoreError {
    StoreError::request(operation, err.to_string())
}

#[async_trait]
impl ObjectStore for GcsObjectStore {
    fn kind(&self) -> &'static str {
        "gcs"
    }

    fn container(&self) -> &str {
        &self.bucket
    }

    async fn container_exists(&self) -> std::result::Result<bool, StoreError> {
        match self.inner.list_with_delimiter(None).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(request_error("list", e)),
        }
    }

    async fn create_container(&self) -> std::result::Result<(), StoreError> {
        Err(StoreError::Unsupported {
            store: "gcs",
            operation: "bucket creation",
        })
    }

    async fn put(
        &self,
        key: &str,
        body: &[u8],
        _content_type: &str,
        _sha256_b64: &str,
    ) -> std::result::Result<(), StoreError> {
        self.inner
            .put(&ObjectPath::from(key), body.to_vec().into())
            .await
            .map_err(|e| request_error("put", e))?;

        debug!(bucket = %self.bucket, key, bytes = body.len(), "object stored");
        Ok(())
    }

    async fn head(&self, key: &str) -> std::result::Result<Option<RemoteObject>, StoreError> {
        match self.inner.head(&ObjectPath::from(key)).await {
            Ok(meta) => Ok(Some(RemoteObject {
                size: meta.size as u64,
                sha256_b64: None,
            })),
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(request_error("head", e)),
        }
    }

    async fn get(&self, key: &str) -> std::result::Result<Vec<u8>, StoreError> {
        let result = self
            .inner
            .get(&ObjectPath::from(key))
            .await
            .map_err(|e| match e {
                object_store::Error::NotFound { .. } => StoreError::NotFound {
                    key: key.to_string(),
                },
                other => request_error("get", other),
            })?;

        let bytes = result.bytes().await.map_err(|e| request_error("get", e))?;
        Ok(bytes.to_vec())
    }
}
