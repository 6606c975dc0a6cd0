//! Client construction
//!
//! The orchestrator never builds clients itself. Everything that talks to
//! the network comes from a [`ClientFactory`], so tests can substitute
//! in-memory fakes.

use std::sync::Arc;

use async_trait::async_trait;
use vaultlift_core::config::{KeyWrapperSettings, StorageSettings, VaultSettings};
use vaultlift_core::Result;
use vaultlift_secrets::{build_key_wrapper, KeyWrapper, MaterializedCredential, SecretStore, VaultSecretStore};
use vaultlift_storage::{GcsObjectStore, ObjectStore, S3ObjectStore};

#[async_trait]
pub trait ClientFactory: Send + Sync {
    fn secret_store(&self, vault: &VaultSettings) -> Result<Arc<dyn SecretStore>>;

    /// Build the object store client for a materialized credential
    async fn object_store(
        &self,
        credential: &MaterializedCredential,
        storage: &StorageSettings,
    ) -> Result<Arc<dyn ObjectStore>>;

    fn key_wrapper(
        &self,
        settings: &KeyWrapperSettings,
        vault: &VaultSettings,
    ) -> Result<Arc<dyn KeyWrapper>>;
}

/// Builds the real clients: Vault over HTTP, S3 or GCS, Transit or age
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultClientFactory;

#[async_trait]
impl ClientFactory for DefaultClientFactory {
    fn secret_store(&self, vault: &VaultSettings) -> Result<Arc<dyn SecretStore>> {
        Ok(Arc::new(VaultSecretStore::new(vault)?))
    }

    async fn object_store(
        &self,
        credential: &MaterializedCredential,
        storage: &StorageSettings,
    ) -> Result<Arc<dyn ObjectStore>> {
        match credential {
            MaterializedCredential::ObjectStoreKeys(keys) => {
                Ok(Arc::new(S3ObjectStore::new(keys, storage).await?))
            }
            MaterializedCredential::ServiceIdentity { path } => Ok(Arc::new(
                GcsObjectStore::from_service_account(path, &storage.bucket)?,
            )),
        }
    }

    fn key_wrapper(
        &self,
        settings: &KeyWrapperSettings,
        vault: &VaultSettings,
    ) -> Result<Arc<dyn KeyWrapper>> {
        build_key_wrapper(settings, vault)
    }
}
