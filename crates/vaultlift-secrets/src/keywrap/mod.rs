//! Key wrapping service
//!
//! A [`KeyWrapper`] encrypts a data-encryption key (DEK) under a
//! key-encryption key that never leaves the wrapping service. Two
//! implementations are provided: Vault Transit and a local age identity.

pub mod age;
pub mod transit;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use vaultlift_core::config::{KeyWrapperKind, KeyWrapperSettings, VaultSettings};
use vaultlift_core::Result;
use zeroize::Zeroizing;

pub use self::age::{generate_key_file, AgeKeyWrapper};
pub use self::transit::TransitKeyWrapper;

/// A DEK encrypted under a named key-encryption key
#[derive(Clone, PartialEq, Eq)]
pub struct WrappedDek {
    /// Identifier of the key-encryption key used
    pub key_id: String,
    /// Opaque ciphertext as produced by the wrapper
    pub ciphertext: Vec<u8>,
}

impl fmt::Debug for WrappedDek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WrappedDek")
            .field("key_id", &self.key_id)
            .field("len", &self.ciphertext.len())
            .finish()
    }
}

#[async_trait]
pub trait KeyWrapper: Send + Sync {
    /// Wrapper name recorded in metadata (`transit`, `age`)
    fn name(&self) -> &'static str;

    /// Identifier of the key-encryption key
    fn key_id(&self) -> &str;

    /// Encrypt `plaintext_key`; fails with `KeyWrapFailure`
    async fn wrap(&self, plaintext_key: &[u8]) -> Result<WrappedDek>;

    /// Recover the DEK from a wrapped key; fails with `KeyWrapFailure`
    async fn unwrap(&self, wrapped: &WrappedDek) -> Result<Zeroizing<Vec<u8>>>;
}

#[async_trait]
impl<T: KeyWrapper + ?Sized> KeyWrapper for Arc<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn key_id(&self) -> &str {
        (**self).key_id()
    }

    async fn wrap(&self, plaintext_key: &[u8]) -> Result<WrappedDek> {
        (**self).wrap(plaintext_key).await
    }

    async fn unwrap(&self, wrapped: &WrappedDek) -> Result<Zeroizing<Vec<u8>>> {
        (**self).unwrap(wrapped).await
    }
}

/// Build the configured key wrapper
pub fn build_key_wrapper(
    settings: &KeyWrapperSettings,
    vault: &VaultSettings,
) -> Result<Arc<dyn KeyWrapper>> {
    match settings.kind {
        KeyWrapperKind::Transit => Ok(Arc::new(TransitKeyWrapper::new(
            vault,
            &settings.transit_mount,
            &settings.transit_key,
        )?)),
        KeyWrapperKind::Age => Ok(Arc::new(AgeKeyWrapper::from_settings(settings)?)),
    }
}
