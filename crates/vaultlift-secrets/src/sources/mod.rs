//! Secret store trait and implementations

pub mod vault;

use async_trait::async_trait;
use vaultlift_core::Result;

use crate::types::Secret;

/// A store that secrets can be read from
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch the secret at `path`
    ///
    /// A single attempt: a missing path is `SecretNotFound`, any other
    /// failure (unreachable, auth rejected, bad response) is
    /// `SecretUnavailable`.
    async fn fetch(&self, path: &str) -> Result<Secret>;

    /// Store name for logs and error messages
    fn name(&self) -> &'static str;
}

pub use vault::VaultSecretStore;
