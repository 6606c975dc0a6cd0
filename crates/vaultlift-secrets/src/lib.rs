//! # vaultlift-secrets
//!
//! Secret handling for vaultlift:
//! - Retrieval of the object-store credential secret from a Vault KV store
//! - Classification and ephemeral materialization of that credential
//! - Key wrapping (Vault Transit or age) and envelope encryption of files
//! - Local artifact layout for encrypted files, wrapped keys and metadata
//!
//! Secret values are never logged. Errors name keys, paths and key ids only.

pub mod artifacts;
pub mod credential;
pub mod envelope;
pub mod keywrap;
pub mod security;
pub mod sources;
pub mod types;

pub use artifacts::{ArtifactKind, ArtifactReader, ArtifactWriter, EncryptedArtifactSet};
pub use credential::{CredentialMaterializer, EphemeralCredential, MaterializedCredential};
pub use envelope::{EncryptedFile, EncryptionMetadata, EnvelopeEncryptor};
pub use keywrap::{build_key_wrapper, AgeKeyWrapper, KeyWrapper, TransitKeyWrapper, WrappedDek};
pub use security::{sanitize_error, SecureString};
pub use sources::{SecretStore, VaultSecretStore};
pub use types::{CredentialPayload, ObjectStoreKeys, Secret};
