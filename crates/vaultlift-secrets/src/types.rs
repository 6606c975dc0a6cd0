//! Secret and credential types

use std::collections::BTreeMap;
use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::Deserialize;
use serde_json::{Map, Value};
use vaultlift_core::{MigrationError, Result};

use crate::security::SecureString;

pub const ACCESS_KEY_FIELD: &str = "minio_access_key";
pub const SECRET_KEY_FIELD: &str = "minio_secret_key";
pub const ENDPOINT_FIELD: &str = "minio_endpoint";
pub const REGION_FIELD: &str = "minio_region";
pub const SESSION_TOKEN_FIELD: &str = "minio_session_token";
pub const SERVICE_ACCOUNT_FIELD: &str = "gcp_service_account_json";

/// A secret document as returned by the secrets store: a mapping of field
/// name to arbitrary JSON value
///
/// `Debug` prints field names only.
#[derive(Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct Secret(BTreeMap<String, Value>);

impl Secret {
    pub fn new(fields: BTreeMap<String, Value>) -> Self {
        Self(fields)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Field names, sorted
    pub fn keys(&self) -> Vec<String> {
        self.0.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Value)> for Secret {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secret").field("keys", &self.keys()).finish()
    }
}

/// Static access-key credentials for an S3-compatible store
#[derive(Clone, Debug)]
pub struct ObjectStoreKeys {
    pub access_key_id: String,
    pub secret_access_key: SecureString,
    pub session_token: Option<SecureString>,
    pub endpoint: Option<String>,
    pub region: Option<String>,
}

/// The recognized credential a secret carries
#[derive(Clone)]
pub enum CredentialPayload {
    /// Access key pair for an S3-compatible store; never written to disk
    ObjectStoreKeys(ObjectStoreKeys),

    /// Cloud service-account document, normalized to a JSON object
    ServiceIdentity(Map<String, Value>),
}

impl fmt::Debug for CredentialPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ObjectStoreKeys(keys) => f
                .debug_struct("ObjectStoreKeys")
                .field("access_key_id", &keys.access_key_id)
                .field("endpoint", &keys.endpoint)
                .finish_non_exhaustive(),
            Self::ServiceIdentity(doc) => f
                .debug_struct("ServiceIdentity")
                .field("fields", &doc.keys().collect::<Vec<_>>())
                .finish(),
        }
    }
}

impl CredentialPayload {
    /// Classify a secret into exactly one credential variant
    ///
    /// The keys variant requires both `minio_access_key` and
    /// `minio_secret_key`; the identity variant requires
    /// `gcp_service_account_json`. A secret matching neither or both
    /// variants is rejected, and the error names only the keys present.
    pub fn from_secret(secret: &Secret) -> Result<Self> {
        let has_keys = secret.contains(ACCESS_KEY_FIELD) && secret.contains(SECRET_KEY_FIELD);
        let has_identity = secret.contains(SERVICE_ACCOUNT_FIELD);

        match (has_keys, has_identity) {
            (true, false) => Ok(Self::ObjectStoreKeys(ObjectStoreKeys {
                access_key_id: required_string(secret, ACCESS_KEY_FIELD)?,
                secret_access_key: SecureString::new(required_string(secret, SECRET_KEY_FIELD)?),
                session_token: optional_string(secret, SESSION_TOKEN_FIELD)?.map(SecureString::new),
                endpoint: optional_string(secret, ENDPOINT_FIELD)?,
                region: optional_string(secret, REGION_FIELD)?,
            })),
            (false, true) => {
                let value = secret.get(SERVICE_ACCOUNT_FIELD).unwrap_or(&Value::Null);
                Ok(Self::ServiceIdentity(normalize_service_account(value)?))
            }
            _ => Err(MigrationError::UnrecognizedSecretShape {
                keys: secret.keys(),
            }),
        }
    }

    /// Short variant name for logs and summaries
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ObjectStoreKeys(_) => "object-store-keys",
            Self::ServiceIdentity(_) => "service-identity",
        }
    }
}

fn required_string(secret: &Secret, field: &str) -> Result<String> {
    match secret.get(field) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Some(Value::String(_)) => Err(MigrationError::malformed_credential(format!(
            "field '{}' is empty",
            field
        ))),
        Some(_) => Err(MigrationError::malformed_credential(format!(
            "field '{}' is not a string",
            field
        ))),
        None => Err(MigrationError::malformed_credential(format!(
            "field '{}' is missing",
            field
        ))),
    }
}

fn optional_string(secret: &Secret, field: &str) -> Result<Option<String>> {
    match secret.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(_) => required_string(secret, field).map(Some),
    }
}

/// Accept the service-account document as a JSON object, as JSON text, or
/// as base64-encoded JSON text
fn normalize_service_account(value: &Value) -> Result<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map.clone()),
        Value::String(text) => {
            if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(text) {
                return Ok(map);
            }
            let decoded = BASE64.decode(text.trim()).map_err(|_| {
                MigrationError::malformed_credential(format!(
                    "field '{}' is neither JSON nor base64-encoded JSON",
                    SERVICE_ACCOUNT_FIELD
                ))
            })?;
            match serde_json::from_slice::<Value>(&decoded) {
                Ok(Value::Object(map)) => Ok(map),
                _ => Err(MigrationError::malformed_credential(format!(
                    "field '{}' does not decode to a JSON object",
                    SERVICE_ACCOUNT_FIELD
                ))),
            }
        }
        _ => Err(MigrationError::malformed_credential(format!(
            "field '{}' must be a JSON object or string",
            SERVICE_ACCOUNT_FIELD
        ))),
    }
}
