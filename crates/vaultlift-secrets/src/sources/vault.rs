//! HashiCorp Vault KV v2 secret store

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, info};
use vaultlift_core::config::VaultSettings;
use vaultlift_core::{MigrationError, Result};

use crate::security::{sanitize_error, SecureString};
use crate::sources::SecretStore;
use crate::types::Secret;

/// Reads secrets over the Vault HTTP API
///
/// `path` is the full API path below `/v1/`, e.g.
/// `secret/data/erp/gcs-service-account` for a KV v2 mount named `secret`.
pub struct VaultSecretStore {
    client: reqwest::Client,
    address: String,
    token: SecureString,
    namespace: Option<String>,
}

#[derive(Deserialize)]
struct KvResponse {
    data: Option<KvData>,
}

#[derive(Deserialize)]
struct KvData {
    data: Option<Secret>,
}

impl VaultSecretStore {
    pub fn new(settings: &VaultSettings) -> Result<Self> {
        if settings.token.is_empty() {
            return Err(MigrationError::secret_unavailable(
                "no Vault token configured (set VAULT_TOKEN)",
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(settings.timeout())
            .build()
            .map_err(|e| MigrationError::client_init("vault", sanitize_error(&e.to_string())))?;

        Ok(Self {
            client,
            address: settings.address.trim_end_matches('/').to_string(),
            token: SecureString::from(settings.token.as_str()),
            namespace: settings.namespace.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.address, path.trim_start_matches('/'))
    }

    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        let mut request = self
            .client
            .get(url)
            .header("X-Vault-Token", self.token.as_str());
        if let Some(ns) = &self.namespace {
            request = request.header("X-Vault-Namespace", ns);
        }
        request
    }

    /// Whether Vault reports itself initialized, unsealed and active
    pub async fn check_health(&self) -> Result<bool> {
        let response = self
            .client
            .get(self.url("sys/health"))
            .send()
            .await
            .map_err(|e| MigrationError::secret_unavailable(sanitize_error(&e.to_string())))?;
        Ok(response.status().is_success())
    }
}

#[async_trait]
impl SecretStore for VaultSecretStore {
    async fn fetch(&self, path: &str) -> Result<Secret> {
        let url = self.url(path);
        debug!(address = %self.address, path, "reading secret from Vault");

        let response = self.request(&url).send().await.map_err(|e| {
            MigrationError::secret_unavailable(format!(
                "request to {} failed: {}",
                self.address,
                sanitize_error(&e.to_string())
            ))
        })?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::NOT_FOUND => {
                return Err(MigrationError::SecretNotFound {
                    path: path.to_string(),
                })
            }
            StatusCode::FORBIDDEN | StatusCode::UNAUTHORIZED => {
                return Err(MigrationError::secret_unavailable(format!(
                    "Vault rejected the token for '{}' (HTTP {})",
                    path,
                    response.status().as_u16()
                )))
            }
            status => {
                return Err(MigrationError::secret_unavailable(format!(
                    "Vault returned HTTP {} for '{}'",
                    status.as_u16(),
                    path
                )))
            }
        }

        let body: KvResponse = response.json().await.map_err(|_| {
            MigrationError::secret_unavailable(format!(
                "Vault response for '{}' is not a KV v2 document",
                path
            ))
        })?;

        let secret = body.data.and_then(|d| d.data).ok_or_else(|| {
            MigrationError::secret_unavailable(format!(
                "Vault response for '{}' has no data.data field",
                path
            ))
        })?;

        info!(path, fields = secret.keys().len(), "secret retrieved");
        Ok(secret)
    }

    fn name(&self) -> &'static str {
        "vault"
    }
}
