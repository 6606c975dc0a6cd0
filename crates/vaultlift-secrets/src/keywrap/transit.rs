//! Vault Transit key wrapper

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use tracing::debug;
use vaultlift_core::config::VaultSettings;
use vaultlift_core::{MigrationError, Result};
use vaultrs::client::{VaultClient, VaultClientSettingsBuilder};
use vaultrs::transit;
use zeroize::Zeroizing;

use super::{KeyWrapper, WrappedDek};
use crate::security::sanitize_error;

/// Wraps DEKs with a named Vault Transit key
///
/// The wrapped form is the Transit ciphertext string (`vault:v<n>:...`)
/// stored as bytes.
pub struct TransitKeyWrapper {
    client: VaultClient,
    mount: String,
    key: String,
    key_id: String,
}

impl TransitKeyWrapper {
    pub fn new(settings: &VaultSettings, mount: &str, key: &str) -> Result<Self> {
        let mut builder = VaultClientSettingsBuilder::default();
        builder.address(&settings.address);
        builder.token(&settings.token);
        builder.timeout(Some(settings.timeout()));
        if let Some(ns) = &settings.namespace {
            builder.namespace(Some(ns.clone()));
        }

        let client_settings = builder
            .build()
            .map_err(|e| MigrationError::client_init("vault-transit", e.to_string()))?;
        let client = VaultClient::new(client_settings)
            .map_err(|e| MigrationError::client_init("vault-transit", sanitize_error(&e.to_string())))?;

        Ok(Self {
            client,
            mount: mount.to_string(),
            key: key.to_string(),
            key_id: format!("{}/{}", mount, key),
        })
    }

    fn failure(&self, reason: impl std::fmt::Display) -> MigrationError {
        MigrationError::key_wrap(&self.key_id, sanitize_error(&reason.to_string()))
    }
}

#[async_trait]
impl KeyWrapper for TransitKeyWrapper {
    fn name(&self) -> &'static str {
        "transit"
    }

    fn key_id(&self) -> &str {
        &self.key_id
    }

    async fn wrap(&self, plaintext_key: &[u8]) -> Result<WrappedDek> {
        let encoded = Zeroizing::new(BASE64.encode(plaintext_key));
        let response =
            transit::data::encrypt(&self.client, &self.mount, &self.key, encoded.as_str(), None)
                .await
                .map_err(|e| self.failure(e))?;

        debug!(key_id = %self.key_id, "DEK wrapped with transit");
        Ok(WrappedDek {
            key_id: self.key_id.clone(),
            ciphertext: response.ciphertext.into_bytes(),
        })
    }

    async fn unwrap(&self, wrapped: &WrappedDek) -> Result<Zeroizing<Vec<u8>>> {
        let ciphertext = std::str::from_utf8(&wrapped.ciphertext)
            .map_err(|_| self.failure("wrapped key is not a transit ciphertext"))?;
        if !ciphertext.starts_with("vault:") {
            return Err(self.failure("wrapped key is not a transit ciphertext"));
        }

        let response = transit::data::decrypt(&self.client, &self.mount, &self.key, ciphertext, None)
            .await
            .map_err(|e| self.failure(e))?;

        let plaintext = Zeroizing::new(response.plaintext);
        BASE64
            .decode(plaintext.as_str())
            .map(Zeroizing::new)
            .map_err(|_| self.failure("transit returned a plaintext that is not base64"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Full Vault response envelope around `data`
    fn vault_response(data: serde_json::Value) -> serde_json::Value {
        json!({
            "request_id": "2f8e6b1c-0d3a-4c59-9a57-5d1f0e7c2b11",
            "lease_id": "",
            "renewable": false,
            "lease_duration": 0,
            "data": data,
            "wrap_info": null,
            "warnings": null,
            "auth": null
        })
    }

    fn settings(address: &str) -> VaultSettings {
        VaultSettings {
            address: address.to_string(),
            token: "hvs.transit".to_string(),
            ..VaultSettings::default()
        }
    }

    #[tokio::test]
    async fn test_wrap_posts_base64_plaintext() {
        let server = MockServer::start().await;
        let dek = [7u8; 32];
        Mock::given(method("POST"))
            .and(path("/v1/transit/encrypt/migration-kek"))
            .and(header("X-Vault-Token", "hvs.transit"))
            .and(body_partial_json(json!({ "plaintext": BASE64.encode(dek) })))
            .respond_with(ResponseTemplate::new(200).set_body_json(vault_response(json!({
                "ciphertext": "vault:v1:abcdef",
                "key_version": 1
            }))))
            .expect(1)
            .mount(&server)
            .await;

        let wrapper =
            TransitKeyWrapper::new(&settings(&server.uri()), "transit", "migration-kek").unwrap();
        let wrapped = wrapper.wrap(&dek).await.unwrap();

        assert_eq!(wrapped.key_id, "transit/migration-kek");
        assert_eq!(wrapped.ciphertext, b"vault:v1:abcdef".to_vec());
    }

    #[tokio::test]
    async fn test_unwrap_decodes_plaintext() {
        let server = MockServer::start().await;
        let dek = [9u8; 32];
        Mock::given(method("POST"))
            .and(path("/v1/transit/decrypt/migration-kek"))
            .and(body_partial_json(json!({ "ciphertext": "vault:v1:abcdef" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(vault_response(json!({
                "plaintext": BASE64.encode(dek)
            }))))
            .expect(1)
            .mount(&server)
            .await;

        let wrapper =
            TransitKeyWrapper::new(&settings(&server.uri()), "transit", "migration-kek").unwrap();
        let unwrapped = wrapper
            .unwrap(&WrappedDek {
                key_id: "transit/migration-kek".to_string(),
                ciphertext: b"vault:v1:abcdef".to_vec(),
            })
            .await
            .unwrap();

        assert_eq!(unwrapped.as_slice(), &dek);
    }

    #[tokio::test]
    async fn test_service_error_is_key_wrap_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "errors": ["sealed"] })))
            .mount(&server)
            .await;

        let wrapper =
            TransitKeyWrapper::new(&settings(&server.uri()), "transit", "migration-kek").unwrap();
        let err = wrapper.wrap(&[1u8; 32]).await.unwrap_err();

        assert!(matches!(err, MigrationError::KeyWrapFailure { ref key_id, .. } if key_id == "transit/migration-kek"));
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn test_unwrap_rejects_foreign_ciphertext() {
        let wrapper =
            TransitKeyWrapper::new(&settings("http://127.0.0.1:1"), "transit", "kek").unwrap();
        let err = wrapper
            .unwrap(&WrappedDek {
                key_id: "transit/kek".to_string(),
                ciphertext: b"age-encryption.org/v1".to_vec(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, MigrationError::KeyWrapFailure { .. }));
    }
}
