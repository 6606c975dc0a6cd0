//! S3-compatible object store (AWS S3, MinIO)
//!
//! Uses explicit static credentials from the secret; no ambient AWS
//! configuration is consulted for credentials. A custom endpoint switches
//! to path-style addressing, which MinIO requires.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    BucketLocationConstraint, ChecksumAlgorithm, ChecksumMode, CreateBucketConfiguration,
};
use aws_sdk_s3::Client;
use tracing::{debug, info};
use vaultlift_core::config::StorageSettings;
use vaultlift_core::{MigrationError, Result};
use vaultlift_secrets::ObjectStoreKeys;

use crate::backend::{ObjectStore, StoreError};
use crate::types::RemoteObject;

/// Region that takes no location constraint on bucket creation
const DEFAULT_REGION: &str = "us-east-1";

pub struct S3ObjectStore {
    client: Client,
    bucket: String,
    region: String,
}

impl S3ObjectStore {
    /// Build a client from the access key pair
    ///
    /// Endpoint and region carried by the secret take precedence over the
    /// configured ones.
    pub async fn new(keys: &ObjectStoreKeys, settings: &StorageSettings) -> Result<Self> {
        if settings.bucket.trim().is_empty() {
            return Err(MigrationError::client_init("s3", "bucket name is empty"));
        }

        let region = keys
            .region
            .clone()
            .unwrap_or_else(|| settings.region.clone());
        let endpoint = keys.endpoint.clone().or_else(|| settings.endpoint.clone());

        let credentials = Credentials::new(
            keys.access_key_id.clone(),
            keys.secret_access_key.as_str().to_string(),
            keys.session_token.as_ref().map(|t| t.as_str().to_string()),
            None,
            "vaultlift-secret",
        );

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.clone()))
            .credentials_provider(credentials)
            .load()
            .await;

        let mut s3_config_builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint_url) = endpoint.as_deref() {
            debug!("Using custom S3 endpoint: {}", endpoint_url);
            s3_config_builder = s3_config_builder
                .endpoint_url(endpoint_url)
                .force_path_style(true);
        }

        Ok(Self::from_client(
            Client::from_conf(s3_config_builder.build()),
            settings.bucket.clone(),
            region,
        ))
    }

    pub fn from_client(client: Client, bucket: String, region: String) -> Self {
        Self {
            client,
            bucket,
            region,
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }
}

fn request_error<E: std::error::Error>(operation: &'static str, err: E) -> StoreError {
    StoreError::request(operation, DisplayErrorContext(err).to_string())
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    fn kind(&self) -> &'static str {
        "s3"
    }

    fn container(&self) -> &str {
        &self.bucket
    }

    async fn container_exists(&self) -> std::result::Result<bool, StoreError> {
        match self.client.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => {
                debug!("Bucket {} is accessible", self.bucket);
                Ok(true)
            }
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_not_found() {
                    debug!("Bucket {} does not exist", self.bucket);
                    Ok(false)
                } else {
                    Err(request_error("head_bucket", service_error))
                }
            }
        }
    }

    async fn create_container(&self) -> std::result::Result<(), StoreError> {
        info!(bucket = %self.bucket, region = %self.region, "Creating bucket");

        let mut request = self.client.create_bucket().bucket(&self.bucket);
        if self.region != DEFAULT_REGION {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }

        match request.send().await {
            Ok(_) => Ok(()),
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_bucket_already_owned_by_you() {
                    debug!("Bucket {} already owned by us", self.bucket);
                    Ok(())
                } else {
                    Err(request_error("create_bucket", service_error))
                }
            }
        }
    }

    async fn put(
        &self,
        key: &str,
        body: &[u8],
        content_type: &str,
        sha256_b64: &str,
    ) -> std::result::Result<(), StoreError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body.to_vec()))
            .content_type(content_type)
            .checksum_algorithm(ChecksumAlgorithm::Sha256)
            .checksum_sha256(sha256_b64)
            .send()
            .await
            .map_err(|e| request_error("put_object", e))?;

        debug!(bucket = %self.bucket, key, bytes = body.len(), "object stored");
        Ok(())
    }

    async fn head(&self, key: &str) -> std::result::Result<Option<RemoteObject>, StoreError> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .checksum_mode(ChecksumMode::Enabled)
            .send()
            .await
        {
            Ok(resp) => Ok(Some(RemoteObject {
                size: resp.content_length().unwrap_or_default().max(0) as u64,
                sha256_b64: resp.checksum_sha256().map(str::to_string),
            })),
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_not_found() {
                    Ok(None)
                } else {
                    Err(request_error("head_object", service_error))
                }
            }
        }
    }

    async fn get(&self, key: &str) -> std::result::Result<Vec<u8>, StoreError> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let service_error = e.into_service_error();
                if service_error.is_no_such_key() {
                    StoreError::NotFound {
                        key: key.to_string(),
                    }
                } else {
                    request_error("get_object", service_error)
                }
            })?;

        let body = resp
            .body
            .collect()
            .await
            .map_err(|e| request_error("get_object", e))?;
        Ok(body.into_bytes().to_vec())
    }
}
