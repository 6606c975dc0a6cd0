//! Verified upload pipeline
//!
//! Each artifact upload is a retried unit: an attempt writes the object and
//! reads its properties back, and only a matching digest (or size, for
//! stores without digests) counts as success. Attempts are separated by the
//! retry policy's backoff, and a cancelled token interrupts the wait.

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use vaultlift_core::retry::{ClosurePredicate, RetryError, RetryExecutorBuilder, TracingObserver};
use vaultlift_core::{MigrationError, Result, RetryPolicy};
use vaultlift_secrets::{sanitize_error, ArtifactKind};

use crate::backend::{ObjectStore, StoreError};
use crate::checksum::ContentDigest;
use crate::types::{UploadOutcome, UploadState, UploadStatus, VerificationMode};

pub struct UploadPipeline {
    store: Arc<dyn ObjectStore>,
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl UploadPipeline {
    pub fn new(store: Arc<dyn ObjectStore>, policy: RetryPolicy) -> Self {
        Self {
            store,
            policy,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    fn executor(
        &self,
        operation: String,
    ) -> vaultlift_core::retry::RetryExecutor<
        ClosurePredicate<fn(&StoreError) -> bool>,
        TracingObserver,
    > {
        RetryExecutorBuilder::new()
            .with_policy(self.policy.clone())
            .with_predicate(ClosurePredicate::new(
                StoreError::is_transient as fn(&StoreError) -> bool,
            ))
            .with_observer(TracingObserver::new(operation))
            .with_cancellation(self.cancel.clone())
            .build()
    }

    /// Make sure the destination container exists, creating it if needed
    ///
    /// The existence check is retried on transient errors. Fails with
    /// `ContainerProvisioningFailure`, or `Cancelled`.
    pub async fn ensure_container(&self) -> Result<()> {
        let container = self.store.container().to_string();
        let store = &self.store;

        let exists = self
            .executor(format!("check container {}", container))
            .execute(|| async move { store.container_exists().await })
            .await
            .map_err(|e| container_error(&container, e))?;

        if exists {
            info!(container = %container, store = self.store.kind(), "container exists");
            return Ok(());
        }

        info!(container = %container, store = self.store.kind(), "container missing, creating");
        self.store
            .create_container()
            .await
            .map_err(|e| MigrationError::container(&container, sanitize_error(&e.to_string())))?;
        info!(container = %container, "container created");
        Ok(())
    }

    /// Upload the file at `local_path` to `key` and verify it
    ///
    /// Never fails; the outcome records the number of attempts, the final
    /// status, how the upload was verified and the last error seen.
    pub async fn upload_verified(
        &self,
        artifact: ArtifactKind,
        local_path: &Path,
        key: &str,
    ) -> UploadOutcome {
        let transitions = Mutex::new(vec![UploadState::Pending]);
        let attempts = AtomicU32::new(0);

        let mut outcome = UploadOutcome {
            artifact,
            local_path: local_path.to_path_buf(),
            destination_key: key.to_string(),
            attempts: 0,
            status: UploadStatus::Failed,
            verification: VerificationMode::NotVerified,
            local_digest: None,
            last_error: None,
            transitions: Vec::new(),
        };

        let body = match tokio::fs::read(local_path).await {
            Ok(body) => body,
            Err(e) => {
                let err = StoreError::LocalRead {
                    path: local_path.display().to_string(),
                    source: e,
                };
                warn!(key, error = %err, "upload not attempted");
                outcome.last_error = Some(err.to_string());
                outcome.transitions = vec![UploadState::Pending, UploadState::Failed];
                return outcome;
            }
        };
        let digest = ContentDigest::of(&body);
        outcome.local_digest = Some(digest.sha256_b64.clone());

        let result = {
            let store = &self.store;
            let body = &body;
            let digest = &digest;
            let transitions = &transitions;
            let attempts = &attempts;
            self.executor(format!("upload {}", key))
                .execute(|| async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    record(transitions, UploadState::Uploading);
                    store
                        .put(key, body, artifact.content_type(), &digest.sha256_b64)
                        .await?;

                    record(transitions, UploadState::Verifying);
                    let remote = store.head(key).await?.ok_or_else(|| StoreError::NotFound {
                        key: key.to_string(),
                    })?;
                    verify(key, digest, remote.size, remote.sha256_b64.as_deref())
                })
                .await
        };

        outcome.attempts = attempts.load(Ordering::SeqCst);
        match result {
            Ok(mode) => {
                record(&transitions, UploadState::Verified);
                outcome.status = UploadStatus::Verified;
                outcome.verification = mode;
                info!(
                    key,
                    attempts = outcome.attempts,
                    verification = ?mode,
                    "artifact uploaded and verified"
                );
            }
            Err(e) => {
                record(&transitions, UploadState::Failed);
                let reason = describe_retry_error(&e);
                warn!(key, attempts = outcome.attempts, error = %reason, "artifact upload failed");
                outcome.last_error = Some(reason);
            }
        }

        outcome.transitions = transitions.into_inner().unwrap_or_default();
        outcome
    }
}

fn record(transitions: &Mutex<Vec<UploadState>>, state: UploadState) {
    if let Ok(mut t) = transitions.lock() {
        t.push(state);
    }
}

/// Compare remote properties with the local digest
fn verify(
    key: &str,
    local: &ContentDigest,
    remote_size: u64,
    remote_sha256_b64: Option<&str>,
) -> std::result::Result<VerificationMode, StoreError> {
    match remote_sha256_b64 {
        Some(remote) if remote == local.sha256_b64 => Ok(VerificationMode::Digest),
        Some(remote) => Err(StoreError::Verification {
            key: key.to_string(),
            reason: format!(
                "digest mismatch: local {} remote {}",
                local.sha256_b64, remote
            ),
        }),
        None if remote_size == local.size => Ok(VerificationMode::Size),
        None => Err(StoreError::Verification {
            key: key.to_string(),
            reason: format!("size mismatch: local {} remote {}", local.size, remote_size),
        }),
    }
}

fn describe_retry_error(err: &RetryError<StoreError>) -> String {
    let message = match err {
        RetryError::Exhausted { source, .. } | RetryError::NonRetryable { source, .. } => {
            source.to_string()
        }
        RetryError::Cancelled {
            last_error: Some(source),
            ..
        } => format!("cancelled after: {}", source),
        RetryError::Cancelled { .. } => "cancelled".to_string(),
    };
    sanitize_error(&message)
}

fn container_error(container: &str, err: RetryError<StoreError>) -> MigrationError {
    if err.is_cancelled() {
        return MigrationError::Cancelled;
    }
    MigrationError::container(container, describe_retry_error(&err))
}
