//! In-memory fakes for the clients a migration run needs

#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use vaultlift_core::config::{KeyWrapperSettings, StorageSettings, VaultSettings};
use vaultlift_core::{MigrationError, Result};
use vaultlift_migrate::ClientFactory;
use vaultlift_secrets::{
    AgeKeyWrapper, KeyWrapper, MaterializedCredential, Secret, SecretStore, WrappedDek,
};
use vaultlift_storage::{ContentDigest, ObjectStore, RemoteObject, StoreError};
use zeroize::Zeroizing;

/// Secret store returning a fixed secret, or failing
pub struct FakeSecretStore {
    secret: Option<Secret>,
    pub fetches: AtomicU32,
}

impl FakeSecretStore {
    pub fn returning(secret: Secret) -> Self {
        Self {
            secret: Some(secret),
            fetches: AtomicU32::new(0),
        }
    }

    /// Every fetch fails as if the store were unreachable
    pub fn unavailable() -> Self {
        Self {
            secret: None,
            fetches: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl SecretStore for FakeSecretStore {
    async fn fetch(&self, _path: &str) -> Result<Secret> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.secret
            .clone()
            .ok_or_else(|| MigrationError::secret_unavailable("connection refused"))
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// Object store keeping objects in a map and recording every put
pub struct FakeObjectStore {
    bucket: String,
    exists: AtomicBool,
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    puts: Mutex<Vec<String>>,
    failing_keys: Mutex<HashSet<String>>,
    pub creates: AtomicU32,
}

impl FakeObjectStore {
    pub fn new(bucket: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            exists: AtomicBool::new(true),
            objects: Mutex::new(BTreeMap::new()),
            puts: Mutex::new(Vec::new()),
            failing_keys: Mutex::new(HashSet::new()),
            creates: AtomicU32::new(0),
        }
    }

    pub fn missing_bucket(bucket: &str) -> Self {
        let store = Self::new(bucket);
        store.exists.store(false, Ordering::SeqCst);
        store
    }

    /// Every put to `key` fails with a transient error
    pub fn fail_key(&self, key: &str) {
        self.failing_keys.lock().unwrap().insert(key.to_string());
    }

    /// Keys in the order they were successfully put
    pub fn puts(&self) -> Vec<String> {
        self.puts.lock().unwrap().clone()
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn bucket_exists(&self) -> bool {
        self.exists.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for FakeObjectStore {
    fn kind(&self) -> &'static str {
        "fake"
    }

    fn container(&self) -> &str {
        &self.bucket
    }

    async fn container_exists(&self) -> std::result::Result<bool, StoreError> {
        Ok(self.exists.load(Ordering::SeqCst))
    }

    async fn create_container(&self) -> std::result::Result<(), StoreError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.exists.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn put(
        &self,
        key: &str,
        body: &[u8],
        _content_type: &str,
        _sha256_b64: &str,
    ) -> std::result::Result<(), StoreError> {
        if self.failing_keys.lock().unwrap().contains(key) {
            return Err(StoreError::request("put", "503 Service Unavailable"));
        }
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), body.to_vec());
        self.puts.lock().unwrap().push(key.to_string());
        Ok(())
    }

    async fn head(&self, key: &str) -> std::result::Result<Option<RemoteObject>, StoreError> {
        Ok(self.objects.lock().unwrap().get(key).map(|body| {
            let digest = ContentDigest::of(body);
            RemoteObject {
                size: digest.size,
                sha256_b64: Some(digest.sha256_b64),
            }
        }))
    }

    async fn get(&self, key: &str) -> std::result::Result<Vec<u8>, StoreError> {
        self.object(key).ok_or_else(|| StoreError::NotFound {
            key: key.to_string(),
        })
    }
}

/// age-backed key wrapper whose wrap calls fail on chosen call numbers
pub struct FlakyKeyWrapper {
    inner: AgeKeyWrapper,
    failing_calls: HashSet<u32>,
    calls: AtomicU32,
}

impl FlakyKeyWrapper {
    pub fn new(inner: AgeKeyWrapper) -> Self {
        Self {
            inner,
            failing_calls: HashSet::new(),
            calls: AtomicU32::new(0),
        }
    }

    /// Make the `n`th wrap call (1-indexed) fail
    pub fn failing_on(mut self, n: u32) -> Self {
        self.failing_calls.insert(n);
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyWrapper for FlakyKeyWrapper {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn key_id(&self) -> &str {
        self.inner.key_id()
    }

    async fn wrap(&self, plaintext_key: &[u8]) -> Result<WrappedDek> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.failing_calls.contains(&n) {
            return Err(MigrationError::key_wrap(
                self.key_id(),
                "key management service unavailable",
            ));
        }
        self.inner.wrap(plaintext_key).await
    }

    async fn unwrap(&self, wrapped: &WrappedDek) -> Result<Zeroizing<Vec<u8>>> {
        self.inner.unwrap(wrapped).await
    }
}

/// age-backed key wrapper that cancels a token on its first wrap call
pub struct CancellingWrapper {
    inner: AgeKeyWrapper,
    token: CancellationToken,
}

impl CancellingWrapper {
    pub fn new(inner: AgeKeyWrapper, token: CancellationToken) -> Self {
        Self { inner, token }
    }
}

#[async_trait]
impl KeyWrapper for CancellingWrapper {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn key_id(&self) -> &str {
        self.inner.key_id()
    }

    async fn wrap(&self, plaintext_key: &[u8]) -> Result<WrappedDek> {
        self.token.cancel();
        self.inner.wrap(plaintext_key).await
    }

    async fn unwrap(&self, wrapped: &WrappedDek) -> Result<Zeroizing<Vec<u8>>> {
        self.inner.unwrap(wrapped).await
    }
}

/// What the fake factory saw when asked for an object store client
#[derive(Debug, Clone, Default)]
pub struct ObservedCredential {
    pub kind: Option<&'static str>,
    pub path: Option<PathBuf>,
    /// Whether the identity file existed while the client was being built
    pub file_existed: bool,
}

/// Client factory handing out shared fakes
pub struct FakeFactory {
    pub secrets: Arc<FakeSecretStore>,
    pub store: Arc<FakeObjectStore>,
    pub wrapper: Arc<dyn KeyWrapper>,
    pub fail_object_store: bool,
    pub observed: Mutex<ObservedCredential>,
}

impl FakeFactory {
    pub fn new(
        secrets: FakeSecretStore,
        store: Arc<FakeObjectStore>,
        wrapper: Arc<dyn KeyWrapper>,
    ) -> Self {
        Self {
            secrets: Arc::new(secrets),
            store,
            wrapper,
            fail_object_store: false,
            observed: Mutex::new(ObservedCredential::default()),
        }
    }

    pub fn failing_object_store(mut self) -> Self {
        self.fail_object_store = true;
        self
    }

    pub fn observed(&self) -> ObservedCredential {
        self.observed.lock().unwrap().clone()
    }
}

#[async_trait]
impl ClientFactory for FakeFactory {
    fn secret_store(&self, _vault: &VaultSettings) -> Result<Arc<dyn SecretStore>> {
        Ok(self.secrets.clone())
    }

    async fn object_store(
        &self,
        credential: &MaterializedCredential,
        _storage: &StorageSettings,
    ) -> Result<Arc<dyn ObjectStore>> {
        {
            let mut observed = self.observed.lock().unwrap();
            match credential {
                MaterializedCredential::ObjectStoreKeys(_) => {
                    observed.kind = Some("object-store-keys");
                }
                MaterializedCredential::ServiceIdentity { path } => {
                    observed.kind = Some("service-identity");
                    observed.path = Some(path.clone());
                    observed.file_existed = path.exists();
                }
            }
        }

        if self.fail_object_store {
            return Err(MigrationError::client_init("gcs", "invalid service account"));
        }
        Ok(self.store.clone())
    }

    fn key_wrapper(
        &self,
        _settings: &KeyWrapperSettings,
        _vault: &VaultSettings,
    ) -> Result<Arc<dyn KeyWrapper>> {
        Ok(self.wrapper.clone())
    }
}
