//! Configuration types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{MigrationError, Result};

/// Complete configuration for a migration run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MigrationConfig {
    /// Secrets store connection
    #[serde(default)]
    pub vault: VaultSettings,

    /// Destination object store
    #[serde(default)]
    pub storage: StorageSettings,

    /// Master key wrapping backend
    #[serde(default)]
    pub key_wrapper: KeyWrapperSettings,

    /// Upload retry policy
    #[serde(default = "default_upload_retry")]
    pub retry: RetryPolicy,

    /// Directory scanned for input files
    #[serde(default = "default_input_dir")]
    pub input_dir: PathBuf,

    /// File extensions picked up from `input_dir` (without the dot)
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Directory receiving the local encrypted artifacts
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Directory for the ephemeral credential file (system temp dir if unset)
    #[serde(default)]
    pub credential_dir: Option<PathBuf>,

    /// Files processed at once (1 = strictly sequential)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Exit non-zero when some files failed
    #[serde(default = "default_fail_on_partial")]
    pub fail_on_partial: bool,

    /// Remove local artifacts once all three are verified remotely
    #[serde(default)]
    pub clean_workdir: bool,

    /// Log verbosity (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            vault: VaultSettings::default(),
            storage: StorageSettings::default(),
            key_wrapper: KeyWrapperSettings::default(),
            retry: default_upload_retry(),
            input_dir: default_input_dir(),
            extensions: default_extensions(),
            work_dir: default_work_dir(),
            credential_dir: None,
            concurrency: default_concurrency(),
            fail_on_partial: default_fail_on_partial(),
            clean_workdir: false,
            log_level: default_log_level(),
        }
    }
}

impl MigrationConfig {
    /// Check invariants that defaults and overrides cannot guarantee
    pub fn validate(&self) -> Result<()> {
        if self.storage.bucket.trim().is_empty() {
            return Err(MigrationError::config("destination bucket must not be empty"));
        }
        if self.retry.max_attempts == 0 {
            return Err(MigrationError::config("retry count must be at least 1"));
        }
        if self.concurrency == 0 {
            return Err(MigrationError::config("concurrency must be at least 1"));
        }
        if self.extensions.is_empty() {
            return Err(MigrationError::config(
                "at least one input file extension is required",
            ));
        }
        if self.key_wrapper.kind == KeyWrapperKind::Transit
            && self.key_wrapper.transit_key.trim().is_empty()
        {
            return Err(MigrationError::config("transit key name must not be empty"));
        }
        Ok(())
    }

    /// Whether a file name matches one of the configured extensions
    pub fn matches_extension(&self, file_name: &str) -> bool {
        self.extensions.iter().any(|ext| {
            file_name
                .rsplit_once('.')
                .is_some_and(|(stem, e)| !stem.is_empty() && e.eq_ignore_ascii_case(ext))
        })
    }
}

fn default_input_dir() -> PathBuf {
    PathBuf::from("data")
}
fn default_extensions() -> Vec<String> {
    vec!["csv".to_string()]
}
fn default_work_dir() -> PathBuf {
    PathBuf::from("encrypted")
}
fn default_concurrency() -> usize {
    1
}
fn default_fail_on_partial() -> bool {
    true
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_upload_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        strategy: RetryStrategy::LinearBackoff,
        backoff_multiplier: 2.0,
        initial_delay_ms: 2000,
        max_delay_ms: 60_000,
    }
}

/// Vault connection settings
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct VaultSettings {
    #[serde(default = "default_vault_addr")]
    pub address: String,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub namespace: Option<String>,
    /// KV v2 API path of the credential secret
    #[serde(default = "default_secret_path")]
    pub secret_path: String,
    #[serde(default = "default_vault_timeout")]
    pub timeout_secs: u64,
}

impl VaultSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for VaultSettings {
    fn default() -> Self {
        Self {
            address: default_vault_addr(),
            token: String::new(),
            namespace: None,
            secret_path: default_secret_path(),
            timeout_secs: default_vault_timeout(),
        }
    }
}

impl fmt::Debug for VaultSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultSettings")
            .field("address", &self.address)
            .field("token", &"[REDACTED]")
            .field("namespace", &self.namespace)
            .field("secret_path", &self.secret_path)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

fn default_vault_addr() -> String {
    "http://127.0.0.1:8200".to_string()
}
fn default_secret_path() -> String {
    "secret/data/erp/gcs-service-account".to_string()
}
fn default_vault_timeout() -> u64 {
    30
}

/// Destination object store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StorageSettings {
    #[serde(default = "default_bucket")]
    pub bucket: String,
    /// Region for S3-compatible stores
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom S3-compatible endpoint, used when the secret carries none
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Prefix under which the three artifact folders are created
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            bucket: default_bucket(),
            region: default_region(),
            endpoint: None,
            prefix: default_prefix(),
        }
    }
}

fn default_bucket() -> String {
    "migration-bucket".to_string()
}
fn default_region() -> String {
    "us-east-1".to_string()
}
fn default_prefix() -> String {
    "migration/".to_string()
}

/// Which key wrapping service guards the data keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum KeyWrapperKind {
    /// Vault Transit engine (default)
    #[default]
    Transit,
    /// Local age X25519 master key
    Age,
}

impl fmt::Display for KeyWrapperKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyWrapperKind::Transit => write!(f, "transit"),
            KeyWrapperKind::Age => write!(f, "age"),
        }
    }
}

impl std::str::FromStr for KeyWrapperKind {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "transit" => Ok(KeyWrapperKind::Transit),
            "age" => Ok(KeyWrapperKind::Age),
            other => Err(MigrationError::config(format!(
                "unknown key wrapper '{}', expected 'transit' or 'age'",
                other
            ))),
        }
    }
}

/// Key wrapping backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct KeyWrapperSettings {
    #[serde(default)]
    pub kind: KeyWrapperKind,
    #[serde(default = "default_transit_mount")]
    pub transit_mount: String,
    #[serde(default = "default_transit_key")]
    pub transit_key: String,
    /// age identity file (when kind = age)
    #[serde(default)]
    pub age_key_file: Option<PathBuf>,
    /// Environment variable holding the age identity (when kind = age)
    #[serde(default)]
    pub age_key_env: Option<String>,
}

impl Default for KeyWrapperSettings {
    fn default() -> Self {
        Self {
            kind: KeyWrapperKind::default(),
            transit_mount: default_transit_mount(),
            transit_key: default_transit_key(),
            age_key_file: None,
            age_key_env: None,
        }
    }
}

fn default_transit_mount() -> String {
    "transit".to_string()
}
fn default_transit_key() -> String {
    "migration-kek".to_string()
}

/// Retry policy for an operation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Retry strategy
    #[serde(default)]
    pub strategy: RetryStrategy,

    /// Backoff multiplier for exponential strategies
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Initial delay in milliseconds
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    /// Maximum delay in milliseconds
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            strategy: RetryStrategy::default(),
            backoff_multiplier: default_backoff_multiplier(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
        }
    }
}

impl RetryPolicy {
    /// Raise `max_delay_ms` so the cap never cuts into a fixed or linear
    /// schedule; exponential backoff stays capped
    pub fn fit_cap_to_backoff(&mut self) {
        let longest_ms = match self.strategy {
            RetryStrategy::FixedDelay => self.initial_delay_ms,
            RetryStrategy::LinearBackoff => self
                .initial_delay_ms
                .saturating_mul(u64::from(self.max_attempts)),
            RetryStrategy::None | RetryStrategy::ExponentialBackoff => return,
        };
        self.max_delay_ms = self.max_delay_ms.max(longest_ms);
    }
}

fn default_max_attempts() -> u32 {
    3
}
fn default_backoff_multiplier() -> f64 {
    2.0
}
fn default_initial_delay() -> u64 {
    1000
}
fn default_max_delay() -> u64 {
    30000
}

/// Retry strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RetryStrategy {
    /// No delay between attempts
    None,

    /// Fixed delay between retries
    FixedDelay,

    /// Exponential backoff (default)
    #[default]
    ExponentialBackoff,

    /// Linear backoff
    LinearBackoff,
}

impl std::str::FromStr for RetryStrategy {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(RetryStrategy::None),
            "fixed" | "fixed-delay" => Ok(RetryStrategy::FixedDelay),
            "exponential" | "exponential-backoff" => Ok(RetryStrategy::ExponentialBackoff),
            "linear" | "linear-backoff" => Ok(RetryStrategy::LinearBackoff),
            other => Err(MigrationError::config(format!(
                "unknown retry strategy '{}'",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = MigrationConfig::default();
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.initial_delay_ms, 2000);
        assert_eq!(config.retry.strategy, RetryStrategy::LinearBackoff);
        assert_eq!(config.vault.address, "http://127.0.0.1:8200");
        assert_eq!(config.storage.prefix, "migration/");
        assert_eq!(config.concurrency, 1);
        assert!(config.fail_on_partial);
        config.validate().unwrap();
    }

    #[test]
    fn test_vault_settings_debug_redacts_token() {
        let settings = VaultSettings {
            token: "hvs.super-secret".to_string(),
            ..Default::default()
        };
        let debug = format!("{:?}", settings);
        assert!(!debug.contains("hvs.super-secret"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut config = MigrationConfig::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_bucket() {
        let mut config = MigrationConfig::default();
        config.storage.bucket = "  ".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("bucket"));
    }

    #[test]
    fn test_matches_extension() {
        let config = MigrationConfig::default();
        assert!(config.matches_extension("customers.csv"));
        assert!(config.matches_extension("ORDERS.CSV"));
        assert!(!config.matches_extension("notes.txt"));
        assert!(!config.matches_extension(".csv"));
        assert!(!config.matches_extension("csv"));
    }

    #[test]
    fn test_yaml_kebab_case() {
        let yaml = r#"
storage:
  bucket: erp-archive
key-wrapper:
  kind: age
  age-key-file: /etc/vaultlift/master.key
retry:
  max-attempts: 5
  strategy: fixed-delay
"#;
        let config: MigrationConfig = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(config.storage.bucket, "erp-archive");
        assert_eq!(config.key_wrapper.kind, KeyWrapperKind::Age);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.strategy, RetryStrategy::FixedDelay);
        assert_eq!(config.work_dir, PathBuf::from("encrypted"));
    }

    #[test]
    fn test_fit_cap_to_linear_backoff() {
        let mut policy = MigrationConfig::default().retry;
        policy.initial_delay_ms = 90_000;
        policy.max_attempts = 4;
        policy.fit_cap_to_backoff();
        assert_eq!(policy.max_delay_ms, 360_000);

        // Already wide enough
        let mut policy = MigrationConfig::default().retry;
        policy.fit_cap_to_backoff();
        assert_eq!(policy.max_delay_ms, 60_000);

        let mut policy = RetryPolicy {
            strategy: RetryStrategy::ExponentialBackoff,
            initial_delay_ms: 90_000,
            max_delay_ms: 30_000,
            ..RetryPolicy::default()
        };
        policy.fit_cap_to_backoff();
        assert_eq!(policy.max_delay_ms, 30_000);
    }

    #[test]
    fn test_parse_key_wrapper_kind() {
        assert_eq!("AGE".parse::<KeyWrapperKind>().unwrap(), KeyWrapperKind::Age);
        assert!("kms".parse::<KeyWrapperKind>().is_err());
    }
}
