//! Layered configuration loader
//!
//! Environment variable names match existing deployments (`VAULT_ADDR`,
//! `CSV_DIR`, `RETRY_COUNT`, ...); settings without an established name use
//! the `VAULTLIFT_` prefix.

use super::types::{KeyWrapperKind, MigrationConfig, RetryStrategy};
use crate::error::{MigrationError, Result};
use serde::de::DeserializeOwned;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// Configuration loader with precedence
pub struct ConfigLoader {
    /// `.env` file to load before reading the environment
    env_file: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a loader that reads `.env` from the current directory
    pub fn new() -> Self {
        Self {
            env_file: Some(PathBuf::from(".env")),
        }
    }

    /// Use a specific `.env` file, or none at all
    pub fn with_env_file(env_file: Option<PathBuf>) -> Self {
        Self { env_file }
    }

    /// Load configuration: defaults, then `config_file`, then `.env`, then environment
    pub fn load(&self, config_file: Option<&Path>) -> Result<MigrationConfig> {
        let mut config = match config_file {
            Some(path) => Self::load_yaml_file::<MigrationConfig>(path)?,
            None => MigrationConfig::default(),
        };

        if let Some(env_file) = &self.env_file {
            // Variables already set in the process take precedence over the file
            match dotenvy::from_path(env_file) {
                Ok(()) => debug!("Loaded environment file {}", env_file.display()),
                Err(e) if e.not_found() => {}
                Err(e) => {
                    return Err(MigrationError::config(format!(
                        "Failed to parse {}: {}",
                        env_file.display(),
                        e
                    )))
                }
            }
        }

        config = Self::apply_overrides(config, |key| env::var(key).ok())?;
        Ok(config)
    }

    fn load_yaml_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
        let content = fs::read_to_string(path).map_err(|e| {
            MigrationError::config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        serde_yaml_ng::from_str(&content).map_err(|e| {
            MigrationError::config(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    /// Apply overrides from a key lookup (the process environment in production)
    pub fn apply_overrides<F>(mut config: MigrationConfig, lookup: F) -> Result<MigrationConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Secrets store
        if let Some(val) = lookup("VAULT_ADDR") {
            config.vault.address = val;
        }
        if let Some(val) = lookup("VAULT_TOKEN") {
            config.vault.token = val;
        }
        if let Some(val) = lookup("VAULT_NAMESPACE") {
            config.vault.namespace = Some(val);
        }
        if let Some(val) = lookup("VAULT_SECRET_PATH") {
            config.vault.secret_path = val;
        }
        if let Some(val) = lookup("VAULT_TIMEOUT") {
            config.vault.timeout_secs = parse_number("VAULT_TIMEOUT", &val)?;
        }

        // Object store; the most specific bucket variable wins
        for key in ["MINIO_BUCKET", "GCS_BUCKET", "VAULTLIFT_BUCKET"] {
            if let Some(val) = lookup(key).filter(|v| !v.trim().is_empty()) {
                config.storage.bucket = val;
            }
        }
        if let Some(val) = lookup("MINIO_ENDPOINT") {
            config.storage.endpoint = Some(val);
        }
        if let Some(val) = lookup("VAULTLIFT_REGION") {
            config.storage.region = val;
        }
        if let Some(val) = lookup("VAULTLIFT_PREFIX") {
            config.storage.prefix = normalize_prefix(&val);
        }

        // Input and working directories
        if let Some(val) = lookup("CSV_DIR") {
            config.input_dir = PathBuf::from(val);
        }
        if let Some(val) = lookup("VAULTLIFT_EXTENSIONS") {
            config.extensions = val
                .split(',')
                .map(|e| e.trim().trim_start_matches('.').to_string())
                .filter(|e| !e.is_empty())
                .collect();
        }
        if let Some(val) = lookup("VAULTLIFT_WORK_DIR") {
            config.work_dir = PathBuf::from(val);
        }
        if let Some(val) = lookup("VAULTLIFT_CREDENTIAL_DIR") {
            config.credential_dir = Some(PathBuf::from(val));
        }

        // Key wrapping
        if let Some(val) = lookup("VAULTLIFT_KEY_WRAPPER") {
            config.key_wrapper.kind = KeyWrapperKind::from_str(&val)?;
        }
        if let Some(val) = lookup("VAULTLIFT_TRANSIT_MOUNT") {
            config.key_wrapper.transit_mount = val;
        }
        if let Some(val) = lookup("VAULTLIFT_TRANSIT_KEY") {
            config.key_wrapper.transit_key = val;
        }
        if let Some(val) = lookup("VAULTLIFT_AGE_KEY_FILE") {
            config.key_wrapper.age_key_file = Some(PathBuf::from(val));
        }
        if let Some(val) = lookup("VAULTLIFT_AGE_KEY_ENV") {
            config.key_wrapper.age_key_env = Some(val);
        }

        // Retry
        if let Some(val) = lookup("RETRY_COUNT") {
            config.retry.max_attempts = parse_number("RETRY_COUNT", &val)?;
        }
        if let Some(val) = lookup("RETRY_BACKOFF_SEC") {
            let secs: u64 = parse_number("RETRY_BACKOFF_SEC", &val)?;
            config.retry.initial_delay_ms = secs.saturating_mul(1000);
        }
        if let Some(val) = lookup("VAULTLIFT_RETRY_STRATEGY") {
            config.retry.strategy = RetryStrategy::from_str(&val)?;
        }
        config.retry.fit_cap_to_backoff();

        // Run behaviour
        if let Some(val) = lookup("VAULTLIFT_CONCURRENCY") {
            config.concurrency = parse_number("VAULTLIFT_CONCURRENCY", &val)?;
        }
        if let Some(val) = lookup("VAULTLIFT_FAIL_ON_PARTIAL") {
            config.fail_on_partial = parse_bool("VAULTLIFT_FAIL_ON_PARTIAL", &val)?;
        }
        if let Some(val) = lookup("VAULTLIFT_CLEAN_WORKDIR") {
            config.clean_workdir = parse_bool("VAULTLIFT_CLEAN_WORKDIR", &val)?;
        }
        if let Some(val) = lookup("LOG_LEVEL") {
            config.log_level = val.to_ascii_lowercase();
        }

        Ok(config)
    }
}

/// Ensure a non-empty prefix ends with exactly one slash
pub(crate) fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}/", trimmed)
    }
}

fn parse_number<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| MigrationError::config(format!("{} must be a valid number", name)))
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(MigrationError::config(format!("{} must be true or false", name))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_deployment_variable_names() {
        let config = ConfigLoader::apply_overrides(
            MigrationConfig::default(),
            lookup_from(&[
                ("VAULT_ADDR", "https://vault.internal:8200"),
                ("VAULT_SECRET_PATH", "secret/data/erp/minio"),
                ("CSV_DIR", "/srv/exports"),
                ("GCS_BUCKET", "erp-archive"),
                ("RETRY_COUNT", "5"),
                ("RETRY_BACKOFF_SEC", "4"),
                ("LOG_LEVEL", "DEBUG"),
            ]),
        )
        .unwrap();

        assert_eq!(config.vault.address, "https://vault.internal:8200");
        assert_eq!(config.vault.secret_path, "secret/data/erp/minio");
        assert_eq!(config.input_dir, PathBuf::from("/srv/exports"));
        assert_eq!(config.storage.bucket, "erp-archive");
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.initial_delay_ms, 4000);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_long_backoff_is_not_capped() {
        let config = ConfigLoader::apply_overrides(
            MigrationConfig::default(),
            lookup_from(&[("RETRY_BACKOFF_SEC", "90")]),
        )
        .unwrap();

        let first = crate::retry::calculate_delay(&config.retry, 1, false);
        let second = crate::retry::calculate_delay(&config.retry, 2, false);
        assert_eq!(first.as_secs(), 90);
        assert_eq!(second.as_secs(), 180);
    }

    #[test]
    fn test_bucket_precedence() {
        let config = ConfigLoader::apply_overrides(
            MigrationConfig::default(),
            lookup_from(&[
                ("MINIO_BUCKET", "minio-bucket"),
                ("VAULTLIFT_BUCKET", "explicit-bucket"),
            ]),
        )
        .unwrap();
        assert_eq!(config.storage.bucket, "explicit-bucket");
    }

    #[test]
    fn test_invalid_number_is_config_error() {
        let err = ConfigLoader::apply_overrides(
            MigrationConfig::default(),
            lookup_from(&[("RETRY_COUNT", "three")]),
        )
        .unwrap_err();
        assert!(matches!(err, MigrationError::Config { .. }));
        assert!(err.to_string().contains("RETRY_COUNT"));
    }

    #[test]
    fn test_key_wrapper_and_flags() {
        let config = ConfigLoader::apply_overrides(
            MigrationConfig::default(),
            lookup_from(&[
                ("VAULTLIFT_KEY_WRAPPER", "age"),
                ("VAULTLIFT_AGE_KEY_FILE", "/keys/master.key"),
                ("VAULTLIFT_FAIL_ON_PARTIAL", "no"),
                ("VAULTLIFT_CONCURRENCY", "4"),
                ("VAULTLIFT_EXTENSIONS", "csv, .tsv"),
                ("VAULTLIFT_PREFIX", "/archive/2024"),
            ]),
        )
        .unwrap();
        assert_eq!(config.key_wrapper.kind, KeyWrapperKind::Age);
        assert_eq!(
            config.key_wrapper.age_key_file,
            Some(PathBuf::from("/keys/master.key"))
        );
        assert!(!config.fail_on_partial);
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.extensions, vec!["csv", "tsv"]);
        assert_eq!(config.storage.prefix, "archive/2024/");
    }

    #[test]
    fn test_normalize_prefix() {
        assert_eq!(normalize_prefix("migration"), "migration/");
        assert_eq!(normalize_prefix("/migration//"), "migration/");
        assert_eq!(normalize_prefix(""), "");
    }

    #[test]
    #[serial]
    fn test_load_yaml_then_env_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("vaultlift.yaml");
        fs::write(
            &config_path,
            "storage:\n  bucket: from-yaml\nconcurrency: 2\n",
        )
        .unwrap();
        let env_path = temp_dir.path().join(".env");
        fs::write(&env_path, "VAULTLIFT_TRANSIT_KEY=from-dotenv\n").unwrap();

        std::env::remove_var("VAULTLIFT_TRANSIT_KEY");
        let loader = ConfigLoader::with_env_file(Some(env_path));
        let config = loader.load(Some(&config_path)).unwrap();

        assert_eq!(config.concurrency, 2);
        assert_eq!(config.key_wrapper.transit_key, "from-dotenv");

        std::env::remove_var("VAULTLIFT_TRANSIT_KEY");
    }

    #[test]
    #[serial]
    fn test_missing_env_file_is_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let loader = ConfigLoader::with_env_file(Some(temp_dir.path().join("absent.env")));
        assert!(loader.load(None).is_ok());
    }

    #[test]
    fn test_missing_config_file_is_error() {
        let loader = ConfigLoader::with_env_file(None);
        let err = loader
            .load(Some(Path::new("/nonexistent/vaultlift.yaml")))
            .unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }
}
