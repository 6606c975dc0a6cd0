//! Configuration for migration runs
//!
//! Precedence (low to high):
//! 1. Built-in defaults
//! 2. YAML config file (optional)
//! 3. `.env` file, loaded into the environment without overriding it
//! 4. Environment variables
//! 5. CLI flags (handled by caller)

mod loader;
mod types;

pub use loader::ConfigLoader;
pub use types::{
    KeyWrapperKind, KeyWrapperSettings, MigrationConfig, RetryPolicy, RetryStrategy,
    StorageSettings, VaultSettings,
};
