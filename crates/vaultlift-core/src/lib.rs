//! # vaultlift-core
//!
//! Core library for vaultlift providing:
//! - The migration error taxonomy and process exit codes
//! - Configuration (defaults, YAML file, `.env`, environment overrides)
//! - Retry execution engine with policy-based configuration and cancellation

pub mod config;
pub mod error;
pub mod retry;

pub use config::{ConfigLoader, KeyWrapperKind, MigrationConfig, RetryPolicy, RetryStrategy};
pub use error::{exit_codes, MigrationError, Result};
