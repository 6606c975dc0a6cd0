//! CLI command implementations

pub mod keygen;
pub mod restore;
pub mod run;

use anyhow::{Context, Result};
use vaultlift_core::{ConfigLoader, KeyWrapperKind, MigrationConfig};

use crate::cli::{Cli, KeyWrapperArgs};

/// Load the layered configuration and start logging at its level
pub(crate) fn load_config(cli: &Cli) -> Result<MigrationConfig> {
    let loader = ConfigLoader::with_env_file(Some(cli.env_file.clone().into_std_path_buf()));
    let config = loader
        .load(cli.config.as_deref().map(|p| p.as_std_path()))
        .context("Failed to load configuration")?;
    crate::init_tracing(cli.verbose, cli.quiet, &config.log_level);
    Ok(config)
}

pub(crate) fn apply_key_args(args: &KeyWrapperArgs, config: &mut MigrationConfig) {
    if let Some(kind) = args.key_wrapper {
        config.key_wrapper.kind = kind.into();
    }
    if let Some(path) = &args.age_key_file {
        config.key_wrapper.kind = KeyWrapperKind::Age;
        config.key_wrapper.age_key_file = Some(path.clone().into_std_path_buf());
    }
    if let Some(key) = &args.transit_key {
        config.key_wrapper.transit_key = key.clone();
    }
}
