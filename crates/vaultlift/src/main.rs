//! vaultlift CLI - envelope-encrypt data files and migrate them to object storage
//!
//! This is the main entry point for the vaultlift command-line interface.

mod cli;
mod commands;
mod output;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize rustls crypto provider (required for rustls 0.23+)
    // This must be done before any TLS operations
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Run(args) => commands::run::run(args, &cli).await,
        Commands::Restore(args) => commands::restore::run(args, &cli).await,
        Commands::Keygen(args) => {
            init_tracing(cli.verbose, cli.quiet, "info");
            commands::keygen::run(args)
        }
    };

    match result {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            output::error(&format!("{:#}", e));
            ExitCode::from(1)
        }
    }
}

/// Initialize tracing with appropriate verbosity
///
/// `-q` and `-v` win over the configured level.
pub(crate) fn init_tracing(verbose: u8, quiet: bool, configured: &str) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::try_new(configured).unwrap_or_else(|_| EnvFilter::new("info")),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}
