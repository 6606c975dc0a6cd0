//! Run command: one full migration

use std::time::Duration;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use vaultlift_core::{exit_codes, MigrationConfig};
use vaultlift_migrate::{MigrationOrchestrator, RunStatus};

use super::{apply_key_args, load_config};
use crate::cli::{Cli, RunArgs};
use crate::output;

pub async fn run(args: &RunArgs, cli: &Cli) -> Result<i32> {
    let mut config = load_config(cli)?;
    apply_args(args, &mut config);
    if let Err(e) = config.validate() {
        output::error(&e.to_string());
        return Ok(e.exit_code());
    }

    output::header("Migration");
    output::kv("Input", &config.input_dir.display().to_string());
    output::kv("Work dir", &config.work_dir.display().to_string());
    output::kv("Bucket", &config.storage.bucket);
    output::kv("Prefix", &config.storage.prefix);
    output::kv("Key wrapper", &config.key_wrapper.kind.to_string());
    println!();

    let cancel = CancellationToken::new();
    watch_for_cancellation(cancel.clone(), args.deadline_secs);

    let fail_on_partial = config.fail_on_partial;
    let summary = MigrationOrchestrator::new(config).run(cancel).await;

    output::print_run_summary(&summary);
    match &summary.status {
        RunStatus::Success => output::success("All files migrated"),
        RunStatus::PartialFailure { failed } => {
            output::warning(&format!("{} file(s) failed", failed))
        }
        RunStatus::Cancelled { skipped } => {
            output::warning(&format!("Cancelled, {} file(s) not processed", skipped))
        }
        RunStatus::Fatal { error, .. } => output::error(error),
    }

    if let Some(path) = &args.summary_json {
        summary
            .write_json(path.as_std_path())
            .await
            .with_context(|| format!("Failed to write summary to {}", path))?;
        output::info(&format!("Summary written to {}", path));
    }

    Ok(summary.exit_code(fail_on_partial))
}

fn apply_args(args: &RunArgs, config: &mut MigrationConfig) {
    if let Some(dir) = &args.input_dir {
        config.input_dir = dir.clone().into_std_path_buf();
    }
    if let Some(dir) = &args.work_dir {
        config.work_dir = dir.clone().into_std_path_buf();
    }
    if let Some(bucket) = &args.bucket {
        config.storage.bucket = bucket.clone();
    }
    if let Some(prefix) = &args.prefix {
        config.storage.prefix = prefix.clone();
    }
    if !args.extensions.is_empty() {
        config.extensions = args
            .extensions
            .iter()
            .map(|e| e.trim_start_matches('.').to_string())
            .collect();
    }
    if let Some(n) = args.concurrency {
        config.concurrency = n;
    }
    if let Some(n) = args.retries {
        config.retry.max_attempts = n;
        config.retry.fit_cap_to_backoff();
    }
    if args.clean_workdir {
        config.clean_workdir = true;
    }
    if args.allow_partial {
        config.fail_on_partial = false;
    }
    apply_key_args(&args.key, config);
}

/// Response to the n-th Ctrl-C of a run
#[derive(Debug, PartialEq, Eq)]
enum Interrupt {
    /// Stop scheduling files and let in-flight ones finish
    Cancel,
    /// Leave immediately; drop guards do not run
    ForceExit,
}

fn interrupt_action(received: u32) -> Interrupt {
    if received <= 1 {
        Interrupt::Cancel
    } else {
        Interrupt::ForceExit
    }
}

/// Cancel on Ctrl-C, or when the deadline passes
///
/// A second Ctrl-C exits at once with the cancelled exit code, which can
/// leave an ephemeral credential file behind.
fn watch_for_cancellation(token: CancellationToken, deadline_secs: Option<u64>) {
    let on_signal = token.clone();
    tokio::spawn(async move {
        let mut received = 0u32;
        while tokio::signal::ctrl_c().await.is_ok() {
            received += 1;
            match interrupt_action(received) {
                Interrupt::Cancel => {
                    warn!("interrupt received, finishing in-flight work (Ctrl-C again to quit)");
                    on_signal.cancel();
                }
                Interrupt::ForceExit => {
                    output::error("Interrupted again, exiting without cleanup");
                    std::process::exit(exit_codes::CANCELLED);
                }
            }
        }
    });

    if let Some(secs) = deadline_secs {
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(Duration::from_secs(secs)) => {
                    warn!(deadline_secs = secs, "deadline reached, cancelling run");
                    token.cancel();
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse(argv: &[&str]) -> RunArgs {
        match Cli::try_parse_from(argv).unwrap().command {
            crate::cli::Commands::Run(args) => args,
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_flags_override_config() {
        let args = parse(&[
            "vaultlift",
            "run",
            "-b",
            "from-flag",
            "-e",
            ".tsv",
            "--allow-partial",
            "--age-key-file",
            "/keys/master.key",
            "--retries",
            "5",
        ]);
        let mut config = MigrationConfig::default();
        apply_args(&args, &mut config);

        assert_eq!(config.storage.bucket, "from-flag");
        assert_eq!(config.extensions, vec!["tsv"]);
        assert!(!config.fail_on_partial);
        assert_eq!(config.key_wrapper.kind, vaultlift_core::KeyWrapperKind::Age);
        assert_eq!(config.retry.max_attempts, 5);
    }

    #[test]
    fn test_more_retries_widen_the_delay_cap() {
        let args = parse(&["vaultlift", "run", "--retries", "40"]);
        let mut config = MigrationConfig::default();
        apply_args(&args, &mut config);

        assert_eq!(config.retry.max_delay_ms, 2000 * 40);
    }

    #[test]
    fn test_second_interrupt_forces_exit() {
        assert_eq!(interrupt_action(1), Interrupt::Cancel);
        assert_eq!(interrupt_action(2), Interrupt::ForceExit);
        assert_eq!(interrupt_action(5), Interrupt::ForceExit);
    }

    #[test]
    fn test_absent_flags_keep_config() {
        let args = parse(&["vaultlift", "run"]);
        let mut config = MigrationConfig::default();
        config.concurrency = 4;
        apply_args(&args, &mut config);

        assert_eq!(config.concurrency, 4);
        assert!(config.fail_on_partial);
        assert_eq!(config.storage.bucket, MigrationConfig::default().storage.bucket);
    }
}
