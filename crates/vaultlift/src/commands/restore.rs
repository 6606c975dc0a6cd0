//! Restore command: decrypt artifact sets back to plaintext

use anyhow::{Context, Result};
use vaultlift_core::exit_codes;
use vaultlift_migrate::{MigrationOrchestrator, RestoreRequest};

use super::{apply_key_args, load_config};
use crate::cli::{Cli, RestoreArgs};
use crate::output;

pub async fn run(args: &RestoreArgs, cli: &Cli) -> Result<i32> {
    let mut config = load_config(cli)?;
    apply_key_args(&args.key, &mut config);

    let request = RestoreRequest {
        artifact_dir: args
            .artifact_dir
            .clone()
            .map(|p| p.into_std_path_buf())
            .unwrap_or_else(|| config.work_dir.clone()),
        output_dir: args.output_dir.clone().into_std_path_buf(),
        names: args.names.clone(),
        overwrite: args.overwrite,
        download: args.download,
    };

    output::header("Restore");
    output::kv("Artifacts", &request.artifact_dir.display().to_string());
    output::kv("Output", &request.output_dir.display().to_string());
    if request.download {
        output::kv("Bucket", &config.storage.bucket);
    }
    println!();

    let orchestrator = MigrationOrchestrator::new(config);
    let outcomes = match orchestrator.restore(&request).await {
        Ok(outcomes) => outcomes,
        Err(e) if e.is_fatal() => {
            output::error(&e.to_string());
            return Ok(e.exit_code());
        }
        Err(e) => return Err(e).context("Restore failed"),
    };

    output::print_restore_outcomes(&outcomes);
    let failed = outcomes.iter().filter(|o| o.is_failed()).count();
    if failed > 0 {
        output::warning(&format!("{} artifact set(s) could not be restored", failed));
        Ok(exit_codes::PARTIAL_FAILURE)
    } else {
        output::success(&format!("{} artifact set(s) processed", outcomes.len()));
        Ok(exit_codes::SUCCESS)
    }
}
