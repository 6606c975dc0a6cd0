//! Keygen command: create an age master key for the `age` key wrapper

use anyhow::{Context, Result};
use vaultlift_core::exit_codes;
use vaultlift_secrets::keywrap::age::generate_key_file;

use crate::cli::KeygenArgs;
use crate::output;

pub fn run(args: &KeygenArgs) -> Result<i32> {
    let recipient = generate_key_file(args.output.as_std_path(), args.force)
        .with_context(|| format!("Failed to create key file {}", args.output))?;

    output::success(&format!("Master key written to {}", args.output));
    output::kv("Public key", &recipient);
    output::info("Keep this file out of version control; it can decrypt every migrated file");
    Ok(exit_codes::SUCCESS)
}
