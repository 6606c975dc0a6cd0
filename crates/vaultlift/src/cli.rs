//! CLI argument parsing with clap

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand, ValueEnum};
use vaultlift_core::KeyWrapperKind;

/// vaultlift - encrypted, verified data migration to object storage
#[derive(Parser, Debug)]
#[command(name = "vaultlift")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to a YAML config file
    #[arg(short, long, global = true, env = "VAULTLIFT_CONFIG")]
    pub config: Option<Utf8PathBuf>,

    /// Environment file loaded before reading the environment
    #[arg(long, global = true, default_value = ".env")]
    pub env_file: Utf8PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Encrypt every input file and upload the artifacts
    Run(RunArgs),

    /// Decrypt artifact sets back to plaintext
    Restore(RestoreArgs),

    /// Generate an age master key file
    Keygen(KeygenArgs),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum WrapperArg {
    /// Vault Transit engine
    Transit,
    /// Local age identity
    Age,
}

impl From<WrapperArg> for KeyWrapperKind {
    fn from(arg: WrapperArg) -> Self {
        match arg {
            WrapperArg::Transit => KeyWrapperKind::Transit,
            WrapperArg::Age => KeyWrapperKind::Age,
        }
    }
}

/// Key wrapper selection shared by `run` and `restore`
#[derive(Args, Debug, Clone)]
pub struct KeyWrapperArgs {
    /// Key wrapping backend
    #[arg(long, value_enum)]
    pub key_wrapper: Option<WrapperArg>,

    /// age identity file (implies --key-wrapper age)
    #[arg(long)]
    pub age_key_file: Option<Utf8PathBuf>,

    /// Transit key name
    #[arg(long)]
    pub transit_key: Option<String>,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Directory scanned for input files
    #[arg(short, long)]
    pub input_dir: Option<Utf8PathBuf>,

    /// Directory receiving the local encrypted artifacts
    #[arg(short, long)]
    pub work_dir: Option<Utf8PathBuf>,

    /// Destination bucket
    #[arg(short, long)]
    pub bucket: Option<String>,

    /// Key prefix for the artifact folders
    #[arg(long)]
    pub prefix: Option<String>,

    /// Input file extension (repeatable)
    #[arg(short = 'e', long = "extension")]
    pub extensions: Vec<String>,

    /// Files processed at once
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Upload attempts per artifact
    #[arg(long)]
    pub retries: Option<u32>,

    #[command(flatten)]
    pub key: KeyWrapperArgs,

    /// Remove local artifacts after verified upload
    #[arg(long)]
    pub clean_workdir: bool,

    /// Exit 0 even when some files failed
    #[arg(long)]
    pub allow_partial: bool,

    /// Cancel the run after this many seconds
    #[arg(long)]
    pub deadline_secs: Option<u64>,

    /// Write the run summary as JSON
    #[arg(long)]
    pub summary_json: Option<Utf8PathBuf>,
}

#[derive(Args, Debug)]
pub struct RestoreArgs {
    /// Artifact set names (input file names); all local sets when omitted
    pub names: Vec<String>,

    /// Directory receiving the plaintext files
    #[arg(short, long)]
    pub output_dir: Utf8PathBuf,

    /// Directory holding the artifact sets (defaults to the work dir)
    #[arg(short, long)]
    pub artifact_dir: Option<Utf8PathBuf>,

    /// Download the named sets from the bucket first
    #[arg(long, requires = "names")]
    pub download: bool,

    /// Replace existing plaintext files
    #[arg(long)]
    pub overwrite: bool,

    #[command(flatten)]
    pub key: KeyWrapperArgs,
}

#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// Output key file
    #[arg(short, long)]
    pub output: Utf8PathBuf,

    /// Overwrite an existing key file
    #[arg(short, long)]
    pub force: bool,
}
