//! Terminal output utilities

use console::style;
use tabled::{settings::Style, Table, Tabled};
use vaultlift_migrate::{FileOutcome, FileStatus, RestoreOutcome, RestoreStatus, RunSummary};

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", style("✓").green().bold(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", style("✗").red().bold(), msg);
}

/// Print a warning message
pub fn warning(msg: &str) {
    eprintln!("{} {}", style("⚠").yellow().bold(), msg);
}

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", style("ℹ").blue().bold(), msg);
}

/// Print a header
pub fn header(msg: &str) {
    println!("\n{}", style(msg).bold().underlined());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", style(key).dim(), value);
}

#[derive(Tabled)]
struct FileRow {
    #[tabled(rename = "FILE")]
    file: String,
    #[tabled(rename = "STATUS")]
    status: String,
    #[tabled(rename = "ATTEMPTS")]
    attempts: String,
    #[tabled(rename = "DURATION")]
    duration: String,
    #[tabled(rename = "DETAIL")]
    detail: String,
}

impl From<&FileOutcome> for FileRow {
    fn from(outcome: &FileOutcome) -> Self {
        let (status, detail) = match &outcome.status {
            FileStatus::Migrated => ("migrated".to_string(), String::new()),
            FileStatus::Failed { stage, reason } => {
                (format!("failed ({})", stage), truncate(reason, 60))
            }
            FileStatus::Skipped => ("skipped".to_string(), "cancelled".to_string()),
        };
        let attempts = outcome
            .uploads
            .iter()
            .map(|u| u.attempts.to_string())
            .collect::<Vec<_>>()
            .join("/");

        Self {
            file: outcome.file.clone(),
            status,
            attempts,
            duration: format!("{}ms", outcome.duration_ms),
            detail,
        }
    }
}

/// Print the per-file table and totals of a run
pub fn print_run_summary(summary: &RunSummary) {
    if !summary.files.is_empty() {
        let rows: Vec<FileRow> = summary.files.iter().map(FileRow::from).collect();
        let mut table = Table::new(rows);
        table.with(Style::sharp());
        println!("{}", table);
    }

    kv("Container", &summary.container);
    if let Some(credential) = &summary.credential {
        kv("Credential", credential);
    }
    kv(
        "Files",
        &format!(
            "{} migrated, {} failed, {} skipped",
            style(summary.migrated()).green(),
            style(summary.failed()).red(),
            style(summary.skipped()).yellow()
        ),
    );
    kv(
        "Duration",
        &format!("{:.1}s", summary.duration().num_milliseconds() as f64 / 1000.0),
    );
}

#[derive(Tabled)]
struct RestoreRow {
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "STATUS")]
    status: String,
    #[tabled(rename = "OUTPUT")]
    output: String,
}

pub fn print_restore_outcomes(outcomes: &[RestoreOutcome]) {
    if outcomes.is_empty() {
        info("No artifact sets found");
        return;
    }

    let rows: Vec<RestoreRow> = outcomes
        .iter()
        .map(|o| RestoreRow {
            name: o.name.clone(),
            status: match &o.status {
                RestoreStatus::Restored { bytes } => format!("restored ({} bytes)", bytes),
                RestoreStatus::Skipped => "skipped (exists)".to_string(),
                RestoreStatus::Failed { reason } => format!("failed: {}", truncate(reason, 60)),
            },
            output: o.output.display().to_string(),
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::sharp());
    println!("{}", table);
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let head: String = text.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", head)
    }
}
