//! # vaultlift-migrate
//!
//! Drives a migration run end to end: fetch the storage credential, build
//! the clients, then encrypt, write and upload every input file, and
//! aggregate the per-file results into a [`RunSummary`]. Also provides the
//! inverse restore workflow.

pub mod factory;
pub mod orchestrator;
pub mod restore;
pub mod summary;

pub use factory::{ClientFactory, DefaultClientFactory};
pub use orchestrator::MigrationOrchestrator;
pub use restore::{RestoreOutcome, RestoreRequest, RestoreStatus, Restorer};
pub use summary::{FileOutcome, FileStatus, RunStatus, RunSummary, Stage};
