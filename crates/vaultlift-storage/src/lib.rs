//! # vaultlift-storage
//!
//! Remote object storage for encrypted artifacts:
//! - [`ObjectStore`] capability trait with S3-compatible and GCS adapters
//! - SHA-256 content digests
//! - [`UploadPipeline`]: container provisioning and retried, verified uploads

pub mod backend;
pub mod checksum;
pub mod gcs;
pub mod s3;
pub mod types;
pub mod upload;

pub use backend::{ObjectStore, StoreError};
pub use checksum::ContentDigest;
pub use gcs::GcsObjectStore;
pub use s3::S3ObjectStore;
pub use types::{RemoteObject, UploadOutcome, UploadState, UploadStatus, VerificationMode};
pub use upload::UploadPipeline;
