//! Content digests

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// SHA-256 and size of a byte buffer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentDigest {
    /// Base64 SHA-256, the form S3 reports in `ChecksumSHA256`
    pub sha256_b64: String,
    pub size: u64,
}

impl ContentDigest {
    pub fn of(bytes: &[u8]) -> Self {
        let digest = Sha256::digest(bytes);
        Self {
            sha256_b64: BASE64.encode(digest),
            size: bytes.len() as u64,
        }
    }

    pub fn sha256_hex(&self) -> String {
        BASE64
            .decode(&self.sha256_b64)
            .map(hex::encode)
            .unwrap_or_default()
    }
}
