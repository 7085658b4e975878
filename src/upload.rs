//! The persistence boundary.
//!
//! The pipeline does not own storage or transport; it hands finalized
//! bytes to an [`UploadAdapter`] and records the returned URL. Adapter
//! failures are survivable: the item keeps its local artifact and can be
//! retried later.

use sha2::{Digest, Sha256};
use thiserror::Error;

/// Failure from the external persistence collaborator. Retry/timeout
/// policy belongs to the adapter implementation, not the pipeline.
#[derive(Error, Debug)]
#[error("upload failed: {0}")]
pub struct UploadError(pub String);

/// External collaborator that persists a finalized artifact and returns
/// its permanent URL.
pub trait UploadAdapter {
    fn persist(&self, bytes: &[u8], suggested_name: &str) -> Result<String, UploadError>;
}

/// Content-addressed name for a finalized artifact: a SHA-256 prefix plus
/// the output extension. Re-uploading identical bytes lands on the same
/// name, so the store deduplicates for free.
pub fn suggested_name(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut hex = String::with_capacity(16);
    for byte in &digest[..8] {
        hex.push_str(&format!("{byte:02x}"));
    }
    format!("{hex}.jpg")
}
