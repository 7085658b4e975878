//! Shared types used across pipeline stages.
//!
//! Everything the coordinator, pipeline, and presentation layer exchange
//! lives here: item identity, the raw input record, outcome records, and
//! the event vocabulary consumed by subscribers (the CLI printer thread,
//! tests asserting on ordering).

use crate::validate::RejectReason;
use serde::Serialize;
use std::fmt;

/// Opaque identity of one pending image, assigned at ingestion and stable
/// for the item's lifetime. Unique within a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ImageId(pub(crate) u64);

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "img-{:04}", self.0)
    }
}

/// A raw file handed to the batch: binary payload plus what the caller
/// claims it is. The payload is owned exclusively by the `PendingImage`
/// this record becomes — it is never aliased into another item.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    /// Original filename, used for reporting and output naming.
    pub name: String,
    /// Declared format, mime-like (`"image/jpeg"`) or a bare extension
    /// (`"jpg"`). Validated against the profile's allow-list.
    pub declared_format: String,
    pub bytes: Vec<u8>,
}

impl IncomingFile {
    pub fn new(
        name: impl Into<String>,
        declared_format: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            name: name.into(),
            declared_format: declared_format.into(),
            bytes,
        }
    }

    pub fn byte_len(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Size bookkeeping for one item, filled in once compression has run and
/// refreshed if a crop replaces the final artifact.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SavingsStats {
    pub original_size: u64,
    pub final_size: u64,
    /// `final_size / original_size`. Can exceed 1.0 — re-encoding tiny or
    /// already-optimal sources occasionally grows them.
    pub ratio: f64,
}

impl SavingsStats {
    pub fn new(original_size: u64, final_size: u64) -> Self {
        let ratio = if original_size == 0 {
            1.0
        } else {
            final_size as f64 / original_size as f64
        };
        Self {
            original_size,
            final_size,
            ratio,
        }
    }
}

/// A finalized item as handed back to the caller: the artifact ready for
/// persistence plus its bookkeeping.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub id: ImageId,
    /// Source filename the artifact derives from.
    pub name: String,
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub original_size: u64,
    pub final_size: u64,
    pub crop_applied: bool,
    /// Set once an `UploadAdapter` has persisted the artifact.
    pub persisted_url: Option<String>,
}

/// Report for a file that never made it into the batch, with the specific
/// reason(s) so the caller can render actionable guidance.
#[derive(Debug, Clone)]
pub struct RejectionReport {
    pub name: String,
    pub reasons: Vec<RejectReason>,
}

/// Events emitted over the coordinator's channel while a batch runs.
///
/// Presentation (progress bars, CLI output) subscribes to these rather
/// than the core printing anything itself. Tests use the registry events
/// to assert release ordering.
#[derive(Debug, Clone)]
pub enum BatchEvent {
    ItemAdmitted { id: ImageId, name: String },
    ItemRejected { name: String, reasons: Vec<RejectReason> },
    ItemFailed { name: String, error: String },
    ItemCompressed { id: ImageId, stats: SavingsStats },
    ItemRemoved { id: ImageId },
    /// Aggregate progress: items done with ingestion-through-compression
    /// over items admitted for processing. Monotonically non-decreasing.
    Progress { completed: usize, total: usize },
    PreviewRegistered { id: ImageId },
    PreviewReleased { id: ImageId },
    CropOpened { id: ImageId },
    CropApplied { id: ImageId },
    UploadStarted { id: ImageId },
    Uploaded { id: ImageId, url: String },
    UploadFailed { id: ImageId, error: String },
    BatchCleared,
}
