//! Per-item state machine: one `PendingImage` moving from raw bytes to a
//! finalized artifact.
//!
//! ```text
//! Ingested → Validating → Validated ──→ Compressing → Compressed
//!                 │                                        │
//!                 └→ Rejected (terminal)     required_crop │ otherwise
//!                                                          ▼         ▼
//!                                              AwaitingCrop → … → Finalized
//!                                                          ▲            │
//!                                               (re-crop) ─┘            ▼
//!                                              Uploading → Persisted | UploadFailed
//! ```
//!
//! The pipeline is the sole writer of its item: ingestion-through-
//! compression happens inside one closure before the item joins the batch,
//! and every later transition goes through the owning coordinator's
//! `&mut self` operations. No two stages for the same item ever run
//! concurrently.

use crate::profile::Profile;
use crate::registry::{HandleRegistry, Preview};
use crate::transcode::{
    CompressParams, CropParams, CropSettings, Dimensions, EncodedImage, RasterBackend,
    TranscodeError,
};
use crate::types::{Artifact, BatchEvent, ImageId, IncomingFile, SavingsStats};
use crate::upload::{UploadAdapter, UploadError, suggested_name};
use crate::validate::{AspectWarning, RejectReason, validate};
use std::sync::mpsc::Sender;

/// Where an item currently sits in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Ingested,
    Validating,
    Validated,
    /// Terminal: the item is excluded from the batch, reasons reported.
    Rejected,
    Compressing,
    Compressed,
    /// Waiting for an externally supplied crop rectangle.
    AwaitingCrop,
    Cropping,
    Cropped,
    /// Artifact ready for persistence.
    Finalized,
    Uploading,
    Persisted,
    /// Upload failed; the local artifact is retained and retryable.
    UploadFailed,
}

/// The unit of work owned by a batch. Mutated only by the pipeline that
/// processes it; callers observe it through shared references.
#[derive(Debug)]
pub struct PendingImage {
    pub id: ImageId,
    /// Original upload, untouched. Owned exclusively by this record.
    pub source: IncomingFile,
    pub stage: Stage,
    /// Source pixel dimensions, known once validation or compression has
    /// looked at the payload.
    pub source_dimensions: Option<Dimensions>,
    /// Registry-tracked preview of the most recent transcode result.
    pub preview: Option<crate::registry::PreviewHandle>,
    /// Output of the unconditional compression stage.
    pub transcoded: Option<EncodedImage>,
    pub crop_settings: Option<CropSettings>,
    /// The artifact to persist: equals `transcoded` unless a crop ran.
    pub final_artifact: Option<EncodedImage>,
    pub stats: Option<SavingsStats>,
    pub warnings: Vec<AspectWarning>,
    pub persisted_url: Option<String>,
    pub upload_error: Option<String>,
}

impl PendingImage {
    fn new(id: ImageId, source: IncomingFile) -> Self {
        Self {
            id,
            source,
            stage: Stage::Ingested,
            source_dimensions: None,
            preview: None,
            transcoded: None,
            crop_settings: None,
            final_artifact: None,
            stats: None,
            warnings: Vec::new(),
            persisted_url: None,
            upload_error: None,
        }
    }

    /// The finalized output record, once the item has one.
    pub fn artifact(&self) -> Option<Artifact> {
        let encoded = self.final_artifact.as_ref()?;
        let stats = self.stats?;
        Some(Artifact {
            id: self.id,
            name: self.source.name.clone(),
            bytes: encoded.bytes.clone(),
            width: encoded.width,
            height: encoded.height,
            original_size: stats.original_size,
            final_size: stats.final_size,
            crop_applied: self.crop_settings.is_some(),
            persisted_url: self.persisted_url.clone(),
        })
    }
}

/// Outcome of running one file through ingestion-through-compression.
#[derive(Debug)]
pub enum ProcessedItem {
    /// The item joined the batch, in `AwaitingCrop` or `Finalized`.
    Admitted(PendingImage),
    /// Validation failed; the file never entered the batch.
    Rejected {
        name: String,
        reasons: Vec<RejectReason>,
    },
    /// The transcoder refused the payload.
    Failed {
        name: String,
        error: TranscodeError,
    },
}

/// Stage driver for one batch's items. Holds the shared collaborators;
/// cheap to construct per rayon worker (the event sender is the only owned
/// piece).
pub(crate) struct ImagePipeline<'a, B: RasterBackend> {
    pub backend: &'a B,
    pub profile: &'a Profile,
    pub registry: &'a HandleRegistry,
    pub events: Option<Sender<BatchEvent>>,
}

impl<'a, B: RasterBackend> ImagePipeline<'a, B> {
    fn emit(&self, event: BatchEvent) {
        if let Some(sender) = &self.events {
            let _ = sender.send(event);
        }
    }

    /// Drive one file from `Ingested` through compression. This is the
    /// automatic, caller-free half of the lifecycle; crop and upload are
    /// driven explicitly afterwards.
    pub fn ingest_and_compress(&self, id: ImageId, file: IncomingFile) -> ProcessedItem {
        let mut item = PendingImage::new(id, file);

        item.stage = Stage::Validating;
        let report = validate(self.backend, &item.source, self.profile);
        item.source_dimensions = report.dimensions;
        item.warnings = report.warnings.clone();

        if !report.is_ok() {
            item.stage = Stage::Rejected;
            // Terminal items still release whatever they hold; at this
            // point that is nothing, and release is a no-op by contract.
            self.registry.release(item.id);
            self.emit(BatchEvent::ItemRejected {
                name: item.source.name.clone(),
                reasons: report.reasons.clone(),
            });
            return ProcessedItem::Rejected {
                name: item.source.name,
                reasons: report.reasons,
            };
        }
        item.stage = Stage::Validated;

        item.stage = Stage::Compressing;
        let encoded = match self.backend.compress(&CompressParams {
            source: &item.source.bytes,
            max_width: self.profile.max_width,
            max_height: self.profile.max_height,
            quality: self.profile.quality,
        }) {
            Ok(encoded) => encoded,
            Err(error) => {
                self.registry.release(item.id);
                self.emit(BatchEvent::ItemFailed {
                    name: item.source.name.clone(),
                    error: error.to_string(),
                });
                return ProcessedItem::Failed {
                    name: item.source.name,
                    error,
                };
            }
        };

        // Profiles without probe-triggering checks reach here without
        // source dimensions; interactive crops need them.
        if item.source_dimensions.is_none() {
            item.source_dimensions = self.backend.probe(&item.source.bytes).ok();
        }

        let stats = SavingsStats::new(item.source.byte_len(), encoded.bytes.len() as u64);
        item.stats = Some(stats);
        item.preview = Some(self.registry.register(
            item.id,
            Preview {
                width: encoded.width,
                height: encoded.height,
                bytes: encoded.bytes.clone(),
            },
        ));
        item.transcoded = Some(encoded);
        item.stage = Stage::Compressed;
        self.emit(BatchEvent::ItemCompressed { id: item.id, stats });
        self.emit(BatchEvent::ItemAdmitted {
            id: item.id,
            name: item.source.name.clone(),
        });

        if self.profile.required_crop {
            item.stage = Stage::AwaitingCrop;
        } else {
            // No crop required: Compressed finalizes directly.
            item.final_artifact = item.transcoded.clone();
            item.stage = Stage::Finalized;
        }
        ProcessedItem::Admitted(item)
    }

    /// Run the crop transcode with an externally supplied rectangle.
    /// On failure the item stays in `AwaitingCrop` — a corrected rectangle
    /// can be supplied later.
    pub fn apply_crop(
        &self,
        item: &mut PendingImage,
        settings: CropSettings,
    ) -> Result<(), TranscodeError> {
        item.stage = Stage::Cropping;
        let quality = self.profile.crop_quality.unwrap_or(self.profile.quality);
        let encoded = match self.backend.crop(&CropParams {
            source: &item.source.bytes,
            crop: settings,
            output: self.profile.crop_output,
            max_width: self.profile.max_width,
            max_height: self.profile.max_height,
            quality,
        }) {
            Ok(encoded) => encoded,
            Err(error) => {
                item.stage = Stage::AwaitingCrop;
                return Err(error);
            }
        };

        item.crop_settings = Some(settings);
        // The crop preview supersedes the compress (or previous crop)
        // preview; the registry retires the old one in the same breath.
        item.preview = Some(self.registry.register(
            item.id,
            Preview {
                width: encoded.width,
                height: encoded.height,
                bytes: encoded.bytes.clone(),
            },
        ));
        item.stats = Some(SavingsStats::new(
            item.source.byte_len(),
            encoded.bytes.len() as u64,
        ));
        item.final_artifact = Some(encoded);
        item.stage = Stage::Cropped;
        item.stage = Stage::Finalized;
        self.emit(BatchEvent::CropApplied { id: item.id });
        Ok(())
    }

    /// Send a finalized item back to `AwaitingCrop`. The previous final
    /// artifact is invalidated and its preview retired; the compressed
    /// preview is re-registered so the crop UI has pixels to show.
    pub fn reopen_crop(&self, item: &mut PendingImage) {
        item.final_artifact = None;
        item.persisted_url = None;
        item.upload_error = None;
        if let Some(transcoded) = &item.transcoded {
            item.preview = Some(self.registry.register(
                item.id,
                Preview {
                    width: transcoded.width,
                    height: transcoded.height,
                    bytes: transcoded.bytes.clone(),
                },
            ));
        }
        item.stage = Stage::AwaitingCrop;
    }

    /// Hand the finalized artifact to the adapter. Failure is non-fatal:
    /// the artifact stays, the stage records the failure, and the item can
    /// be retried.
    pub fn upload(
        &self,
        item: &mut PendingImage,
        adapter: &dyn UploadAdapter,
    ) -> Result<String, UploadError> {
        let bytes = match &item.final_artifact {
            Some(encoded) => encoded.bytes.clone(),
            None => return Err(UploadError("item has no finalized artifact".to_string())),
        };

        item.stage = Stage::Uploading;
        self.emit(BatchEvent::UploadStarted { id: item.id });

        let name = suggested_name(&bytes);
        match adapter.persist(&bytes, &name) {
            Ok(url) => {
                item.persisted_url = Some(url.clone());
                item.upload_error = None;
                item.stage = Stage::Persisted;
                self.emit(BatchEvent::Uploaded {
                    id: item.id,
                    url: url.clone(),
                });
                Ok(url)
            }
            Err(error) => {
                item.upload_error = Some(error.to_string());
                item.stage = Stage::UploadFailed;
                self.emit(BatchEvent::UploadFailed {
                    id: item.id,
                    error: error.to_string(),
                });
                Err(error)
            }
        }
    }
}
