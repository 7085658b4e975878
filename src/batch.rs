//! Batch coordination: the ordered set of in-flight pending images owned
//! by one upload site.
//!
//! The coordinator enforces cardinality (single/multiple, max count),
//! admission (all-or-nothing against the limit), fans accepted files out
//! across rayon workers so one slow or failing decode never blocks its
//! siblings, aggregates per-item outcomes, and manages the single
//! interactive crop slot. Presentation subscribes to the event channel;
//! the coordinator never prints.
//!
//! Teardown discipline: dropping the coordinator releases every preview
//! still registered, so a widget unmount cannot leak decoded buffers.

use crate::pipeline::{ImagePipeline, PendingImage, ProcessedItem, Stage};
use crate::profile::Profile;
use crate::registry::{HandleRegistry, HandleStats};
use crate::transcode::{CropSettings, RasterBackend, TranscodeError};
use crate::types::{Artifact, BatchEvent, ImageId, IncomingFile, RejectionReport};
use crate::upload::{UploadAdapter, UploadError};
use crate::validate::{AspectWarning, RejectReason};
use rayon::prelude::*;
use std::sync::Mutex;
use std::sync::mpsc::Sender;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("cannot add {incoming} file(s): batch holds {current} of at most {limit}")]
    LimitExceeded {
        current: usize,
        incoming: usize,
        limit: usize,
    },
    #[error("no item with id {0}")]
    UnknownItem(ImageId),
    #[error("a crop session is already open for {0}")]
    CropSessionBusy(ImageId),
    #[error("no crop session open for {0}")]
    NoCropSession(ImageId),
    #[error("item {id} is in stage {stage:?}, expected {expected:?}")]
    InvalidStage {
        id: ImageId,
        stage: Stage,
        expected: Stage,
    },
    #[error(transparent)]
    Transcode(#[from] TranscodeError),
}

/// Per-file result of one `add_files` call, in input order.
#[derive(Debug)]
pub enum ItemOutcome {
    Admitted {
        id: ImageId,
        warnings: Vec<AspectWarning>,
    },
    Rejected {
        name: String,
        reasons: Vec<RejectReason>,
    },
    Failed {
        name: String,
        error: TranscodeError,
    },
}

#[derive(Debug)]
pub struct AddOutcome {
    pub outcomes: Vec<ItemOutcome>,
}

impl AddOutcome {
    pub fn admitted_ids(&self) -> Vec<ImageId> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                ItemOutcome::Admitted { id, .. } => Some(*id),
                _ => None,
            })
            .collect()
    }

    pub fn fully_admitted(&self) -> bool {
        self.outcomes
            .iter()
            .all(|o| matches!(o, ItemOutcome::Admitted { .. }))
    }
}

/// Result of driving one item through the upload stage.
#[derive(Debug)]
pub struct UploadOutcome {
    pub id: ImageId,
    pub result: Result<String, UploadError>,
}

struct ProgressState {
    done: usize,
    total: usize,
}

/// Owner of one upload site's batch. See the module docs.
pub struct BatchCoordinator<B: RasterBackend> {
    profile: Profile,
    backend: B,
    registry: HandleRegistry,
    items: Vec<PendingImage>,
    rejections: Vec<RejectionReport>,
    failures: Vec<(String, String)>,
    active_crop: Option<ImageId>,
    events: Option<Sender<BatchEvent>>,
    next_id: u64,
    // Progress counter and its event emission share one lock so observers
    // never see the counter go backwards.
    progress: Mutex<ProgressState>,
}

impl<B: RasterBackend> BatchCoordinator<B> {
    pub fn new(backend: B, profile: Profile) -> Self {
        Self {
            profile,
            backend,
            registry: HandleRegistry::new(),
            items: Vec::new(),
            rejections: Vec::new(),
            failures: Vec::new(),
            active_crop: None,
            events: None,
            next_id: 0,
            progress: Mutex::new(ProgressState { done: 0, total: 0 }),
        }
    }

    /// A coordinator reporting batch and registry activity on `events`.
    pub fn with_events(backend: B, profile: Profile, events: Sender<BatchEvent>) -> Self {
        let mut coordinator = Self::new(backend, profile);
        coordinator.registry = HandleRegistry::with_events(events.clone());
        coordinator.events = Some(events);
        coordinator
    }

    fn emit(&self, event: BatchEvent) {
        if let Some(sender) = &self.events {
            let _ = sender.send(event);
        }
    }

    /// Admit files into the batch and run each through
    /// ingestion-through-compression.
    ///
    /// Single mode (`multiple == false`) releases and replaces whatever
    /// the batch held; a call with more than one file is refused. Multiple
    /// mode refuses the whole call when it would exceed `max_items` — no
    /// partial admission. Per-item validation or transcode failures never
    /// abort siblings; they come back in the outcome list.
    pub fn add_files(&mut self, files: Vec<IncomingFile>) -> Result<AddOutcome, BatchError> {
        if files.is_empty() {
            return Ok(AddOutcome {
                outcomes: Vec::new(),
            });
        }

        if self.profile.multiple {
            if self.items.len() + files.len() > self.profile.max_items {
                return Err(BatchError::LimitExceeded {
                    current: self.items.len(),
                    incoming: files.len(),
                    limit: self.profile.max_items,
                });
            }
        } else {
            if files.len() > 1 {
                return Err(BatchError::LimitExceeded {
                    current: self.items.len(),
                    incoming: files.len(),
                    limit: 1,
                });
            }
            // Replace semantics: the old item's previews are released
            // before the newcomer registers its own.
            self.evict_all_items();
        }

        let staged: Vec<(ImageId, IncomingFile)> = files
            .into_iter()
            .map(|file| {
                let id = ImageId(self.next_id);
                self.next_id += 1;
                (id, file)
            })
            .collect();

        self.progress.lock().unwrap().total += staged.len();

        let backend = &self.backend;
        let profile = &self.profile;
        let registry = &self.registry;
        let progress = &self.progress;

        let processed: Vec<ProcessedItem> = staged
            .into_par_iter()
            .map_with(self.events.clone(), |events, (id, file)| {
                let pipeline = ImagePipeline {
                    backend,
                    profile,
                    registry,
                    events: events.clone(),
                };
                let outcome = pipeline.ingest_and_compress(id, file);

                let mut p = progress.lock().unwrap();
                p.done += 1;
                if let Some(sender) = events {
                    let _ = sender.send(BatchEvent::Progress {
                        completed: p.done,
                        total: p.total,
                    });
                }
                outcome
            })
            .collect();

        let mut outcomes = Vec::with_capacity(processed.len());
        for item in processed {
            match item {
                ProcessedItem::Admitted(item) => {
                    outcomes.push(ItemOutcome::Admitted {
                        id: item.id,
                        warnings: item.warnings.clone(),
                    });
                    self.items.push(item);
                }
                ProcessedItem::Rejected { name, reasons } => {
                    self.rejections.push(RejectionReport {
                        name: name.clone(),
                        reasons: reasons.clone(),
                    });
                    outcomes.push(ItemOutcome::Rejected { name, reasons });
                }
                ProcessedItem::Failed { name, error } => {
                    self.failures.push((name.clone(), error.to_string()));
                    outcomes.push(ItemOutcome::Failed { name, error });
                }
            }
        }

        if self.profile.required_crop
            && self.profile.auto_open_crop
            && self.active_crop.is_none()
        {
            let awaiting = self
                .items
                .iter()
                .find(|item| item.stage == Stage::AwaitingCrop)
                .map(|item| item.id);
            if let Some(id) = awaiting {
                self.active_crop = Some(id);
                self.emit(BatchEvent::CropOpened { id });
            }
        }

        Ok(AddOutcome { outcomes })
    }

    /// Remove one item: its previews are released and the sequence closes
    /// up. The first remaining item is implicitly primary — position is
    /// the only primary flag.
    pub fn remove_item(&mut self, id: ImageId) -> Result<(), BatchError> {
        let index = self
            .items
            .iter()
            .position(|item| item.id == id)
            .ok_or(BatchError::UnknownItem(id))?;

        if self.active_crop == Some(id) {
            self.active_crop = None;
        }
        self.registry.release(id);
        self.items.remove(index);
        self.emit(BatchEvent::ItemRemoved { id });
        Ok(())
    }

    /// Open the interactive crop session for an item awaiting its crop.
    /// Only one session may be open per batch; opening the already-active
    /// item is a no-op.
    pub fn open_crop(&mut self, id: ImageId) -> Result<(), BatchError> {
        if self.active_crop == Some(id) {
            return Ok(());
        }
        if let Some(active) = self.active_crop {
            return Err(BatchError::CropSessionBusy(active));
        }

        let item = self.item(id).ok_or(BatchError::UnknownItem(id))?;
        if item.stage != Stage::AwaitingCrop {
            return Err(BatchError::InvalidStage {
                id,
                stage: item.stage,
                expected: Stage::AwaitingCrop,
            });
        }

        self.active_crop = Some(id);
        self.emit(BatchEvent::CropOpened { id });
        Ok(())
    }

    /// Apply an externally supplied crop rectangle to the item whose
    /// session is open. On success the session closes and the item
    /// finalizes; on transcode failure the session stays open so a
    /// corrected rectangle can be tried.
    pub fn apply_crop(
        &mut self,
        id: ImageId,
        settings: CropSettings,
    ) -> Result<(), BatchError> {
        if self.active_crop != Some(id) {
            return Err(BatchError::NoCropSession(id));
        }

        let pipeline = ImagePipeline {
            backend: &self.backend,
            profile: &self.profile,
            registry: &self.registry,
            events: self.events.clone(),
        };
        let item = self
            .items
            .iter_mut()
            .find(|item| item.id == id)
            .ok_or(BatchError::UnknownItem(id))?;
        if item.stage != Stage::AwaitingCrop {
            return Err(BatchError::InvalidStage {
                id,
                stage: item.stage,
                expected: Stage::AwaitingCrop,
            });
        }

        pipeline.apply_crop(item, settings)?;
        self.active_crop = None;
        Ok(())
    }

    /// Abandon the open crop session, if any. The item stays in
    /// `AwaitingCrop`; a required crop still gates finalization.
    pub fn cancel_crop(&mut self) {
        self.active_crop = None;
    }

    /// Send a finalized item back for re-cropping. The previous final
    /// artifact is invalidated and a new session opens for the item.
    pub fn reopen_crop(&mut self, id: ImageId) -> Result<(), BatchError> {
        if let Some(active) = self.active_crop {
            return Err(BatchError::CropSessionBusy(active));
        }

        let pipeline = ImagePipeline {
            backend: &self.backend,
            profile: &self.profile,
            registry: &self.registry,
            events: self.events.clone(),
        };
        let item = self
            .items
            .iter_mut()
            .find(|item| item.id == id)
            .ok_or(BatchError::UnknownItem(id))?;
        if !matches!(item.stage, Stage::Finalized | Stage::UploadFailed) {
            return Err(BatchError::InvalidStage {
                id,
                stage: item.stage,
                expected: Stage::Finalized,
            });
        }

        pipeline.reopen_crop(item);
        self.active_crop = Some(id);
        self.emit(BatchEvent::CropOpened { id });
        Ok(())
    }

    /// Drive every finalized (or previously failed) item through the
    /// upload adapter. Failures are recorded per item and never discard
    /// local artifacts.
    pub fn upload_all(&mut self, adapter: &dyn UploadAdapter) -> Vec<UploadOutcome> {
        let pipeline = ImagePipeline {
            backend: &self.backend,
            profile: &self.profile,
            registry: &self.registry,
            events: self.events.clone(),
        };

        let mut outcomes = Vec::new();
        for item in &mut self.items {
            if !matches!(item.stage, Stage::Finalized | Stage::UploadFailed) {
                continue;
            }
            let result = pipeline.upload(item, adapter);
            outcomes.push(UploadOutcome {
                id: item.id,
                result,
            });
        }
        outcomes
    }

    /// Release every preview and empty the batch.
    pub fn clear(&mut self) {
        self.registry.release_all();
        self.items.clear();
        self.rejections.clear();
        self.failures.clear();
        self.active_crop = None;
        self.emit(BatchEvent::BatchCleared);
    }

    fn evict_all_items(&mut self) {
        let evicted: Vec<PendingImage> = self.items.drain(..).collect();
        for item in &evicted {
            self.registry.release(item.id);
            self.emit(BatchEvent::ItemRemoved { id: item.id });
        }
        self.active_crop = None;
    }

    // -- accessors ----------------------------------------------------------

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn items(&self) -> &[PendingImage] {
        &self.items
    }

    pub fn item(&self, id: ImageId) -> Option<&PendingImage> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn active_crop(&self) -> Option<ImageId> {
        self.active_crop
    }

    /// Finalized output records, in batch order.
    pub fn artifacts(&self) -> Vec<Artifact> {
        self.items.iter().filter_map(|item| item.artifact()).collect()
    }

    pub fn rejections(&self) -> &[RejectionReport] {
        &self.rejections
    }

    /// Transcode failures as `(file name, error)` pairs.
    pub fn failures(&self) -> &[(String, String)] {
        &self.failures
    }

    /// `(completed, total)` over every file ever admitted for processing.
    /// Monotonically non-decreasing; crop work is excluded.
    pub fn progress(&self) -> (usize, usize) {
        let p = self.progress.lock().unwrap();
        (p.done, p.total)
    }

    pub fn handle_stats(&self) -> HandleStats {
        self.registry.stats()
    }
}

impl<B: RasterBackend> Drop for BatchCoordinator<B> {
    fn drop(&mut self) {
        // Widget-unmount equivalent: every preview still live is released
        // here, exactly once.
        self.registry.release_all();
    }
}
