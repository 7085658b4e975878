//! # imageprep
//!
//! Batch image acquisition and processing for storefront media uploads:
//! turn raw, user-supplied raster files into validated, size-bounded,
//! optionally cropped, compressed artifacts ready for persistence — and
//! deterministically release the transient memory each stage allocates.
//!
//! # Architecture: One Pipeline, Many Profiles
//!
//! Every upload site in a storefront needs the same dance — validate,
//! compress, maybe crop, persist — with different numbers. Instead of one
//! near-identical implementation per call site, there is a single
//! parameterized pipeline and a set of named [`profile::Profile`]s
//! ("logo", "banner", "product-gallery", "avatar") carrying the numbers:
//!
//! ```text
//! files + Profile
//!    ↓
//! BatchCoordinator        (cardinality, admission, fan-out, outcomes)
//!    ├─ Validator         (size/format/dimension checks, aspect advisory)
//!    ├─ RasterTranscoder  (compress → bounds + quality; crop → clamp,
//!    │                     scale, rotate/zoom, re-encode)
//!    ├─ HandleRegistry    (preview buffers, released exactly once)
//!    └─ UploadAdapter     (external; failures keep local artifacts)
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`batch`] | [`batch::BatchCoordinator`] — ordered batch, admission rules, crop slot, upload driving |
//! | [`pipeline`] | Per-item state machine from `Ingested` to `Persisted` |
//! | [`validate`] | Pure pre-admission checks with collected, actionable reasons |
//! | [`transcode`] | Backend trait, dimension math, and the `image`-crate implementation |
//! | [`registry`] | Constructor-scoped preview registry with `Drop`-driven teardown |
//! | [`profile`] | Named constraint presets + TOML profile files |
//! | [`upload`] | The persistence boundary: adapter trait + content-addressed names |
//! | [`types`] | Ids, input/outcome records, and the [`types::BatchEvent`] vocabulary |
//! | [`output`] | CLI presentation over events and outcomes — the core never prints |
//!
//! # Design Decisions
//!
//! ## Compression Is Unconditional, Resizing Is Not
//!
//! Every admitted file is re-encoded at the profile's quality even when no
//! resize is needed: the output is then one normalized format (JPEG, alpha
//! flattened over white) with a known quality, whatever arrived. Resizing
//! only happens when a source exceeds the profile's pixel bounds, by a
//! uniform factor — aspect ratios never distort, and resizing is a fixed
//! point once within bounds.
//!
//! ## Crop Rectangles Live in Source Pixel Space
//!
//! Interactive crops are expressed in the original image's coordinates,
//! clamped before use, and applied to the original bytes — not to an
//! already-compressed preview. One coordinate space means no scale factors
//! to mix up, and cropping from the source costs one generation of lossy
//! encoding instead of two.
//!
//! ## Previews Have Exactly One Owner
//!
//! Decoded previews are the easiest thing in an upload widget to leak.
//! All of them live in a [`registry::HandleRegistry`] owned by the batch:
//! each stage that produces pixels registers through it (retiring the
//! predecessor in the same breath), removal releases per item, and
//! coordinator drop releases whatever is left. Register/release counters
//! make leak checks one assertion.
//!
//! ## Failure Is Per-Item
//!
//! A batch is only as useful as its surviving items. Validation rejections
//! and transcoder refusals turn into per-item outcomes with specific
//! reasons; the only operation-level error is over-limit admission, which
//! admits all files or none. Upload failures keep the local artifact and
//! stay retryable.

pub mod batch;
pub mod output;
pub mod pipeline;
pub mod profile;
pub mod registry;
pub mod transcode;
pub mod types;
pub mod upload;
pub mod validate;
