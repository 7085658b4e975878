//! Pre-admission validation of incoming files against a profile.
//!
//! Validation is pure: no handles are registered, and the only pixel work
//! is a header probe for dimensions, whose buffers are dropped before
//! returning. Cheap checks (byte size, declared format) run first and all
//! of their failures are collected; the probe-based checks only run when
//! the cheap checks pass, so an oversized or mistyped file costs zero
//! decode work.

use crate::profile::{Profile, parse_format};
use crate::transcode::{Dimensions, RasterBackend};
use crate::types::IncomingFile;
use std::fmt;
use thiserror::Error;

/// Why a file cannot enter the batch. Each variant carries the actual and
/// allowed values so callers can render actionable guidance ("reduce file
/// size to under 5 MB") rather than a generic failure.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RejectReason {
    #[error("file is {actual} bytes, over the {limit} byte limit")]
    SizeExceeded { actual: u64, limit: u64 },
    #[error("format {declared:?} is not accepted here")]
    FormatNotAllowed { declared: String },
    #[error("image is {width}x{height}, larger than the {max_width}x{max_height} maximum")]
    DimensionTooLarge {
        width: u32,
        height: u32,
        max_width: u32,
        max_height: u32,
    },
    #[error("image is {width}x{height}, smaller than the {min_width}x{min_height} minimum")]
    DimensionTooSmall {
        width: u32,
        height: u32,
        min_width: u32,
        min_height: u32,
    },
    #[error("could not read image: {0}")]
    UnreadableImage(String),
}

/// Advisory: the image's shape is off the profile's expected aspect ratio.
/// Never blocks the pipeline; surfaced so the UI can suggest a crop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AspectWarning {
    pub actual: f64,
    pub expected: f64,
    pub tolerance: f64,
}

impl fmt::Display for AspectWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "aspect ratio {:.2} is outside {:.2} ± {:.2}",
            self.actual, self.expected, self.tolerance
        )
    }
}

/// Everything `validate` learned about one file.
#[derive(Debug)]
pub struct ValidationReport {
    pub reasons: Vec<RejectReason>,
    pub warnings: Vec<AspectWarning>,
    /// Source dimensions, when the profile required a probe and it
    /// succeeded.
    pub dimensions: Option<Dimensions>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.reasons.is_empty()
    }
}

/// Check one file against a profile, collecting every applicable reason.
pub fn validate(
    backend: &impl RasterBackend,
    file: &IncomingFile,
    profile: &Profile,
) -> ValidationReport {
    let mut reasons = Vec::new();
    let mut warnings = Vec::new();

    if file.byte_len() > profile.max_size_bytes {
        reasons.push(RejectReason::SizeExceeded {
            actual: file.byte_len(),
            limit: profile.max_size_bytes,
        });
    }

    match parse_format(&file.declared_format) {
        Some(format) if profile.allowed_formats.contains(&format) => {}
        _ => reasons.push(RejectReason::FormatNotAllowed {
            declared: file.declared_format.clone(),
        }),
    }

    // Probe-based checks only when the cheap checks passed and the profile
    // actually wants dimensions.
    if !reasons.is_empty() || !profile.probes_dimensions() {
        return ValidationReport {
            reasons,
            warnings,
            dimensions: None,
        };
    }

    let dims = match backend.probe(&file.bytes) {
        Ok(dims) => dims,
        Err(e) => {
            // All dimension and aspect checks are skipped: there is
            // nothing trustworthy to measure.
            reasons.push(RejectReason::UnreadableImage(e.to_string()));
            return ValidationReport {
                reasons,
                warnings,
                dimensions: None,
            };
        }
    };

    if let Some((max_w, max_h)) = profile.max_source_dimensions {
        if dims.width > max_w || dims.height > max_h {
            reasons.push(RejectReason::DimensionTooLarge {
                width: dims.width,
                height: dims.height,
                max_width: max_w,
                max_height: max_h,
            });
        }
    }

    if let Some((min_w, min_h)) = profile.min_dimensions {
        if dims.width < min_w || dims.height < min_h {
            reasons.push(RejectReason::DimensionTooSmall {
                width: dims.width,
                height: dims.height,
                min_width: min_w,
                min_height: min_h,
            });
        }
    }

    if let Some(expected) = profile.aspect_ratio {
        let actual = dims.aspect();
        if (actual - expected).abs() > profile.aspect_tolerance {
            warnings.push(AspectWarning {
                actual,
                expected,
                tolerance: profile.aspect_tolerance,
            });
        }
    }

    ValidationReport {
        reasons,
        warnings,
        dimensions: Some(dims),
    }
}
