//! Transcoding backend trait and shared types.
//!
//! The [`RasterBackend`] trait defines the three operations every backend
//! must support: probe, compress, and crop. The production implementation
//! is [`ImageCrateBackend`](super::image_backend::ImageCrateBackend) —
//! pure Rust, statically linked. The rest of the codebase is
//! backend-agnostic, so tests run against a recording mock instead of
//! paying for real decodes.

use super::params::{CompressParams, CropParams};
use thiserror::Error;

/// Failure while decoding, transforming, or re-encoding a payload.
///
/// Non-retryable: the same input will fail the same way. Surfaced to the
/// caller as a per-item outcome, never crashing the batch.
#[derive(Error, Debug)]
pub enum TranscodeError {
    #[error("could not decode image: {0}")]
    Decode(String),
    #[error("could not encode image: {0}")]
    Encode(String),
    #[error("crop rectangle does not intersect the image")]
    EmptyCrop,
    #[error("invalid transform: {0}")]
    InvalidTransform(String),
}

/// Result of a probe operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn aspect(&self) -> f64 {
        self.width as f64 / self.height.max(1) as f64
    }

    pub fn as_tuple(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// An encoded payload plus its realized pixel dimensions.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Trait for transcoding backends.
///
/// `Sync` because batch processing fans items out across rayon workers
/// that share one backend instance.
pub trait RasterBackend: Sync {
    /// Read pixel dimensions from the payload's header without a full
    /// decode. Any buffers allocated are dropped before returning.
    fn probe(&self, bytes: &[u8]) -> Result<Dimensions, TranscodeError>;

    /// Decode, resize into the pixel bounds if needed (uniform scale,
    /// never distorting), and re-encode at the given quality.
    /// Re-encoding happens unconditionally — resizing is conditional.
    fn compress(&self, params: &CompressParams<'_>) -> Result<EncodedImage, TranscodeError>;

    /// Crop a clamped region out of the source, scale it to the output
    /// dimensions, apply rotation/zoom about the output center, and
    /// re-encode at the given quality.
    fn crop(&self, params: &CropParams<'_>) -> Result<EncodedImage, TranscodeError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::transcode::calculations::{clamp_crop_rect, crop_output_dimensions};
    use std::sync::Mutex;

    /// Mock backend that records operations without decoding anything.
    /// Uses Mutex (not RefCell) so it is Sync and works with rayon.
    ///
    /// `probe` and the decode step of `compress`/`crop` pop queued
    /// dimensions; an empty queue makes the operation fail, which doubles
    /// as the transcode-failure injection point.
    #[derive(Default)]
    pub struct MockBackend {
        pub probe_results: Mutex<Vec<Dimensions>>,
        pub decode_results: Mutex<Vec<Dimensions>>,
        pub operations: Mutex<Vec<RecordedOp>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Probe,
        Compress {
            max_width: u32,
            max_height: u32,
            quality: u32,
        },
        Crop {
            x: u32,
            y: u32,
            width: u32,
            height: u32,
            out_width: u32,
            out_height: u32,
            quality: u32,
        },
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue the same dimensions for `count` probes and decodes.
        pub fn with_source(width: u32, height: u32, count: usize) -> Self {
            Self {
                probe_results: Mutex::new(vec![Dimensions { width, height }; count]),
                decode_results: Mutex::new(vec![Dimensions { width, height }; count]),
                operations: Mutex::new(Vec::new()),
            }
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        pub fn operation_count(&self) -> usize {
            self.operations.lock().unwrap().len()
        }
    }

    impl RasterBackend for MockBackend {
        fn probe(&self, _bytes: &[u8]) -> Result<Dimensions, TranscodeError> {
            self.operations.lock().unwrap().push(RecordedOp::Probe);
            self.probe_results
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| TranscodeError::Decode("no mock probe result".to_string()))
        }

        fn compress(&self, params: &CompressParams<'_>) -> Result<EncodedImage, TranscodeError> {
            self.operations.lock().unwrap().push(RecordedOp::Compress {
                max_width: params.max_width,
                max_height: params.max_height,
                quality: params.quality.value(),
            });

            let dims = self
                .decode_results
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| TranscodeError::Decode("no mock decode result".to_string()))?;

            let (width, height) = crate::transcode::fit_within(
                dims.as_tuple(),
                (params.max_width, params.max_height),
            );
            Ok(EncodedImage {
                // Length scales with the area so stats look plausible.
                bytes: vec![0u8; (width as usize * height as usize) / 8 + 16],
                width,
                height,
            })
        }

        fn crop(&self, params: &CropParams<'_>) -> Result<EncodedImage, TranscodeError> {
            let dims = self
                .decode_results
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| TranscodeError::Decode("no mock decode result".to_string()))?;

            let rect =
                clamp_crop_rect(&params.crop, dims.as_tuple()).ok_or(TranscodeError::EmptyCrop)?;
            let (out_width, out_height) = crop_output_dimensions(
                (rect.width, rect.height),
                params.output,
                (params.max_width, params.max_height),
            );

            self.operations.lock().unwrap().push(RecordedOp::Crop {
                x: rect.x,
                y: rect.y,
                width: rect.width,
                height: rect.height,
                out_width,
                out_height,
                quality: params.quality.value(),
            });

            Ok(EncodedImage {
                bytes: vec![0u8; (out_width as usize * out_height as usize) / 8 + 16],
                width: out_width,
                height: out_height,
            })
        }
    }

    #[test]
    fn mock_records_probe() {
        let backend = MockBackend::with_source(800, 600, 1);
        let dims = backend.probe(&[]).unwrap();
        assert_eq!(dims.width, 800);
        assert_eq!(dims.height, 600);
        assert_eq!(backend.get_operations(), vec![RecordedOp::Probe]);
    }

    #[test]
    fn mock_compress_applies_fit_policy() {
        let backend = MockBackend::with_source(2000, 1000, 1);
        let encoded = backend
            .compress(&CompressParams {
                source: &[],
                max_width: 800,
                max_height: 800,
                quality: crate::transcode::Quality::new(85),
            })
            .unwrap();
        assert_eq!((encoded.width, encoded.height), (800, 400));
    }

    #[test]
    fn mock_fails_when_queue_is_dry() {
        let backend = MockBackend::new();
        let result = backend.compress(&CompressParams {
            source: &[],
            max_width: 800,
            max_height: 800,
            quality: crate::transcode::Quality::default(),
        });
        assert!(matches!(result, Err(TranscodeError::Decode(_))));
    }
}
