//! Raster transcoding — pure Rust, zero external dependencies.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Probe** | `ImageReader::into_dimensions` (header only) |
//! | **Compress** | Lanczos3 resize into bounds + JPEG encode at quality |
//! | **Crop** | clamp + `crop_imm` + resize + rotate/zoom resampler |
//!
//! The module is split into:
//! - **Calculations**: pure functions for dimension math (unit testable)
//! - **Parameters**: data structures describing transcode operations
//! - **Backend**: [`RasterBackend`] trait + [`ImageCrateBackend`]

pub mod backend;
mod calculations;
pub mod image_backend;
mod params;

pub use backend::{Dimensions, EncodedImage, RasterBackend, TranscodeError};
pub use calculations::{
    CropRect, centered_crop, clamp_crop_rect, crop_output_dimensions, fit_exact, fit_within,
};
pub use image_backend::ImageCrateBackend;
pub use params::{CompressParams, CropParams, CropSettings, Quality};
