//! Transcoding backend built on the `image` crate — pure Rust, statically
//! linked.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Probe (JPEG, PNG, GIF, WebP) | `ImageReader::into_dimensions` (header only) |
//! | Decode | `image` crate decoders via `ImageReader` |
//! | Resize | `image::imageops::resize` with `Lanczos3` filter |
//! | Crop | `image::imageops::crop_imm` |
//! | Rotate + zoom | custom inverse-mapped bilinear resampler |
//! | Encode | `image::codecs::jpeg::JpegEncoder` at profile quality |
//!
//! Output is always JPEG: the quality factor needs a lossy target, and a
//! single normalized output format keeps the persistence layer simple.
//! Alpha is flattened over white before encoding.

use super::backend::{Dimensions, EncodedImage, RasterBackend, TranscodeError};
use super::calculations::{clamp_crop_rect, crop_output_dimensions, fit_within};
use super::params::{CompressParams, CropParams, Quality};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, ImageReader, Rgb, RgbImage};
use std::io::Cursor;

/// Backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct ImageCrateBackend;

impl ImageCrateBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ImageCrateBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode an in-memory payload, sniffing the container format from magic
/// bytes rather than trusting the caller's declared format.
fn decode(bytes: &[u8]) -> Result<DynamicImage, TranscodeError> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| TranscodeError::Decode(e.to_string()))?
        .decode()
        .map_err(|e| TranscodeError::Decode(e.to_string()))
}

/// Flatten any pixel layout to RGB8, compositing alpha over white.
/// JPEG has no alpha channel, so transparency must resolve to something
/// deterministic before encoding.
fn flatten_to_rgb(img: DynamicImage) -> RgbImage {
    match img {
        DynamicImage::ImageRgb8(rgb) => rgb,
        other => {
            let rgba = other.to_rgba8();
            let (w, h) = rgba.dimensions();
            let mut out = RgbImage::new(w, h);
            for (x, y, px) in rgba.enumerate_pixels() {
                let [r, g, b, a] = px.0;
                let a = a as u32;
                let blend = |c: u8| (((c as u32 * a) + 255 * (255 - a) + 127) / 255) as u8;
                out.put_pixel(x, y, Rgb([blend(r), blend(g), blend(b)]));
            }
            out
        }
    }
}

/// Encode RGB8 pixels as JPEG at the given quality.
fn encode_jpeg(img: &RgbImage, quality: Quality) -> Result<Vec<u8>, TranscodeError> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality.value() as u8)
        .write_image(
            img.as_raw(),
            img.width(),
            img.height(),
            ExtendedColorType::Rgb8,
        )
        .map_err(|e| TranscodeError::Encode(e.to_string()))?;
    Ok(buf)
}

/// Apply rotation and uniform zoom about the canvas center, in that order:
/// translate-to-center → rotate → scale → translate-back.
///
/// Implemented as inverse mapping: each output pixel is pulled through the
/// inverted transform and bilinearly sampled from the source. Pixels whose
/// preimage falls outside the source fill with white, matching the alpha
/// flattening background. Canvas dimensions are unchanged.
fn canvas_transform(src: &RgbImage, rotate_deg: f64, scale: f64) -> RgbImage {
    let (w, h) = src.dimensions();
    let cx = (w as f64 - 1.0) / 2.0;
    let cy = (h as f64 - 1.0) / 2.0;
    let theta = rotate_deg.to_radians();
    let (sin, cos) = theta.sin_cos();
    let inv_scale = 1.0 / scale;

    let mut out = RgbImage::from_pixel(w, h, Rgb([255, 255, 255]));
    for y in 0..h {
        for x in 0..w {
            let dx = x as f64 - cx;
            let dy = y as f64 - cy;
            // Inverse of S·R about the center: rotate by -θ, then unscale.
            let sx = cx + (dx * cos + dy * sin) * inv_scale;
            let sy = cy + (-dx * sin + dy * cos) * inv_scale;
            if let Some(px) = sample_bilinear(src, sx, sy) {
                out.put_pixel(x, y, px);
            }
        }
    }
    out
}

/// Bilinear sample at fractional coordinates; `None` outside the image.
fn sample_bilinear(img: &RgbImage, x: f64, y: f64) -> Option<Rgb<u8>> {
    let (w, h) = img.dimensions();
    let x0 = x.floor();
    let y0 = y.floor();
    if x0 < 0.0 || y0 < 0.0 || x0 >= w as f64 || y0 >= h as f64 {
        return None;
    }

    let xi = x0 as u32;
    let yi = y0 as u32;
    let xn = (xi + 1).min(w - 1);
    let yn = (yi + 1).min(h - 1);
    let fx = x - x0;
    let fy = y - y0;

    let p00 = img.get_pixel(xi, yi).0;
    let p10 = img.get_pixel(xn, yi).0;
    let p01 = img.get_pixel(xi, yn).0;
    let p11 = img.get_pixel(xn, yn).0;

    let mut out = [0u8; 3];
    for c in 0..3 {
        let top = p00[c] as f64 * (1.0 - fx) + p10[c] as f64 * fx;
        let bottom = p01[c] as f64 * (1.0 - fx) + p11[c] as f64 * fx;
        out[c] = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }
    Some(Rgb(out))
}

impl RasterBackend for ImageCrateBackend {
    fn probe(&self, bytes: &[u8]) -> Result<Dimensions, TranscodeError> {
        let (width, height) = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| TranscodeError::Decode(e.to_string()))?
            .into_dimensions()
            .map_err(|e| TranscodeError::Decode(e.to_string()))?;
        Ok(Dimensions { width, height })
    }

    fn compress(&self, params: &CompressParams<'_>) -> Result<EncodedImage, TranscodeError> {
        let rgb = flatten_to_rgb(decode(params.source)?);
        let (w, h) = rgb.dimensions();
        let (tw, th) = fit_within((w, h), (params.max_width, params.max_height));

        let resized = if (tw, th) == (w, h) {
            rgb
        } else {
            image::imageops::resize(&rgb, tw, th, FilterType::Lanczos3)
        };

        let bytes = encode_jpeg(&resized, params.quality)?;
        Ok(EncodedImage {
            bytes,
            width: tw,
            height: th,
        })
    }

    fn crop(&self, params: &CropParams<'_>) -> Result<EncodedImage, TranscodeError> {
        if params.crop.scale <= 0.0 {
            return Err(TranscodeError::InvalidTransform(format!(
                "scale must be positive, got {}",
                params.crop.scale
            )));
        }

        let rgb = flatten_to_rgb(decode(params.source)?);
        let rect = clamp_crop_rect(&params.crop, rgb.dimensions()).ok_or(TranscodeError::EmptyCrop)?;
        let region =
            image::imageops::crop_imm(&rgb, rect.x, rect.y, rect.width, rect.height).to_image();

        let (out_w, out_h) = crop_output_dimensions(
            (rect.width, rect.height),
            params.output,
            (params.max_width, params.max_height),
        );
        let scaled = if (out_w, out_h) == (rect.width, rect.height) {
            region
        } else {
            image::imageops::resize(&region, out_w, out_h, FilterType::Lanczos3)
        };

        let final_img = if params.crop.is_identity_transform() {
            scaled
        } else {
            canvas_transform(&scaled, params.crop.rotate_deg, params.crop.scale)
        };

        let bytes = encode_jpeg(&final_img, params.quality)?;
        Ok(EncodedImage {
            bytes,
            width: out_w,
            height: out_h,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcode::params::CropSettings;
    use image::{ImageFormat, Rgba, RgbaImage};

    /// Encode a small valid JPEG with a horizontal color gradient.
    fn test_jpeg(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        });
        encode_jpeg(&img, Quality::new(90)).unwrap()
    }

    /// Encode a PNG whose left half is fully transparent.
    fn test_png_half_transparent(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_fn(width, height, |x, _| {
            if x < width / 2 {
                Rgba([0, 0, 0, 0])
            } else {
                Rgba([200, 30, 30, 255])
            }
        });
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    fn backend() -> ImageCrateBackend {
        ImageCrateBackend::new()
    }

    #[test]
    fn probe_reads_header_dimensions() {
        let bytes = test_jpeg(200, 150);
        let dims = backend().probe(&bytes).unwrap();
        assert_eq!((dims.width, dims.height), (200, 150));
    }

    #[test]
    fn probe_garbage_errors() {
        let result = backend().probe(&[0u8; 64]);
        assert!(matches!(result, Err(TranscodeError::Decode(_))));
    }

    #[test]
    fn compress_scales_into_bounds() {
        let bytes = test_jpeg(400, 200);
        let encoded = backend()
            .compress(&CompressParams {
                source: &bytes,
                max_width: 100,
                max_height: 100,
                quality: Quality::new(85),
            })
            .unwrap();
        assert_eq!((encoded.width, encoded.height), (100, 50));

        // The realized payload decodes to the reported dimensions.
        let dims = backend().probe(&encoded.bytes).unwrap();
        assert_eq!((dims.width, dims.height), (100, 50));
    }

    #[test]
    fn compress_reencodes_even_without_resize() {
        let bytes = test_jpeg(80, 60);
        let encoded = backend()
            .compress(&CompressParams {
                source: &bytes,
                max_width: 800,
                max_height: 800,
                quality: Quality::new(40),
            })
            .unwrap();
        assert_eq!((encoded.width, encoded.height), (80, 60));
        // Re-encoded at a different quality — not a passthrough of the input.
        assert_ne!(encoded.bytes, bytes);
    }

    #[test]
    fn compress_twice_is_a_dimension_fixed_point() {
        let bytes = test_jpeg(400, 300);
        let params = |source| CompressParams {
            source,
            max_width: 128,
            max_height: 128,
            quality: Quality::new(85),
        };
        let once = backend().compress(&params(&bytes)).unwrap();
        let twice = backend().compress(&params(&once.bytes)).unwrap();
        assert_eq!((once.width, once.height), (twice.width, twice.height));
    }

    #[test]
    fn compress_flattens_alpha_over_white() {
        let bytes = test_png_half_transparent(64, 64);
        let encoded = backend()
            .compress(&CompressParams {
                source: &bytes,
                max_width: 128,
                max_height: 128,
                quality: Quality::new(95),
            })
            .unwrap();

        let decoded = decode(&encoded.bytes).unwrap().to_rgb8();
        // A pixel deep inside the transparent half is near-white.
        let px = decoded.get_pixel(8, 32).0;
        assert!(px.iter().all(|&c| c > 230), "expected white, got {px:?}");
    }

    #[test]
    fn crop_clamps_rect_hanging_off_the_edge() {
        let bytes = test_jpeg(200, 100);
        let encoded = backend()
            .crop(&CropParams {
                source: &bytes,
                crop: CropSettings::rect(-10, 0, 100, 100),
                output: None,
                max_width: 800,
                max_height: 800,
                quality: Quality::new(85),
            })
            .unwrap();
        // Intersection is 90x100.
        assert_eq!((encoded.width, encoded.height), (90, 100));
    }

    #[test]
    fn crop_scales_region_to_explicit_output() {
        let bytes = test_jpeg(300, 300);
        let encoded = backend()
            .crop(&CropParams {
                source: &bytes,
                crop: CropSettings::rect(50, 50, 100, 100),
                output: Some((256, 256)),
                max_width: 800,
                max_height: 800,
                quality: Quality::new(85),
            })
            .unwrap();
        assert_eq!((encoded.width, encoded.height), (256, 256));
    }

    #[test]
    fn crop_disjoint_rect_errors() {
        let bytes = test_jpeg(100, 100);
        let result = backend().crop(&CropParams {
            source: &bytes,
            crop: CropSettings::rect(500, 500, 50, 50),
            output: None,
            max_width: 800,
            max_height: 800,
            quality: Quality::new(85),
        });
        assert!(matches!(result, Err(TranscodeError::EmptyCrop)));
    }

    #[test]
    fn crop_zero_scale_errors() {
        let bytes = test_jpeg(100, 100);
        let mut crop = CropSettings::rect(0, 0, 50, 50);
        crop.scale = 0.0;
        let result = backend().crop(&CropParams {
            source: &bytes,
            crop,
            output: None,
            max_width: 800,
            max_height: 800,
            quality: Quality::new(85),
        });
        assert!(matches!(result, Err(TranscodeError::InvalidTransform(_))));
    }

    #[test]
    fn rotation_180_mirrors_the_canvas() {
        // Left half red, right half blue; after a 180° turn the halves swap.
        let img = RgbImage::from_fn(32, 32, |x, _| {
            if x < 16 { Rgb([220, 20, 20]) } else { Rgb([20, 20, 220]) }
        });
        let turned = canvas_transform(&img, 180.0, 1.0);
        assert_eq!(turned.dimensions(), (32, 32));

        let left = turned.get_pixel(4, 16).0;
        let right = turned.get_pixel(28, 16).0;
        assert!(left[2] > left[0], "left should now be blue, got {left:?}");
        assert!(right[0] > right[2], "right should now be red, got {right:?}");
    }

    #[test]
    fn zoom_magnifies_the_center() {
        // 30x30 red block centered in white; at 2x zoom the corners of the
        // canvas sample from inside the block.
        let img = RgbImage::from_fn(40, 40, |x, y| {
            if (5..35).contains(&x) && (5..35).contains(&y) {
                Rgb([220, 20, 20])
            } else {
                Rgb([255, 255, 255])
            }
        });
        assert_eq!(img.get_pixel(0, 0).0, [255, 255, 255]);

        let zoomed = canvas_transform(&img, 0.0, 2.0);
        let corner = zoomed.get_pixel(0, 0).0;
        assert!(corner[0] > 150 && corner[1] < 100, "expected red, got {corner:?}");
    }

    #[test]
    fn transform_preimage_outside_source_fills_white() {
        // Zooming out pulls in samples from beyond the source edges.
        let img = RgbImage::from_pixel(20, 20, Rgb([0, 0, 0]));
        let shrunk = canvas_transform(&img, 0.0, 0.5);
        assert_eq!(shrunk.get_pixel(0, 0).0, [255, 255, 255]);
        // The center still samples the source.
        assert_eq!(shrunk.get_pixel(10, 10).0, [0, 0, 0]);
    }
}
