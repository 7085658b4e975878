//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

use super::params::CropSettings;

/// A crop rectangle after clamping: guaranteed to lie fully inside the
/// source image, with non-zero area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Scale dimensions down to fit inside `bounds`, preserving aspect ratio.
///
/// Both dimensions are scaled by `min(bw/w, bh/h)` — a uniform factor, so
/// the aspect ratio never distorts. Dimensions already within bounds are
/// returned unchanged, which makes the function a fixed point on its own
/// output: once within bounds, repeated application changes nothing.
///
/// # Examples
/// ```
/// # use imageprep::transcode::fit_within;
/// // 2000x1000 into 800x800 → scaled by 800/2000
/// assert_eq!(fit_within((2000, 1000), (800, 800)), (800, 400));
///
/// // already inside → unchanged
/// assert_eq!(fit_within((640, 480), (800, 800)), (640, 480));
/// ```
pub fn fit_within(source: (u32, u32), bounds: (u32, u32)) -> (u32, u32) {
    let (w, h) = source;
    let (bw, bh) = bounds;

    if w <= bw && h <= bh {
        return (w, h);
    }

    let scale = (bw as f64 / w as f64).min(bh as f64 / h as f64);
    let out_w = ((w as f64 * scale).round() as u32).max(1);
    let out_h = ((h as f64 * scale).round() as u32).max(1);
    (out_w, out_h)
}

/// Scale dimensions to fit inside `target`, preserving aspect ratio,
/// scaling up as well as down. Used for explicit crop output canvases
/// (fixed avatar/banner shapes) where a small crop region must fill the
/// canvas.
pub fn fit_exact(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (w, h) = source;
    let (tw, th) = target;

    let scale = (tw as f64 / w as f64).min(th as f64 / h as f64);
    let out_w = ((w as f64 * scale).round() as u32).max(1);
    let out_h = ((h as f64 * scale).round() as u32).max(1);
    (out_w, out_h)
}

/// Clamp a crop rectangle into `[0, source_w] × [0, source_h]`.
///
/// The incoming rectangle may hang over any edge (interactive crop UIs
/// routinely report `x = -10` while dragging); only the intersection with
/// the source is read. Returns `None` when the intersection is empty —
/// the rectangle lies entirely outside the image.
pub fn clamp_crop_rect(crop: &CropSettings, source: (u32, u32)) -> Option<CropRect> {
    let (sw, sh) = (source.0 as i64, source.1 as i64);

    let left = crop.x.clamp(0, sw);
    let top = crop.y.clamp(0, sh);
    let right = (crop.x + crop.width as i64).clamp(0, sw);
    let bottom = (crop.y + crop.height as i64).clamp(0, sh);

    let width = right - left;
    let height = bottom - top;
    if width <= 0 || height <= 0 {
        return None;
    }

    Some(CropRect {
        x: left as u32,
        y: top as u32,
        width: width as u32,
        height: height as u32,
    })
}

/// Output dimensions for a cropped region.
///
/// With an explicit output canvas the region is scaled (up or down) to fit
/// it uniformly — the aspect ratio of the crop rectangle is preserved,
/// never stretched. Without one, the region only shrinks into the
/// profile's pixel bounds, same policy as compression.
pub fn crop_output_dimensions(
    region: (u32, u32),
    explicit: Option<(u32, u32)>,
    bounds: (u32, u32),
) -> (u32, u32) {
    match explicit {
        Some(target) => fit_exact(region, target),
        None => fit_within(region, bounds),
    }
}

/// The largest centered crop rectangle with the given aspect ratio.
///
/// Used by non-interactive callers (the CLI) to satisfy a profile's
/// required crop without a human dragging a rectangle.
pub fn centered_crop(source: (u32, u32), aspect: f64) -> CropSettings {
    let (w, h) = source;
    let source_aspect = w as f64 / h as f64;

    let (cw, ch) = if source_aspect > aspect {
        // Source is wider: full height, trimmed width.
        let cw = ((h as f64 * aspect).round() as u32).clamp(1, w);
        (cw, h)
    } else {
        // Source is taller (or equal): full width, trimmed height.
        let ch = ((w as f64 / aspect).round() as u32).clamp(1, h);
        (w, ch)
    };

    CropSettings::rect(
        ((w - cw) / 2) as i64,
        ((h - ch) / 2) as i64,
        cw,
        ch,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // fit_within tests
    // =========================================================================

    #[test]
    fn fit_within_scales_uniformly() {
        // 2000x1000 into 800x800: limited by width, 800/2000 = 0.4
        assert_eq!(fit_within((2000, 1000), (800, 800)), (800, 400));
        // 1000x2000 into 800x800: limited by height
        assert_eq!(fit_within((1000, 2000), (800, 800)), (400, 800));
    }

    #[test]
    fn fit_within_keeps_small_images() {
        assert_eq!(fit_within((640, 480), (800, 800)), (640, 480));
        assert_eq!(fit_within((800, 800), (800, 800)), (800, 800));
    }

    #[test]
    fn fit_within_is_a_fixed_point() {
        let once = fit_within((3123, 1777), (800, 600));
        let twice = fit_within(once, (800, 600));
        assert_eq!(once, twice);
        assert!(once.0 <= 800 && once.1 <= 600);
    }

    #[test]
    fn fit_within_preserves_aspect_within_rounding() {
        let (w, h) = fit_within((2000, 1000), (799, 799));
        let original = 2000.0 / 1000.0;
        let scaled = w as f64 / h as f64;
        assert!((original - scaled).abs() < 0.01);
    }

    #[test]
    fn fit_within_never_collapses_to_zero() {
        // Extreme panorama: the short edge survives as 1px.
        assert_eq!(fit_within((10_000, 10), (100, 100)), (100, 1));
        assert_eq!(fit_within((20_000, 4), (100, 100)), (100, 1));
    }

    // =========================================================================
    // fit_exact tests
    // =========================================================================

    #[test]
    fn fit_exact_scales_up() {
        assert_eq!(fit_exact((100, 100), (256, 256)), (256, 256));
        // 50x40 into 256x256: limited by width factor 5.12 vs 6.4
        assert_eq!(fit_exact((50, 40), (256, 256)), (256, 205));
    }

    #[test]
    fn fit_exact_scales_down() {
        assert_eq!(fit_exact((1000, 1000), (256, 256)), (256, 256));
    }

    // =========================================================================
    // clamp_crop_rect tests
    // =========================================================================

    #[test]
    fn clamp_passes_through_inside_rect() {
        let crop = CropSettings::rect(100, 50, 300, 200);
        let rect = clamp_crop_rect(&crop, (800, 600)).unwrap();
        assert_eq!(
            rect,
            CropRect {
                x: 100,
                y: 50,
                width: 300,
                height: 200
            }
        );
    }

    #[test]
    fn clamp_trims_negative_origin() {
        // x = -10 drags in from the left edge: only the intersection reads.
        let crop = CropSettings::rect(-10, 0, 100, 100);
        let rect = clamp_crop_rect(&crop, (800, 600)).unwrap();
        assert_eq!(rect.x, 0);
        assert_eq!(rect.width, 90);
    }

    #[test]
    fn clamp_trims_overhang_on_far_edges() {
        // Spec-style square crop hanging past the bottom of a 2000x1000.
        let crop = CropSettings::rect(600, 0, 1000, 1000);
        let rect = clamp_crop_rect(&crop, (2000, 1000)).unwrap();
        assert_eq!(
            rect,
            CropRect {
                x: 600,
                y: 0,
                width: 1000,
                height: 1000
            }
        );

        let crop = CropSettings::rect(1500, 700, 1000, 1000);
        let rect = clamp_crop_rect(&crop, (2000, 1000)).unwrap();
        assert_eq!(rect.width, 500);
        assert_eq!(rect.height, 300);
    }

    #[test]
    fn clamp_rejects_disjoint_rect() {
        let crop = CropSettings::rect(900, 700, 50, 50);
        assert!(clamp_crop_rect(&crop, (800, 600)).is_none());

        let crop = CropSettings::rect(-200, -200, 100, 100);
        assert!(clamp_crop_rect(&crop, (800, 600)).is_none());
    }

    // =========================================================================
    // crop_output_dimensions tests
    // =========================================================================

    #[test]
    fn crop_output_shrinks_into_bounds_without_explicit_canvas() {
        // 1000x1000 region, 800x800 bounds → 800x800
        assert_eq!(
            crop_output_dimensions((1000, 1000), None, (800, 800)),
            (800, 800)
        );
        // Small region stays small — no upscale without an explicit canvas.
        assert_eq!(
            crop_output_dimensions((300, 300), None, (800, 800)),
            (300, 300)
        );
    }

    #[test]
    fn crop_output_fills_explicit_canvas() {
        assert_eq!(
            crop_output_dimensions((300, 300), Some((256, 256)), (800, 800)),
            (256, 256)
        );
        // Upscale into a fixed canvas.
        assert_eq!(
            crop_output_dimensions((100, 100), Some((256, 256)), (800, 800)),
            (256, 256)
        );
    }

    // =========================================================================
    // centered_crop tests
    // =========================================================================

    #[test]
    fn centered_square_from_landscape() {
        let crop = centered_crop((2000, 1000), 1.0);
        assert_eq!((crop.width, crop.height), (1000, 1000));
        assert_eq!((crop.x, crop.y), (500, 0));
    }

    #[test]
    fn centered_square_from_portrait() {
        let crop = centered_crop((600, 900), 1.0);
        assert_eq!((crop.width, crop.height), (600, 600));
        assert_eq!((crop.x, crop.y), (0, 150));
    }

    #[test]
    fn centered_wide_aspect() {
        let crop = centered_crop((1200, 1200), 2.4);
        assert_eq!((crop.width, crop.height), (1200, 500));
        assert_eq!((crop.x, crop.y), (0, 350));
    }

    #[test]
    fn centered_crop_of_exact_aspect_is_full_frame() {
        let crop = centered_crop((800, 400), 2.0);
        assert_eq!((crop.x, crop.y, crop.width, crop.height), (0, 0, 800, 400));
    }
}
