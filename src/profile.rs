//! Upload profiles: the immutable constraint bundle applied to one upload
//! site.
//!
//! A profile is created once per call site and never mutated. Built-in
//! presets cover the storefront's upload sites (`logo`, `banner`,
//! `product-gallery`, `avatar`); custom sets load from a TOML file with
//! one `[profiles.<name>]` table per profile. `stock_profiles_toml()`
//! returns a fully documented starting file for the `gen-profiles`
//! command.

use crate::transcode::Quality;
use image::ImageFormat;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("could not read profile file: {0}")]
    Read(#[from] std::io::Error),
    #[error("could not parse profile file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("profile {profile:?} allows unknown format {format:?}")]
    UnknownFormat { profile: String, format: String },
    #[error("profile {profile:?} allows no formats")]
    NoFormats { profile: String },
    #[error("profile {profile:?} has zero pixel bounds")]
    ZeroBounds { profile: String },
    #[error("no profile named {0:?}")]
    UnknownProfile(String),
}

/// Declared formats the pipeline understands, as `(name, format)` pairs.
/// Both bare extensions and mime types are accepted where files declare
/// themselves either way.
const FORMAT_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("image/jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("image/png", ImageFormat::Png),
    ("gif", ImageFormat::Gif),
    ("image/gif", ImageFormat::Gif),
    ("webp", ImageFormat::WebP),
    ("image/webp", ImageFormat::WebP),
];

/// Parse a declared format string (`"jpg"`, `"image/png"`, ...) into the
/// format vocabulary. Case-insensitive. `None` for anything unknown.
pub fn parse_format(declared: &str) -> Option<ImageFormat> {
    let declared = declared.trim().to_ascii_lowercase();
    FORMAT_CANDIDATES
        .iter()
        .find(|(name, _)| *name == declared)
        .map(|(_, format)| *format)
}

/// Constraint bundle for one upload site. Fields are public and the value
/// is treated as immutable after construction.
#[derive(Debug, Clone)]
pub struct Profile {
    pub name: String,
    pub max_size_bytes: u64,
    pub allowed_formats: Vec<ImageFormat>,
    /// Output pixel bounds for compression. Oversized sources are scaled
    /// into these, never rejected for exceeding them.
    pub max_width: u32,
    pub max_height: u32,
    pub quality: Quality,
    /// Advisory aspect ratio (width / height). Deviations beyond the
    /// tolerance produce a warning, never a rejection.
    pub aspect_ratio: Option<f64>,
    pub aspect_tolerance: f64,
    /// Minimum acceptable source dimensions; below these the file is
    /// rejected with `DimensionTooSmall`.
    pub min_dimensions: Option<(u32, u32)>,
    /// Hard ceiling on source dimensions (decode-bomb guard); above these
    /// the file is rejected with `DimensionTooLarge`.
    pub max_source_dimensions: Option<(u32, u32)>,
    pub required_crop: bool,
    /// When a required crop is pending after admission, open the first
    /// item's crop session automatically.
    pub auto_open_crop: bool,
    /// Explicit crop output canvas. The cropped region is scaled (up or
    /// down) to fit it; without one the region only shrinks into
    /// `max_width` × `max_height`.
    pub crop_output: Option<(u32, u32)>,
    pub crop_quality: Option<Quality>,
    /// Whether the upload site takes several images. `false` means a new
    /// admission replaces the current item.
    pub multiple: bool,
    pub max_items: usize,
}

impl Profile {
    /// Square product photos for the catalog gallery.
    pub fn product_gallery() -> Self {
        Self {
            name: "product-gallery".to_string(),
            max_size_bytes: 5_000_000,
            allowed_formats: vec![ImageFormat::Jpeg, ImageFormat::Png, ImageFormat::WebP],
            max_width: 1600,
            max_height: 1600,
            quality: Quality::new(85),
            aspect_ratio: Some(1.0),
            aspect_tolerance: 0.1,
            min_dimensions: Some((400, 400)),
            max_source_dimensions: None,
            required_crop: false,
            auto_open_crop: false,
            crop_output: None,
            crop_quality: None,
            multiple: true,
            max_items: 8,
        }
    }

    /// Store logo: small, single, any reasonable shape.
    pub fn logo() -> Self {
        Self {
            name: "logo".to_string(),
            max_size_bytes: 2_000_000,
            allowed_formats: vec![ImageFormat::Png, ImageFormat::Jpeg, ImageFormat::WebP],
            max_width: 512,
            max_height: 512,
            quality: Quality::new(90),
            aspect_ratio: None,
            aspect_tolerance: 0.1,
            min_dimensions: None,
            max_source_dimensions: None,
            required_crop: false,
            auto_open_crop: false,
            crop_output: None,
            crop_quality: None,
            multiple: false,
            max_items: 1,
        }
    }

    /// Homepage hero banner: fixed wide canvas, crop always required.
    pub fn banner() -> Self {
        Self {
            name: "banner".to_string(),
            max_size_bytes: 8_000_000,
            allowed_formats: vec![ImageFormat::Jpeg, ImageFormat::Png, ImageFormat::WebP],
            max_width: 2400,
            max_height: 1200,
            quality: Quality::new(82),
            aspect_ratio: Some(2.4),
            aspect_tolerance: 0.15,
            min_dimensions: Some((1200, 500)),
            max_source_dimensions: None,
            required_crop: true,
            auto_open_crop: true,
            crop_output: Some((2400, 1000)),
            crop_quality: None,
            multiple: false,
            max_items: 1,
        }
    }

    /// Account avatar: tiny fixed square canvas.
    pub fn avatar() -> Self {
        Self {
            name: "avatar".to_string(),
            max_size_bytes: 1_000_000,
            allowed_formats: vec![ImageFormat::Jpeg, ImageFormat::Png],
            max_width: 256,
            max_height: 256,
            quality: Quality::new(80),
            aspect_ratio: Some(1.0),
            aspect_tolerance: 0.05,
            min_dimensions: Some((128, 128)),
            max_source_dimensions: Some((8000, 8000)),
            required_crop: true,
            auto_open_crop: true,
            crop_output: Some((256, 256)),
            crop_quality: Some(Quality::new(85)),
            multiple: false,
            max_items: 1,
        }
    }

    /// All built-in presets, in display order.
    pub fn presets() -> Vec<Profile> {
        vec![
            Self::product_gallery(),
            Self::banner(),
            Self::logo(),
            Self::avatar(),
        ]
    }

    /// Look up a built-in preset by name.
    pub fn preset(name: &str) -> Option<Profile> {
        Self::presets().into_iter().find(|p| p.name == name)
    }

    /// True when the profile's validator needs source dimensions.
    pub fn probes_dimensions(&self) -> bool {
        self.min_dimensions.is_some()
            || self.max_source_dimensions.is_some()
            || self.aspect_ratio.is_some()
    }
}

// ---------------------------------------------------------------------------
// TOML loading
// ---------------------------------------------------------------------------

fn default_aspect_tolerance() -> f64 {
    0.1
}

fn default_max_items() -> usize {
    1
}

/// Raw shape of one `[profiles.<name>]` table. Converted to [`Profile`]
/// with format-name validation after parsing.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProfileEntry {
    max_size_bytes: u64,
    allowed_formats: Vec<String>,
    max_width: u32,
    max_height: u32,
    quality: u32,
    aspect_ratio: Option<f64>,
    #[serde(default = "default_aspect_tolerance")]
    aspect_tolerance: f64,
    min_dimensions: Option<[u32; 2]>,
    max_source_dimensions: Option<[u32; 2]>,
    #[serde(default)]
    required_crop: bool,
    #[serde(default)]
    auto_open_crop: bool,
    crop_output: Option<[u32; 2]>,
    crop_quality: Option<u32>,
    #[serde(default)]
    multiple: bool,
    #[serde(default = "default_max_items")]
    max_items: usize,
}

#[derive(Debug, Deserialize)]
struct ProfileFile {
    profiles: BTreeMap<String, ProfileEntry>,
}

fn convert_entry(name: &str, entry: ProfileEntry) -> Result<Profile, ProfileError> {
    if entry.allowed_formats.is_empty() {
        return Err(ProfileError::NoFormats {
            profile: name.to_string(),
        });
    }
    if entry.max_width == 0 || entry.max_height == 0 {
        return Err(ProfileError::ZeroBounds {
            profile: name.to_string(),
        });
    }

    let mut allowed_formats = Vec::new();
    for raw in &entry.allowed_formats {
        let format = parse_format(raw).ok_or_else(|| ProfileError::UnknownFormat {
            profile: name.to_string(),
            format: raw.clone(),
        })?;
        if !allowed_formats.contains(&format) {
            allowed_formats.push(format);
        }
    }

    Ok(Profile {
        name: name.to_string(),
        max_size_bytes: entry.max_size_bytes,
        allowed_formats,
        max_width: entry.max_width,
        max_height: entry.max_height,
        quality: Quality::new(entry.quality),
        aspect_ratio: entry.aspect_ratio,
        aspect_tolerance: entry.aspect_tolerance,
        min_dimensions: entry.min_dimensions.map(|[w, h]| (w, h)),
        max_source_dimensions: entry.max_source_dimensions.map(|[w, h]| (w, h)),
        required_crop: entry.required_crop,
        auto_open_crop: entry.auto_open_crop,
        crop_output: entry.crop_output.map(|[w, h]| (w, h)),
        crop_quality: entry.crop_quality.map(Quality::new),
        multiple: entry.multiple,
        max_items: entry.max_items.max(1),
    })
}

/// Load all profiles from a TOML file, sorted by name.
pub fn load_profiles(path: &Path) -> Result<Vec<Profile>, ProfileError> {
    let content = std::fs::read_to_string(path)?;
    let file: ProfileFile = toml::from_str(&content)?;
    file.profiles
        .into_iter()
        .map(|(name, entry)| convert_entry(&name, entry))
        .collect()
}

/// Resolve a profile by name: a custom file (when given) takes precedence,
/// then the built-in presets.
pub fn resolve_profile(name: &str, file: Option<&Path>) -> Result<Profile, ProfileError> {
    if let Some(path) = file {
        if let Some(profile) = load_profiles(path)?.into_iter().find(|p| p.name == name) {
            return Ok(profile);
        }
    }
    Profile::preset(name).ok_or_else(|| ProfileError::UnknownProfile(name.to_string()))
}

/// A documented stock profiles file, printed by `gen-profiles`.
pub fn stock_profiles_toml() -> &'static str {
    r##"# imageprep profiles
#
# One [profiles.<name>] table per upload site. All sizes are pixels,
# all byte counts are bytes. Remove optional keys to disable a check.

[profiles.product-gallery]
max_size_bytes = 5000000
# Accepted declared formats: jpg/jpeg/png/gif/webp or their mime names.
allowed_formats = ["jpeg", "png", "webp"]
# Compression bounds. Larger sources are scaled into these, not rejected.
max_width = 1600
max_height = 1600
# Re-encoding quality, 1-100.
quality = 85
# Optional advisory aspect ratio (width / height) with tolerance.
# Deviations warn; they never reject.
aspect_ratio = 1.0
aspect_tolerance = 0.1
# Optional: reject sources smaller than this.
min_dimensions = [400, 400]
# Optional: reject sources larger than this (decode-bomb guard).
# max_source_dimensions = [12000, 12000]
# Interactive crop: required before an item can finalize?
required_crop = false
auto_open_crop = false
# Optional fixed crop canvas; the cropped region is scaled to fit it.
# crop_output = [1600, 1600]
# Optional crop-specific quality override.
# crop_quality = 90
# Cardinality of the upload site.
multiple = true
max_items = 8

[profiles.avatar]
max_size_bytes = 1000000
allowed_formats = ["jpeg", "png"]
max_width = 256
max_height = 256
quality = 80
aspect_ratio = 1.0
aspect_tolerance = 0.05
min_dimensions = [128, 128]
max_source_dimensions = [8000, 8000]
required_crop = true
auto_open_crop = true
crop_output = [256, 256]
crop_quality = 85
multiple = false
max_items = 1
"##
}
