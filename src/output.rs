//! CLI output formatting for batch events and outcomes.
//!
//! The core never prints: it emits [`BatchEvent`]s and returns structured
//! outcomes, and this module turns both into terminal lines. Each concern
//! has a `format_*` function (returns strings, pure, testable) and a
//! `print_*` wrapper that writes to stdout.
//!
//! # Display contract
//!
//! Every entity is a two-level display: a header line with a 3-digit
//! positional index and the file's identity, then indented context lines.
//!
//! ```text
//! Processed
//! 001 shirt-red.jpg
//!     1600x1600, 1.2 MB → 214.6 KB (17% of original)
//!     crop: applied
//! Rejected
//! 001 manual.pdf
//!     format "application/pdf" is not accepted here
//! ```

use crate::profile::Profile;
use crate::types::{Artifact, BatchEvent, RejectionReport};

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Render a byte count at a human scale.
pub fn human_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = 1024.0 * 1024.0;
    let b = bytes as f64;
    if b >= MB {
        format!("{:.1} MB", b / MB)
    } else if b >= KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{bytes} B")
    }
}

/// One display line for a live event, or `None` for events that are only
/// interesting to tests and debuggers (registry traffic, admissions that
/// the summary already covers).
pub fn format_event(event: &BatchEvent) -> Option<String> {
    match event {
        BatchEvent::ItemCompressed { id, stats } => Some(format!(
            "{id}: compressed {} → {}",
            human_size(stats.original_size),
            human_size(stats.final_size),
        )),
        BatchEvent::ItemRejected { name, reasons } => {
            let joined: Vec<String> = reasons.iter().map(|r| r.to_string()).collect();
            Some(format!("{name}: rejected ({})", joined.join("; ")))
        }
        BatchEvent::ItemFailed { name, error } => Some(format!("{name}: failed ({error})")),
        BatchEvent::Progress { completed, total } => {
            Some(format!("progress: {completed}/{total}"))
        }
        BatchEvent::CropOpened { id } => Some(format!("{id}: crop session opened")),
        BatchEvent::CropApplied { id } => Some(format!("{id}: crop applied")),
        BatchEvent::Uploaded { id, url } => Some(format!("{id}: persisted → {url}")),
        BatchEvent::UploadFailed { id, error } => Some(format!("{id}: upload failed ({error})")),
        BatchEvent::ItemAdmitted { .. }
        | BatchEvent::ItemRemoved { .. }
        | BatchEvent::PreviewRegistered { .. }
        | BatchEvent::PreviewReleased { .. }
        | BatchEvent::UploadStarted { .. }
        | BatchEvent::BatchCleared => None,
    }
}

/// Final batch summary: processed artifacts, then rejections and failures.
pub fn format_summary(
    artifacts: &[Artifact],
    rejections: &[RejectionReport],
    failures: &[(String, String)],
) -> Vec<String> {
    let mut lines = Vec::new();

    if !artifacts.is_empty() {
        lines.push("Processed".to_string());
        for (pos, artifact) in artifacts.iter().enumerate() {
            lines.push(format!("{} {}", format_index(pos + 1), artifact.name));
            let percent = if artifact.original_size == 0 {
                100
            } else {
                (artifact.final_size * 100 / artifact.original_size) as u32
            };
            lines.push(format!(
                "    {}x{}, {} → {} ({percent}% of original)",
                artifact.width,
                artifact.height,
                human_size(artifact.original_size),
                human_size(artifact.final_size),
            ));
            if artifact.crop_applied {
                lines.push("    crop: applied".to_string());
            }
            if let Some(url) = &artifact.persisted_url {
                lines.push(format!("    url: {url}"));
            }
        }
    }

    if !rejections.is_empty() {
        lines.push("Rejected".to_string());
        for (pos, rejection) in rejections.iter().enumerate() {
            lines.push(format!("{} {}", format_index(pos + 1), rejection.name));
            for reason in &rejection.reasons {
                lines.push(format!("    {reason}"));
            }
        }
    }

    if !failures.is_empty() {
        lines.push("Failed".to_string());
        for (pos, (name, error)) in failures.iter().enumerate() {
            lines.push(format!("{} {}", format_index(pos + 1), name));
            lines.push(format!("    {error}"));
        }
    }

    if lines.is_empty() {
        lines.push("Nothing to do".to_string());
    }
    lines
}

/// One profile as a header plus indented constraint lines.
pub fn format_profile(profile: &Profile) -> Vec<String> {
    let mut lines = vec![profile.name.clone()];
    let formats: Vec<&str> = profile
        .allowed_formats
        .iter()
        .map(|f| f.extensions_str()[0])
        .collect();
    lines.push(format!(
        "    formats: {}, up to {}",
        formats.join("/"),
        human_size(profile.max_size_bytes)
    ));
    lines.push(format!(
        "    output: {}x{} max, quality {}",
        profile.max_width,
        profile.max_height,
        profile.quality.value()
    ));
    if let Some(aspect) = profile.aspect_ratio {
        lines.push(format!(
            "    aspect: {aspect:.2} ± {:.2} (advisory)",
            profile.aspect_tolerance
        ));
    }
    if let Some((w, h)) = profile.min_dimensions {
        lines.push(format!("    minimum source: {w}x{h}"));
    }
    if profile.required_crop {
        let canvas = profile
            .crop_output
            .map(|(w, h)| format!(" to {w}x{h}"))
            .unwrap_or_default();
        lines.push(format!("    crop: required{canvas}"));
    }
    lines.push(format!(
        "    cardinality: {}",
        if profile.multiple {
            format!("up to {} items", profile.max_items)
        } else {
            "single item".to_string()
        }
    ));
    lines
}

pub fn print_summary(
    artifacts: &[Artifact],
    rejections: &[RejectionReport],
    failures: &[(String, String)],
) {
    for line in format_summary(artifacts, rejections, failures) {
        println!("{line}");
    }
}

pub fn print_profiles(profiles: &[Profile]) {
    for profile in profiles {
        for line in format_profile(profile) {
            println!("{line}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ImageId;
    use crate::validate::RejectReason;

    fn artifact(name: &str, crop: bool) -> Artifact {
        Artifact {
            id: ImageId(1),
            name: name.to_string(),
            bytes: vec![0; 10],
            width: 800,
            height: 400,
            original_size: 2 * 1024 * 1024,
            final_size: 300 * 1024,
            crop_applied: crop,
            persisted_url: None,
        }
    }

    #[test]
    fn human_size_scales() {
        assert_eq!(human_size(512), "512 B");
        assert_eq!(human_size(2048), "2.0 KB");
        assert_eq!(human_size(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn summary_lists_artifacts_with_index_and_stats() {
        let lines = format_summary(&[artifact("a.jpg", true)], &[], &[]);
        assert_eq!(lines[0], "Processed");
        assert_eq!(lines[1], "001 a.jpg");
        assert!(lines[2].contains("800x400"));
        assert!(lines[2].contains("14% of original"));
        assert_eq!(lines[3], "    crop: applied");
    }

    #[test]
    fn summary_lists_rejections_with_reasons() {
        let rejection = RejectionReport {
            name: "big.png".to_string(),
            reasons: vec![RejectReason::SizeExceeded {
                actual: 10_000_000,
                limit: 5_000_000,
            }],
        };
        let lines = format_summary(&[], &[rejection], &[]);
        assert_eq!(lines[0], "Rejected");
        assert_eq!(lines[1], "001 big.png");
        assert!(lines[2].contains("10000000"));
    }

    #[test]
    fn empty_summary_says_so() {
        assert_eq!(format_summary(&[], &[], &[]), vec!["Nothing to do"]);
    }

    #[test]
    fn event_lines_cover_user_facing_events() {
        let line = format_event(&BatchEvent::Progress {
            completed: 2,
            total: 5,
        })
        .unwrap();
        assert_eq!(line, "progress: 2/5");

        assert!(format_event(&BatchEvent::PreviewRegistered { id: ImageId(1) }).is_none());
    }

    #[test]
    fn profile_lines_mention_crop_canvas() {
        let lines = format_profile(&Profile::avatar());
        assert_eq!(lines[0], "avatar");
        assert!(lines.iter().any(|l| l.contains("crop: required to 256x256")));
        assert!(lines.iter().any(|l| l.contains("single item")));
    }
}
