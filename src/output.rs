//! CLI output formatting.
//!
//! Output leads with what a derivative *is* (attachment, size, format,
//! geometry) and shows URLs and filesystem paths as indented context:
//!
//! ```text
//! 42 @ card (600x400-c)
//!     webp      600x400  /wp-content/uploads/skin-sizes/42/2024/05/photo-600x400-c.webp
//!     jpeg      600x400  /wp-content/uploads/skin-sizes/42/2024/05/photo-600x400-c.jpg
//!     original  600x400  /wp-content/uploads/skin-sizes/42/2024/05/photo-600x400-c.jpg
//! ```
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::derivatives::{ImageDerivative, MediaEvent};
use crate::formats::Format;
use crate::pregenerate::{ItemStatus, PregenerateReport};
use crate::sizes::{ResizeSpec, SizeRegistry};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

// ============================================================================
// Shared helpers
// ============================================================================

/// 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn geometry(width: u32, height: u32) -> String {
    if width == 0 || height == 0 {
        "unknown".to_string()
    } else {
        format!("{}x{}", width, height)
    }
}

/// ```text
/// webp      600x400  /wp-content/uploads/…/photo-600x400-c.webp
/// ```
fn derivative_line(derivative: &ImageDerivative) -> String {
    format!(
        "{:<9} {:<8} {}",
        derivative.format.as_str(),
        geometry(derivative.width, derivative.height),
        derivative.src
    )
}

fn request_header(attachment_id: u64, size: &str, spec: Option<&ResizeSpec>) -> String {
    match spec {
        Some(spec) => format!("{} @ {} ({})", attachment_id, size, spec),
        None => format!("{} @ {}", attachment_id, size),
    }
}

// ============================================================================
// resolve / formats
// ============================================================================

/// One resolved derivative, or a note that none is available.
pub fn format_resolved(
    attachment_id: u64,
    size: &str,
    spec: Option<&ResizeSpec>,
    derivative: Option<&ImageDerivative>,
) -> Vec<String> {
    let mut lines = vec![request_header(attachment_id, size, spec)];
    match derivative {
        Some(derivative) => lines.push(format!("{}{}", indent(1), derivative_line(derivative))),
        None => lines.push(format!("{}unavailable", indent(1))),
    }
    lines
}

pub fn print_resolved(
    attachment_id: u64,
    size: &str,
    spec: Option<&ResizeSpec>,
    derivative: Option<&ImageDerivative>,
) {
    for line in format_resolved(attachment_id, size, spec, derivative) {
        println!("{}", line);
    }
}

/// Every format of one size, in priority order.
pub fn format_formats(
    attachment_id: u64,
    size: &str,
    spec: Option<&ResizeSpec>,
    formats: &BTreeMap<Format, ImageDerivative>,
) -> Vec<String> {
    let mut lines = vec![request_header(attachment_id, size, spec)];
    if formats.is_empty() {
        lines.push(format!("{}unavailable", indent(1)));
    }
    for derivative in formats.values() {
        lines.push(format!("{}{}", indent(1), derivative_line(derivative)));
    }
    lines
}

pub fn print_formats(
    attachment_id: u64,
    size: &str,
    spec: Option<&ResizeSpec>,
    formats: &BTreeMap<Format, ImageDerivative>,
) {
    for line in format_formats(attachment_id, size, spec, formats) {
        println!("{}", line);
    }
}

// ============================================================================
// sizes
// ============================================================================

/// ```text
/// Sizes
///     card        600x400    crop    Card
///     square      480x480    crop    Square
///
/// Native sizes
///     medium      300x300    fit     Medium
/// ```
pub fn format_sizes(sizes: &SizeRegistry, native: &SizeRegistry) -> Vec<String> {
    let mut lines = Vec::new();
    for (title, registry) in [("Sizes", sizes), ("Native sizes", native)] {
        if !lines.is_empty() {
            lines.push(String::new());
        }
        lines.push(title.to_string());
        if registry.is_empty() {
            lines.push(format!("{}(none)", indent(1)));
        }
        for preset in registry.iter() {
            let mode = if preset.crop.is_cropped() { "crop" } else { "fit" };
            lines.push(format!(
                "{}{:<11} {:<10} {:<7} {}",
                indent(1),
                preset.name,
                geometry(preset.width, preset.height),
                mode,
                registry.label(&preset.name)
            ));
        }
    }
    lines
}

pub fn print_sizes(sizes: &SizeRegistry, native: &SizeRegistry) {
    for line in format_sizes(sizes, native) {
        println!("{}", line);
    }
}

// ============================================================================
// pregenerate
// ============================================================================

/// Per-item status lines followed by a summary line.
pub fn format_pregenerate_report(report: &PregenerateReport) -> Vec<String> {
    let mut lines: Vec<String> = report
        .items
        .iter()
        .map(|item| {
            let status = match item.status {
                ItemStatus::Existing => format!("cached ({} formats)", item.formats),
                ItemStatus::Generated => format!("generated ({} formats)", item.formats),
                ItemStatus::Unavailable => "unavailable".to_string(),
            };
            format!("{} @ {}: {}", item.attachment_id, item.size, status)
        })
        .collect();
    lines.push(format!("Pregenerated: {}", report.stats));
    lines
}

pub fn print_pregenerate_report(report: &PregenerateReport) {
    for line in format_pregenerate_report(report) {
        println!("{}", line);
    }
}

/// Progress lines for a [`MediaEvent`].
pub fn format_media_event(event: &MediaEvent) -> Vec<String> {
    match event {
        MediaEvent::DerivativeCreated {
            attachment_id,
            size,
            derivatives,
        } => {
            let mut lines = vec![format!("Created {} @ {}", attachment_id, size)];
            for derivative in derivatives.values() {
                lines.push(format!("{}{}", indent(1), derivative_line(derivative)));
            }
            lines
        }
        MediaEvent::DerivativesPurged { attachment_id } => {
            vec![format!("Purged {}", attachment_id)]
        }
    }
}

// ============================================================================
// list / locate
// ============================================================================

/// Derivative files of one attachment, relative to `root`.
pub fn format_derivative_list(attachment_id: u64, files: &[PathBuf], root: &Path) -> Vec<String> {
    let mut lines = vec![match files.len() {
        1 => format!("{} (1 file)", attachment_id),
        n => format!("{} ({} files)", attachment_id, n),
    }];
    for file in files {
        let shown = file.strip_prefix(root).unwrap_or(file);
        lines.push(format!("{}{}", indent(1), shown.display()));
    }
    lines
}

pub fn print_derivative_list(attachment_id: u64, files: &[PathBuf], root: &Path) {
    for line in format_derivative_list(attachment_id, files, root) {
        println!("{}", line);
    }
}

pub fn format_located(url: &str, path: Option<&Path>) -> Vec<String> {
    match path {
        Some(path) => {
            let state = if path.is_file() { "" } else { " (missing)" };
            vec![url.to_string(), format!("{}{}{}", indent(1), path.display(), state)]
        }
        None => vec![url.to_string(), format!("{}outside the upload directory", indent(1))],
    }
}

pub fn print_located(url: &str, path: Option<&Path>) {
    for line in format_located(url, path) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pregenerate::{PregenerateItem, PregenerateStats};
    use crate::sizes::Crop;

    fn webp() -> ImageDerivative {
        ImageDerivative {
            src: "/u/skin-sizes/42/photo-600x400-c.webp".to_string(),
            width: 600,
            height: 400,
            format: Format::Webp,
        }
    }

    fn card_spec() -> ResizeSpec {
        ResizeSpec {
            width: 600,
            height: 400,
            crop: Crop::Center,
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    #[test]
    fn indent_levels() {
        assert_eq!(indent(0), "");
        assert_eq!(indent(2), "        ");
    }

    #[test]
    fn geometry_unknown_for_zero() {
        assert_eq!(geometry(600, 400), "600x400");
        assert_eq!(geometry(0, 0), "unknown");
    }

    #[test]
    fn derivative_line_aligns_columns() {
        assert_eq!(
            derivative_line(&webp()),
            "webp      600x400  /u/skin-sizes/42/photo-600x400-c.webp"
        );
    }

    // =========================================================================
    // Commands
    // =========================================================================

    #[test]
    fn resolved_with_and_without_derivative() {
        let spec = card_spec();
        let lines = format_resolved(42, "card", Some(&spec), Some(&webp()));
        assert_eq!(lines[0], "42 @ card (600x400-c)");
        assert!(lines[1].starts_with("    webp"));

        let lines = format_resolved(42, "nope", None, None);
        assert_eq!(lines, vec!["42 @ nope", "    unavailable"]);
    }

    #[test]
    fn formats_in_priority_order() {
        let mut jpeg = webp();
        jpeg.format = Format::Jpeg;
        jpeg.src = "/u/a.jpg".into();
        let formats = BTreeMap::from([(Format::Jpeg, jpeg), (Format::Webp, webp())]);
        let lines = format_formats(42, "card", None, &formats);
        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains("webp"));
        assert!(lines[2].contains("/u/a.jpg"));
    }

    #[test]
    fn sizes_lists_both_tables() {
        let mut sizes = SizeRegistry::new();
        sizes.add("card", 600, 400, Crop::Center);
        sizes.set_label("card", "Card");
        let native = SizeRegistry::new();

        let lines = format_sizes(&sizes, &native);
        assert_eq!(lines[0], "Sizes");
        assert_eq!(lines[1], "    card        600x400    crop    Card");
        assert_eq!(lines[2], "");
        assert_eq!(lines[3], "Native sizes");
        assert_eq!(lines[4], "    (none)");
    }

    #[test]
    fn pregenerate_report_lines() {
        let report = PregenerateReport {
            items: vec![
                PregenerateItem {
                    attachment_id: 1,
                    size: "card".into(),
                    status: ItemStatus::Generated,
                    formats: 3,
                },
                PregenerateItem {
                    attachment_id: 2,
                    size: "card".into(),
                    status: ItemStatus::Unavailable,
                    formats: 0,
                },
            ],
            stats: PregenerateStats {
                existing: 0,
                generated: 1,
                unavailable: 1,
            },
        };
        let lines = format_pregenerate_report(&report);
        assert_eq!(lines[0], "1 @ card: generated (3 formats)");
        assert_eq!(lines[1], "2 @ card: unavailable");
        assert_eq!(
            lines[2],
            "Pregenerated: 0 existing, 1 generated, 1 unavailable (2 total)"
        );
    }

    #[test]
    fn media_events() {
        let created = MediaEvent::DerivativeCreated {
            attachment_id: 42,
            size: card_spec(),
            derivatives: BTreeMap::from([(Format::Webp, webp())]),
        };
        let lines = format_media_event(&created);
        assert_eq!(lines[0], "Created 42 @ 600x400-c");
        assert_eq!(lines.len(), 2);

        let purged = MediaEvent::DerivativesPurged { attachment_id: 42 };
        assert_eq!(format_media_event(&purged), vec!["Purged 42"]);
    }

    #[test]
    fn derivative_list_is_relative_to_root() {
        let root = Path::new("/srv/uploads/skin-sizes");
        let files = vec![
            PathBuf::from("/srv/uploads/skin-sizes/42/2024/05/photo-600x400-c.jpg"),
            PathBuf::from("/srv/uploads/skin-sizes/42/2024/05/photo-600x400-c.webp"),
        ];
        let lines = format_derivative_list(42, &files, root);
        assert_eq!(lines[0], "42 (2 files)");
        assert_eq!(lines[1], "    42/2024/05/photo-600x400-c.jpg");

        assert_eq!(format_derivative_list(7, &[], root), vec!["7 (0 files)"]);
    }

    #[test]
    fn located_outside_uploads() {
        let lines = format_located("/elsewhere/a.jpg", None);
        assert_eq!(lines[1], "    outside the upload directory");

        let lines = format_located("/u/a.jpg", Some(Path::new("/nonexistent/a.jpg")));
        assert_eq!(lines[1], "    /nonexistent/a.jpg (missing)");
    }
}
