//! CLI output formatting for builds.
//!
//! # Artifact-First Display
//!
//! Every line leads with the bundle path of the artifact it is about, so the
//! output reads as an inventory of what the build did to the output
//! directory. Details (sizes, errors) follow as indented context lines.
//!
//! # Output Format
//!
//! ## Events
//!
//! ```text
//! images/photo.jpg → images/thumb_photo.jpg
//!     128x96, 212.4 KB → 2.1 KB
//! icons/small.png: skipped, small (10.0 KB)
//! images/broken.jpg: failed
//!     Error: Processing failed: unsupported format
//! css/site.css: 2 references
//! assets/broken.js: not valid JavaScript, left unchanged
//! index.html: runtime injected
//! assets/app.js.map: source map updated
//! ```
//!
//! ## Summary
//!
//! ```text
//! Thumbnails: 1 emitted, 1 skipped, 0 failed
//! Rewritten: 2 artifacts, 3 references
//! Runtime: 2 pages
//! Written: 5 files
//! ```
//!
//! # Architecture
//!
//! Each formatter returns `Vec<String>` for testability and has a `print_*`
//! wrapper that writes to stdout. Format functions are pure: no I/O, no side
//! effects. The CLI formats events on a printer thread as they arrive.

use crate::pipeline::{BuildEvent, BuildSummary};

// ============================================================================
// Shared helpers
// ============================================================================

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Human-readable size: bytes below 1 KB, otherwise KB or MB with one decimal.
fn format_size(bytes: usize) -> String {
    const KB: f64 = 1024.0;
    let size = bytes as f64;
    if size < KB {
        format!("{} B", bytes)
    } else if size < KB * KB {
        format!("{:.1} KB", size / KB)
    } else {
        format!("{:.1} MB", size / (KB * KB))
    }
}

/// "1 file", "2 files".
fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{} {}", count, noun)
    } else {
        format!("{} {}s", count, noun)
    }
}

// ============================================================================
// Build events
// ============================================================================

/// Format one build event.
pub fn format_build_event(event: &BuildEvent) -> Vec<String> {
    match event {
        BuildEvent::ThumbnailEmitted {
            original,
            thumbnail,
            original_size,
            thumbnail_size,
            dimensions,
        } => vec![
            format!("{} \u{2192} {}", original, thumbnail),
            format!(
                "{}{}x{}, {} \u{2192} {}",
                indent(1),
                dimensions.width,
                dimensions.height,
                format_size(*original_size),
                format_size(*thumbnail_size)
            ),
        ],
        BuildEvent::ThumbnailSkipped { path, reason } => {
            vec![format!("{}: skipped, {}", path, reason)]
        }
        BuildEvent::ThumbnailFailed { path, error } => vec![
            format!("{}: failed", path),
            format!("{}Error: {}", indent(1), error),
        ],
        BuildEvent::ArtifactRewritten {
            path, references, ..
        } => vec![format!("{}: {}", path, plural(*references, "reference"))],
        BuildEvent::ScriptUnparsed { path } => {
            vec![format!("{}: not valid JavaScript, left unchanged", path)]
        }
        BuildEvent::RuntimeInjected { path } => vec![format!("{}: runtime injected", path)],
        BuildEvent::SourceMapUpdated { path } => vec![format!("{}: source map updated", path)],
    }
}

/// Print one build event to stdout.
pub fn print_build_event(event: &BuildEvent) {
    for line in format_build_event(event) {
        println!("{}", line);
    }
}

// ============================================================================
// Summary
// ============================================================================

/// Format the totals of a build.
pub fn format_summary(summary: &BuildSummary) -> Vec<String> {
    let thumbnails = &summary.thumbnails;
    let mut lines = vec![
        format!(
            "Thumbnails: {} emitted, {} skipped, {} failed",
            thumbnails.emitted.len(),
            thumbnails.skipped,
            thumbnails.failed
        ),
        format!(
            "Rewritten: {}, {}",
            plural(summary.rewritten, "artifact"),
            plural(summary.references, "reference")
        ),
        format!("Runtime: {}", plural(summary.injected, "page")),
    ];
    if summary.unparsed > 0 {
        lines.push(format!(
            "Unparsed: {}",
            plural(summary.unparsed, "script chunk")
        ));
    }
    lines.push(format!("Written: {}", plural(summary.written, "file")));
    lines
}

/// Print build totals to stdout.
pub fn print_summary(summary: &BuildSummary) {
    for line in format_summary(summary) {
        println!("{}", line);
    }
}
