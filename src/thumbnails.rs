//! Thumbnail generation over a bundle.
//!
//! Every image asset in the bundle is considered once. Qualifying originals
//! get a thumbnail emitted next to them under the name from
//! [`naming::to_thumbnail`]; the original itself is never touched.
//!
//! ## Selection
//!
//! | Asset | Outcome |
//! |---|---|
//! | not an image extension, or a script chunk | ignored |
//! | basename contains the prefix, original present | skipped (earlier output) |
//! | basename contains the prefix, no original | skipped (prefix conflict) |
//! | at most `min_size_to_resize` KB with `skip_small_images` | skipped (small) |
//! | anything else | encoded |
//!
//! Encoding runs in parallel with rayon. A failing asset is reported and
//! left without a thumbnail; its siblings are unaffected and the pass as a
//! whole still succeeds. Results are applied to the bundle in path order
//! after every task has settled, so the output is deterministic.
//!
//! The returned [`ThumbnailReport`] lists the originals that actually got a
//! thumbnail. Reference rewriting consults it so nothing ever points at a
//! file that was not produced.

use crate::bundle::{AssetKind, Bundle};
use crate::config::ThumbnailConfig;
use crate::imaging::{BackendError, GeneratedThumbnail, ImageBackend, SourceImage, create_thumbnail};
use crate::naming;
use crate::pipeline::BuildEvent;
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::mpsc::Sender;

/// Why an image asset did not get a thumbnail.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// Payload at or below the configured KB threshold.
    Small { size_kb: f64 },
    /// Basename already carries the prefix and no matching original exists.
    PrefixConflict,
    /// A thumbnail from an earlier build; its original is in the bundle.
    ExistingThumbnail,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Small { size_kb } => write!(f, "small ({size_kb:.1} KB)"),
            Self::PrefixConflict => write!(
                f,
                "name contains \"{}\", rename the file to get a thumbnail",
                naming::THUMBNAIL_PREFIX
            ),
            Self::ExistingThumbnail => write!(f, "existing thumbnail"),
        }
    }
}

/// Summary of one generation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThumbnailReport {
    /// Originals that got a thumbnail, by bundle path.
    pub emitted: BTreeSet<String>,
    pub skipped: usize,
    pub failed: usize,
}

/// Per-asset decision made before any pixel work.
enum Plan {
    Skip(String, SkipReason),
    Encode(String),
}

fn plan_asset(bundle: &Bundle, path: &str, size: usize, config: &ThumbnailConfig) -> Plan {
    if naming::has_prefix_conflict(path) {
        let reason = if bundle.contains(&naming::to_original(path)) {
            SkipReason::ExistingThumbnail
        } else {
            SkipReason::PrefixConflict
        };
        return Plan::Skip(path.to_string(), reason);
    }
    if config.skips_size(size) {
        return Plan::Skip(
            path.to_string(),
            SkipReason::Small {
                size_kb: size as f64 / 1024.0,
            },
        );
    }
    Plan::Encode(path.to_string())
}

/// Generate thumbnails for every qualifying image asset in `bundle`.
///
/// Progress is reported through `events` when a sender is given.
pub fn generate_thumbnails(
    bundle: &mut Bundle,
    config: &ThumbnailConfig,
    backend: &impl ImageBackend,
    events: Option<&Sender<BuildEvent>>,
) -> ThumbnailReport {
    let send = |event: BuildEvent| {
        if let Some(tx) = events {
            tx.send(event).ok();
        }
    };

    let plans: Vec<Plan> = bundle
        .iter()
        .filter(|(path, entry)| entry.kind == AssetKind::Asset && naming::is_image_path(path))
        .map(|(path, entry)| plan_asset(bundle, path, entry.len(), config))
        .collect();

    let mut report = ThumbnailReport::default();
    let mut to_encode = Vec::new();
    for plan in plans {
        match plan {
            Plan::Skip(path, reason) => {
                report.skipped += 1;
                send(BuildEvent::ThumbnailSkipped { path, reason });
            }
            Plan::Encode(path) => to_encode.push(path),
        }
    }

    let shared: &Bundle = bundle;
    let results: Vec<(String, usize, Result<GeneratedThumbnail, BackendError>)> = to_encode
        .into_par_iter()
        .filter_map(|path| {
            let entry = shared.get(&path)?;
            let result = create_thumbnail(backend, SourceImage::new(&path, entry.bytes()), config);
            Some((path, entry.len(), result))
        })
        .collect();

    for (original, original_size, result) in results {
        match result {
            Ok(thumb) => {
                let thumbnail = naming::to_thumbnail(&original);
                let thumbnail_size = thumb.bytes.len();
                bundle.emit_file(&thumbnail, thumb.bytes);
                send(BuildEvent::ThumbnailEmitted {
                    original: original.clone(),
                    thumbnail,
                    original_size,
                    thumbnail_size,
                    dimensions: thumb.dimensions,
                });
                report.emitted.insert(original);
            }
            Err(e) => {
                report.failed += 1;
                send(BuildEvent::ThumbnailFailed {
                    path: original,
                    error: e.to_string(),
                });
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::MockBackend;
    use crate::test_helpers::{bundle_with_images, kb};
    use std::sync::mpsc;

    #[test]
    fn emits_thumbnail_next_to_original() {
        let mut bundle = bundle_with_images(&[("images/photo.jpg", kb(200))]);
        let backend = MockBackend::new();

        let report = generate_thumbnails(&mut bundle, &ThumbnailConfig::default(), &backend, None);

        assert!(report.emitted.contains("images/photo.jpg"));
        let thumb = bundle.get("images/thumb_photo.jpg").unwrap();
        assert_eq!(thumb.kind, AssetKind::Asset);
        assert!(thumb.is_dirty());
        // Original untouched
        assert!(!bundle.get("images/photo.jpg").unwrap().is_dirty());
        assert_eq!(bundle.get("images/photo.jpg").unwrap().len(), kb(200));
    }

    #[test]
    fn small_images_are_skipped_inclusively() {
        let mut bundle = bundle_with_images(&[
            ("icons/small.png", kb(10)),
            ("edge.png", kb(30)),
            ("just-over.png", kb(30) + 512),
        ]);
        let backend = MockBackend::new();

        let report = generate_thumbnails(&mut bundle, &ThumbnailConfig::default(), &backend, None);

        assert!(!bundle.contains("icons/thumb_small.png"));
        assert!(!bundle.contains("thumb_edge.png"));
        assert!(bundle.contains("thumb_just-over.png"));
        assert_eq!(report.skipped, 2);
        assert_eq!(backend.thumbnailed_sources(), ["just-over.png"]);
    }

    #[test]
    fn small_images_processed_when_policy_off() {
        let mut bundle = bundle_with_images(&[("icons/small.png", kb(1))]);
        let config = ThumbnailConfig {
            skip_small_images: false,
            ..ThumbnailConfig::default()
        };

        let report = generate_thumbnails(&mut bundle, &config, &MockBackend::new(), None);
        assert!(report.emitted.contains("icons/small.png"));
        assert!(bundle.contains("icons/thumb_small.png"));
    }

    #[test]
    fn non_images_and_chunks_are_ignored() {
        let mut bundle = bundle_with_images(&[("a.jpg", kb(100))]);
        bundle.insert_asset("style.css", "a{}");
        bundle.insert_asset("logo.svg", vec![0u8; kb(100)]);
        bundle.insert_chunk("weird.jpg.js", "1");
        let backend = MockBackend::new();

        generate_thumbnails(&mut bundle, &ThumbnailConfig::default(), &backend, None);
        assert_eq!(backend.thumbnailed_sources(), ["a.jpg"]);
    }

    #[test]
    fn one_failure_does_not_stop_siblings() {
        let mut bundle = bundle_with_images(&[
            ("a.jpg", kb(100)),
            ("broken.jpg", kb(100)),
            ("c.webp", kb(100)),
        ]);
        let backend = MockBackend::new().failing_on("broken.jpg");
        let (tx, rx) = mpsc::channel();

        let report =
            generate_thumbnails(&mut bundle, &ThumbnailConfig::default(), &backend, Some(&tx));
        drop(tx);

        assert_eq!(report.failed, 1);
        assert!(bundle.contains("thumb_a.jpg"));
        assert!(bundle.contains("thumb_c.webp"));
        assert!(!bundle.contains("thumb_broken.jpg"));
        assert!(!report.emitted.contains("broken.jpg"));

        let failures: Vec<BuildEvent> = rx
            .iter()
            .filter(|e| matches!(e, BuildEvent::ThumbnailFailed { .. }))
            .collect();
        assert_eq!(failures.len(), 1);
    }

    #[test]
    fn prefix_conflict_is_reported_not_renamed() {
        let mut bundle = bundle_with_images(&[("img/thumb_sunset.jpg", kb(100))]);
        let (tx, rx) = mpsc::channel();

        let report = generate_thumbnails(
            &mut bundle,
            &ThumbnailConfig::default(),
            &MockBackend::new(),
            Some(&tx),
        );
        drop(tx);

        assert!(report.emitted.is_empty());
        assert_eq!(bundle.len(), 1);
        let events: Vec<BuildEvent> = rx.iter().collect();
        assert!(matches!(
            &events[..],
            [BuildEvent::ThumbnailSkipped {
                reason: SkipReason::PrefixConflict,
                ..
            }]
        ));
    }

    #[test]
    fn earlier_thumbnails_are_not_thumbnailed_again() {
        let mut bundle = bundle_with_images(&[
            ("img/photo.jpg", kb(100)),
            ("img/thumb_photo.jpg", kb(40)),
        ]);
        let backend = MockBackend::new();
        let (tx, rx) = mpsc::channel();

        let report =
            generate_thumbnails(&mut bundle, &ThumbnailConfig::default(), &backend, Some(&tx));
        drop(tx);

        assert_eq!(backend.thumbnailed_sources(), ["img/photo.jpg"]);
        assert!(!bundle.contains("img/thumb_thumb_photo.jpg"));
        assert_eq!(report.skipped, 1);
        assert!(rx.iter().any(|e| matches!(
            e,
            BuildEvent::ThumbnailSkipped {
                reason: SkipReason::ExistingThumbnail,
                ..
            }
        )));
    }

    #[test]
    fn thumbnail_keeps_original_extension_with_forced_format() {
        let mut bundle = bundle_with_images(&[("hero.png", kb(100))]);
        let config = ThumbnailConfig {
            format: crate::config::FormatChoice::Webp,
            ..ThumbnailConfig::default()
        };

        generate_thumbnails(&mut bundle, &config, &MockBackend::new(), None);
        assert!(bundle.contains("thumb_hero.png"));
        assert_eq!(
            bundle.get("thumb_hero.png").unwrap().bytes(),
            b"thumb:webp:128x96"
        );
    }

    #[test]
    fn uppercase_extensions_qualify() {
        let mut bundle = bundle_with_images(&[("DSC_0001.JPG", kb(100))]);
        generate_thumbnails(&mut bundle, &ThumbnailConfig::default(), &MockBackend::new(), None);
        assert!(bundle.contains("thumb_DSC_0001.JPG"));
    }
}
