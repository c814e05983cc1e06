//! Build orchestration.
//!
//! A build runs in two phases over one [`Bundle`]:
//!
//! ```text
//! 1. Thumbnails   image assets  →  thumb_* assets         (rayon, per image)
//! 2. Rewrite      css / js / html  →  edited in place      (rayon, per artifact)
//! ```
//!
//! Phase 2 starts only after every thumbnail task has settled, because the
//! rewriters may only point at thumbnails that exist. Within phase 2 each
//! artifact is owned by exactly one task; style sheets, chunks and pages are
//! independent of each other. A rewritten chunk that ships with a map file
//! gets that file updated afterwards, so debuggers keep lining up.
//!
//! Progress is reported as [`BuildEvent`]s over an optional channel, in
//! bundle path order. Per-artifact problems (an image that fails to encode,
//! a chunk that does not parse) are events, never errors: the build as a
//! whole still succeeds and the affected artifact keeps its original
//! references. Only reading or writing the output directory can fail.

use crate::bundle::{AssetKind, Bundle, BundleEntry, BundleError};
use crate::config::ThumbnailConfig;
use crate::imaging::{Dimensions, ImageBackend};
use crate::naming;
use crate::rewrite::sourcemap::{SourceMap, compose};
use crate::rewrite::{ReferenceResolver, join_normalized};
use crate::rewrite::css::rewrite_stylesheet;
use crate::rewrite::markup::{inject_tags, rewrite_markup, transform_index_html};
use crate::rewrite::script::{ScriptOutcome, rewrite_script};
use crate::thumbnails::{SkipReason, ThumbnailReport, generate_thumbnails};
use rayon::prelude::*;
use std::path::Path;
use std::sync::mpsc::Sender;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Bundle error: {0}")]
    Bundle(#[from] BundleError),
}

/// Text artifact types the rewriters handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Stylesheet,
    Script,
    Page,
}

/// Progress of a build, one event per thing that happened to an artifact.
#[derive(Debug, Clone)]
pub enum BuildEvent {
    ThumbnailEmitted {
        original: String,
        thumbnail: String,
        original_size: usize,
        thumbnail_size: usize,
        dimensions: Dimensions,
    },
    ThumbnailSkipped {
        path: String,
        reason: SkipReason,
    },
    ThumbnailFailed {
        path: String,
        error: String,
    },
    ArtifactRewritten {
        path: String,
        kind: ArtifactKind,
        references: usize,
    },
    /// A script chunk that is not valid JavaScript; left as is.
    ScriptUnparsed {
        path: String,
    },
    RuntimeInjected {
        path: String,
    },
    /// The map file of a rewritten chunk, updated or written.
    SourceMapUpdated {
        path: String,
    },
}

/// Totals for one build.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildSummary {
    pub thumbnails: ThumbnailReport,
    /// Artifacts whose references were rewritten.
    pub rewritten: usize,
    /// References pointed at thumbnails, over all artifacts.
    pub references: usize,
    pub unparsed: usize,
    pub injected: usize,
    /// Files written back to disk (directory builds only).
    pub written: usize,
}

impl BuildSummary {
    fn record(&mut self, event: &BuildEvent) {
        match event {
            BuildEvent::ArtifactRewritten { references, .. } => {
                self.rewritten += 1;
                self.references += references;
            }
            BuildEvent::ScriptUnparsed { .. } => self.unparsed += 1,
            BuildEvent::RuntimeInjected { .. } => self.injected += 1,
            _ => {}
        }
    }
}

fn artifact_kind(path: &str, entry: &BundleEntry) -> Option<ArtifactKind> {
    if entry.kind == AssetKind::Chunk {
        return Some(ArtifactKind::Script);
    }
    match naming::extension(path).as_deref() {
        Some("css") => Some(ArtifactKind::Stylesheet),
        Some("html" | "htm") => Some(ArtifactKind::Page),
        _ => None,
    }
}

fn rewritten(path: &str, kind: ArtifactKind, references: usize) -> BuildEvent {
    BuildEvent::ArtifactRewritten {
        path: path.to_string(),
        kind,
        references,
    }
}

/// Run the applicable rewriter over one artifact, editing it in place.
fn rewrite_artifact(
    path: &str,
    entry: &mut BundleEntry,
    config: &ThumbnailConfig,
    resolver: &ReferenceResolver,
) -> Vec<BuildEvent> {
    let Some(kind) = artifact_kind(path, entry) else {
        return Vec::new();
    };
    let Some(text) = entry.text() else {
        return Vec::new();
    };

    let mut events = Vec::new();
    match kind {
        ArtifactKind::Stylesheet => {
            if config.skip_background {
                return events;
            }
            if let Some(result) = rewrite_stylesheet(text, path, resolver, config.background_fill)
            {
                events.push(rewritten(path, kind, result.references));
                entry.set_text(result.css);
            }
        }
        ArtifactKind::Script => match rewrite_script(text, path, resolver) {
            ScriptOutcome::Rewritten(output) => {
                events.push(rewritten(path, kind, output.references));
                entry.set_text(output.code);
                entry.map = Some(output.map);
            }
            ScriptOutcome::Unparsed => events.push(BuildEvent::ScriptUnparsed {
                path: path.to_string(),
            }),
            ScriptOutcome::Unchanged => {}
        },
        ArtifactKind::Page => {
            let mut page = text.to_string();
            if config.rewrite_markup
                && let Some(result) = rewrite_markup(&page, path, resolver, config)
            {
                events.push(rewritten(path, kind, result.references));
                page = result.html;
            }
            let transform = transform_index_html(&page, config);
            let injected = inject_tags(&transform.html, &transform.tags);
            if injected.is_some() {
                events.push(BuildEvent::RuntimeInjected {
                    path: path.to_string(),
                });
            }
            if let Some(html) = injected.or_else(|| (!events.is_empty()).then_some(page)) {
                entry.set_text(html);
            }
        }
    }
    events
}

/// Where the map of the chunk at `path` lives: the file its
/// `sourceMappingURL` comment names, else a `.map` sibling already in the
/// bundle. Inline and remote maps are not followed.
fn map_target(path: &str, code: &str, bundle: &Bundle) -> Option<String> {
    const DIRECTIVE: &str = "sourceMappingURL=";
    let Some(pos) = code.rfind(DIRECTIVE) else {
        let sibling = format!("{path}.map");
        return bundle.contains(&sibling).then_some(sibling);
    };
    let rest = &code[pos + DIRECTIVE.len()..];
    let url = rest
        .find(|c: char| c.is_whitespace() || c == '*')
        .map_or(rest, |end| &rest[..end]);
    let url = url.find(['?', '#']).map_or(url, |end| &url[..end]);
    if url.is_empty() || url.contains(':') || url.starts_with("//") {
        return None;
    }
    match url.strip_prefix('/') {
        Some(rooted) => join_normalized("", rooted),
        None => join_normalized(naming::dirname(path), url),
    }
}

/// Update (or write) the map file of every chunk rewritten in this build.
///
/// An existing map is composed with the rewrite so it still points at the
/// original sources. A map that cannot be read, or a referenced map file
/// that does not exist, is replaced by the rewrite's own map.
fn update_source_maps(bundle: &mut Bundle) -> Vec<BuildEvent> {
    let targets: Vec<(String, String, SourceMap)> = bundle
        .iter()
        .filter_map(|(path, entry)| {
            let map = entry.map.as_ref()?;
            let target = map_target(path, entry.text()?, bundle)?;
            Some((path.clone(), target, map.clone()))
        })
        .collect();

    let mut events = Vec::new();
    for (chunk, target, mut map) in targets {
        let composed = bundle
            .get(&target)
            .and_then(BundleEntry::text)
            .and_then(|existing| compose(&map, existing));
        let json = composed.unwrap_or_else(|| {
            // Sources are relative to the map file
            if naming::dirname(&target) == naming::dirname(&chunk) {
                map.sources = vec![naming::basename(&chunk).to_string()];
            } else {
                map.sources = vec![format!("/{chunk}")];
            }
            map.to_json()
        });
        bundle.emit_file(&target, json.into_bytes());
        events.push(BuildEvent::SourceMapUpdated { path: target });
    }
    events
}

/// Run a full build over `bundle`.
///
/// Thumbnails are generated first; then every style sheet, script chunk and
/// page is rewritten in parallel against the set of originals that actually
/// got a thumbnail.
pub fn run(
    bundle: &mut Bundle,
    config: &ThumbnailConfig,
    backend: &impl ImageBackend,
    events: Option<Sender<BuildEvent>>,
) -> BuildSummary {
    let send = |event: BuildEvent| {
        if let Some(tx) = &events {
            tx.send(event).ok();
        }
    };

    let thumbnails = generate_thumbnails(bundle, config, backend, events.as_ref());
    let resolver = ReferenceResolver::new(&thumbnails.emitted, &config.base);

    let artifact_events: Vec<Vec<BuildEvent>> = bundle
        .entries_mut()
        .par_iter_mut()
        .map(|(path, entry)| rewrite_artifact(path, entry, config, &resolver))
        .collect();

    let map_events = update_source_maps(bundle);

    let mut summary = BuildSummary::default();
    for event in artifact_events.into_iter().flatten().chain(map_events) {
        summary.record(&event);
        send(event);
    }
    summary.thumbnails = thumbnails;
    summary
}

/// Build the output directory at `root` in place.
///
/// Loads every file, runs [`run`] and writes back only what the build added
/// or changed.
pub fn build_dir(
    root: &Path,
    config: &ThumbnailConfig,
    backend: &impl ImageBackend,
    events: Option<Sender<BuildEvent>>,
) -> Result<BuildSummary, PipelineError> {
    if !root.is_dir() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("output directory not found: {}", root.display()),
        )
        .into());
    }
    let mut bundle = Bundle::load_dir(root)?;
    let mut summary = run(&mut bundle, config, backend, events);
    summary.written = bundle.write_dir(root)?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::MockBackend;
    use crate::test_helpers::{SITE_JS, kb, noisy_jpeg, site_bundle, write_all};
    use std::sync::mpsc;

    fn text<'a>(bundle: &'a Bundle, path: &str) -> &'a str {
        bundle.get(path).unwrap().text().unwrap()
    }

    fn build(config: &ThumbnailConfig) -> (Bundle, BuildSummary, Vec<BuildEvent>) {
        let mut bundle = site_bundle();
        let (tx, rx) = mpsc::channel();
        let summary = run(&mut bundle, config, &MockBackend::new(), Some(tx));
        let events = rx.iter().collect();
        (bundle, summary, events)
    }

    fn with_backgrounds() -> ThumbnailConfig {
        ThumbnailConfig {
            skip_background: false,
            ..ThumbnailConfig::default()
        }
    }

    // =========================================================================
    // Thumbnail phase
    // =========================================================================

    #[test]
    fn large_image_gets_thumbnail_small_one_does_not() {
        let (bundle, summary, _) = build(&ThumbnailConfig::default());

        assert!(bundle.contains("images/thumb_photo.jpg"));
        assert!(!bundle.contains("icons/thumb_small.png"));
        assert_eq!(summary.thumbnails.emitted.len(), 1);
        assert_eq!(summary.thumbnails.skipped, 1);
        // Originals survive
        assert_eq!(bundle.get("images/photo.jpg").unwrap().len(), kb(200));
        assert!(bundle.contains("icons/small.png"));
    }

    // =========================================================================
    // Rewrite phase
    // =========================================================================

    #[test]
    fn script_references_point_at_thumbnails() {
        let (bundle, _, _) = build(&ThumbnailConfig::default());
        let code = text(&bundle, "assets/app.js");
        assert!(code.contains("\"images/thumb_photo.jpg\""));
        // Not emitted, so unchanged
        assert!(code.contains("'icons/small.png'"));
        assert!(bundle.get("assets/app.js").unwrap().map.is_some());
    }

    #[test]
    fn stylesheets_untouched_by_default() {
        let (bundle, _, _) = build(&ThumbnailConfig::default());
        let css = text(&bundle, "css/site.css");
        assert!(css.contains("url(../images/photo.jpg)"));
        assert!(!bundle.get("css/site.css").unwrap().is_dirty());
    }

    #[test]
    fn stylesheets_rewritten_when_backgrounds_enabled() {
        let (bundle, _, _) = build(&with_backgrounds());
        let css = text(&bundle, "css/site.css");
        assert!(css.contains("url(../images/thumb_photo.jpg)"));
        assert!(css.contains("url(/icons/small.png)"));
    }

    #[test]
    fn every_page_gets_the_runtime_once() {
        let (bundle, summary, _) = build(&ThumbnailConfig::default());
        for page in ["index.html", "blog/post.html"] {
            let html = text(&bundle, page);
            assert_eq!(html.matches("data-lazy-thumbnails").count(), 1, "{page}");
            assert!(html.contains("var BACKGROUNDS = false;"));
        }
        assert_eq!(summary.injected, 2);
    }

    #[test]
    fn markup_attributes_rewritten_only_when_enabled() {
        let (bundle, _, _) = build(&ThumbnailConfig::default());
        assert!(text(&bundle, "index.html").contains(r#"<img src="images/photo.jpg""#));

        let config = ThumbnailConfig {
            rewrite_markup: true,
            ..ThumbnailConfig::default()
        };
        let (bundle, _, _) = build(&config);
        assert!(text(&bundle, "index.html").contains(r#"<img src="images/thumb_photo.jpg""#));
    }

    #[test]
    fn markup_styles_follow_the_background_switch() {
        let page = "<html><head><style>.hero{background:url(images/photo.jpg)}</style></head>\n\
                    <body><div style=\"background-image:url(images/photo.jpg)\"></div>\n\
                    <img src=\"images/photo.jpg\"></body></html>\n";
        let markup_only = ThumbnailConfig {
            rewrite_markup: true,
            ..ThumbnailConfig::default()
        };
        let mut bundle = site_bundle();
        bundle.insert_asset("styled.html", page);
        run(&mut bundle, &markup_only, &MockBackend::new(), None);

        // The controller will not swap backgrounds, so none may point at a thumbnail
        let html = text(&bundle, "styled.html");
        assert!(html.contains("var BACKGROUNDS = false;"));
        assert!(!html.contains("url(images/thumb_photo.jpg)"));
        assert!(html.contains(r#"<img src="images/thumb_photo.jpg">"#));

        let both = ThumbnailConfig {
            rewrite_markup: true,
            skip_background: false,
            ..ThumbnailConfig::default()
        };
        let mut bundle = site_bundle();
        bundle.insert_asset("styled.html", page);
        run(&mut bundle, &both, &MockBackend::new(), None);

        let html = text(&bundle, "styled.html");
        assert!(html.contains("var BACKGROUNDS = true;"));
        assert!(html.contains(".hero{background:url(images/thumb_photo.jpg)}"));
        assert!(html.contains(r#"style="background-image:url(images/thumb_photo.jpg)""#));
    }

    // =========================================================================
    // Source maps
    // =========================================================================

    const BUNDLER_MAP: &str =
        r#"{"version":3,"sources":["../src/app.ts"],"names":[],"mappings":"AAAA,MAAM,aAAa"}"#;

    #[test]
    fn sibling_map_is_updated_with_the_chunk() {
        let mut bundle = site_bundle();
        bundle.insert_asset("assets/app.js.map", BUNDLER_MAP);
        let (tx, rx) = mpsc::channel();
        run(&mut bundle, &ThumbnailConfig::default(), &MockBackend::new(), Some(tx));

        let entry = bundle.get("assets/app.js.map").unwrap();
        assert!(entry.is_dirty());
        let json: serde_json::Value = serde_json::from_str(entry.text().unwrap()).unwrap();
        assert_eq!(json["sources"][0], "../src/app.ts");
        assert_ne!(json["mappings"], "AAAA,MAAM,aAAa");
        assert!(rx.iter().any(|e| matches!(
            e,
            BuildEvent::SourceMapUpdated { ref path } if path == "assets/app.js.map"
        )));
    }

    #[test]
    fn mapping_url_names_the_map_file() {
        let mut bundle = site_bundle();
        let code = format!("{SITE_JS}//# sourceMappingURL=../maps/app.map\n");
        bundle.insert_chunk("assets/app.js", code);
        run(&mut bundle, &ThumbnailConfig::default(), &MockBackend::new(), None);

        // Not present before, so the rewrite's own map is written there
        let entry = bundle.get("maps/app.map").unwrap();
        let json: serde_json::Value = serde_json::from_str(entry.text().unwrap()).unwrap();
        assert_eq!(json["sources"][0], "/assets/app.js");
        assert!(!bundle.contains("assets/app.js.map"));
    }

    #[test]
    fn chunk_without_map_file_gets_none() {
        let (bundle, _, events) = build(&ThumbnailConfig::default());
        assert!(!bundle.contains("assets/app.js.map"));
        assert!(!events
            .iter()
            .any(|e| matches!(e, BuildEvent::SourceMapUpdated { .. })));
    }

    #[test]
    fn map_target_forms() {
        let mut bundle = Bundle::new();
        bundle.insert_asset("js/b.js.map", "{}");
        assert_eq!(map_target("js/a.js", "x()", &bundle), None);
        assert_eq!(
            map_target("js/b.js", "x()", &bundle).as_deref(),
            Some("js/b.js.map")
        );
        assert_eq!(
            map_target("js/a.js", "x()\n//# sourceMappingURL=a.js.map", &bundle).as_deref(),
            Some("js/a.js.map")
        );
        assert_eq!(
            map_target("js/a.js", "x()\n/*# sourceMappingURL=/maps/a.map*/", &bundle).as_deref(),
            Some("maps/a.map")
        );
        assert_eq!(
            map_target(
                "js/a.js",
                "//# sourceMappingURL=data:application/json;base64,e30=",
                &bundle
            ),
            None
        );
        assert_eq!(
            map_target("js/a.js", "//# sourceMappingURL=https://cdn/a.map", &bundle),
            None
        );
    }

    #[test]
    fn failed_thumbnail_keeps_original_references() {
        let mut bundle = site_bundle();
        let backend = MockBackend::new().failing_on("images/photo.jpg");
        let summary = run(&mut bundle, &with_backgrounds(), &backend, None);

        assert_eq!(summary.thumbnails.failed, 1);
        assert!(!bundle.contains("images/thumb_photo.jpg"));
        assert!(text(&bundle, "assets/app.js").contains("\"images/photo.jpg\""));
        assert!(text(&bundle, "css/site.css").contains("url(../images/photo.jpg)"));
    }

    #[test]
    fn unparseable_chunk_is_reported_and_kept() {
        let mut bundle = site_bundle();
        bundle.insert_chunk("assets/broken.js", "const = 'images/photo.jpg' {");
        let (tx, rx) = mpsc::channel();
        let summary = run(&mut bundle, &ThumbnailConfig::default(), &MockBackend::new(), Some(tx));

        assert_eq!(summary.unparsed, 1);
        assert_eq!(
            text(&bundle, "assets/broken.js"),
            "const = 'images/photo.jpg' {"
        );
        assert!(rx.iter().any(|e| matches!(
            e,
            BuildEvent::ScriptUnparsed { ref path } if path == "assets/broken.js"
        )));
    }

    #[test]
    fn second_run_changes_nothing() {
        let config = ThumbnailConfig {
            rewrite_markup: true,
            skip_background: false,
            ..ThumbnailConfig::default()
        };
        let mut bundle = site_bundle();
        run(&mut bundle, &config, &MockBackend::new(), None);
        let first = bundle.clone();

        let backend = MockBackend::new();
        let summary = run(&mut bundle, &config, &backend, None);

        assert_eq!(summary.rewritten, 0);
        assert_eq!(summary.injected, 0);
        assert!(!bundle.contains("images/thumb_thumb_photo.jpg"));
        for (path, entry) in first.iter() {
            assert_eq!(bundle.get(path).unwrap().bytes(), entry.bytes(), "{path}");
        }
    }

    #[test]
    fn events_arrive_in_path_order() {
        let (_, summary, events) = build(&with_backgrounds());
        let rewritten: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                BuildEvent::ArtifactRewritten { path, .. } => Some(path.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(rewritten, ["assets/app.js", "css/site.css"]);
        assert_eq!(summary.rewritten, 2);
    }

    #[test]
    fn real_backend_end_to_end() {
        let mut bundle = Bundle::new();
        bundle.insert_asset("images/photo.jpg", noisy_jpeg(400, 300));
        bundle.insert_chunk("app.js", SITE_JS);

        let summary = run(
            &mut bundle,
            &ThumbnailConfig::default(),
            &crate::imaging::RustBackend::new(),
            None,
        );

        assert_eq!(summary.thumbnails.failed, 0);
        let thumb = bundle.get("images/thumb_photo.jpg").unwrap();
        let decoded = image::load_from_memory(thumb.bytes()).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (128, 96));
        assert!(thumb.len() < bundle.get("images/photo.jpg").unwrap().len());
        assert!(text(&bundle, "app.js").contains("images/thumb_photo.jpg"));
    }

    // =========================================================================
    // Directory builds
    // =========================================================================

    #[test]
    fn build_dir_writes_only_changes() {
        let tmp = tempfile::TempDir::new().unwrap();
        write_all(&site_bundle(), tmp.path());

        let summary =
            build_dir(tmp.path(), &with_backgrounds(), &MockBackend::new(), None).unwrap();

        // thumbnail, app.js, site.css, two pages
        assert_eq!(summary.written, 5);
        assert!(tmp.path().join("images/thumb_photo.jpg").exists());
        let css = std::fs::read_to_string(tmp.path().join("css/site.css")).unwrap();
        assert!(css.contains("thumb_photo.jpg"));
    }

    #[test]
    fn build_dir_missing_directory_fails() {
        let tmp = tempfile::TempDir::new().unwrap();
        let result = build_dir(
            &tmp.path().join("nope"),
            &ThumbnailConfig::default(),
            &MockBackend::new(),
            None,
        );
        assert!(matches!(result, Err(PipelineError::Io(_))));
    }
}
