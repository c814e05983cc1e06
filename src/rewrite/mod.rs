//! Static reference rewriting.
//!
//! After thumbnails are generated, text artifacts are edited so they request
//! the thumbnail instead of the original:
//!
//! | Artifact | Pass | Edits |
//! |---|---|---|
//! | style sheet | [`css`] | the text inside `url(...)` |
//! | script chunk | [`script`] | string literal tokens, with a source map |
//! | HTML page | [`markup`] | runtime injection; attributes when enabled |
//!
//! All passes share one [`ReferenceResolver`], which decides whether a
//! reference points at an original that actually got a thumbnail. The passes
//! only read and write their own artifact, so they run independently.

pub mod css;
pub mod markup;
pub mod script;
pub mod sourcemap;

use crate::naming;
use std::collections::BTreeSet;

/// How a relative reference in an artifact is anchored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// Relative to the referencing file's directory (style sheets, markup).
    Artifact,
    /// Relative to the output root (script strings are document-relative).
    Root,
}

/// Maps references found in artifacts to thumbnail references.
///
/// A reference is rewritten only when it resolves to an original in
/// `emitted`, so references to skipped or failed images stay as they are.
#[derive(Debug, Clone)]
pub struct ReferenceResolver<'a> {
    emitted: &'a BTreeSet<String>,
    base: String,
}

impl<'a> ReferenceResolver<'a> {
    /// `base` is the public base path of the site; it is normalized to
    /// carry a trailing slash.
    pub fn new(emitted: &'a BTreeSet<String>, base: &str) -> Self {
        let mut base = base.trim().to_string();
        if base.is_empty() {
            base.push('/');
        }
        if !base.ends_with('/') {
            base.push('/');
        }
        Self { emitted, base }
    }

    /// Return the thumbnail form of `reference` found in `artifact`, or
    /// `None` when the reference must stay unchanged.
    ///
    /// The query and fragment are carried over verbatim. The directory part
    /// of the reference is kept as written, only the basename changes.
    pub fn resolve(&self, reference: &str, artifact: &str, anchor: Anchor) -> Option<String> {
        let (path, suffix) = split_suffix(reference);
        if path.is_empty() || !naming::is_image_path(path) || naming::is_thumbnail(path) {
            return None;
        }

        let from_base = (self.base != "/")
            .then(|| path.strip_prefix(self.base.as_str()))
            .flatten();
        let candidates: Vec<String> = if let Some(rest) = from_base {
            vec![join_normalized("", rest)?]
        } else if has_scheme(path) || path.starts_with("//") {
            return None;
        } else if let Some(rest) = path.strip_prefix('/') {
            vec![join_normalized("", rest)?]
        } else {
            let local = join_normalized(naming::dirname(artifact), path);
            let root = join_normalized("", path);
            match anchor {
                Anchor::Artifact => [local, root].into_iter().flatten().collect(),
                Anchor::Root => [root, local].into_iter().flatten().collect(),
            }
        };

        candidates
            .iter()
            .any(|c| self.emitted.contains(c))
            .then(|| format!("{}{}", naming::to_thumbnail(path), suffix))
    }
}

/// Split `path?query#hash` into the path and the verbatim remainder.
pub(crate) fn split_suffix(reference: &str) -> (&str, &str) {
    match reference.find(['?', '#']) {
        Some(pos) => (&reference[..pos], &reference[pos..]),
        None => (reference, ""),
    }
}

/// `data:`, `http:`, `blob:` and friends.
fn has_scheme(reference: &str) -> bool {
    let Some(colon) = reference.find(':') else {
        return false;
    };
    let scheme = &reference[..colon];
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Join `rel` onto `dir` and collapse `.`/`..` segments.
///
/// Returns `None` when `..` climbs above the output root, which cannot name
/// a bundle entry.
pub(crate) fn join_normalized(dir: &str, rel: &str) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    for segment in dir.split('/').chain(rel.split('/')) {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            s => parts.push(s),
        }
    }
    Some(parts.join("/"))
}
