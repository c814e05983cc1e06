//! The output bundle: every artifact of a build keyed by its output path.
//!
//! A [`Bundle`] is the in-memory stand-in for a bundler's output set. Paths
//! are relative to the output root and always use forward slashes. Entries
//! are either plain assets (images, style sheets, HTML) or script chunks;
//! the distinction decides which rewriter looks at an entry.
//!
//! The build only ever adds and modifies entries, it never removes them, so
//! originals stay available to the browser after their thumbnails are added.
//!
//! ```text
//! dist/                         Bundle
//! ├── index.html          →     "index.html"        Asset
//! ├── assets/app.js       →     "assets/app.js"     Chunk
//! └── images/photo.jpg    →     "images/photo.jpg"  Asset
//! ```
//!
//! [`Bundle::load_dir`] and [`Bundle::write_dir`] connect a bundle to a directory on
//! disk. Only entries that were added or changed during the build are written
//! back.

use crate::naming;
use crate::rewrite::sourcemap::SourceMap;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum BundleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Path is not valid UTF-8: {0}")]
    NonUtf8Path(String),
    #[error("Path outside the output root: {0}")]
    OutsideRoot(String),
}

/// Whether an entry is an already-final asset or a script chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Asset,
    Chunk,
}

/// One artifact in the bundle.
#[derive(Debug, Clone, PartialEq)]
pub struct BundleEntry {
    pub kind: AssetKind,
    contents: Vec<u8>,
    /// Source map produced when a chunk was rewritten.
    pub map: Option<SourceMap>,
    dirty: bool,
}

impl BundleEntry {
    pub fn bytes(&self) -> &[u8] {
        &self.contents
    }

    pub fn len(&self) -> usize {
        self.contents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }

    /// Contents as text, if they are valid UTF-8.
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.contents).ok()
    }

    /// Replace the contents with rewritten text.
    pub fn set_text(&mut self, text: String) {
        self.contents = text.into_bytes();
        self.dirty = true;
    }

    /// Whether the entry was added or modified since loading.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

/// Ordered map of output path → artifact.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bundle {
    entries: BTreeMap<String, BundleEntry>,
}

impl Bundle {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, path: &str, kind: AssetKind, contents: Vec<u8>, dirty: bool) {
        self.entries.insert(
            naming::normalize(path),
            BundleEntry {
                kind,
                contents,
                map: None,
                dirty,
            },
        );
    }

    /// Add an existing asset, as a bundler would hand it over.
    pub fn insert_asset(&mut self, path: &str, contents: impl Into<Vec<u8>>) {
        self.insert(path, AssetKind::Asset, contents.into(), false);
    }

    /// Add an existing script chunk.
    pub fn insert_chunk(&mut self, path: &str, code: impl Into<String>) {
        self.insert(path, AssetKind::Chunk, code.into().into_bytes(), false);
    }

    /// Emit a new asset produced by the build. Replaces any entry at `path`.
    pub fn emit_file(&mut self, path: &str, contents: Vec<u8>) {
        self.insert(path, AssetKind::Asset, contents, true);
    }

    pub fn get(&self, path: &str) -> Option<&BundleEntry> {
        self.entries.get(path)
    }

    pub fn get_mut(&mut self, path: &str) -> Option<&mut BundleEntry> {
        self.entries.get_mut(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BundleEntry)> {
        self.entries.iter()
    }

    /// Mutable access to the underlying map, for parallel rewrite passes.
    pub fn entries_mut(&mut self) -> &mut BTreeMap<String, BundleEntry> {
        &mut self.entries
    }

    /// Load every file below `root` into a bundle.
    ///
    /// `.js`, `.mjs` and `.cjs` files become chunks; everything else is an asset.
    /// Hidden files and directories (leading `.`) are skipped.
    pub fn load_dir(root: &Path) -> Result<Self, BundleError> {
        let mut bundle = Self::new();
        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));

        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(root)
                .map_err(|_| BundleError::OutsideRoot(entry.path().display().to_string()))?;
            let path = relative
                .to_str()
                .ok_or_else(|| BundleError::NonUtf8Path(relative.display().to_string()))?;
            let path = naming::normalize(path);
            let contents = fs::read(entry.path())?;

            let kind = if is_script(&path) {
                AssetKind::Chunk
            } else {
                AssetKind::Asset
            };
            bundle.insert(&path, kind, contents, false);
        }
        Ok(bundle)
    }

    /// Write every added or modified entry below `root`, creating directories
    /// as needed. Returns the number of files written.
    pub fn write_dir(&self, root: &Path) -> Result<usize, BundleError> {
        let mut written = 0;
        for (path, entry) in self.entries.iter().filter(|(_, e)| e.dirty) {
            let target = root.join(path);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&target, &entry.contents)?;
            written += 1;
        }
        Ok(written)
    }
}

/// Script files handed to the script rewriter.
fn is_script(path: &str) -> bool {
    matches!(
        naming::extension(path).as_deref(),
        Some("js" | "mjs" | "cjs")
    )
}
