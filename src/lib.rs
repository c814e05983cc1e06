//! # Lazy Thumbnails
//!
//! Progressive image delivery for statically built web sites. Pages ship
//! with small, low-quality thumbnails in place of their images; a tiny
//! script injected into every page swaps each thumbnail for its original
//! once the original is available, blurring the thumbnail while it loads.
//!
//! # Architecture: Build Time and Run Time
//!
//! ```text
//! build   dist/photo.jpg  →  dist/thumb_photo.jpg       (generate)
//!         dist/*.css|js   →  references to thumb_*      (rewrite)
//!         dist/*.html     →  + <script> swap controller  (inject)
//!
//! browser thumb_photo.jpg →  photo.jpg                  (swap)
//! ```
//!
//! Everything is tied together by one naming convention ([`naming`]): a
//! thumbnail sits next to its original with a `thumb_` prefix on the
//! basename. The build derives thumbnail names from originals; the browser
//! derives originals from thumbnail names. No manifest is shipped.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`naming`] | The `thumb_` path convention shared by every stage |
//! | [`bundle`] | In-memory output set, loaded from and written back to a directory |
//! | [`imaging`] | Backend trait, fit math and the pure-Rust codec |
//! | [`thumbnails`] | Parallel thumbnail generation over a bundle |
//! | [`rewrite`] | Reference rewriting in style sheets, script chunks and pages |
//! | [`runtime`] | The browser swap controller and its renderer |
//! | [`pipeline`] | Build orchestration and progress events |
//! | [`config`] | `thumbnails.toml` loading, defaults and merging |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Nothing Is Removed
//!
//! The build only adds files and edits references. Originals stay in the
//! output directory because the browser fetches them after the page loads.
//! Re-running a build over its own output is safe: existing thumbnails are
//! recognised by their prefix and rewritten references are left alone.
//!
//! ## Failures Stay Local
//!
//! An image that fails to encode simply gets no thumbnail, and references to
//! it are not rewritten. A script chunk that does not parse is passed through
//! untouched. Neither fails the build.
//!
//! ## Pure Rust Imaging
//!
//! Decoding, resizing and encoding go through the `image` crate, with
//! `rav1d` for AVIF sources. The binary has no system dependencies.

pub mod bundle;
pub mod config;
pub mod imaging;
pub mod naming;
pub mod output;
pub mod pipeline;
pub mod rewrite;
pub mod runtime;
pub mod thumbnails;

#[cfg(test)]
pub(crate) mod test_helpers;
