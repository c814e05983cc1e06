//! The thumbnail naming convention shared by every stage.
//!
//! A thumbnail lives next to its original and carries a fixed prefix on the
//! basename:
//!
//! ```text
//! images/photo.jpg      →  images/thumb_photo.jpg
//! /assets/hero-4f2a.png →  /assets/thumb_hero-4f2a.png
//! logo.webp             →  thumb_logo.webp
//! ```
//!
//! The generator, all three reference rewriters and the browser controller
//! agree on this mapping, so it is defined exactly once. Paths are always
//! handled with forward slashes; backslashes from Windows-style inputs are
//! normalized before anything else happens.
//!
//! ## Precondition
//!
//! [`to_original`] strips the *first* occurrence of [`THUMBNAIL_PREFIX`] from
//! the basename. An original whose basename already contains the prefix is
//! indistinguishable from a thumbnail at runtime, so such files are reported
//! by [`has_prefix_conflict`] and left alone by the build. Renaming them is
//! the caller's job.

/// Literal prepended to an original's basename to form the thumbnail name.
pub const THUMBNAIL_PREFIX: &str = "thumb_";

/// Image extensions eligible for thumbnail generation and reference rewriting.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "avif", "gif"];

/// Normalize separators to forward slashes.
pub fn normalize(path: &str) -> String {
    path.replace('\\', "/")
}

/// Split a slash-normalized path into `(directory_with_trailing_slash, basename)`.
///
/// The directory part keeps its trailing slash (or is empty) so the two halves
/// concatenate back to the input unchanged.
fn split_basename(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(pos) => (&path[..=pos], &path[pos + 1..]),
        None => ("", path),
    }
}

/// Basename of a path (text after the last `/` or `\`).
pub fn basename(path: &str) -> &str {
    let cut = path.rfind(['/', '\\']).map(|p| p + 1).unwrap_or(0);
    &path[cut..]
}

/// Directory of a slash-normalized path without trailing slash (`""` at root).
pub fn dirname(path: &str) -> &str {
    match path.rfind('/') {
        Some(pos) => &path[..pos],
        None => "",
    }
}

/// Lowercased extension of the basename, if any.
pub fn extension(path: &str) -> Option<String> {
    let name = basename(path);
    let dot = name.rfind('.')?;
    if dot == 0 || dot + 1 == name.len() {
        return None;
    }
    Some(name[dot + 1..].to_ascii_lowercase())
}

/// Whether the path names a qualifying image (case-insensitive extension match).
pub fn is_image_path(path: &str) -> bool {
    extension(path).is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

/// Whether the basename carries the thumbnail prefix anywhere.
///
/// This is the runtime eligibility test: the browser controller treats any
/// element whose basename contains the prefix as a thumbnail.
pub fn is_thumbnail(path: &str) -> bool {
    basename(path).contains(THUMBNAIL_PREFIX)
}

/// An *original* whose basename already contains the prefix breaks the
/// convention's invertibility and must not be processed.
pub fn has_prefix_conflict(original: &str) -> bool {
    is_thumbnail(original)
}

/// Map an original asset path to its thumbnail path.
///
/// The directory part is kept verbatim (including `./`, `../` or a leading
/// `/`), so the result is valid wherever the input was.
pub fn to_thumbnail(original: &str) -> String {
    let normalized = normalize(original);
    let (dir, name) = split_basename(&normalized);
    format!("{dir}{THUMBNAIL_PREFIX}{name}")
}

/// Map a thumbnail path back to its original by removing the first prefix
/// occurrence from the basename. Paths without the prefix come back unchanged.
pub fn to_original(thumbnail: &str) -> String {
    let normalized = normalize(thumbnail);
    let (dir, name) = split_basename(&normalized);
    match name.find(THUMBNAIL_PREFIX) {
        Some(pos) => format!(
            "{dir}{}{}",
            &name[..pos],
            &name[pos + THUMBNAIL_PREFIX.len()..]
        ),
        None => normalized,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thumbnail_in_subdirectory() {
        assert_eq!(to_thumbnail("images/photo.jpg"), "images/thumb_photo.jpg");
    }

    #[test]
    fn thumbnail_at_root() {
        assert_eq!(to_thumbnail("logo.webp"), "thumb_logo.webp");
    }

    #[test]
    fn thumbnail_keeps_leading_slash_and_dot_segments() {
        assert_eq!(
            to_thumbnail("/assets/hero-4f2a.png"),
            "/assets/thumb_hero-4f2a.png"
        );
        assert_eq!(to_thumbnail("./img/a.gif"), "./img/thumb_a.gif");
        assert_eq!(to_thumbnail("../img/a.gif"), "../img/thumb_a.gif");
    }

    #[test]
    fn thumbnail_normalizes_backslashes() {
        assert_eq!(
            to_thumbnail("images\\nested\\photo.JPG"),
            "images/nested/thumb_photo.JPG"
        );
    }

    #[test]
    fn original_strips_first_prefix_only() {
        assert_eq!(to_original("images/thumb_photo.jpg"), "images/photo.jpg");
        assert_eq!(
            to_original("images/thumb_thumb_photo.jpg"),
            "images/thumb_photo.jpg"
        );
    }

    #[test]
    fn original_ignores_prefix_in_directory() {
        assert_eq!(to_original("thumb_dir/photo.jpg"), "thumb_dir/photo.jpg");
    }

    #[test]
    fn original_of_plain_path_is_unchanged() {
        assert_eq!(to_original("images/photo.jpg"), "images/photo.jpg");
    }

    #[test]
    fn round_trip_holds_for_unprefixed_basenames() {
        for path in [
            "a.jpg",
            "images/photo.jpg",
            "/assets/x-1a2b.png",
            "deep/er/path/with.dots.webp",
            "./rel/pic.avif",
            "thumb_dir/pic.gif",
            "my_thumbnail.jpeg",
        ] {
            assert_eq!(to_original(&to_thumbnail(path)), path, "{path}");
        }
    }

    #[test]
    fn image_predicate_is_case_insensitive() {
        assert!(is_image_path("a/B.JPG"));
        assert!(is_image_path("c.jpeg"));
        assert!(is_image_path("d.Png"));
        assert!(is_image_path("e.webp"));
        assert!(is_image_path("f.avif"));
        assert!(is_image_path("g.gif"));
        assert!(!is_image_path("h.svg"));
        assert!(!is_image_path("i.jpg.map"));
        assert!(!is_image_path("jpg"));
        assert!(!is_image_path("dir.jpg/file"));
    }

    #[test]
    fn extension_edge_cases() {
        assert_eq!(extension("a/b.TXT"), Some("txt".to_string()));
        assert_eq!(extension(".hidden"), None);
        assert_eq!(extension("trailing."), None);
        assert_eq!(extension("noext"), None);
    }

    #[test]
    fn prefix_conflict_detection() {
        assert!(has_prefix_conflict("images/thumb_photo.jpg"));
        assert!(has_prefix_conflict("images/my-thumb_photo.jpg"));
        assert!(!has_prefix_conflict("thumb_dir/photo.jpg"));
        assert!(!has_prefix_conflict("images/thumbnail.jpg"));
    }

    #[test]
    fn dirname_and_basename() {
        assert_eq!(dirname("a/b/c.jpg"), "a/b");
        assert_eq!(dirname("c.jpg"), "");
        assert_eq!(basename("a/b/c.jpg"), "c.jpg");
        assert_eq!(basename("a\\b\\c.jpg"), "c.jpg");
    }
}
