//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the high-level [`operations`](super::operations) module
//! (which decides what thumbnail to create) and the [`backend`](super::backend)
//! (which does the actual pixel work). This separation allows swapping backends
//! (e.g. for testing with a mock) without changing operation logic.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality. Carried as given; the encoder rejects values outside 1–100.
//! - [`OutputFormat`]: Concrete encoding of a thumbnail, resolved from the configured format.
//! - [`SourceImage`]: An original's bundle path plus its encoded bytes.
//! - [`ThumbnailParams`]: Everything needed to produce a thumbnail: source, bounding box fit, quality, format.

use crate::config::FormatChoice;
use crate::naming;

/// Quality setting for lossy image encoding.
///
/// Not clamped: an out-of-range configured value must surface as an encoder
/// failure for that asset, not be silently corrected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub i64);

impl Quality {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn value(self) -> i64 {
        self.0
    }

    pub fn is_valid(self) -> bool {
        (1..=100).contains(&self.0)
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(30)
    }
}

/// Encoding used for a generated thumbnail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg,
    Png,
    Webp,
}

impl OutputFormat {
    /// Resolve the configured choice against the original's path.
    ///
    /// `Auto` keeps PNG and WebP sources in their own format and encodes
    /// everything else (JPEG, AVIF, GIF) as JPEG. An explicit choice is used
    /// regardless of the source.
    pub fn resolve(choice: FormatChoice, original: &str) -> Self {
        match choice {
            FormatChoice::Png => Self::Png,
            FormatChoice::Webp => Self::Webp,
            FormatChoice::Jpeg => Self::Jpeg,
            FormatChoice::Auto => match naming::extension(original).as_deref() {
                Some("png") => Self::Png,
                Some("webp") => Self::Webp,
                _ => Self::Jpeg,
            },
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Webp => "webp",
        }
    }
}

/// An original image as found in the bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceImage<'a> {
    /// Bundle-relative path, used for format sniffing and diagnostics.
    pub path: &'a str,
    pub bytes: &'a [u8],
}

impl<'a> SourceImage<'a> {
    pub fn new(path: &'a str, bytes: &'a [u8]) -> Self {
        Self { path, bytes }
    }

    /// AVIF by extension or by the `ftypavif` brand in the ISO-BMFF header.
    pub fn is_avif(&self) -> bool {
        naming::extension(self.path).as_deref() == Some("avif")
            || self.bytes.get(4..12) == Some(b"ftypavif".as_slice())
    }
}

/// Parameters for a thumbnail operation (fit inside a bounding box, re-encode).
#[derive(Debug, Clone, PartialEq)]
pub struct ThumbnailParams<'a> {
    pub source: SourceImage<'a>,
    /// Final output dimensions.
    pub width: u32,
    pub height: u32,
    pub quality: Quality,
    pub format: OutputFormat,
}
