//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the two operations every backend must
//! support: identify and thumbnail. Both work on in-memory bytes because the
//! originals come out of a [`Bundle`](crate::bundle::Bundle), not from disk.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), written in pure Rust and
//! statically linked into the binary.

use super::params::{SourceImage, ThumbnailParams};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for image processing backends.
///
/// `Sync` so one backend can be shared by every rayon worker.
pub trait ImageBackend: Sync {
    /// Get image dimensions.
    fn identify(&self, source: &SourceImage) -> Result<Dimensions, BackendError>;

    /// Decode, resize to exactly `width`×`height` and encode. Returns the
    /// encoded thumbnail bytes.
    fn thumbnail(&self, params: &ThumbnailParams) -> Result<Vec<u8>, BackendError>;
}
