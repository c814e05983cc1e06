//! High-level image operations.
//!
//! These functions combine calculations with backend execution.
//! They take configuration, compute parameters, and call the backend.

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::calculations::fit_within;
use super::params::{OutputFormat, Quality, SourceImage, ThumbnailParams};
use crate::config::ThumbnailConfig;

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Get image dimensions using the backend.
pub fn get_dimensions(backend: &impl ImageBackend, source: &SourceImage) -> Result<(u32, u32)> {
    let dims = backend.identify(source)?;
    Ok((dims.width, dims.height))
}

/// An encoded thumbnail ready to be emitted.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedThumbnail {
    pub bytes: Vec<u8>,
    pub dimensions: Dimensions,
    pub format: OutputFormat,
}

/// Plan a thumbnail operation without executing it.
///
/// Useful for testing parameter generation.
pub fn plan_thumbnail<'a>(
    source: SourceImage<'a>,
    original_dims: (u32, u32),
    config: &ThumbnailConfig,
) -> ThumbnailParams<'a> {
    let (width, height) = fit_within(original_dims, config.width, config.height);

    ThumbnailParams {
        source,
        width,
        height,
        quality: Quality::new(config.quality),
        format: OutputFormat::resolve(config.format, source.path),
    }
}

/// Create a thumbnail for one original.
///
/// Identifies the source, fits it inside the configured box and encodes it
/// in the resolved format.
pub fn create_thumbnail(
    backend: &impl ImageBackend,
    source: SourceImage,
    config: &ThumbnailConfig,
) -> Result<GeneratedThumbnail> {
    let original_dims = get_dimensions(backend, &source)?;
    let params = plan_thumbnail(source, original_dims, config);
    let bytes = backend.thumbnail(&params)?;

    Ok(GeneratedThumbnail {
        bytes,
        dimensions: Dimensions {
            width: params.width,
            height: params.height,
        },
        format: params.format,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FormatChoice;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};

    #[test]
    fn get_dimensions_calls_backend() {
        let backend = MockBackend::with_dimensions(Dimensions {
            width: 1920,
            height: 1080,
        });

        let dims = get_dimensions(&backend, &SourceImage::new("test.jpg", b"")).unwrap();
        assert_eq!(dims, (1920, 1080));
    }

    #[test]
    fn plan_thumbnail_uses_config() {
        let config = ThumbnailConfig {
            quality: 45,
            width: 100,
            ..ThumbnailConfig::default()
        };
        let params = plan_thumbnail(SourceImage::new("a/b.png", b""), (400, 200), &config);

        assert_eq!(params.width, 100);
        assert_eq!(params.height, 50);
        assert_eq!(params.quality, Quality::new(45));
        assert_eq!(params.format, OutputFormat::Png);
    }

    #[test]
    fn plan_thumbnail_respects_height_box() {
        let config = ThumbnailConfig {
            width: 128,
            height: Some(32),
            format: FormatChoice::Webp,
            ..ThumbnailConfig::default()
        };
        let params = plan_thumbnail(SourceImage::new("a.jpg", b""), (800, 600), &config);

        assert_eq!((params.width, params.height), (43, 32));
        assert_eq!(params.format, OutputFormat::Webp);
    }

    #[test]
    fn create_thumbnail_identifies_then_encodes() {
        let backend = MockBackend::new();
        let thumb = create_thumbnail(
            &backend,
            SourceImage::new("img/photo.jpg", b""),
            &ThumbnailConfig::default(),
        )
        .unwrap();

        assert_eq!(thumb.dimensions.width, 128);
        assert_eq!(thumb.dimensions.height, 96);
        assert_eq!(thumb.format, OutputFormat::Jpeg);

        let ops = backend.get_operations();
        assert_eq!(ops.len(), 2);
        assert!(matches!(&ops[0], RecordedOp::Identify(p) if p == "img/photo.jpg"));
        assert!(matches!(
            &ops[1],
            RecordedOp::Thumbnail {
                width: 128,
                height: 96,
                quality: 30,
                format: OutputFormat::Jpeg,
                ..
            }
        ));
    }

    #[test]
    fn create_thumbnail_propagates_identify_failure() {
        let backend = MockBackend::new().failing_on("bad.jpg");
        let result = create_thumbnail(
            &backend,
            SourceImage::new("bad.jpg", b""),
            &ThumbnailConfig::default(),
        );
        assert!(result.is_err());
        // No encode attempted after a failed identify
        assert_eq!(backend.get_operations().len(), 1);
    }
}
