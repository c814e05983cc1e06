//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// Calculate the largest size that fits inside a bounding box.
///
/// The aspect ratio of `source` is preserved and images are never scaled up.
/// When `height` is `None` only the width constrains the result.
///
/// # Arguments
/// * `source` - Original image dimensions (width, height)
/// * `width` - Bounding box width
/// * `height` - Optional bounding box height
///
/// # Returns
/// * `(width, height)` - Output dimensions, each at least 1 unless the box
///   itself has a zero side, in which case `(0, 0)` is returned and the
///   encoder reports the failure.
///
/// # Examples
/// ```
/// # use lazy_thumbnails::imaging::fit_within;
/// // 1200x800 into a 128px wide box → 128x85
/// assert_eq!(fit_within((1200, 800), 128, None), (128, 85));
///
/// // Smaller than the box: unchanged
/// assert_eq!(fit_within((100, 50), 128, None), (100, 50));
/// ```
pub fn fit_within(source: (u32, u32), width: u32, height: Option<u32>) -> (u32, u32) {
    let (src_w, src_h) = source;
    if width == 0 || height == Some(0) || src_w == 0 || src_h == 0 {
        return (0, 0);
    }

    let scale_w = width as f64 / src_w as f64;
    let scale = match height {
        Some(h) => scale_w.min(h as f64 / src_h as f64),
        None => scale_w,
    };

    if scale >= 1.0 {
        return (src_w, src_h);
    }

    let out_w = ((src_w as f64 * scale).round() as u32).max(1);
    let out_h = ((src_h as f64 * scale).round() as u32).max(1);
    (out_w, out_h)
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Width-only box
    // =========================================================================

    #[test]
    fn landscape_width_only() {
        assert_eq!(fit_within((1200, 800), 128, None), (128, 85));
    }

    #[test]
    fn portrait_width_only() {
        assert_eq!(fit_within((800, 1200), 128, None), (128, 192));
    }

    #[test]
    fn exact_width_is_unchanged() {
        assert_eq!(fit_within((128, 64), 128, None), (128, 64));
    }

    #[test]
    fn never_upscales() {
        assert_eq!(fit_within((64, 48), 128, None), (64, 48));
        assert_eq!(fit_within((64, 48), 128, Some(128)), (64, 48));
    }

    // =========================================================================
    // Width and height box
    // =========================================================================

    #[test]
    fn height_limits_tall_images() {
        // 1000x2000 into 128x128: height is the binding edge
        assert_eq!(fit_within((1000, 2000), 128, Some(128)), (64, 128));
    }

    #[test]
    fn width_limits_wide_images() {
        assert_eq!(fit_within((2000, 1000), 128, Some(128)), (128, 64));
    }

    #[test]
    fn extreme_aspect_keeps_one_pixel() {
        assert_eq!(fit_within((10000, 10), 100, None), (100, 1));
    }

    // =========================================================================
    // Degenerate boxes
    // =========================================================================

    #[test]
    fn zero_width_box() {
        assert_eq!(fit_within((800, 600), 0, None), (0, 0));
    }

    #[test]
    fn zero_height_box() {
        assert_eq!(fit_within((800, 600), 100, Some(0)), (0, 0));
    }

    #[test]
    fn zero_source() {
        assert_eq!(fit_within((0, 600), 100, None), (0, 0));
    }
}
