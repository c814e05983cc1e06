//! Shared test utilities for the lazy-thumbnails test suite.
//!
//! Bundles here carry placeholder image payloads (zero bytes of a chosen
//! size); the generator only looks at sizes and paths, and the
//! [`MockBackend`](crate::imaging::backend::tests::MockBackend) never decodes.
//! Tests that need real pixels build them with the `image` crate.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let bundle = bundle_with_images(&[("images/photo.jpg", kb(200))]);
//! let site = site_bundle();
//! ```

use crate::bundle::Bundle;
use std::path::Path;

// =========================================================================
// Fixture setup
// =========================================================================

/// `n` kilobytes in bytes.
pub fn kb(n: usize) -> usize {
    n * 1024
}

/// A bundle holding one zero-filled asset per `(path, size)` pair.
pub fn bundle_with_images(images: &[(&str, usize)]) -> Bundle {
    let mut bundle = Bundle::new();
    for (path, size) in images {
        bundle.insert_asset(path, vec![0u8; *size]);
    }
    bundle
}

pub const SITE_CSS: &str =
    ".hero{background:url(../images/photo.jpg)}\n.icon{background:url(/icons/small.png)}\n";

pub const SITE_JS: &str =
    "const hero = \"images/photo.jpg\";\nconst icon = 'icons/small.png';\nexport { hero, icon };\n";

pub const INDEX_HTML: &str = "<!doctype html>\n<html>\n<head><link rel=\"stylesheet\" href=\"css/site.css\"></head>\n<body>\n<img src=\"images/photo.jpg\" alt=\"photo\">\n<img src=\"icons/small.png\" alt=\"icon\">\n<script type=\"module\" src=\"assets/app.js\"></script>\n</body>\n</html>\n";

pub const POST_HTML: &str = "<!doctype html>\n<html><body><p>post</p></body></html>\n";

/// A small built site: one large and one small image, a style sheet and a
/// script chunk referencing both, and two pages.
pub fn site_bundle() -> Bundle {
    let mut bundle = bundle_with_images(&[
        ("images/photo.jpg", kb(200)),
        ("icons/small.png", kb(10)),
    ]);
    bundle.insert_asset("css/site.css", SITE_CSS);
    bundle.insert_chunk("assets/app.js", SITE_JS);
    bundle.insert_asset("index.html", INDEX_HTML);
    bundle.insert_asset("blog/post.html", POST_HTML);
    bundle
}

/// Write every entry of `bundle` below `root`, dirty or not.
pub fn write_all(bundle: &Bundle, root: &Path) {
    for (path, entry) in bundle.iter() {
        let target = root.join(path);
        std::fs::create_dir_all(target.parent().unwrap()).unwrap();
        std::fs::write(target, entry.bytes()).unwrap();
    }
}

// =========================================================================
// Real images
// =========================================================================

/// A JPEG of `width`×`height` filled with deterministic noise, so it does
/// not compress below the small-image threshold.
pub fn noisy_jpeg(width: u32, height: u32) -> Vec<u8> {
    let mut seed: u32 = 0x2545_f491;
    let img = image::RgbImage::from_fn(width, height, |_, _| {
        let mut channel = || {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            (seed & 0xff) as u8
        };
        image::Rgb([channel(), channel(), channel()])
    });
    let mut bytes = Vec::new();
    img.write_to(
        &mut std::io::Cursor::new(&mut bytes),
        image::ImageFormat::Jpeg,
    )
    .unwrap();
    bytes
}
