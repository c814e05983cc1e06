//! The browser swap controller and the build-time injector that renders it.
//!
//! The controller lives in `static/swap-controller.js` and is embedded at
//! compile time. Rendering fills its four parameters from the resolved
//! config; the result is a self-contained script for an inline `<script>`
//! element.

pub mod template;

use crate::config::ThumbnailConfig;
use crate::naming::THUMBNAIL_PREFIX;

/// Controller source with `__LT_*__` placeholders.
pub const TEMPLATE: &str = include_str!("../../static/swap-controller.js");

/// Render the controller for `config`.
pub fn render_runtime(config: &ThumbnailConfig) -> String {
    let values = [
        ("__LT_PREFIX__", template::js_string(THUMBNAIL_PREFIX)),
        ("__LT_BLUR_PX__", template::js_number(config.blur_amount)),
        (
            "__LT_TRANSITION__",
            template::js_string(&config.transition_duration),
        ),
        ("__LT_BACKGROUNDS__", (!config.skip_background).to_string()),
    ];
    template::render(TEMPLATE, &values)
}
