//! Build configuration.
//!
//! One immutable [`ThumbnailConfig`] is resolved per build from three layers,
//! each overriding the one before it:
//!
//! ```text
//! stock defaults  →  thumbnails.toml (optional)  →  CLI flags
//! ```
//!
//! Layers are merged as raw TOML values with [`merge_toml`] before being
//! deserialized once, so a layer only needs the keys it wants to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! quality = 30               # Encoder quality (1-100)
//! width = 128                # Thumbnail bounding box width (px)
//! # height = 96              # Bounding box height; omit to keep aspect ratio
//! skip_small_images = true   # Leave small images alone
//! min_size_to_resize = 30    # "Small" threshold in KB (inclusive)
//! format = "auto"            # auto | png | webp | jpeg
//! blur_amount = 3            # Blur radius (px) while the original loads
//! transition_duration = "0.3s"
//! skip_background = true     # Skip CSS url() rewriting and background swaps
//! base = "/"                 # Public base path of the site
//! background_fill = false    # Append `center / cover no-repeat` to backgrounds
//! rewrite_markup = false     # Also rewrite <img src> (and styles, with backgrounds) in HTML
//!
//! [processing]
//! max_processes = 4          # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! The camelCase spellings used by JavaScript build tools (`skipSmallImages`,
//! `minSizeToResize`, `blurAmount`, `transitionDuration`, `skipBackground`)
//! are accepted as aliases.
//!
//! Unknown keys are accepted and ignored, and values are not range-checked
//! here: a quality of 0 or a width of 0 reaches the codec and shows up as a
//! per-image failure in the build output.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Default config file name looked up by the CLI.
pub const CONFIG_FILENAME: &str = "thumbnails.toml";

/// Resolved build configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThumbnailConfig {
    /// Encoder quality, 1-100. Ignored by lossless encoders (PNG, WebP).
    /// Any integer is accepted here; the encoder rejects the rest per image.
    pub quality: i64,
    /// Target bounding box width in pixels.
    pub width: u32,
    /// Target bounding box height. `None` keeps the aspect ratio from `width`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Skip images whose payload is at most `min_size_to_resize` KB.
    #[serde(alias = "skipSmallImages")]
    pub skip_small_images: bool,
    /// Size threshold in KB for `skip_small_images`.
    #[serde(alias = "minSizeToResize")]
    pub min_size_to_resize: u64,
    /// Output format of generated thumbnails.
    pub format: FormatChoice,
    /// Blur radius in pixels applied while an original loads over the network.
    #[serde(alias = "blurAmount")]
    pub blur_amount: f64,
    /// CSS time value for the blur transition.
    #[serde(alias = "transitionDuration")]
    pub transition_duration: String,
    /// Skip style sheet rewriting and runtime background-image swapping.
    #[serde(alias = "skipBackground")]
    pub skip_background: bool,
    /// Public base path; references starting with it are root-relative.
    pub base: String,
    /// Append `center / cover no-repeat` to rewritten `background` shorthands.
    #[serde(alias = "backgroundFill")]
    pub background_fill: bool,
    /// Rewrite image references inside HTML attributes and inline styles.
    #[serde(alias = "rewriteMarkup")]
    pub rewrite_markup: bool,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            quality: 30,
            width: 128,
            height: None,
            skip_small_images: true,
            min_size_to_resize: 30,
            format: FormatChoice::Auto,
            blur_amount: 3.0,
            transition_duration: "0.3s".to_string(),
            skip_background: true,
            base: "/".to_string(),
            background_fill: false,
            rewrite_markup: false,
            processing: ProcessingConfig::default(),
        }
    }
}

impl ThumbnailConfig {
    /// Whether an asset of `size_bytes` falls under the small-image skip policy.
    ///
    /// The comparison is inclusive and done in fractional KB, so a 30.5 KB
    /// file is processed with the default threshold of 30.
    pub fn skips_size(&self, size_bytes: usize) -> bool {
        self.skip_small_images && (size_bytes as f64 / 1024.0) <= self.min_size_to_resize as f64
    }
}

/// Requested thumbnail format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatChoice {
    /// Follow the original: png → png, webp → webp, anything else → jpeg.
    #[default]
    Auto,
    Png,
    Webp,
    #[serde(alias = "jpg")]
    Jpeg,
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Maximum number of parallel thumbnail workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)`, and at least one
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading and merging
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(ThumbnailConfig::default()).unwrap_or_else(|_| {
        // Every field of the default config is representable in TOML.
        toml::Value::Table(toml::map::Map::new())
    })
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value. A missing file is `Ok(None)`.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.is_file() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    Ok(Some(toml::from_str(&content)?))
}

/// camelCase spellings and the field each one stands for.
const CAMEL_CASE_KEYS: &[(&str, &str)] = &[
    ("skipSmallImages", "skip_small_images"),
    ("minSizeToResize", "min_size_to_resize"),
    ("blurAmount", "blur_amount"),
    ("transitionDuration", "transition_duration"),
    ("skipBackground", "skip_background"),
    ("backgroundFill", "background_fill"),
    ("rewriteMarkup", "rewrite_markup"),
];

/// Rename camelCase top-level keys to their field names.
///
/// The stock defaults layer always carries the snake_case key, so an alias
/// left in place would reach serde as a duplicate field.
fn canonical_keys(layer: toml::Value) -> toml::Value {
    match layer {
        toml::Value::Table(table) => toml::Value::Table(
            table
                .into_iter()
                .map(|(key, value)| {
                    let key = CAMEL_CASE_KEYS
                        .iter()
                        .find(|(camel, _)| *camel == key)
                        .map_or(key, |(_, snake)| snake.to_string());
                    (key, value)
                })
                .collect(),
        ),
        other => other,
    }
}

/// Merge the given layers over the stock defaults and deserialize the result.
pub fn resolve_config(
    layers: impl IntoIterator<Item = toml::Value>,
) -> Result<ThumbnailConfig, ConfigError> {
    let merged = layers
        .into_iter()
        .map(canonical_keys)
        .fold(stock_defaults_value(), merge_toml);
    Ok(merged.try_into()?)
}

/// Load config from a file (if it exists) on top of the stock defaults.
pub fn load_config(path: &Path) -> Result<ThumbnailConfig, ConfigError> {
    resolve_config(load_raw_config(path)?)
}

/// Returns a fully-commented stock config with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# lazy-thumbnails configuration
# =============================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys are ignored.

# ---------------------------------------------------------------------------
# Thumbnail generation
# ---------------------------------------------------------------------------

# Encoder quality (1-100). JPEG honours it; PNG and WebP output is lossless.
quality = 30

# Bounding box for thumbnails. Images are scaled down to fit, never up.
width = 128
# height = 96

# Images at or below `min_size_to_resize` KB get no thumbnail and keep
# their original references.
skip_small_images = true
min_size_to_resize = 30

# Thumbnail encoding: "auto" follows the original (png -> png,
# webp -> webp, everything else -> jpeg), or force "png", "webp", "jpeg".
format = "auto"

# ---------------------------------------------------------------------------
# Reference rewriting
# ---------------------------------------------------------------------------

# Public base path of the site. References starting with it are resolved
# from the output root.
base = "/"

# Skip url() rewriting in style sheets and background swapping at runtime.
skip_background = true

# Append `center / cover no-repeat` to rewritten `background` shorthands so
# the thumbnail fills the same box as the original.
background_fill = false

# Also rewrite <img src> in HTML pages, plus style attributes and inline
# <style> blocks when skip_background is false.
rewrite_markup = false

# ---------------------------------------------------------------------------
# Runtime swap
# ---------------------------------------------------------------------------

# Blur radius (px) shown while an original downloads.
blur_amount = 3.0

# CSS duration of the blur transition.
transition_duration = "0.3s"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel thumbnail workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
