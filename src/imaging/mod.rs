//! Image processing in pure Rust.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `ImageReader::into_dimensions`, `avif-parse` for AVIF |
//! | **Decode** | `image::load_from_memory`, `rav1d` for AVIF |
//! | **Thumbnail** | `resize_exact` (Lanczos3) inside the configured box |
//! | **Encode** | JPEG (quality), PNG and WebP (lossless) |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: High-level functions combining calculations + backend

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::fit_within;
pub use operations::{GeneratedThumbnail, create_thumbnail, get_dimensions, plan_thumbnail};
pub use params::{OutputFormat, Quality, SourceImage, ThumbnailParams};
pub use rust_backend::RustBackend;
