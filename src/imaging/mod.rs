//! Image processing: geometry, quality settings, and the decode/encode backend.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::image_dimensions` |
//! | **Crop + scale** | `crop_imm` + `resize_exact` (Lanczos3) |
//! | **Encode → WebP** | `webp` (lossy, libwebp) |
//! | **Encode → JPEG / PNG / GIF** | `image` codecs |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for crop/scale geometry (unit testable)
//! - **Parameters**: Encoding quality per output format
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]

pub mod backend;
pub mod calculations;
pub mod params;
pub mod rust_backend;

pub use backend::{BackendError, Capabilities, Dimensions, ImageBackend, ImageEditor};
pub use calculations::{GeometryError, ResizeRectangle};
pub use params::{Quality, QualitySettings};
pub use rust_backend::RustBackend;
