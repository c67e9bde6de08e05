//! Image processing backend traits and shared types.
//!
//! A backend does three things: report the dimensions of a file on disk,
//! report which output encodings it can write, and open a source for editing.
//! An [`ImageEditor`] is the handle returned by `open`: it applies one
//! [`ResizeRectangle`] and can then be saved to any number of output paths.
//! The source is decoded once no matter how many formats are written.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend).

use super::calculations::ResizeRectangle;
use super::params::Quality;
use crate::formats::Format;
use std::path::Path;
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

/// Which derivative encodings can be written.
///
/// Resolved once when the engine is built (backend probe ANDed with the
/// `[formats]` config table). `original` is always writable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub webp: bool,
    pub png: bool,
    pub jpeg: bool,
}

impl Capabilities {
    pub fn all() -> Self {
        Self {
            webp: true,
            png: true,
            jpeg: true,
        }
    }

    pub fn supports(self, format: Format) -> bool {
        match format {
            Format::Webp => self.webp,
            Format::Png => self.png,
            Format::Jpeg => self.jpeg,
            Format::Original => true,
        }
    }

    pub fn intersect(self, other: Capabilities) -> Self {
        Self {
            webp: self.webp && other.webp,
            png: self.png && other.png,
            jpeg: self.jpeg && other.jpeg,
        }
    }
}

/// An opened source image.
pub trait ImageEditor {
    /// Current dimensions (after any applied resize).
    fn dimensions(&self) -> Dimensions;

    /// Crop and scale according to `rect`.
    fn apply(&mut self, rect: &ResizeRectangle) -> Result<(), BackendError>;

    /// Encode to `output`, choosing the encoding from its extension.
    fn save(&self, output: &Path, quality: Quality) -> Result<(), BackendError>;
}

/// Trait for image processing backends.
pub trait ImageBackend: Send + Sync {
    /// Get image dimensions without a full decode where possible.
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Output encodings this backend can write.
    fn capabilities(&self) -> Capabilities;

    /// Lowercase source extensions this backend can decode.
    fn supported_extensions(&self) -> &[&'static str];

    /// Decode `path` for editing.
    fn open(&self, path: &Path) -> Result<Box<dyn ImageEditor + '_>, BackendError>;
}
