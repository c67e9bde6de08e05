//! Encoding parameters for derivative output.
//!
//! - [`Quality`]: Lossy encoding quality (1–100, default 90). Clamped on construction.
//! - [`QualitySettings`]: One quality per output encoding, chosen by file extension.

use crate::config::QualityConfig;
use crate::formats::{Format, format_for_extension};
use std::path::Path;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

/// Per-encoding quality: WebP 85, JPEG 90, PNG 90 by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualitySettings {
    pub webp: Quality,
    pub jpeg: Quality,
    pub png: Quality,
}

impl QualitySettings {
    pub fn from_config(config: &QualityConfig) -> Self {
        Self {
            webp: Quality::new(config.webp),
            jpeg: Quality::new(config.jpeg),
            png: Quality::new(config.png),
        }
    }

    /// Quality for the encoding implied by `path`'s extension.
    ///
    /// Extensions outside webp/jpeg/png (e.g. GIF originals) use the JPEG value.
    pub fn for_path(&self, path: &Path) -> Quality {
        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(format_for_extension);
        match format {
            Some(Format::Webp) => self.webp,
            Some(Format::Png) => self.png,
            _ => self.jpeg,
        }
    }
}

impl Default for QualitySettings {
    fn default() -> Self {
        Self::from_config(&QualityConfig::default())
    }
}
