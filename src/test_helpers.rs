//! Shared test utilities for the skin-media test suite.
//!
//! Builds temporary upload trees, configs pointing at them, and engines wired
//! to the recording [`MockBackend`].
//!
//! # Usage
//!
//! ```rust,ignore
//! use crate::test_helpers::*;
//!
//! let (tmp, engine) = mock_engine(&[(42, "2024/05/photo.jpg", 4000, 3000)]);
//! let src = engine.get_src(42, &SizeSpec::named("card"), None).unwrap();
//! assert_eq!((src.width, src.height), (600, 400));
//! ```

use std::path::Path;
use tempfile::TempDir;

use crate::attachments::{AttachmentRecord, ManifestStore};
use crate::config::MediaConfig;
use crate::derivatives::MediaEngine;
use crate::imaging::RustBackend;
use crate::imaging::backend::tests::MockBackend;

pub type MockEngine = MediaEngine<MockBackend, ManifestStore>;
pub type RustEngine = MediaEngine<RustBackend, ManifestStore>;

// =========================================================================
// Config
// =========================================================================

/// Stock config with the upload tree rooted at `upload_dir`.
pub fn test_config(upload_dir: &Path) -> MediaConfig {
    let mut config = MediaConfig::default();
    config.paths.upload_dir = upload_dir.to_string_lossy().to_string();
    config
}

// =========================================================================
// Engines
// =========================================================================

/// Engine over a fresh temp upload dir.
///
/// Each source is `(attachment_id, relative_file, width, height)`. Sources
/// with zero dimensions are listed in the manifest without dimensions and
/// are not openable by the mock backend.
pub fn mock_engine(sources: &[(u64, &str, u32, u32)]) -> (TempDir, MockEngine) {
    let tmp = TempDir::new().unwrap();
    let engine = mock_engine_in(tmp.path(), sources);
    (tmp, engine)
}

pub fn mock_engine_in(upload_dir: &Path, sources: &[(u64, &str, u32, u32)]) -> MockEngine {
    mock_engine_with_config(&test_config(upload_dir), sources)
}

pub fn mock_engine_with_config(
    config: &MediaConfig,
    sources: &[(u64, &str, u32, u32)],
) -> MockEngine {
    let upload_dir = Path::new(&config.paths.upload_dir);
    let backend = MockBackend::new();
    let mut records = Vec::new();
    for &(id, file, width, height) in sources {
        let known = width > 0 && height > 0;
        if known {
            backend.add_source(upload_dir.join(file), width, height);
        }
        records.push(AttachmentRecord {
            id,
            file: file.to_string(),
            width: known.then_some(width),
            height: known.then_some(height),
        });
    }
    let store = ManifestStore::from_records(upload_dir, records).unwrap();
    MediaEngine::new(backend, store, config)
}

/// Engine with the real backend over synthesized image files.
///
/// `.png` sources are written as PNG, everything else as JPEG. Dimensions
/// are left out of the manifest so the engine reads them from the files.
pub fn rust_engine(sources: &[(u64, &str, u32, u32)]) -> (TempDir, RustEngine) {
    let tmp = TempDir::new().unwrap();
    let mut records = Vec::new();
    for &(id, file, width, height) in sources {
        let path = tmp.path().join(file);
        if file.ends_with(".png") {
            write_png(&path, width, height);
        } else {
            write_jpeg(&path, width, height);
        }
        records.push(AttachmentRecord {
            id,
            file: file.to_string(),
            width: None,
            height: None,
        });
    }
    let store = ManifestStore::from_records(tmp.path(), records).unwrap();
    let engine = MediaEngine::new(RustBackend::new(), store, &test_config(tmp.path()));
    (tmp, engine)
}

// =========================================================================
// Image fixtures
// =========================================================================

/// Write a small gradient JPEG, creating parent directories.
pub fn write_jpeg(path: &Path, width: u32, height: u32) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    img.save_with_format(path, image::ImageFormat::Jpeg).unwrap();
}

/// Write a small RGBA PNG, creating parent directories.
pub fn write_png(path: &Path, width: u32, height: u32) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    let img = image::RgbaImage::from_fn(width, height, |x, y| {
        image::Rgba([(x % 256) as u8, (y % 256) as u8, 200, 255])
    });
    img.save_with_format(path, image::ImageFormat::Png).unwrap();
}
