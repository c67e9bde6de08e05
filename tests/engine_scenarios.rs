//! End-to-end derivative scenarios against the real image backend.
//!
//! Sources are synthesized with the `image` crate into a temp upload tree;
//! every assertion about dimensions reads the written files back.

use skin_media::attachments::{AttachmentRecord, ManifestStore};
use skin_media::config::MediaConfig;
use skin_media::derivatives::MediaEngine;
use skin_media::formats::{Format, FormatRequest};
use skin_media::imaging::RustBackend;
use skin_media::sizes::SizeSpec;
use skin_media::{endpoint, markup};
use std::path::Path;
use tempfile::TempDir;

type Engine = MediaEngine<RustBackend, ManifestStore>;

fn write_jpeg(path: &Path, width: u32, height: u32) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 90])
    });
    img.save_with_format(path, image::ImageFormat::Jpeg).unwrap();
}

/// Engine over `sources`: `(id, relative file, width, height)`.
///
/// `.svg` files are written as plain markup; everything else as JPEG.
fn engine(sources: &[(u64, &str, u32, u32)]) -> (TempDir, Engine) {
    let tmp = TempDir::new().unwrap();
    let mut records = Vec::new();
    for &(id, file, width, height) in sources {
        let path = tmp.path().join(file);
        if file.ends_with(".svg") {
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, r#"<svg xmlns="http://www.w3.org/2000/svg"/>"#).unwrap();
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
    let mut config = MediaConfig::default();
    config.paths.upload_dir = tmp.path().to_string_lossy().to_string();
    let store = ManifestStore::from_records(tmp.path(), records).unwrap();
    let engine = MediaEngine::new(RustBackend::new(), store, &config);
    (tmp, engine)
}

fn dimensions(path: &Path) -> (u32, u32) {
    image::image_dimensions(path).unwrap()
}

// =========================================================================
// Scenarios
// =========================================================================

#[test]
fn card_from_large_photo() {
    let (tmp, engine) = engine(&[(42, "2024/05/photo.jpg", 1600, 1200)]);

    let src = engine.get_src(42, &SizeSpec::named("card"), None).unwrap();
    assert_eq!(src.format, Format::Webp);
    assert_eq!((src.width, src.height), (600, 400));

    let dir = tmp.path().join("skin-sizes/42/2024/05");
    assert_eq!(dimensions(&dir.join("photo-600x400-c.webp")), (600, 400));
    assert_eq!(dimensions(&dir.join("photo-600x400-c.jpg")), (600, 400));
}

#[test]
fn hero_upscales_small_source_to_exact_size() {
    let (tmp, engine) = engine(&[(7, "2024/05/small.jpg", 800, 600)]);

    let formats = engine.get_all_formats(7, &SizeSpec::named("hero"), None);
    assert_eq!(formats[&Format::Webp].width, 1920);
    assert_eq!(formats[&Format::Webp].height, 1080);
    assert_eq!(
        dimensions(&tmp.path().join("skin-sizes/7/2024/05/small-1920x1080-c.jpg")),
        (1920, 1080)
    );
}

#[test]
fn unknown_size_touches_nothing() {
    let (tmp, engine) = engine(&[(42, "2024/05/photo.jpg", 320, 240)]);

    assert!(engine.get_src(42, &SizeSpec::named("poster"), None).is_none());
    assert!(!tmp.path().join("skin-sizes/42").exists());
}

#[test]
fn purge_then_regenerate() {
    let (tmp, engine) = engine(&[(42, "2024/05/photo.jpg", 320, 240)]);
    let square = SizeSpec::named("square");

    engine.get_src(42, &square, None).unwrap();
    assert!(!engine.list_derivatives(42).is_empty());

    engine.delete_attachment_derivatives(42).unwrap();
    assert!(engine.list_derivatives(42).is_empty());
    assert!(!tmp.path().join("skin-sizes/42").exists());

    let again = engine.get_src(42, &square, None).unwrap();
    assert_eq!((again.width, again.height), (480, 480));
    assert_eq!(engine.list_derivatives(42).len(), 2);
}

#[test]
fn svg_is_served_as_is() {
    let (tmp, engine) = engine(&[(5, "2024/05/logo.svg", 0, 0)]);

    let src = engine.get_src(5, &SizeSpec::named("card"), None).unwrap();
    assert_eq!(src.format, Format::Original);
    assert_eq!(src.src, "/wp-content/uploads/2024/05/logo.svg");
    assert!(!tmp.path().join("skin-sizes").exists());
}

#[test]
fn keep_ratio_for_explicit_dimensions() {
    let (_tmp, engine) = engine(&[(42, "2024/05/photo.jpg", 400, 300)]);

    let jpeg = engine
        .get_src_format(
            42,
            &SizeSpec::Dimensions {
                width: 200,
                height: 200,
            },
            FormatRequest::Exact(Format::Jpeg),
            None,
        )
        .unwrap();
    assert_eq!((jpeg.width, jpeg.height), (200, 150));
    assert!(jpeg.src.ends_with("photo-200x200.jpg"));
}

// =========================================================================
// Outer surfaces
// =========================================================================

#[test]
fn endpoint_and_markup_agree() {
    let (_tmp, engine) = engine(&[(42, "2024/05/photo.jpg", 640, 480)]);

    let response = endpoint::handle(&engine, "GET", "/media/resize/42?size=square&format=webp");
    assert_eq!(response.status, 200);
    let webp_url = response.body["src"].as_str().unwrap().to_string();

    let html = markup::render_responsive(&engine, 42, "square", "Photo", "100vw")
        .unwrap()
        .into_string();
    assert!(html.contains(&webp_url));
    assert!(html.contains(r#"alt="Photo""#));
}
