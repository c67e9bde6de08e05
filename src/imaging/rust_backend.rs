//! Image processing backend built on the `image` crate.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, GIF, WebP) | `image` crate (pure Rust decoders) |
//! | Identify | `image::image_dimensions` (header only) |
//! | Crop + scale | `DynamicImage::crop_imm` + `resize_exact` with `Lanczos3` |
//! | Encode → JPEG / PNG / GIF | `image::codecs::{jpeg, png, gif}` |
//! | Encode → WebP (lossy) | `webp::Encoder` (libwebp) |
//!
//! Every save goes to a temporary file in the destination directory and is
//! renamed into place, so a concurrent reader never sees a partial file.

use super::backend::{BackendError, Capabilities, Dimensions, ImageBackend, ImageEditor};
use super::calculations::ResizeRectangle;
use super::params::Quality;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::LazyLock;

const PHOTO_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("gif", ImageFormat::Gif),
    ("webp", ImageFormat::WebP),
];

static SUPPORTED_EXTENSIONS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    PHOTO_CANDIDATES
        .iter()
        .filter(|(_, fmt)| fmt.reading_enabled())
        .map(|(ext, _)| *ext)
        .collect()
});

/// Returns the set of image file extensions that have working decoders compiled in.
pub fn supported_input_extensions() -> &'static [&'static str] {
    &SUPPORTED_EXTENSIONS
}

/// Backend using the `image` crate ecosystem, plus libwebp for lossy WebP.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Load and decode an image from disk.
fn load_image(path: &Path) -> Result<DynamicImage, BackendError> {
    ImageReader::open(path)
        .map_err(BackendError::Io)?
        .with_guessed_format()
        .map_err(BackendError::Io)?
        .decode()
        .map_err(|e| {
            BackendError::ProcessingFailed(format!("Failed to decode {}: {}", path.display(), e))
        })
}

/// Encode `img` into `writer` using the encoder implied by `ext`.
fn encode_into<W: Write>(
    img: &DynamicImage,
    ext: &str,
    quality: u32,
    writer: W,
) -> Result<(), BackendError> {
    let encode_err = |kind: &str, e: image::ImageError| {
        BackendError::ProcessingFailed(format!("{kind} encode failed: {e}"))
    };
    match ext {
        "jpg" | "jpeg" => {
            let encoder =
                image::codecs::jpeg::JpegEncoder::new_with_quality(writer, quality as u8);
            DynamicImage::ImageRgb8(img.to_rgb8())
                .write_with_encoder(encoder)
                .map_err(|e| encode_err("JPEG", e))
        }
        "png" => {
            let encoder = image::codecs::png::PngEncoder::new(writer);
            img.write_with_encoder(encoder)
                .map_err(|e| encode_err("PNG", e))
        }
        "gif" => {
            let mut encoder = image::codecs::gif::GifEncoder::new(writer);
            encoder
                .encode_frame(image::Frame::new(img.to_rgba8()))
                .map_err(|e| encode_err("GIF", e))
        }
        "webp" => {
            let rgba = img.to_rgba8();
            let (width, height) = rgba.dimensions();
            let encoded = webp::Encoder::from_rgba(&rgba, width, height)
                .encode_simple(false, quality as f32)
                .map_err(|e| {
                    BackendError::ProcessingFailed(format!(
                        "WebP encode failed for {width}x{height}: {e:?}"
                    ))
                })?;
            let mut writer = writer;
            writer.write_all(&encoded)?;
            Ok(())
        }
        other => Err(BackendError::ProcessingFailed(format!(
            "Unsupported output format: {}",
            other
        ))),
    }
}

/// Save a DynamicImage to the given path, inferring format from extension.
fn save_image(img: &DynamicImage, path: &Path, quality: u32) -> Result<(), BackendError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let tmp = tempfile::Builder::new()
        .prefix(".skin-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        encode_into(img, &ext, quality, &mut writer)?;
        writer.flush()?;
    }
    tmp.persist(path).map_err(|e| BackendError::Io(e.error))?;
    Ok(())
}

/// A decoded source held in memory between resize and the per-format saves.
pub struct RustEditor {
    image: DynamicImage,
}

impl ImageEditor for RustEditor {
    fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.image.width(),
            height: self.image.height(),
        }
    }

    fn apply(&mut self, rect: &ResizeRectangle) -> Result<(), BackendError> {
        let (width, height) = (self.image.width() as u64, self.image.height() as u64);
        if rect.src_w == 0
            || rect.src_h == 0
            || rect.dst_w == 0
            || rect.dst_h == 0
            || rect.src_x as u64 + rect.src_w as u64 > width
            || rect.src_y as u64 + rect.src_h as u64 > height
        {
            return Err(BackendError::ProcessingFailed(format!(
                "crop {}x{}+{}+{} outside {}x{} source",
                rect.src_w, rect.src_h, rect.src_x, rect.src_y, width, height
            )));
        }

        let cropped = self
            .image
            .crop_imm(rect.src_x, rect.src_y, rect.src_w, rect.src_h);
        self.image = if cropped.width() == rect.dst_w && cropped.height() == rect.dst_h {
            cropped
        } else {
            cropped.resize_exact(rect.dst_w, rect.dst_h, FilterType::Lanczos3)
        };
        Ok(())
    }

    fn save(&self, output: &Path, quality: Quality) -> Result<(), BackendError> {
        save_image(&self.image, output, quality.value())
    }
}

impl ImageBackend for RustBackend {
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
        let (width, height) = image::image_dimensions(path).map_err(|e| {
            BackendError::ProcessingFailed(format!("Failed to read dimensions: {}", e))
        })?;
        Ok(Dimensions { width, height })
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            webp: true,
            png: ImageFormat::Png.writing_enabled(),
            jpeg: ImageFormat::Jpeg.writing_enabled(),
        }
    }

    fn supported_extensions(&self) -> &[&'static str] {
        supported_input_extensions()
    }

    fn open(&self, path: &Path) -> Result<Box<dyn ImageEditor + '_>, BackendError> {
        let image = load_image(path)?;
        Ok(Box::new(RustEditor { image }))
    }
}
