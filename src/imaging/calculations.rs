//! Pure calculation functions for derivative geometry.
//!
//! All functions here are pure and testable without any I/O or images. They
//! produce a [`ResizeRectangle`]: the window of the source to read and the
//! size of the canvas it is scaled onto.

use crate::sizes::{Crop, HorizontalAnchor, VerticalAnchor};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeometryError {
    #[error("invalid geometry: cannot resize {orig_w}x{orig_h} to {new_w}x{new_h}")]
    InvalidGeometry {
        orig_w: u32,
        orig_h: u32,
        new_w: u32,
        new_h: u32,
    },
}

/// A complete crop + scale operation.
///
/// The source window `(src_x, src_y, src_w, src_h)` is scaled onto a
/// `dst_w`×`dst_h` canvas at `(dst_x, dst_y)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeRectangle {
    pub dst_x: u32,
    pub dst_y: u32,
    pub src_x: u32,
    pub src_y: u32,
    pub dst_w: u32,
    pub dst_h: u32,
    pub src_w: u32,
    pub src_h: u32,
}

fn invalid(orig_w: u32, orig_h: u32, new_w: u32, new_h: u32) -> GeometryError {
    GeometryError::InvalidGeometry {
        orig_w,
        orig_h,
        new_w,
        new_h,
    }
}

/// Crop-fill resize with a centered crop window.
///
/// The output is exactly `new_w`×`new_h`. The source window has the target's
/// aspect ratio and is as large as the source allows; excess is trimmed
/// equally from both sides of the longer dimension. Upscaling works the same
/// way as downscaling.
///
/// # Examples
/// ```
/// # use skin_media::imaging::calculations::resize_crop;
/// let rect = resize_crop(800, 600, 400, 400).unwrap();
/// assert_eq!((rect.dst_w, rect.dst_h), (400, 400));
/// assert_eq!((rect.src_x, rect.src_y, rect.src_w, rect.src_h), (100, 0, 600, 600));
/// ```
pub fn resize_crop(
    orig_w: u32,
    orig_h: u32,
    new_w: u32,
    new_h: u32,
) -> Result<ResizeRectangle, GeometryError> {
    resize_crop_anchored(
        orig_w,
        orig_h,
        new_w,
        new_h,
        HorizontalAnchor::Center,
        VerticalAnchor::Center,
    )
}

/// Crop-fill resize keeping the given edges of the source.
pub fn resize_crop_anchored(
    orig_w: u32,
    orig_h: u32,
    new_w: u32,
    new_h: u32,
    horizontal: HorizontalAnchor,
    vertical: VerticalAnchor,
) -> Result<ResizeRectangle, GeometryError> {
    if orig_w == 0 || orig_h == 0 || new_w == 0 || new_h == 0 {
        return Err(invalid(orig_w, orig_h, new_w, new_h));
    }

    let ratio = (new_w as f64 / orig_w as f64).max(new_h as f64 / orig_h as f64);
    let crop_w = (new_w as f64 / ratio).round().clamp(1.0, orig_w as f64) as u32;
    let crop_h = (new_h as f64 / ratio).round().clamp(1.0, orig_h as f64) as u32;

    let slack_x = orig_w - crop_w;
    let slack_y = orig_h - crop_h;
    let src_x = match horizontal {
        HorizontalAnchor::Left => 0,
        HorizontalAnchor::Center => slack_x / 2,
        HorizontalAnchor::Right => slack_x,
    };
    let src_y = match vertical {
        VerticalAnchor::Top => 0,
        VerticalAnchor::Center => slack_y / 2,
        VerticalAnchor::Bottom => slack_y,
    };

    Ok(ResizeRectangle {
        dst_x: 0,
        dst_y: 0,
        src_x,
        src_y,
        dst_w: new_w,
        dst_h: new_h,
        src_w: crop_w,
        src_h: crop_h,
    })
}

/// Ratio-preserving resize that fits inside `new_w`×`new_h`.
///
/// The whole source is used. Returns `Ok(None)` when the target is degenerate
/// (a zero ratio, or an output that rounds to zero pixels).
pub fn resize_keep_ratio(
    orig_w: u32,
    orig_h: u32,
    new_w: u32,
    new_h: u32,
) -> Result<Option<ResizeRectangle>, GeometryError> {
    if orig_w == 0 || orig_h == 0 {
        return Err(invalid(orig_w, orig_h, new_w, new_h));
    }

    let ratio = (new_w as f64 / orig_w as f64).min(new_h as f64 / orig_h as f64);
    if ratio == 0.0 {
        return Ok(None);
    }

    let out_w = (orig_w as f64 * ratio).round() as u32;
    let out_h = (orig_h as f64 * ratio).round() as u32;
    if out_w == 0 || out_h == 0 {
        return Ok(None);
    }

    Ok(Some(ResizeRectangle {
        dst_x: 0,
        dst_y: 0,
        src_x: 0,
        src_y: 0,
        dst_w: out_w,
        dst_h: out_h,
        src_w: orig_w,
        src_h: orig_h,
    }))
}

/// Dispatch on the crop mode.
pub fn resize(
    crop: Crop,
    orig_w: u32,
    orig_h: u32,
    new_w: u32,
    new_h: u32,
) -> Result<Option<ResizeRectangle>, GeometryError> {
    match crop {
        Crop::None => resize_keep_ratio(orig_w, orig_h, new_w, new_h),
        Crop::Center => resize_crop(orig_w, orig_h, new_w, new_h).map(Some),
        Crop::Position(h, v) => resize_crop_anchored(orig_w, orig_h, new_w, new_h, h, v).map(Some),
    }
}
