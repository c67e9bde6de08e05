//! HTML rendering for resolved derivatives.
//!
//! Produces `<picture>` elements with one `<source>` per modern format and
//! an `<img>` fallback that every browser can show:
//!
//! ```html
//! <picture>
//!   <source type="image/webp" srcset="…/photo-600x400-c.webp">
//!   <img src="…/photo-600x400-c.jpg" width="600" height="400" alt="…">
//! </picture>
//! ```
//!
//! The fallback is negotiated from JPEG (JPEG → PNG → original), so a source
//! served as-is (SVG, `full`) renders as a bare `<img>` inside the picture.
//! [`render_responsive`] widens each `srcset` with the `-s/-m/-l` density
//! variants of a responsive preset.

use crate::attachments::AttachmentStore;
use crate::derivatives::{ImageDerivative, MediaEngine};
use crate::formats::{Format, PRIORITY, negotiate};
use crate::imaging::ImageBackend;
use crate::sizes::{SizeSpec, density_variants};
use maud::{Markup, html};
use std::collections::{BTreeMap, BTreeSet};

/// `<picture>` for one size. `None` when `formats` is empty.
pub fn render_picture(formats: &BTreeMap<Format, ImageDerivative>, alt: &str) -> Option<Markup> {
    let available: BTreeSet<Format> = formats.keys().copied().collect();
    let fallback = &formats[&negotiate(Format::Jpeg, &available)?];

    let mut seen = BTreeSet::from([fallback.src.as_str()]);
    let sources: Vec<&ImageDerivative> = PRIORITY
        .iter()
        .filter_map(|format| formats.get(format))
        .filter(|derivative| seen.insert(derivative.src.as_str()))
        .collect();

    Some(html! {
        picture {
            @for source in &sources {
                source type=(source.mime_type()) srcset=(source.src);
            }
            img src=(fallback.src) width=(fallback.width) height=(fallback.height)
                alt=(alt) loading="lazy" decoding="async";
        }
    })
}

/// `<picture>` whose `srcset`s cover every density variant of `base`.
///
/// Falls back to [`render_picture`] for presets registered without
/// variants. Returns `None` when nothing can be resolved for `base`.
pub fn render_responsive<B: ImageBackend, S: AttachmentStore>(
    engine: &MediaEngine<B, S>,
    attachment_id: u64,
    base: &str,
    alt: &str,
    sizes_attr: &str,
) -> Option<Markup> {
    let base_formats = engine.get_all_formats(attachment_id, &SizeSpec::named(base), None);
    let variants: Vec<String> = density_variants(base)
        .into_iter()
        .filter(|name| engine.sizes().get(name).is_some())
        .collect();
    if variants.is_empty() {
        return render_picture(&base_formats, alt);
    }

    let available: BTreeSet<Format> = base_formats.keys().copied().collect();
    let fallback_format = negotiate(Format::Jpeg, &available)?;
    let fallback = &base_formats[&fallback_format];

    // width → url, per format
    let mut candidates: BTreeMap<Format, BTreeMap<u32, String>> = BTreeMap::new();
    for name in &variants {
        let formats = engine.get_all_formats(attachment_id, &SizeSpec::named(name.as_str()), None);
        for (format, derivative) in formats {
            candidates
                .entry(format)
                .or_default()
                .entry(derivative.width)
                .or_insert(derivative.src);
        }
    }

    let srcset = |format: Format| -> String {
        candidates
            .get(&format)
            .map(|widths| {
                widths
                    .iter()
                    .map(|(width, src)| format!("{} {}w", src, width))
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_default()
    };

    let fallback_srcset = srcset(fallback_format);
    let mut seen = BTreeSet::from([fallback_srcset.clone()]);
    let sources: Vec<(&'static str, String)> = PRIORITY
        .iter()
        .filter_map(|format| {
            let set = srcset(*format);
            let mime = base_formats.get(format)?.mime_type();
            (!set.is_empty() && seen.insert(set.clone())).then_some((mime, set))
        })
        .collect();

    Some(html! {
        picture {
            @for (mime, set) in &sources {
                source type=(mime) srcset=(set) sizes=(sizes_attr);
            }
            @if fallback_srcset.is_empty() {
                img src=(fallback.src) width=(fallback.width) height=(fallback.height)
                    alt=(alt) loading="lazy" decoding="async";
            } @else {
                img src=(fallback.src) srcset=(fallback_srcset) sizes=(sizes_attr)
                    width=(fallback.width) height=(fallback.height)
                    alt=(alt) loading="lazy" decoding="async";
            }
        }
    })
}
