//! # Skin Media
//!
//! Image derivative resolution and caching for theme media. Given an
//! attachment id and a size (a named preset such as `"card"`, explicit
//! `"600x400"`, or `"full"`), the engine returns the URL and real pixel
//! dimensions of the best resized file available, generating it on first use.
//!
//! # Request Flow
//!
//! ```text
//! (attachment_id, size, crop)
//!   → SizeRegistry        preset lookup, native-size fallback
//!   → PathResolver        content-addressed paths, one per format
//!   → DerivativeCache     in-process TTL cache
//!   → disk                webp → jpeg → png → original
//!   → ImageBackend        decode, crop/resize, encode original + webp + jpeg
//!   → ImageDerivative     { src, width, height, format }
//! ```
//!
//! The filesystem is the durable cache. A derivative's filename encodes
//! everything that determines its pixels, so "does this file exist" is the
//! whole cache protocol and generation is idempotent.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`derivatives`] | `MediaEngine`: lookup, generation, single-flight locking, cleanup, events |
//! | [`sizes`] | Crop modes, size presets with density variants, size specifiers and resolution |
//! | [`formats`] | Output formats, lookup priority, fallback negotiation |
//! | [`paths`] | Derivative filenames and directories, path ↔ URL translation |
//! | [`attachments`] | Attachment sources and the JSON manifest store |
//! | [`cache`] | In-process derivative cache and hit/miss stats |
//! | [`imaging`] | Geometry math, quality settings, backend traits, the `image`/libwebp backend |
//! | [`pregenerate`] | Parallel warming of derivatives across attachments and sizes |
//! | [`markup`] | `<picture>` rendering with Maud |
//! | [`endpoint`] | JSON handler for `GET /media/resize/{id}` |
//! | [`config`] | `skin-media.toml` loading, merging, validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Never Fail a Page Render
//!
//! The request-path API (`get_src`, `get_src_format`, `get_all_formats`)
//! returns `Option` and maps, not `Result`. Unknown attachments, unknown
//! sizes, and failed encodes are logged through `tracing` and come back as
//! `None`. A template that asks for an image it cannot get renders without
//! it instead of erroring.
//!
//! ## One Decode, Several Encodes
//!
//! Generation decodes the source once, crops and resizes once, then encodes
//! the same pixels as the source's own format, lossy WebP, and JPEG. WebP is
//! preferred on lookup; JPEG is the universal `<img>` fallback.
//!
//! ## Swappable Imaging Backend
//!
//! The engine only talks to the [`imaging::ImageBackend`] trait. The bundled
//! [`imaging::RustBackend`] uses the `image` crate (Lanczos3 resampling) and
//! libwebp through the `webp` crate for lossy WebP; tests use a recording
//! mock. Writes go through a temp file and rename, so a
//! reader never sees half an image.

pub mod attachments;
pub mod cache;
pub mod config;
pub mod derivatives;
pub mod endpoint;
pub mod formats;
pub mod imaging;
pub mod markup;
pub mod output;
pub mod paths;
pub mod pregenerate;
pub mod sizes;

#[cfg(test)]
pub(crate) mod test_helpers;
