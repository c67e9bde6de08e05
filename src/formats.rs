//! Output formats and format negotiation.
//!
//! Every derivative exists in up to four formats. Their order is fixed and
//! used everywhere a choice has to be made:
//!
//! ```text
//! priority:   webp → jpeg → png → original
//! fallbacks:  webp     → [jpeg, png, original]
//!             png      → [jpeg, original]
//!             jpeg     → [png, original]
//!             original → []
//! ```
//!
//! `original` means "the source's own encoding", so a `.gif` upload produces
//! `.gif` originals. PNG is recognized on lookup but never generated (see
//! [`GENERATION_ORDER`]) so that PNG derivatives from earlier runs are still
//! served.
//!
//! [`negotiate`] is a pure function of the requested format and the set of
//! available ones, so the policy is testable without touching disk.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("unknown format: {0} (expected best, webp, jpeg, png or original)")]
    Unknown(String),
}

/// A derivative output format. `Ord` follows lookup priority.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Webp,
    Jpeg,
    Png,
    Original,
}

/// Lookup order: the first format found on disk wins.
pub const PRIORITY: [Format; 4] = [Format::Webp, Format::Jpeg, Format::Png, Format::Original];

/// Formats written when a derivative is generated, in write order.
pub const GENERATION_ORDER: [Format; 3] = [Format::Original, Format::Webp, Format::Jpeg];

impl Format {
    pub fn as_str(self) -> &'static str {
        match self {
            Format::Webp => "webp",
            Format::Jpeg => "jpeg",
            Format::Png => "png",
            Format::Original => "original",
        }
    }

    /// Formats to try, in order, when this one is unavailable.
    pub fn fallbacks(self) -> &'static [Format] {
        match self {
            Format::Webp => &[Format::Jpeg, Format::Png, Format::Original],
            Format::Png => &[Format::Jpeg, Format::Original],
            Format::Jpeg => &[Format::Png, Format::Original],
            Format::Original => &[],
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "webp" => Ok(Format::Webp),
            "jpeg" | "jpg" => Ok(Format::Jpeg),
            "png" => Ok(Format::Png),
            "original" => Ok(Format::Original),
            _ => Err(FormatError::Unknown(s.to_string())),
        }
    }
}

/// A caller's format preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatRequest {
    /// Whatever ranks highest in [`PRIORITY`].
    #[default]
    Best,
    Exact(Format),
}

impl FromStr for FormatRequest {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("best") {
            return Ok(FormatRequest::Best);
        }
        trimmed.parse().map(FormatRequest::Exact)
    }
}

impl fmt::Display for FormatRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatRequest::Best => f.write_str("best"),
            FormatRequest::Exact(format) => format.fmt(f),
        }
    }
}

/// File extension written for a format. `Original` keeps the source's.
pub fn extension_for(format: Format) -> Option<&'static str> {
    match format {
        Format::Webp => Some("webp"),
        Format::Jpeg => Some("jpg"),
        Format::Png => Some("png"),
        Format::Original => None,
    }
}

/// Format a file extension encodes, if it is one of the derivative formats.
pub fn format_for_extension(ext: &str) -> Option<Format> {
    match ext.to_ascii_lowercase().as_str() {
        "webp" => Some(Format::Webp),
        "jpg" | "jpeg" => Some(Format::Jpeg),
        "png" => Some(Format::Png),
        _ => None,
    }
}

pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "webp" => Some("image/webp"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "svg" => Some("image/svg+xml"),
        _ => None,
    }
}

/// Pick the best match for `requested` among `available`.
///
/// Returns `requested` itself when present, otherwise the first available
/// entry of its fallback chain.
pub fn negotiate(requested: Format, available: &BTreeSet<Format>) -> Option<Format> {
    if available.contains(&requested) {
        return Some(requested);
    }
    requested
        .fallbacks()
        .iter()
        .copied()
        .find(|format| available.contains(format))
}
