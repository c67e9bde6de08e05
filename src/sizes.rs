//! Named size presets and size specifiers.
//!
//! A request names its target geometry either by preset (`"card"`,
//! `"hero-m2x"`), by explicit dimensions (`"600x400"`), or as `"full"` for the
//! untouched source. [`resolve_spec`] turns any of these into a [`ResizeSpec`],
//! consulting the theme's own [`SizeRegistry`] first and the host's native
//! size table second.
//!
//! ## Device-density variants
//!
//! [`SizeRegistry::add_responsive`] registers a base preset together with
//! `-s`, `-m`, `-l` scaled copies and their `2x` doubles:
//!
//! ```text
//! card       600x400
//! card-s     300x200     card-s2x   600x400
//! card-m     450x300     card-m2x   900x600
//! card-l     600x400     card-l2x  1200x800
//! ```
//!
//! The registry never parses these suffixes; they are a naming convention the
//! markup layer relies on when it builds `srcset` lists.

use crate::config::SizeConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SizeError {
    #[error("size specifier must not be empty")]
    Empty,
    #[error("invalid crop setting: {0}")]
    InvalidCrop(String),
}

/// Largest width or height a derivative may have. libwebp refuses anything
/// bigger, and requests beyond it are treated as unknown sizes.
pub const MAX_DIMENSION: u32 = 16_383;

/// Scale factors for the `-s`, `-m`, `-l` density suffixes.
pub const DENSITY_SCALES: &[(&str, f64)] = &[("s", 0.5), ("m", 0.75), ("l", 1.0)];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HorizontalAnchor {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerticalAnchor {
    Top,
    Center,
    Bottom,
}

impl HorizontalAnchor {
    fn code(self) -> char {
        match self {
            Self::Left => 'l',
            Self::Center => 'c',
            Self::Right => 'r',
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Center => "center",
            Self::Right => "right",
        }
    }
}

impl VerticalAnchor {
    fn code(self) -> char {
        match self {
            Self::Top => 't',
            Self::Center => 'c',
            Self::Bottom => 'b',
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Top => "top",
            Self::Center => "center",
            Self::Bottom => "bottom",
        }
    }
}

/// How a derivative is fitted into its target box.
///
/// In `skin-media.toml` this is written as `crop = true`, `crop = false`, or
/// `crop = ["left", "top"]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "CropSetting", into = "CropSetting")]
pub enum Crop {
    /// Fit inside the box, preserving the aspect ratio.
    #[default]
    None,
    /// Fill the box, trimming the excess symmetrically.
    Center,
    /// Fill the box, keeping the given edge of the source.
    Position(HorizontalAnchor, VerticalAnchor),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum CropSetting {
    Flag(bool),
    Position(HorizontalAnchor, VerticalAnchor),
}

impl From<CropSetting> for Crop {
    fn from(setting: CropSetting) -> Self {
        match setting {
            CropSetting::Flag(false) => Crop::None,
            CropSetting::Flag(true) => Crop::Center,
            CropSetting::Position(h, v) => Crop::Position(h, v),
        }
    }
}

impl From<Crop> for CropSetting {
    fn from(crop: Crop) -> Self {
        match crop {
            Crop::None => CropSetting::Flag(false),
            Crop::Center => CropSetting::Flag(true),
            Crop::Position(h, v) => CropSetting::Position(h, v),
        }
    }
}

impl Crop {
    pub fn is_cropped(self) -> bool {
        !matches!(self, Crop::None)
    }

    /// Filename suffix: `""`, `"-c"`, or a position code such as `"-tl"`.
    pub fn suffix(self) -> String {
        match self {
            Crop::None => String::new(),
            Crop::Center => "-c".to_string(),
            Crop::Position(h, v) => format!("-{}{}", v.code(), h.code()),
        }
    }
}

impl fmt::Display for Crop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Crop::None => write!(f, "false"),
            Crop::Center => write!(f, "true"),
            Crop::Position(h, v) => write!(f, "{},{}", h.name(), v.name()),
        }
    }
}

impl FromStr for Crop {
    type Err = SizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim().to_ascii_lowercase();
        match value.as_str() {
            "" | "false" | "0" | "no" | "none" => return Ok(Crop::None),
            "true" | "1" | "yes" | "c" | "center" => return Ok(Crop::Center),
            _ => {}
        }
        let (h, v) = value
            .split_once(',')
            .ok_or_else(|| SizeError::InvalidCrop(s.to_string()))?;
        let h = match h.trim() {
            "left" => HorizontalAnchor::Left,
            "center" => HorizontalAnchor::Center,
            "right" => HorizontalAnchor::Right,
            _ => return Err(SizeError::InvalidCrop(s.to_string())),
        };
        let v = match v.trim() {
            "top" => VerticalAnchor::Top,
            "center" => VerticalAnchor::Center,
            "bottom" => VerticalAnchor::Bottom,
            _ => return Err(SizeError::InvalidCrop(s.to_string())),
        };
        Ok(Crop::Position(h, v))
    }
}

/// A named, registered `(width, height, crop)` triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SizePreset {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub crop: Crop,
}

/// What a caller asked for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SizeSpec {
    /// The source file itself, never processed.
    Full,
    Named(String),
    Dimensions { width: u32, height: u32 },
}

impl SizeSpec {
    pub fn named(name: impl Into<String>) -> Self {
        SizeSpec::Named(name.into())
    }

    pub fn is_full(&self) -> bool {
        matches!(self, SizeSpec::Full)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, SizeSpec::Named(name) if name.trim().is_empty())
    }
}

impl fmt::Display for SizeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SizeSpec::Full => write!(f, "full"),
            SizeSpec::Named(name) => write!(f, "{}", name),
            SizeSpec::Dimensions { width, height } => write!(f, "{}x{}", width, height),
        }
    }
}

impl FromStr for SizeSpec {
    type Err = SizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(SizeError::Empty);
        }
        if s == "full" {
            return Ok(SizeSpec::Full);
        }
        if let Some((w, h)) = s.split_once('x')
            && let (Ok(width), Ok(height)) = (w.parse::<u32>(), h.parse::<u32>())
        {
            return Ok(SizeSpec::Dimensions { width, height });
        }
        Ok(SizeSpec::Named(s.to_string()))
    }
}

/// The resolved target geometry for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResizeSpec {
    pub width: u32,
    pub height: u32,
    pub crop: Crop,
}

impl fmt::Display for ResizeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}{}", self.width, self.height, self.crop.suffix())
    }
}

/// Name → preset lookup table.
///
/// Built once at startup (from config) and handed to the engine, which only
/// ever reads it. Tests build isolated registries freely.
#[derive(Debug, Clone, Default)]
pub struct SizeRegistry {
    presets: BTreeMap<String, SizePreset>,
    labels: BTreeMap<String, String>,
}

impl SizeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a `[sizes]` or `[native_sizes]` config table.
    pub fn from_config(table: &BTreeMap<String, SizeConfig>) -> Self {
        let mut registry = Self::new();
        for (name, size) in table {
            let added = if size.responsive {
                registry.add_responsive(name, size.width, size.height, size.crop)
            } else {
                registry.add(name, size.width, size.height, size.crop)
            };
            if added && let Some(label) = &size.label {
                registry.set_label(name, label);
            }
        }
        registry
    }

    /// Register a preset. Returns `false` for an empty name, or a dimension
    /// that is zero or above [`MAX_DIMENSION`].
    pub fn add(&mut self, name: &str, width: u32, height: u32, crop: Crop) -> bool {
        let name = name.trim();
        if name.is_empty() || !dimensions_in_range(width, height) {
            return false;
        }
        self.presets.insert(
            name.to_string(),
            SizePreset {
                name: name.to_string(),
                width,
                height,
                crop,
            },
        );
        true
    }

    /// Register `name` plus its `-s/-m/-l` and `-s2x/-m2x/-l2x` variants.
    pub fn add_responsive(&mut self, name: &str, width: u32, height: u32, crop: Crop) -> bool {
        if !self.add(name, width, height, crop) {
            return false;
        }
        let name = name.trim();
        for (suffix, scale) in DENSITY_SCALES {
            let w = (width as f64 * scale).round() as u32;
            let h = (height as f64 * scale).round() as u32;
            self.add(&format!("{name}-{suffix}"), w, h, crop);
            if let (Some(w2), Some(h2)) = (w.checked_mul(2), h.checked_mul(2)) {
                self.add(&format!("{name}-{suffix}2x"), w2, h2, crop);
            }
        }
        true
    }

    pub fn set_label(&mut self, name: &str, label: &str) {
        self.labels.insert(name.to_string(), label.to_string());
    }

    /// Human-readable label for administrative listings.
    pub fn label(&self, name: &str) -> String {
        self.labels
            .get(name)
            .cloned()
            .unwrap_or_else(|| humanize(name))
    }

    pub fn get(&self, name: &str) -> Option<&SizePreset> {
        self.presets.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SizePreset> {
        self.presets.values()
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }
}

/// Whether `width`x`height` is a size a derivative can be generated at.
pub fn dimensions_in_range(width: u32, height: u32) -> bool {
    (1..=MAX_DIMENSION).contains(&width) && (1..=MAX_DIMENSION).contains(&height)
}

/// Names of the density variants of `base`, smallest first.
pub fn density_variants(base: &str) -> Vec<String> {
    DENSITY_SCALES
        .iter()
        .flat_map(|(suffix, _)| [format!("{base}-{suffix}"), format!("{base}-{suffix}2x")])
        .collect()
}

/// Resolve a size specifier into target geometry.
///
/// Named sizes are looked up in `registry`, then in `native`. Returns `None`
/// for `full`, unknown names, and dimensions outside [`dimensions_in_range`].
pub fn resolve_spec(
    registry: &SizeRegistry,
    native: &SizeRegistry,
    size: &SizeSpec,
    crop_override: Option<Crop>,
) -> Option<ResizeSpec> {
    let (width, height, crop) = match size {
        SizeSpec::Full => return None,
        SizeSpec::Named(name) => {
            let preset = registry.get(name).or_else(|| native.get(name))?;
            (preset.width, preset.height, preset.crop)
        }
        SizeSpec::Dimensions { width, height } => (*width, *height, Crop::None),
    };
    if !dimensions_in_range(width, height) {
        return None;
    }
    Some(ResizeSpec {
        width,
        height,
        crop: crop_override.unwrap_or(crop),
    })
}

fn humanize(name: &str) -> String {
    name.split(['-', '_'])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
