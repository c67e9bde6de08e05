//! Engine configuration module.
//!
//! Handles loading, validating, and merging `skin-media.toml`. Stock defaults
//! are serialized to a TOML table and the user file is merged on top key by
//! key, so a config file only needs the values it changes.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [paths]
//! upload_dir = "uploads"              # Base upload directory
//! upload_url = "/wp-content/uploads"  # Public URL prefix of upload_dir
//! derivative_dir = "skin-sizes"       # Derivative root, relative to upload_dir
//! attachments = "attachments.json"    # Attachment manifest, relative to upload_dir
//!
//! [cache]
//! ttl_secs = 3600                     # 0 disables the in-process cache
//! max_entries = 10000
//! single_flight = true                # One generator per derivative at a time
//!
//! [formats]                           # ANDed with what the backend can encode
//! webp = true
//! jpeg = true
//! png = true
//!
//! [quality]
//! webp = 85
//! jpeg = 90
//! png = 90
//!
//! [processing]
//! max_processes = 4                   # Pregeneration workers (omit for auto = CPU cores)
//!
//! [sizes.card]                        # Presets, merged with the stock ones
//! width = 600
//! height = 400
//! crop = true                         # or false, or ["left", "top"]
//! responsive = true                   # Also register card-s .. card-l2x
//! label = "Card"
//!
//! [native_sizes.thumbnail]            # Fallback table for names not in [sizes]
//! width = 150
//! height = 150
//! crop = true
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::Capabilities;
use crate::sizes::{Crop, MAX_DIMENSION, dimensions_in_range};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "skin-media.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Engine configuration loaded from `skin-media.toml`.
///
/// All fields have defaults. User config files need only specify the values
/// they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MediaConfig {
    /// Upload tree and URL locations.
    pub paths: PathsConfig,
    /// In-process derivative cache.
    pub cache: CacheConfig,
    /// Which derivative encodings may be written.
    pub formats: FormatsConfig,
    /// Encoder quality per format.
    pub quality: QualityConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
    /// Theme size presets.
    pub sizes: BTreeMap<String, SizeConfig>,
    /// Host-provided sizes consulted when a name is not in `sizes`.
    pub native_sizes: BTreeMap<String, SizeConfig>,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            paths: PathsConfig::default(),
            cache: CacheConfig::default(),
            formats: FormatsConfig::default(),
            quality: QualityConfig::default(),
            processing: ProcessingConfig::default(),
            sizes: stock_sizes(),
            native_sizes: stock_native_sizes(),
        }
    }
}

impl MediaConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("webp", self.quality.webp),
            ("jpeg", self.quality.jpeg),
            ("png", self.quality.png),
        ] {
            if !(1..=100).contains(&value) {
                return Err(ConfigError::Validation(format!(
                    "quality.{name} must be 1-100"
                )));
            }
        }
        for (name, value) in [
            ("upload_dir", &self.paths.upload_dir),
            ("upload_url", &self.paths.upload_url),
            ("derivative_dir", &self.paths.derivative_dir),
            ("attachments", &self.paths.attachments),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "paths.{name} must not be empty"
                )));
            }
        }
        if self.cache.max_entries == 0 {
            return Err(ConfigError::Validation(
                "cache.max_entries must be greater than 0".into(),
            ));
        }
        for (table, sizes) in [("sizes", &self.sizes), ("native_sizes", &self.native_sizes)] {
            for (name, size) in sizes {
                if name.trim().is_empty() {
                    return Err(ConfigError::Validation(format!(
                        "{table} contains an empty size name"
                    )));
                }
                if !dimensions_in_range(size.width, size.height) {
                    return Err(ConfigError::Validation(format!(
                        "{table}.{name} width and height must be 1-{}",
                        MAX_DIMENSION
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Upload tree and URL locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    pub upload_dir: String,
    pub upload_url: String,
    pub derivative_dir: String,
    pub attachments: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            upload_dir: "uploads".to_string(),
            upload_url: "/wp-content/uploads".to_string(),
            derivative_dir: "skin-sizes".to_string(),
            attachments: "attachments.json".to_string(),
        }
    }
}

/// In-process derivative cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Entry lifetime in seconds. `0` disables the cache.
    pub ttl_secs: u64,
    pub max_entries: u64,
    /// Serialize generation of the same derivative across threads.
    pub single_flight: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 3600,
            max_entries: 10_000,
            single_flight: true,
        }
    }
}

/// Derivative encodings the engine may write.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FormatsConfig {
    pub webp: bool,
    pub jpeg: bool,
    pub png: bool,
}

impl Default for FormatsConfig {
    fn default() -> Self {
        Self {
            webp: true,
            jpeg: true,
            png: true,
        }
    }
}

impl FormatsConfig {
    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            webp: self.webp,
            png: self.png,
            jpeg: self.jpeg,
        }
    }
}

/// Encoder quality per output format (1-100).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QualityConfig {
    pub webp: u32,
    pub jpeg: u32,
    pub png: u32,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            webp: 85,
            jpeg: 90,
            png: 90,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel pregeneration workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

/// One `[sizes.NAME]` or `[native_sizes.NAME]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SizeConfig {
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub crop: Crop,
    /// Also register the `-s/-m/-l` density variants and their `2x` doubles.
    #[serde(default)]
    pub responsive: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl SizeConfig {
    fn new(width: u32, height: u32, crop: Crop, responsive: bool, label: &str) -> Self {
        Self {
            width,
            height,
            crop,
            responsive,
            label: Some(label.to_string()),
        }
    }
}

fn stock_sizes() -> BTreeMap<String, SizeConfig> {
    BTreeMap::from([
        (
            "card".to_string(),
            SizeConfig::new(600, 400, Crop::Center, true, "Card"),
        ),
        (
            "hero".to_string(),
            SizeConfig::new(1920, 1080, Crop::Center, true, "Hero"),
        ),
        (
            "square".to_string(),
            SizeConfig::new(480, 480, Crop::Center, false, "Square"),
        ),
        (
            "content".to_string(),
            SizeConfig::new(1200, 1200, Crop::None, false, "Content width"),
        ),
    ])
}

fn stock_native_sizes() -> BTreeMap<String, SizeConfig> {
    BTreeMap::from([
        (
            "thumbnail".to_string(),
            SizeConfig::new(150, 150, Crop::Center, false, "Thumbnail"),
        ),
        (
            "medium".to_string(),
            SizeConfig::new(300, 300, Crop::None, false, "Medium"),
        ),
        (
            "large".to_string(),
            SizeConfig::new(1024, 1024, Crop::None, false, "Large"),
        ),
    ])
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(MediaConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<MediaConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: MediaConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from the given file.
///
/// A missing file yields the stock defaults. Merges user values on top of
/// stock defaults, rejects unknown keys, and validates the result.
pub fn load_config(path: &Path) -> Result<MediaConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `skin-media.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# skin-media Configuration
# ========================
#
# All options are optional. Remove or comment out anything you don't need
# to change; missing keys fall back to the values shown here.

# ---------------------------------------------------------------------------
# Paths
# ---------------------------------------------------------------------------
[paths]
# Base upload directory. Source files live below it in year/month folders.
upload_dir = "uploads"
# Public URL prefix that maps onto upload_dir.
upload_url = "/wp-content/uploads"
# Derivative root, relative to upload_dir. Layout below it:
#   {attachment_id}/{year}/{month}/{stem}-{width}x{height}{crop}.{ext}
derivative_dir = "skin-sizes"
# Attachment manifest, relative to upload_dir.
attachments = "attachments.json"

# ---------------------------------------------------------------------------
# Cache
# ---------------------------------------------------------------------------
[cache]
# Lifetime of a resolved derivative in the in-process cache. 0 disables it.
ttl_secs = 3600
# Upper bound on cached entries.
max_entries = 10000
# Let only one worker generate a given derivative at a time.
single_flight = true

# ---------------------------------------------------------------------------
# Formats
# ---------------------------------------------------------------------------
# Encodings that may be written. Anything the image backend cannot encode is
# switched off regardless of these values. PNG is looked up but never written.
[formats]
webp = true
jpeg = true
png = true

# ---------------------------------------------------------------------------
# Quality (1-100)
# ---------------------------------------------------------------------------
[quality]
webp = 85
jpeg = 90
png = 90

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers for `pregenerate`.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4

# ---------------------------------------------------------------------------
# Size presets
# ---------------------------------------------------------------------------
# width and height: 1-16383 pixels (the WebP encoder's limit). A 2x variant
# that would exceed it is not registered.
# crop = false         fit inside the box, keep the aspect ratio
# crop = true          fill the box, trim the excess evenly
# crop = ["left", "top"]  fill the box, keep that corner
#                      (left|center|right, top|center|bottom)
# responsive = true    also register NAME-s, NAME-m, NAME-l (x0.5, x0.75, x1)
#                      and NAME-s2x, NAME-m2x, NAME-l2x (double of each)
[sizes.card]
width = 600
height = 400
crop = true
responsive = true
label = "Card"

[sizes.content]
width = 1200
height = 1200
crop = false
label = "Content width"

[sizes.hero]
width = 1920
height = 1080
crop = true
responsive = true
label = "Hero"

[sizes.square]
width = 480
height = 480
crop = true
label = "Square"

# ---------------------------------------------------------------------------
# Native sizes
# ---------------------------------------------------------------------------
# Consulted when a requested name is not one of the presets above.
[native_sizes.large]
width = 1024
height = 1024
crop = false
label = "Large"

[native_sizes.medium]
width = 300
height = 300
crop = false
label = "Medium"

[native_sizes.thumbnail]
width = 150
height = 150
crop = true
label = "Thumbnail"
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sizes::{HorizontalAnchor, VerticalAnchor};
    use tempfile::TempDir;

    #[test]
    fn default_config_has_paths() {
        let config = MediaConfig::default();
        assert_eq!(config.paths.upload_dir, "uploads");
        assert_eq!(config.paths.upload_url, "/wp-content/uploads");
        assert_eq!(config.paths.derivative_dir, "skin-sizes");
    }

    #[test]
    fn default_config_has_cache_and_quality() {
        let config = MediaConfig::default();
        assert_eq!(config.cache.ttl_secs, 3600);
        assert!(config.cache.single_flight);
        assert_eq!(config.quality.webp, 85);
        assert_eq!(config.quality.jpeg, 90);
    }

    #[test]
    fn default_config_has_stock_sizes() {
        let config = MediaConfig::default();
        let card = &config.sizes["card"];
        assert_eq!((card.width, card.height, card.crop), (600, 400, Crop::Center));
        assert!(card.responsive);
        assert_eq!(config.sizes["hero"].width, 1920);
        assert_eq!(config.native_sizes["thumbnail"].crop, Crop::Center);
    }

    #[test]
    fn parse_partial_config() {
        let toml = r#"
[quality]
webp = 70
"#;
        let config: MediaConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.quality.webp, 70);
        // Default values preserved
        assert_eq!(config.quality.jpeg, 90);
        assert_eq!(config.paths.upload_dir, "uploads");
    }

    #[test]
    fn parse_size_crop_forms() {
        let toml = r#"
[sizes.a]
width = 10
height = 10

[sizes.b]
width = 10
height = 10
crop = true

[sizes.c]
width = 10
height = 10
crop = ["right", "bottom"]
"#;
        let config: MediaConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.sizes["a"].crop, Crop::None);
        assert_eq!(config.sizes["b"].crop, Crop::Center);
        assert_eq!(
            config.sizes["c"].crop,
            Crop::Position(HorizontalAnchor::Right, VerticalAnchor::Bottom)
        );
    }

    #[test]
    fn formats_config_to_capabilities() {
        let formats = FormatsConfig {
            webp: false,
            jpeg: true,
            png: true,
        };
        let caps = formats.capabilities();
        assert!(!caps.webp);
        assert!(caps.jpeg);
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config.paths.upload_dir, "uploads");
        assert!(config.sizes.contains_key("card"));
    }

    #[test]
    fn load_config_reads_file_and_keeps_stock_sizes() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join(CONFIG_FILE);
        fs::write(
            &config_path,
            r#"
[paths]
upload_dir = "/srv/uploads"

[sizes.banner]
width = 1600
height = 400
crop = ["center", "top"]
"#,
        )
        .unwrap();

        let config = load_config(&config_path).unwrap();
        assert_eq!(config.paths.upload_dir, "/srv/uploads");
        assert_eq!(config.paths.derivative_dir, "skin-sizes");
        assert_eq!(config.sizes["banner"].width, 1600);
        assert!(config.sizes.contains_key("card"));
    }

    #[test]
    fn load_config_overrides_one_field_of_stock_size() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join(CONFIG_FILE);
        fs::write(
            &config_path,
            r#"
[sizes.card]
height = 300
"#,
        )
        .unwrap();

        let config = load_config(&config_path).unwrap();
        assert_eq!(config.sizes["card"].width, 600);
        assert_eq!(config.sizes["card"].height, 300);
        assert!(config.sizes["card"].responsive);
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join(CONFIG_FILE);
        fs::write(&config_path, "this is not valid toml [[[").unwrap();

        let result = load_config(&config_path);
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    // =========================================================================
    // effective_threads tests
    // =========================================================================

    #[test]
    fn effective_threads_auto() {
        let config = ProcessingConfig {
            max_processes: None,
        };
        let threads = effective_threads(&config);
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(threads, cores);
    }

    #[test]
    fn effective_threads_clamped_to_cores() {
        let config = ProcessingConfig {
            max_processes: Some(99999),
        };
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(effective_threads(&config), cores);
    }

    #[test]
    fn effective_threads_user_constrains_down() {
        let config = ProcessingConfig {
            max_processes: Some(1),
        };
        assert_eq!(effective_threads(&config), 1);
    }

    // =========================================================================
    // merge_toml tests
    // =========================================================================

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str("a = 1\nb = 2").unwrap();
        let overlay: toml::Value = toml::from_str("b = 3").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("a").unwrap().as_integer(), Some(1));
        assert_eq!(merged.get("b").unwrap().as_integer(), Some(3));
    }

    #[test]
    fn merge_toml_deep_nested() {
        let base: toml::Value = toml::from_str(
            r#"
[sizes.card]
width = 600
height = 400
"#,
        )
        .unwrap();
        let overlay: toml::Value = toml::from_str(
            r#"
[sizes.card]
width = 640
"#,
        )
        .unwrap();
        let merged = merge_toml(base, overlay);
        let card = merged.get("sizes").unwrap().get("card").unwrap();
        assert_eq!(card.get("width").unwrap().as_integer(), Some(640));
        assert_eq!(card.get("height").unwrap().as_integer(), Some(400));
    }

    #[test]
    fn merge_toml_array_replaces() {
        let base: toml::Value = toml::from_str("crop = [\"left\", \"top\"]").unwrap();
        let overlay: toml::Value = toml::from_str("crop = true").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("crop").unwrap().as_bool(), Some(true));
    }

    // =========================================================================
    // Unknown key rejection
    // =========================================================================

    #[test]
    fn unknown_key_rejected() {
        let result: Result<MediaConfig, _> = toml::from_str("unknown_key = 1");
        assert!(result.is_err());
    }

    #[test]
    fn unknown_nested_key_rejected() {
        let result: Result<MediaConfig, _> = toml::from_str("[cache]\nttl = 5");
        assert!(result.is_err());
    }

    #[test]
    fn unknown_size_key_rejected() {
        let result: Result<MediaConfig, _> =
            toml::from_str("[sizes.card]\nwidth = 1\nheight = 1\nwdith = 2");
        assert!(result.is_err());
    }

    // =========================================================================
    // Validation
    // =========================================================================

    #[test]
    fn validate_default_config_passes() {
        assert!(MediaConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_quality_bounds() {
        let mut config = MediaConfig::default();
        config.quality.webp = 100;
        config.quality.jpeg = 1;
        assert!(config.validate().is_ok());

        config.quality.png = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));

        config.quality.png = 101;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_empty_path() {
        let mut config = MediaConfig::default();
        config.paths.derivative_dir = " ".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_zero_size_dimension() {
        let mut config = MediaConfig::default();
        config.native_sizes.insert(
            "broken".to_string(),
            SizeConfig::new(0, 100, Crop::None, false, "Broken"),
        );
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("native_sizes.broken"));
    }

    #[test]
    fn validate_oversized_size_dimension() {
        let mut config = MediaConfig::default();
        config.sizes.insert(
            "billboard".to_string(),
            SizeConfig::new(20_000, 100, Crop::Center, false, "Billboard"),
        );
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("sizes.billboard"), "{err}");
        assert!(err.to_string().contains("16383"), "{err}");
    }

    #[test]
    fn validate_zero_max_entries() {
        let mut config = MediaConfig::default();
        config.cache.max_entries = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn resolve_config_rejects_invalid_values() {
        let base = stock_defaults_value();
        let overlay: toml::Value = toml::from_str("[quality]\njpeg = 200").unwrap();
        let result = resolve_config(base, Some(overlay));
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    // =========================================================================
    // stock_config_toml / stock_defaults_value tests
    // =========================================================================

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let config: MediaConfig = toml::from_str(stock_config_toml()).unwrap();
        let defaults = MediaConfig::default();
        assert_eq!(config.sizes, defaults.sizes);
        assert_eq!(config.native_sizes, defaults.native_sizes);
        assert_eq!(config.quality.webp, defaults.quality.webp);
        assert_eq!(config.cache.ttl_secs, defaults.cache.ttl_secs);
        assert_eq!(config.paths.upload_url, defaults.paths.upload_url);
    }

    #[test]
    fn stock_config_toml_contains_all_sections() {
        let content = stock_config_toml();
        for section in [
            "[paths]",
            "[cache]",
            "[formats]",
            "[quality]",
            "[processing]",
            "[sizes.card]",
            "[native_sizes.thumbnail]",
        ] {
            assert!(content.contains(section), "missing {section}");
        }
    }

    #[test]
    fn stock_defaults_value_has_all_sections() {
        let val = stock_defaults_value();
        assert!(val.is_table());
        for key in [
            "paths",
            "cache",
            "formats",
            "quality",
            "processing",
            "sizes",
            "native_sizes",
        ] {
            assert!(val.get(key).is_some(), "missing {key}");
        }
    }
}
