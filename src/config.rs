//! Collage configuration module.
//!
//! Handles loading, validating, and merging the TOML config file. Stock
//! defaults are serialized from [`CollageConfig::default`] and the user file
//! is merged on top, so a config only needs the keys it wants to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [layout]
//! cols = 3                 # Cells per row
//! rows_per_group = 3       # Rows per sheet (0 = 50)
//! gap = 0                  # Pixels between cells
//! aspect_ratio = 0.75      # Cell width / height (0 = use custom sides)
//! custom_width = 1000
//! custom_height = 1500
//! cell_width = 1500        # Base cell width before the row-width shrink
//!
//! [numbering]
//! enabled = true
//! start = 1
//! font_size = 350
//! font_family = "sans-serif"   # Family name or path to a .ttf/.otf
//! color = "#FFFFFF"
//! stroke = false
//! stroke_color = "#000000"
//! shadow = true
//! shadow_color = "#000000"
//! position = "bottom-center"
//!
//! [overlay]
//! # image = "frame.png"
//! opacity = 1.0
//! blend_mode = "normal"
//!
//! [mask]
//! indices = ""             # e.g. "1-3, 7"
//! mode = "line"            # line | image
//! line_style = "cross"     # cross | slash
//! color = "#FF3B30"
//! width = 10
//! # sticker = "sticker.png"
//! sticker_size = 50
//! sticker_x = 50
//! sticker_y = 50
//!
//! [export]
//! quality = 0.8            # 1.0 = PNG, below = JPEG
//!
//! [device]
//! class = "desktop"        # desktop | mobile
//! max_combine_images = 100
//!
//! [pacing]
//! yield_every = 30
//! cell_pause_ms = 10
//! sheet_pause_ms = 200
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::rust_backend::DEFAULT_MAX_SURFACE_PIXELS;
use crate::imaging::{Anchor, BlendMode, Color, ExportQuality, LineStyle, MaskMode};
use crate::layout;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Collage configuration.
///
/// All fields have defaults. User config files need only specify the values
/// they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CollageConfig {
    /// Grid shape and cell size.
    pub layout: LayoutConfig,
    /// Per-cell number labels.
    pub numbering: NumberingConfig,
    /// Optional image composited over each finished sheet.
    pub overlay: OverlayConfig,
    /// Mask targets and how they are drawn.
    pub mask: MaskConfig,
    /// Output encoding.
    pub export: ExportConfig,
    /// Limits of the machine the output is meant for.
    pub device: DeviceConfig,
    /// Cooperative scheduling cadence.
    pub pacing: PacingConfig,
}

impl CollageConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Validation(msg.into()));

        if self.layout.cols == 0 {
            return invalid("layout.cols must be at least 1");
        }
        if !(self.layout.aspect_ratio > 0.0
            || (self.layout.aspect_ratio == 0.0
                && self.layout.custom_width > 0
                && self.layout.custom_height > 0))
        {
            return invalid(
                "layout.aspect_ratio must be positive, or 0 with non-zero custom_width/custom_height",
            );
        }
        layout::cell_size(&self.layout)
            .map_err(|e| ConfigError::Validation(format!("layout: {e}")))?;

        let quality = self.export.quality.value();
        if !(quality > 0.0 && quality <= 1.0) {
            return invalid("export.quality must be in (0, 1]");
        }
        if !(0.0..=1.0).contains(&self.overlay.opacity) {
            return invalid("overlay.opacity must be in [0, 1]");
        }
        if !(self.numbering.font_size > 0.0) {
            return invalid("numbering.font_size must be positive");
        }
        if !(self.mask.width >= 0.0) {
            return invalid("mask.width must not be negative");
        }
        if !(self.mask.sticker_size > 0.0) {
            return invalid("mask.sticker_size must be positive");
        }
        if self.pacing.yield_every == 0 {
            return invalid("pacing.yield_every must be at least 1");
        }
        if self.device.max_combine_pixels == Some(0) {
            return invalid("device.max_combine_pixels must be positive");
        }
        Ok(())
    }
}

/// Grid shape and cell sizing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LayoutConfig {
    /// Cells per row.
    pub cols: u32,
    /// Rows per sheet; 0 means 50.
    pub rows_per_group: u32,
    /// Pixels between adjacent cells.
    pub gap: u32,
    /// Cell width / height. 0 derives the ratio from the custom sides.
    pub aspect_ratio: f64,
    pub custom_width: u32,
    pub custom_height: u32,
    /// Base cell width before shrinking to fit the maximum canvas dimension.
    pub cell_width: u32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            cols: 3,
            rows_per_group: 3,
            gap: 0,
            aspect_ratio: 0.75,
            custom_width: 1000,
            custom_height: 1500,
            cell_width: 1500,
        }
    }
}

/// Number labels drawn in each cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NumberingConfig {
    pub enabled: bool,
    /// Global index of the first image.
    pub start: i64,
    /// Font size in pixels.
    pub font_size: f32,
    /// Generic family (`sans-serif`, `serif`, `monospace`), family name, or font file path.
    pub font_family: String,
    pub color: Color,
    pub stroke: bool,
    pub stroke_color: Color,
    pub shadow: bool,
    pub shadow_color: Color,
    pub position: Anchor,
}

impl Default for NumberingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            start: 1,
            font_size: 350.0,
            font_family: "sans-serif".into(),
            color: Color::WHITE,
            stroke: false,
            stroke_color: Color::BLACK,
            shadow: true,
            shadow_color: Color::BLACK,
            position: Anchor::default(),
        }
    }
}

/// Global overlay composited over every sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OverlayConfig {
    /// Overlay image file; relative paths resolve against the config file.
    pub image: Option<PathBuf>,
    pub opacity: f32,
    pub blend_mode: BlendMode,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            image: None,
            opacity: 1.0,
            blend_mode: BlendMode::Normal,
        }
    }
}

/// Which cells get masked and how.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MaskConfig {
    /// Index expression, e.g. `"1-3, 7"`.
    pub indices: String,
    pub mode: MaskMode,
    pub line_style: LineStyle,
    pub color: Color,
    /// Line width at a 500px reference cell, divided by 5.
    pub width: f32,
    /// Sticker image file for `image` mode.
    pub sticker: Option<PathBuf>,
    /// Sticker width as a percentage of the cell width.
    pub sticker_size: f32,
    /// Sticker center as percentages of the cell size.
    pub sticker_x: f32,
    pub sticker_y: f32,
}

impl Default for MaskConfig {
    fn default() -> Self {
        Self {
            indices: String::new(),
            mode: MaskMode::Line,
            line_style: LineStyle::Cross,
            color: Color::rgb(0xFF, 0x3B, 0x30),
            width: 10.0,
            sticker: None,
            sticker_size: 50.0,
            sticker_x: 50.0,
            sticker_y: 50.0,
        }
    }
}

/// Output encoding settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportConfig {
    /// 1.0 exports PNG, anything lower exports JPEG at that quality.
    pub quality: ExportQuality,
}

/// Device class for the combined-image pixel budget.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceClass {
    #[default]
    Desktop,
    Mobile,
}

impl DeviceClass {
    /// Largest combined image, in pixels, the class can hold safely.
    pub fn pixel_budget(self) -> u64 {
        match self {
            DeviceClass::Desktop => 50_000_000,
            DeviceClass::Mobile => 16_777_216,
        }
    }
}

/// Capabilities of the target device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeviceConfig {
    pub class: DeviceClass,
    /// Overrides the class budget when set.
    pub max_combine_pixels: Option<u64>,
    /// Combine is refused above this many source images.
    pub max_combine_images: usize,
    /// Largest raster surface the renderer may allocate.
    pub max_surface_pixels: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            class: DeviceClass::Desktop,
            max_combine_pixels: None,
            max_combine_images: 100,
            max_surface_pixels: DEFAULT_MAX_SURFACE_PIXELS,
        }
    }
}

impl DeviceConfig {
    pub fn combine_pixel_budget(&self) -> u64 {
        self.max_combine_pixels
            .unwrap_or_else(|| self.class.pixel_budget())
    }
}

/// Pauses taken at the cooperative yield points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PacingConfig {
    /// Yield after this many cells within a sheet.
    pub yield_every: usize,
    pub cell_pause_ms: u64,
    pub sheet_pause_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            yield_every: 30,
            cell_pause_ms: 10,
            sheet_pause_ms: 200,
        }
    }
}

impl PacingConfig {
    pub fn cell_pause(&self) -> Duration {
        Duration::from_millis(self.cell_pause_ms)
    }

    pub fn sheet_pause(&self) -> Duration {
        Duration::from_millis(self.sheet_pause_ms)
    }
}

// =============================================================================
// Loading and merging
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(CollageConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, value) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(existing) => merge_toml(existing, value),
                    None => value,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value. `Ok(None)` if it does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.is_file() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    Ok(Some(toml::from_str(&content)?))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<CollageConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: CollageConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the config file at `path` over the stock defaults.
///
/// A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<CollageConfig, ConfigError> {
    resolve_config(stock_defaults_value(), load_raw_config(path)?)
}

/// Returns a fully-commented stock config with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# gridsheet configuration
# =======================
# All settings are optional. Values shown below are the defaults.
# Unknown keys cause an error.

# ---------------------------------------------------------------------------
# Grid layout
# ---------------------------------------------------------------------------
[layout]
# Cells per row.
cols = 3

# Rows per sheet. 0 means 50.
rows_per_group = 3

# Pixels between adjacent cells.
gap = 0

# Cell width / height. Set to 0 to use custom_width:custom_height instead.
aspect_ratio = 0.75
custom_width = 1000
custom_height = 1500

# Base cell width in pixels. Shrinks when a row would exceed 8192px.
cell_width = 1500

# ---------------------------------------------------------------------------
# Cell numbers
# ---------------------------------------------------------------------------
[numbering]
enabled = true

# Number of the first image.
start = 1

# Font size in pixels.
font_size = 350.0

# "sans-serif", "serif", "monospace", a family name, or a path to a font file.
# Falls back to built-in block digits when nothing matches.
font_family = "sans-serif"

color = "#FFFFFF"

# Outline drawn under the number, width = font_size / 12.
stroke = false
stroke_color = "#000000"

# Soft shadow behind the number, blur = font_size / 10.
shadow = true
shadow_color = "#000000"

# bottom-center, bottom-left, bottom-right, center, top-left, top-right
position = "bottom-center"

# ---------------------------------------------------------------------------
# Global overlay
# ---------------------------------------------------------------------------
[overlay]
# Image stretched over each finished sheet. Relative to this file.
# image = "overlay.png"

opacity = 1.0

# normal (source-over), multiply, screen, overlay, darken, lighten,
# color-dodge, color-burn, hard-light, soft-light, difference, exclusion
blend_mode = "normal"

# ---------------------------------------------------------------------------
# Masking
# ---------------------------------------------------------------------------
[mask]
# Numbers to mask, e.g. "1-3, 7". Separators: comma, 、, whitespace.
indices = ""

# line: draw a cross or slash. image: paste a sticker.
mode = "line"

# cross or slash
line_style = "cross"
color = "#FF3B30"

# Line width; scaled with the cell width.
width = 10.0

# Sticker image for image mode. Relative to this file.
# sticker = "sticker.png"

# Sticker width as % of the cell width, and its center as % of the cell.
sticker_size = 50.0
sticker_x = 50.0
sticker_y = 50.0

# ---------------------------------------------------------------------------
# Export
# ---------------------------------------------------------------------------
[export]
# 1.0 exports lossless PNG; anything lower exports JPEG at that quality.
quality = 0.8

# ---------------------------------------------------------------------------
# Device limits
# ---------------------------------------------------------------------------
[device]
# desktop (50,000,000 px combine budget) or mobile (16,777,216 px).
class = "desktop"

# Override the combine pixel budget.
# max_combine_pixels = 50000000

# Combining more source images than this is refused; use the archive instead.
max_combine_images = 100

# Largest raster the renderer will allocate for one sheet.
max_surface_pixels = 500000000

# ---------------------------------------------------------------------------
# Pacing
# ---------------------------------------------------------------------------
[pacing]
# Yield after this many cells within a sheet.
yield_every = 30

# Pause at each in-sheet yield, in milliseconds.
cell_pause_ms = 10

# Pause after each finished sheet, in milliseconds.
sheet_pause_ms = 200
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_matches_stock_values() {
        let config = CollageConfig::default();
        assert_eq!(config.layout.cols, 3);
        assert_eq!(config.layout.rows_per_group, 3);
        assert_eq!(config.layout.aspect_ratio, 0.75);
        assert!(config.numbering.enabled);
        assert_eq!(config.numbering.font_size, 350.0);
        assert!(!config.numbering.stroke);
        assert!(config.numbering.shadow);
        assert_eq!(config.export.quality.value(), 0.8);
        assert_eq!(config.mask.color, Color::rgb(0xFF, 0x3B, 0x30));
    }

    #[test]
    fn parse_partial_config() {
        let config: CollageConfig = toml::from_str(
            r##"
[layout]
cols = 5

[numbering]
color = "#ff0000"
position = "top-left"
"##,
        )
        .unwrap();
        assert_eq!(config.layout.cols, 5);
        assert_eq!(config.layout.rows_per_group, 3);
        assert_eq!(config.numbering.color, Color::rgb(255, 0, 0));
        assert_eq!(config.numbering.position, Anchor::TopLeft);
    }

    #[test]
    fn blend_mode_accepts_canvas_name() {
        let config: CollageConfig = toml::from_str(
            r#"
[overlay]
blend_mode = "source-over"
"#,
        )
        .unwrap();
        assert_eq!(config.overlay.blend_mode, BlendMode::Normal);
    }

    // =========================================================================
    // load_config
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join("gridsheet.toml")).unwrap();
        assert_eq!(config, CollageConfig::default());
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("gridsheet.toml");
        fs::write(
            &path,
            r#"
[mask]
indices = "1-3"
mode = "image"

[export]
quality = 1.0
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.mask.indices, "1-3");
        assert_eq!(config.mask.mode, MaskMode::Image);
        assert!(config.export.quality.is_lossless());
        // Unspecified values should be defaults
        assert_eq!(config.mask.line_style, LineStyle::Cross);
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("gridsheet.toml");
        fs::write(&path, "this is not valid toml [[[").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn unknown_key_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("gridsheet.toml");
        fs::write(&path, "[layout]\ncolumns = 4\n").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn unknown_section_rejected() {
        let result: Result<CollageConfig, _> = toml::from_str("[grid]\ncols = 2\n");
        assert!(result.is_err());
    }

    #[test]
    fn bad_color_rejected() {
        let result: Result<CollageConfig, _> = toml::from_str("[numbering]\ncolor = \"#12\"\n");
        assert!(result.is_err());
    }

    // =========================================================================
    // merge_toml
    // =========================================================================

    #[test]
    fn merge_toml_table_merge() {
        let base: toml::Value = toml::from_str("[a]\nx = 1\ny = 2\n").unwrap();
        let overlay: toml::Value = toml::from_str("[a]\ny = 3\n").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["a"]["x"].as_integer(), Some(1));
        assert_eq!(merged["a"]["y"].as_integer(), Some(3));
    }

    #[test]
    fn merge_toml_scalar_override() {
        let merged = merge_toml(toml::Value::Integer(1), toml::Value::Integer(2));
        assert_eq!(merged.as_integer(), Some(2));
    }

    // =========================================================================
    // validation
    // =========================================================================

    fn overlay_result(text: &str) -> Result<CollageConfig, ConfigError> {
        resolve_config(stock_defaults_value(), Some(toml::from_str(text).unwrap()))
    }

    #[test]
    fn validate_default_config_passes() {
        assert!(CollageConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_zero_columns() {
        assert!(matches!(
            overlay_result("[layout]\ncols = 0\n"),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn validate_quality_bounds() {
        assert!(overlay_result("[export]\nquality = 1.0\n").is_ok());
        assert!(matches!(
            overlay_result("[export]\nquality = 1.5\n"),
            Err(ConfigError::Validation(_))
        ));
        assert!(matches!(
            overlay_result("[export]\nquality = 0.0\n"),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn validate_opacity_range() {
        assert!(matches!(
            overlay_result("[overlay]\nopacity = 1.2\n"),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn validate_custom_ratio() {
        assert!(overlay_result("[layout]\naspect_ratio = 0.0\n").is_ok());
        assert!(matches!(
            overlay_result("[layout]\naspect_ratio = 0.0\ncustom_height = 0\n"),
            Err(ConfigError::Validation(_))
        ));
        assert!(matches!(
            overlay_result("[layout]\naspect_ratio = -1.0\n"),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn validate_gap_leaving_no_cell_width() {
        assert!(matches!(
            overlay_result("[layout]\ncols = 8\ngap = 1100\n"),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn validate_pacing_and_sticker() {
        assert!(overlay_result("[pacing]\nyield_every = 0\n").is_err());
        assert!(overlay_result("[mask]\nsticker_size = 0.0\n").is_err());
    }

    #[test]
    fn device_budget_override() {
        let mut device = DeviceConfig::default();
        assert_eq!(device.combine_pixel_budget(), 50_000_000);
        device.class = DeviceClass::Mobile;
        assert_eq!(device.combine_pixel_budget(), 16_777_216);
        device.max_combine_pixels = Some(1000);
        assert_eq!(device.combine_pixel_budget(), 1000);
    }

    // =========================================================================
    // stock config
    // =========================================================================

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let config: CollageConfig = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(config, CollageConfig::default());
    }

    #[test]
    fn stock_config_toml_contains_all_sections() {
        let content = stock_config_toml();
        for section in [
            "[layout]",
            "[numbering]",
            "[overlay]",
            "[mask]",
            "[export]",
            "[device]",
            "[pacing]",
        ] {
            assert!(content.contains(section), "missing {section}");
        }
    }

    #[test]
    fn stock_defaults_value_has_all_sections() {
        let val = stock_defaults_value();
        assert!(val.is_table());
        for key in ["layout", "numbering", "overlay", "mask", "export", "device", "pacing"] {
            assert!(val.get(key).is_some(), "missing {key}");
        }
    }
}
