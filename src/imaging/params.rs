//! Value types shared by the renderer and the config layer.
//!
//! These describe *what* to draw, not *how*. Everything here is `Copy` and
//! serializes to the same spelling the config file uses.
//!
//! ## Types
//!
//! - [`ExportQuality`]: Encoding quality in (0, 1]. `1.0` selects lossless PNG.
//! - [`OutputFormat`]: PNG or JPEG, derived from the quality.
//! - [`Color`]: sRGB color with alpha, parsed from CSS hex or a small set of names.
//! - [`Anchor`]: Where the cell number sits inside a cell.
//! - [`BlendMode`]: Compositing operator for the global overlay.
//! - [`MaskMode`] / [`LineStyle`]: How targeted cells are masked.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Encoding quality in (0, 1].
///
/// `1.0` means lossless (PNG); anything lower is JPEG at `round(q * 100)`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExportQuality(pub f32);

impl ExportQuality {
    pub const LOSSLESS: Self = Self(1.0);

    /// Clamp into (0, 1]. Non-finite input falls back to the default.
    pub fn new(value: f32) -> Self {
        if !value.is_finite() {
            return Self::default();
        }
        Self(value.clamp(0.01, 1.0))
    }

    pub fn value(self) -> f32 {
        self.0
    }

    pub fn is_lossless(self) -> bool {
        self.0 >= 1.0
    }

    pub fn format(self) -> OutputFormat {
        if self.is_lossless() {
            OutputFormat::Png
        } else {
            OutputFormat::Jpeg {
                quality: self.jpeg_quality(),
            }
        }
    }

    /// JPEG quality on the encoder's 1–100 scale.
    pub fn jpeg_quality(self) -> u8 {
        (self.0 * 100.0).round().clamp(1.0, 100.0) as u8
    }
}

impl Default for ExportQuality {
    fn default() -> Self {
        Self(0.8)
    }
}

/// Output encoding chosen from an [`ExportQuality`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Png,
    Jpeg { quality: u8 },
}

impl OutputFormat {
    /// File extension used for sheets, archive entries and combined exports.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg { .. } => "jpg",
        }
    }

    pub fn is_lossless(self) -> bool {
        matches!(self, OutputFormat::Png)
    }
}

/// An sRGB color with straight (non-premultiplied) alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Self = Self::rgb(255, 255, 255);
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    pub const TRANSPARENT: Self = Self {
        r: 0,
        g: 0,
        b: 0,
        a: 0,
    };

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Parse `#rgb`, `#rgba`, `#rrggbb`, `#rrggbbaa` or a basic color name.
    pub fn parse(input: &str) -> Option<Self> {
        let s = input.trim();
        if let Some(hex) = s.strip_prefix('#') {
            return Self::parse_hex(hex);
        }
        match s.to_ascii_lowercase().as_str() {
            "white" => Some(Self::WHITE),
            "black" => Some(Self::BLACK),
            "red" => Some(Self::rgb(255, 0, 0)),
            "green" => Some(Self::rgb(0, 128, 0)),
            "blue" => Some(Self::rgb(0, 0, 255)),
            "yellow" => Some(Self::rgb(255, 255, 0)),
            "gray" | "grey" => Some(Self::rgb(128, 128, 128)),
            "transparent" => Some(Self::TRANSPARENT),
            _ => None,
        }
    }

    fn parse_hex(hex: &str) -> Option<Self> {
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|v| v * 17);
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        match hex.len() {
            3 => Some(Self::rgb(nibble(0)?, nibble(1)?, nibble(2)?)),
            4 => Some(Self {
                r: nibble(0)?,
                g: nibble(1)?,
                b: nibble(2)?,
                a: nibble(3)?,
            }),
            6 => Some(Self::rgb(byte(0)?, byte(2)?, byte(4)?)),
            8 => Some(Self {
                r: byte(0)?,
                g: byte(2)?,
                b: byte(4)?,
                a: byte(6)?,
            }),
            _ => None,
        }
    }

    pub fn is_transparent(self) -> bool {
        self.a == 0
    }

    pub fn to_rgba(self) -> image::Rgba<u8> {
        image::Rgba([self.r, self.g, self.b, self.a])
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a == 255 {
            write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
        } else {
            write!(f, "#{:02X}{:02X}{:02X}{:02X}", self.r, self.g, self.b, self.a)
        }
    }
}

impl TryFrom<String> for Color {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("invalid color '{value}'"))
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

/// Anchor of the cell number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Anchor {
    #[default]
    BottomCenter,
    BottomLeft,
    BottomRight,
    Center,
    TopLeft,
    TopRight,
}

/// Horizontal text alignment relative to the anchor x coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

/// Compositing operator for the global overlay.
///
/// The separable modes of W3C Compositing and Blending. `source-over` is accepted
/// as an alias of `normal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlendMode {
    #[default]
    #[serde(alias = "source-over")]
    Normal,
    Multiply,
    Screen,
    Overlay,
    Darken,
    Lighten,
    ColorDodge,
    ColorBurn,
    HardLight,
    SoftLight,
    Difference,
    Exclusion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MaskMode {
    #[default]
    Line,
    Image,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LineStyle {
    #[default]
    Cross,
    Slash,
}
