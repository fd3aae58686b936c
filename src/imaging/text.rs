//! Number glyph rasterization.
//!
//! Text is rendered into a grayscale coverage mask first; stroke and shadow
//! are derived from that mask (dilation and Gaussian blur) and the three
//! layers are painted in order: stroke, shadow, fill.
//!
//! ## Faces
//!
//! `font_family` is resolved once per run:
//! - a path to a `.ttf` / `.otf` file is loaded directly;
//! - a family name is looked up in the usual system font directories,
//!   preferring bold variants;
//! - anything unresolved falls back to a built-in blocky digit face, so
//!   numbering never needs a font installed.

use ab_glyph::{Font, FontVec, PxScale, ScaleFont};
use image::{GrayImage, Luma};
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Generic family names mapped to file stems worth trying, best first.
const SANS_CANDIDATES: &[&str] = &[
    "DejaVuSans-Bold",
    "LiberationSans-Bold",
    "Arial Bold",
    "arialbd",
    "Helvetica-Bold",
    "NotoSans-Bold",
    "FreeSansBold",
    "Roboto-Bold",
    "DejaVuSans",
    "LiberationSans-Regular",
    "Arial",
];

const SERIF_CANDIDATES: &[&str] = &[
    "DejaVuSerif-Bold",
    "LiberationSerif-Bold",
    "timesbd",
    "Times New Roman Bold",
    "NotoSerif-Bold",
    "DejaVuSerif",
];

const MONO_CANDIDATES: &[&str] = &[
    "DejaVuSansMono-Bold",
    "LiberationMono-Bold",
    "courbd",
    "DejaVuSansMono",
];

fn font_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![
        PathBuf::from("/usr/share/fonts"),
        PathBuf::from("/usr/local/share/fonts"),
        PathBuf::from("/Library/Fonts"),
        PathBuf::from("/System/Library/Fonts"),
        PathBuf::from("C:\\Windows\\Fonts"),
    ];
    if let Some(home) = std::env::var_os("HOME") {
        let home = PathBuf::from(home);
        dirs.push(home.join(".fonts"));
        dirs.push(home.join(".local/share/fonts"));
        dirs.push(home.join("Library/Fonts"));
    }
    dirs
}

fn is_font_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("ttf") || e.eq_ignore_ascii_case("otf"))
}

/// Find a font file whose stem matches one of `stems` (case-insensitive).
fn find_font_file(stems: &[String]) -> Option<PathBuf> {
    let files: Vec<PathBuf> = font_dirs()
        .into_iter()
        .filter(|d| d.is_dir())
        .flat_map(|d| {
            WalkDir::new(d)
                .follow_links(true)
                .into_iter()
                .filter_map(|e| e.ok())
                .map(|e| e.into_path())
                .filter(|p| is_font_file(p))
                .collect::<Vec<_>>()
        })
        .collect();

    stems.iter().find_map(|stem| {
        files
            .iter()
            .find(|p| {
                p.file_stem()
                    .and_then(|s| s.to_str())
                    .is_some_and(|s| s.eq_ignore_ascii_case(stem))
            })
            .cloned()
    })
}

fn candidate_stems(family: &str) -> Vec<String> {
    let generic: &[&str] = match family.to_ascii_lowercase().as_str() {
        "" | "sans-serif" | "sans" | "system-ui" => SANS_CANDIDATES,
        "serif" => SERIF_CANDIDATES,
        "monospace" => MONO_CANDIDATES,
        _ => &[],
    };
    if !generic.is_empty() {
        return generic.iter().map(|s| s.to_string()).collect();
    }
    let compact: String = family.chars().filter(|c| !c.is_whitespace()).collect();
    vec![
        format!("{compact}-Bold"),
        format!("{family} Bold"),
        compact.clone(),
        family.to_string(),
    ]
}

/// A resolved text face.
pub enum TextFace {
    Outline(FontVec),
    /// Built-in 5×7 block digits.
    Blocks,
}

impl std::fmt::Debug for TextFace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TextFace::Outline(_) => f.write_str("TextFace::Outline"),
            TextFace::Blocks => f.write_str("TextFace::Blocks"),
        }
    }
}

impl TextFace {
    /// Resolve a CSS-like family name or a font file path.
    pub fn resolve(family: &str) -> Self {
        let family = family.trim();
        let as_path = Path::new(family);
        let file = if is_font_file(as_path) && as_path.is_file() {
            Some(as_path.to_path_buf())
        } else {
            find_font_file(&candidate_stems(family))
        };

        match file.as_deref().map(load_font_file) {
            Some(Ok(font)) => {
                tracing::debug!(family, file = ?file, "resolved number font");
                TextFace::Outline(font)
            }
            Some(Err(e)) => {
                tracing::warn!(family, "font unusable ({e}), using built-in digits");
                TextFace::Blocks
            }
            None => {
                tracing::warn!(family, "no font found, using built-in digits");
                TextFace::Blocks
            }
        }
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, ab_glyph::InvalidFont> {
        FontVec::try_from_vec(bytes).map(TextFace::Outline)
    }
}

fn load_font_file(path: &Path) -> Result<FontVec, String> {
    let bytes = std::fs::read(path).map_err(|e| e.to_string())?;
    FontVec::try_from_vec(bytes).map_err(|e| e.to_string())
}

/// A rasterized line of text.
#[derive(Debug, Clone)]
pub struct TextMask {
    /// Coverage, 0 = empty, 255 = fully inside a glyph.
    pub coverage: GrayImage,
    /// Empty border kept around the glyphs for stroke and shadow growth.
    pub pad: u32,
    /// Advance width of the text.
    pub advance: u32,
    /// Distance from the top of the glyph area (excluding `pad`) to the baseline.
    pub ascent: u32,
}

impl TextMask {
    /// Top-left of the mask on the sheet for a given anchor point and alignment.
    pub fn origin(&self, x: f32, baseline: f32, align: super::params::TextAlign) -> (i64, i64) {
        use super::params::TextAlign;
        let left = match align {
            TextAlign::Left => x,
            TextAlign::Center => x - self.advance as f32 / 2.0,
            TextAlign::Right => x - self.advance as f32,
        };
        (
            (left - self.pad as f32).round() as i64,
            (baseline - self.ascent as f32 - self.pad as f32).round() as i64,
        )
    }
}

/// Rasterize `text` at `size` pixels with `pad` pixels of empty border.
pub fn rasterize(face: &TextFace, text: &str, size: f32, pad: u32) -> TextMask {
    match face {
        TextFace::Outline(font) => rasterize_outline(font, text, size, pad),
        TextFace::Blocks => rasterize_blocks(text, size, pad),
    }
}

/// Scale at which the em square is `size` pixels, as a CSS `font-size` is.
///
/// `PxScale` measures ascent to descent, which is taller than the em for
/// most fonts.
fn em_scale(font: &FontVec, size: f32) -> PxScale {
    match font.units_per_em() {
        Some(upem) if upem > 0.0 => PxScale::from(size * font.height_unscaled() / upem),
        _ => PxScale::from(size),
    }
}

fn rasterize_outline(font: &FontVec, text: &str, size: f32, pad: u32) -> TextMask {
    let scale = em_scale(font, size);
    let scaled = font.as_scaled(scale);
    let ascent = scaled.ascent().ceil().max(0.0) as u32;
    let descent = (-scaled.descent()).ceil().max(0.0) as u32;
    let (advance, _) = text_size(scale, font, text);

    let mut coverage = GrayImage::new(advance + 2 * pad + 1, ascent + descent + 2 * pad + 1);
    draw_text_mut(
        &mut coverage,
        Luma([255u8]),
        pad as i32,
        pad as i32,
        scale,
        font,
        text,
    );

    TextMask {
        coverage,
        pad,
        advance,
        ascent,
    }
}

#[rustfmt::skip]
const DIGITS_5X7: [[u8; 7]; 10] = [
    [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
    [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
    [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
    [0b11110, 0b00001, 0b00001, 0b01110, 0b00001, 0b00001, 0b11110],
    [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
    [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
    [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
    [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
    [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
    [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
];

const MINUS_5X7: [u8; 7] = [0, 0, 0, 0b11111, 0, 0, 0];

fn block_rows(ch: char) -> Option<[u8; 7]> {
    match ch {
        '0'..='9' => Some(DIGITS_5X7[ch as usize - '0' as usize]),
        '-' => Some(MINUS_5X7),
        _ => None,
    }
}

/// Block digits sized so the 7-row glyph is ~70% of `size`, like a cap height.
fn rasterize_blocks(text: &str, size: f32, pad: u32) -> TextMask {
    let unit = (size / 10.0).round().max(1.0) as u32;
    let glyphs: Vec<[u8; 7]> = text.chars().filter_map(block_rows).collect();
    let advance = glyphs.len() as u32 * 6 * unit;
    let ascent = 7 * unit;

    let mut coverage = GrayImage::new(advance + 2 * pad + 1, ascent + 2 * pad + 1);
    for (i, rows) in glyphs.iter().enumerate() {
        let gx = pad + i as u32 * 6 * unit;
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..5u32 {
                if (bits >> (4 - col)) & 1 == 1 {
                    draw_filled_rect_mut(
                        &mut coverage,
                        Rect::at((gx + col * unit) as i32, (pad + row as u32 * unit) as i32)
                            .of_size(unit, unit),
                        Luma([255u8]),
                    );
                }
            }
        }
    }

    TextMask {
        coverage,
        pad,
        advance,
        ascent,
    }
}
