//! Pure geometry for a single cell.
//!
//! All functions here are pure and testable without any I/O or images.
//! Coordinates are sheet pixels with the origin at the top-left corner.

use super::params::{Anchor, LineStyle, TextAlign};

/// A cell rectangle on the sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// How to crop one source image so it scales exactly onto a cell.
///
/// The window is in source pixels; only the visible part is resampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoverFit {
    /// Top-left of the crop window in the source.
    pub origin: (u32, u32),
    /// Size of the crop window in the source; never larger than the source.
    pub size: (u32, u32),
}

/// Plan a cover-fit: uniform scale to cover `target`, center-cropping the
/// overflow axis.
///
/// The scale is `max(tw / sw, th / sh)`; the window is the target size
/// divided by that scale, centered in the source.
pub fn plan_cover_fit(source: (u32, u32), target: (u32, u32)) -> CoverFit {
    let (src_w, src_h) = (source.0.max(1), source.1.max(1));
    let scale = (target.0 as f64 / src_w as f64).max(target.1 as f64 / src_h as f64);
    let window = |tgt: u32, src: u32| ((tgt as f64 / scale).round() as u32).clamp(1, src);
    let size = (window(target.0, src_w), window(target.1, src_h));
    CoverFit {
        origin: ((src_w - size.0) / 2, (src_h - size.1) / 2),
        size,
    }
}

/// Baseline position and alignment for a cell number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextPlacement {
    pub x: f32,
    /// Alphabetic baseline.
    pub baseline: f32,
    pub align: TextAlign,
}

/// Horizontal inset for left/right anchored numbers.
pub const NUMBER_INSET: f32 = 20.0;

/// Place the number text inside a cell.
///
/// Bottom anchors sit at `h - size/2`, top anchors at `size + 20`, center at
/// `h/2 + size/3`, all measured from the cell top.
pub fn place_number(rect: CellRect, anchor: Anchor, font_size: f32) -> TextPlacement {
    let (x, y) = (rect.x as f32, rect.y as f32);
    let (w, h) = (rect.width as f32, rect.height as f32);

    let baseline = match anchor {
        Anchor::Center => y + h / 2.0 + font_size / 3.0,
        Anchor::TopLeft | Anchor::TopRight => y + font_size + NUMBER_INSET,
        Anchor::BottomCenter | Anchor::BottomLeft | Anchor::BottomRight => {
            y + h - font_size / 2.0
        }
    };

    let (x, align) = match anchor {
        Anchor::TopLeft | Anchor::BottomLeft => (x + NUMBER_INSET, TextAlign::Left),
        Anchor::TopRight | Anchor::BottomRight => (x + w - NUMBER_INSET, TextAlign::Right),
        Anchor::Center | Anchor::BottomCenter => (x + w / 2.0, TextAlign::Center),
    };

    TextPlacement { x, baseline, align }
}

/// A straight segment in sheet coordinates.
pub type Segment = ((f32, f32), (f32, f32));

/// Mask strokes for a cell: a full cross (both diagonals) or one slash.
///
/// Endpoints sit at the 20% / 80% points of the cell.
pub fn mask_segments(rect: CellRect, style: LineStyle) -> Vec<Segment> {
    let (x, y) = (rect.x as f32, rect.y as f32);
    let (w, h) = (rect.width as f32, rect.height as f32);
    let at = |fx: f32, fy: f32| (x + w * fx, y + h * fy);

    match style {
        LineStyle::Cross => vec![(at(0.2, 0.2), at(0.8, 0.8)), (at(0.8, 0.2), at(0.2, 0.8))],
        LineStyle::Slash => vec![(at(0.2, 0.8), at(0.8, 0.2))],
    }
}

/// Stroke width for mask lines, scaled from a 500px reference cell.
pub fn mask_stroke_width(line_width: f32, cell_width: u32) -> f32 {
    line_width * (cell_width as f32 / 500.0) * 5.0
}

/// Destination rectangle of a sticker, possibly extending past the cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StickerRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Place a sticker centered at `(x + w*pos_x%, y + h*pos_y%)`.
///
/// Width is `w * size%`; height keeps the sticker's native aspect ratio.
pub fn place_sticker(
    rect: CellRect,
    sticker: (u32, u32),
    size_pct: f32,
    pos_x_pct: f32,
    pos_y_pct: f32,
) -> StickerRect {
    let (w, h) = (rect.width as f32, rect.height as f32);
    let width = w * size_pct / 100.0;
    let height = width * (sticker.1 as f32 / sticker.0.max(1) as f32);
    StickerRect {
        x: rect.x as f32 + w * pos_x_pct / 100.0 - width / 2.0,
        y: rect.y as f32 + h * pos_y_pct / 100.0 - height / 2.0,
        width,
        height,
    }
}
