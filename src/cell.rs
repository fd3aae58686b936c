//! Cell rendering.
//!
//! One cell is drawn in three layers, each optional after the first:
//!
//! 1. the source image, cover-fit and clipped to the cell (or the error
//!    placeholder when it cannot be decoded);
//! 2. the cell's global number;
//! 3. the mask (cross/slash lines or a sticker) when the cell is a target.
//!
//! Number and mask are independent: a masked cell still shows its number
//! underneath the mask.

use crate::config::{MaskConfig, NumberingConfig};
use crate::imaging::calculations::{mask_segments, mask_stroke_width, place_number, place_sticker};
use crate::imaging::operations::{
    TextStyle, draw_cover_fit, draw_error_placeholder, draw_sticker, draw_text, stroke_segments,
};
use crate::imaging::text::rasterize;
use crate::imaging::{Anchor, Color, ImageBackend, LineStyle, MaskMode, TextFace};
use crate::layout::CellPlan;
use image::{RgbImage, RgbaImage};

/// Number label settings resolved for a run.
#[derive(Debug)]
pub struct NumberStyle {
    pub face: TextFace,
    pub font_size: f32,
    pub anchor: Anchor,
    pub text: TextStyle,
}

impl NumberStyle {
    /// Stroke width is `font_size / 12`, shadow blur `font_size / 10`.
    pub fn from_config(config: &NumberingConfig, face: TextFace) -> Self {
        let fs = config.font_size;
        Self {
            face,
            font_size: fs,
            anchor: config.position,
            text: TextStyle {
                fill: config.color,
                stroke: config.stroke.then_some((config.stroke_color, fs / 12.0)),
                shadow: config.shadow.then_some((config.shadow_color, fs / 10.0)),
            },
        }
    }
}

/// How target cells are overdrawn.
#[derive(Debug)]
pub enum MaskStyle {
    Line {
        style: LineStyle,
        color: Color,
        width: f32,
    },
    Sticker {
        image: RgbaImage,
        size_pct: f32,
        x_pct: f32,
        y_pct: f32,
    },
}

impl MaskStyle {
    /// `None` when image mode has no sticker to draw.
    pub fn from_config(config: &MaskConfig, sticker: Option<RgbaImage>) -> Option<Self> {
        match config.mode {
            MaskMode::Line => Some(MaskStyle::Line {
                style: config.line_style,
                color: config.color,
                width: config.width,
            }),
            MaskMode::Image => sticker.map(|image| MaskStyle::Sticker {
                image,
                size_pct: config.sticker_size,
                x_pct: config.sticker_x,
                y_pct: config.sticker_y,
            }),
        }
    }
}

/// What ended up in the image layer of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellOutcome {
    Drawn,
    Placeholder,
}

/// Draws cells onto a sheet surface.
#[derive(Debug, Default)]
pub struct CellRenderer {
    pub numbering: Option<NumberStyle>,
    pub mask: Option<MaskStyle>,
}

impl CellRenderer {
    pub fn new(numbering: Option<NumberStyle>, mask: Option<MaskStyle>) -> Self {
        Self { numbering, mask }
    }

    /// Draw one cell. A payload that fails to decode becomes a placeholder;
    /// this never fails.
    pub fn render(
        &self,
        canvas: &mut RgbImage,
        backend: &impl ImageBackend,
        payload: &[u8],
        cell: &CellPlan,
    ) -> CellOutcome {
        let outcome = match backend.decode(payload) {
            Ok(img) => {
                draw_cover_fit(canvas, &img, cell.rect);
                drop(img);
                CellOutcome::Drawn
            }
            Err(e) => {
                tracing::warn!(index = cell.global_index, "cannot decode image: {e}");
                draw_error_placeholder(canvas, cell.rect);
                CellOutcome::Placeholder
            }
        };

        if let Some(number) = &self.numbering {
            self.draw_number(canvas, number, cell);
        }
        if let Some(mask) = self.mask.as_ref().filter(|_| cell.masked) {
            self.draw_mask(canvas, mask, cell);
        }
        outcome
    }

    fn draw_number(&self, canvas: &mut RgbImage, number: &NumberStyle, cell: &CellPlan) {
        let placement = place_number(cell.rect, number.anchor, number.font_size);
        let glyphs = rasterize(
            &number.face,
            &cell.global_index.to_string(),
            number.font_size,
            number.text.padding(),
        );
        draw_text(
            canvas,
            &glyphs,
            placement.x,
            placement.baseline,
            placement.align,
            &number.text,
        );
    }

    fn draw_mask(&self, canvas: &mut RgbImage, mask: &MaskStyle, cell: &CellPlan) {
        match mask {
            MaskStyle::Line {
                style,
                color,
                width,
            } => {
                let segments = mask_segments(cell.rect, *style);
                let stroke = mask_stroke_width(*width, cell.rect.width);
                stroke_segments(canvas, &segments, stroke, *color);
            }
            MaskStyle::Sticker {
                image,
                size_pct,
                x_pct,
                y_pct,
            } => {
                let dest = place_sticker(cell.rect, image.dimensions(), *size_pct, *x_pct, *y_pct);
                draw_sticker(canvas, image, dest);
            }
        }
    }
}
