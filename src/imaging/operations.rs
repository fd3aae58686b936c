//! High-level drawing operations on the sheet surface.
//!
//! These functions combine the pure [`calculations`](super::calculations)
//! with pixel work. None of them allocate the surface or talk to a backend.

use super::blend::{composite_image, composite_image_clipped, paint_coverage};
use super::calculations::{CellRect, Segment, StickerRect, plan_cover_fit};
use super::params::{BlendMode, Color, TextAlign};
use super::text::TextMask;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage, RgbaImage};
use imageproc::distance_transform::Norm;
use imageproc::drawing::{draw_filled_circle_mut, draw_polygon_mut};
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::dilate;
use imageproc::point::Point;

/// Resampling filter for cells, stickers and the overlay.
const FILTER: FilterType = FilterType::Triangle;

/// Error placeholder colors.
const PLACEHOLDER_FILL: Color = Color::rgb(0xf9, 0xf9, 0xf9);
const PLACEHOLDER_GLYPH: Color = Color::rgb(0xff, 0x3b, 0x30);

/// Fill a rectangle with an opaque color.
pub fn fill_rect(canvas: &mut RgbImage, rect: CellRect, color: Color) {
    let px = Rgb([color.r, color.g, color.b]);
    let x1 = (rect.x + rect.width).min(canvas.width());
    let y1 = (rect.y + rect.height).min(canvas.height());
    for y in rect.y..y1 {
        for x in rect.x..x1 {
            canvas.put_pixel(x, y, px);
        }
    }
}

/// Draw `img` covering `rect`: uniform scale, center crop, clipped to the cell.
pub fn draw_cover_fit(canvas: &mut RgbImage, img: &DynamicImage, rect: CellRect) {
    if img.width() == 0 || img.height() == 0 {
        return;
    }
    let fit = plan_cover_fit((img.width(), img.height()), (rect.width, rect.height));
    let cropped = img
        .crop_imm(fit.origin.0, fit.origin.1, fit.size.0, fit.size.1)
        .resize_exact(rect.width, rect.height, FILTER)
        .to_rgba8();

    let clip = (
        rect.x as i64,
        rect.y as i64,
        rect.width as i64,
        rect.height as i64,
    );
    composite_image_clipped(
        canvas,
        &cropped,
        rect.x as i64,
        rect.y as i64,
        clip,
        BlendMode::Normal,
        1.0,
    );
}

/// Stroke segments with round caps.
///
/// All segments go into one coverage mask, so crossing strokes do not
/// double up where they overlap.
pub fn stroke_segments(canvas: &mut RgbImage, segments: &[Segment], width: f32, color: Color) {
    if segments.is_empty() || width <= 0.0 {
        return;
    }
    let r = width / 2.0;
    let min_x = segments.iter().flat_map(|s| [s.0.0, s.1.0]).fold(f32::MAX, f32::min) - r;
    let min_y = segments.iter().flat_map(|s| [s.0.1, s.1.1]).fold(f32::MAX, f32::min) - r;
    let max_x = segments.iter().flat_map(|s| [s.0.0, s.1.0]).fold(f32::MIN, f32::max) + r;
    let max_y = segments.iter().flat_map(|s| [s.0.1, s.1.1]).fold(f32::MIN, f32::max) + r;

    let ox = min_x.floor() as i64;
    let oy = min_y.floor() as i64;
    let mut mask = GrayImage::new(
        (max_x.ceil() as i64 - ox + 1) as u32,
        (max_y.ceil() as i64 - oy + 1) as u32,
    );
    let local = |p: (f32, f32)| (p.0 - ox as f32, p.1 - oy as f32);

    for &(a, b) in segments {
        let (a, b) = (local(a), local(b));
        let (dx, dy) = (b.0 - a.0, b.1 - a.1);
        let len = (dx * dx + dy * dy).sqrt();
        if len >= 1.0 {
            let (nx, ny) = (-dy / len * r, dx / len * r);
            let corner = |p: (f32, f32), s: f32| {
                Point::new((p.0 + s * nx).round() as i32, (p.1 + s * ny).round() as i32)
            };
            let quad = [corner(a, 1.0), corner(b, 1.0), corner(b, -1.0), corner(a, -1.0)];
            if quad[0] != quad[3] {
                draw_polygon_mut(&mut mask, &quad, Luma([255u8]));
            }
        }
        for p in [a, b] {
            draw_filled_circle_mut(
                &mut mask,
                (p.0.round() as i32, p.1.round() as i32),
                r.round() as i32,
                Luma([255u8]),
            );
        }
    }

    paint_coverage(canvas, &mask, ox, oy, color);
}

/// Draw a sticker at its (possibly out-of-cell) destination rectangle.
pub fn draw_sticker(canvas: &mut RgbImage, sticker: &RgbaImage, dest: StickerRect) {
    let w = dest.width.round() as u32;
    let h = dest.height.round() as u32;
    if w == 0 || h == 0 {
        return;
    }
    let scaled = imageops::resize(sticker, w, h, FILTER);
    composite_image(
        canvas,
        &scaled,
        dest.x.round() as i64,
        dest.y.round() as i64,
        BlendMode::Normal,
        1.0,
    );
}

/// Stretch `overlay` over the whole canvas and composite it.
pub fn draw_overlay(canvas: &mut RgbImage, overlay: &RgbaImage, mode: BlendMode, opacity: f32) {
    if opacity <= 0.0 {
        return;
    }
    let (w, h) = canvas.dimensions();
    let stretched = if overlay.dimensions() == (w, h) {
        overlay.clone()
    } else {
        imageops::resize(overlay, w, h, FILTER)
    };
    composite_image(canvas, &stretched, 0, 0, mode, opacity.min(1.0));
}

/// Flat fill plus a centered red cross, in place of an undecodable image.
pub fn draw_error_placeholder(canvas: &mut RgbImage, rect: CellRect) {
    fill_rect(canvas, rect, PLACEHOLDER_FILL);

    let size = (rect.width as f32 / 10.0).max(4.0);
    let cx = rect.x as f32 + rect.width as f32 / 2.0;
    let cy = rect.y as f32 + rect.height as f32 / 2.0;
    let half = size / 2.0;
    let segments = [
        ((cx - half, cy - half), (cx + half, cy + half)),
        ((cx + half, cy - half), (cx - half, cy + half)),
    ];
    stroke_segments(canvas, &segments, size / 6.0, PLACEHOLDER_GLYPH);
}

/// Styling for one number draw.
#[derive(Debug, Clone, Copy)]
pub struct TextStyle {
    pub fill: Color,
    /// Stroke color and total line width.
    pub stroke: Option<(Color, f32)>,
    /// Shadow color and blur radius (no offset).
    pub shadow: Option<(Color, f32)>,
}

impl TextStyle {
    /// Empty border a mask needs so stroke and shadow are not cut off.
    pub fn padding(&self) -> u32 {
        let stroke = self.stroke.map(|(_, w)| (w / 2.0).ceil()).unwrap_or(0.0);
        let shadow = self.shadow.map(|(_, b)| (b * 1.5).ceil()).unwrap_or(0.0);
        (stroke + shadow) as u32 + 2
    }
}

/// Paint a rasterized number: stroke first, then shadow, then fill.
///
/// The shadow only belongs to the fill; the stroke never casts one.
pub fn draw_text(
    canvas: &mut RgbImage,
    text: &TextMask,
    x: f32,
    baseline: f32,
    align: TextAlign,
    style: &TextStyle,
) {
    let (ox, oy) = text.origin(x, baseline, align);

    if let Some((color, width)) = style.stroke {
        let radius = (width / 2.0).round().clamp(1.0, 255.0) as u8;
        let stroke = dilate(&text.coverage, Norm::L2, radius);
        paint_coverage(canvas, &stroke, ox, oy, color);
    }

    if let Some((color, blur)) = style.shadow {
        // Canvas shadowBlur is twice the Gaussian sigma
        let sigma = blur / 2.0;
        if sigma > 0.0 {
            let shadow = gaussian_blur_f32(&text.coverage, sigma);
            paint_coverage(canvas, &shadow, ox, oy, color);
        }
    }

    paint_coverage(canvas, &text.coverage, ox, oy, style.fill);
}
