//! Compositing onto the opaque sheet surface.
//!
//! The surface has no alpha channel, so every operation here is "source over
//! an opaque backdrop": `out = (1 - αs) * Cb + αs * B(Cb, Cs)` with `B` the
//! blend function from W3C Compositing and Blending Level 1.

use super::params::{BlendMode, Color};
use image::{GrayImage, Rgb, RgbImage, RgbaImage};

/// Separable blend of one channel, values in [0, 1].
fn blend_channel(mode: BlendMode, cb: f32, cs: f32) -> f32 {
    match mode {
        BlendMode::Normal => cs,
        BlendMode::Multiply => cb * cs,
        BlendMode::Screen => cb + cs - cb * cs,
        BlendMode::Overlay => blend_channel(BlendMode::HardLight, cs, cb),
        BlendMode::Darken => cb.min(cs),
        BlendMode::Lighten => cb.max(cs),
        BlendMode::ColorDodge => {
            if cb == 0.0 {
                0.0
            } else if cs >= 1.0 {
                1.0
            } else {
                (cb / (1.0 - cs)).min(1.0)
            }
        }
        BlendMode::ColorBurn => {
            if cb >= 1.0 {
                1.0
            } else if cs <= 0.0 {
                0.0
            } else {
                1.0 - ((1.0 - cb) / cs).min(1.0)
            }
        }
        BlendMode::HardLight => {
            if cs <= 0.5 {
                cb * 2.0 * cs
            } else {
                let s = 2.0 * cs - 1.0;
                cb + s - cb * s
            }
        }
        BlendMode::SoftLight => {
            if cs <= 0.5 {
                cb - (1.0 - 2.0 * cs) * cb * (1.0 - cb)
            } else {
                let d = if cb <= 0.25 {
                    ((16.0 * cb - 12.0) * cb + 4.0) * cb
                } else {
                    cb.sqrt()
                };
                cb + (2.0 * cs - 1.0) * (d - cb)
            }
        }
        BlendMode::Difference => (cb - cs).abs(),
        BlendMode::Exclusion => cb + cs - 2.0 * cb * cs,
    }
}

/// Composite one source pixel onto a backdrop pixel.
///
/// `alpha` is the effective source alpha in [0, 1] (pixel alpha × opacity × coverage).
#[inline]
pub fn composite_pixel(backdrop: &mut Rgb<u8>, source: [u8; 3], alpha: f32, mode: BlendMode) {
    if alpha <= 0.0 {
        return;
    }
    let alpha = alpha.min(1.0);
    for (cb_u8, cs_u8) in backdrop.0.iter_mut().zip(source) {
        let cb = *cb_u8 as f32 / 255.0;
        let cs = cs_u8 as f32 / 255.0;
        let mixed = (1.0 - alpha) * cb + alpha * blend_channel(mode, cb, cs);
        *cb_u8 = (mixed * 255.0).round().clamp(0.0, 255.0) as u8;
    }
}

/// Draw `top` onto `canvas` at `(x, y)`, clipped to `clip` (x, y, w, h).
///
/// Pixels of `top` outside the clip rectangle or the canvas are ignored.
pub fn composite_image_clipped(
    canvas: &mut RgbImage,
    top: &RgbaImage,
    x: i64,
    y: i64,
    clip: (i64, i64, i64, i64),
    mode: BlendMode,
    opacity: f32,
) {
    let (cw, ch) = (canvas.width() as i64, canvas.height() as i64);
    let x0 = x.max(clip.0).max(0);
    let y0 = y.max(clip.1).max(0);
    let x1 = (x + top.width() as i64).min(clip.0 + clip.2).min(cw);
    let y1 = (y + top.height() as i64).min(clip.1 + clip.3).min(ch);

    for dy in y0..y1 {
        for dx in x0..x1 {
            let src = top.get_pixel((dx - x) as u32, (dy - y) as u32);
            let alpha = src.0[3] as f32 / 255.0 * opacity;
            let dst = canvas.get_pixel_mut(dx as u32, dy as u32);
            composite_pixel(dst, [src.0[0], src.0[1], src.0[2]], alpha, mode);
        }
    }
}

/// Draw `top` onto `canvas` at `(x, y)`, clipped only by the canvas.
pub fn composite_image(
    canvas: &mut RgbImage,
    top: &RgbaImage,
    x: i64,
    y: i64,
    mode: BlendMode,
    opacity: f32,
) {
    let clip = (0, 0, canvas.width() as i64, canvas.height() as i64);
    composite_image_clipped(canvas, top, x, y, clip, mode, opacity);
}

/// Paint a solid color through a coverage mask placed at `(x, y)`.
pub fn paint_coverage(canvas: &mut RgbImage, mask: &GrayImage, x: i64, y: i64, color: Color) {
    if color.is_transparent() {
        return;
    }
    let (cw, ch) = (canvas.width() as i64, canvas.height() as i64);
    let x0 = x.max(0);
    let y0 = y.max(0);
    let x1 = (x + mask.width() as i64).min(cw);
    let y1 = (y + mask.height() as i64).min(ch);
    let color_alpha = color.a as f32 / 255.0;

    for dy in y0..y1 {
        for dx in x0..x1 {
            let coverage = mask.get_pixel((dx - x) as u32, (dy - y) as u32).0[0];
            if coverage == 0 {
                continue;
            }
            let alpha = coverage as f32 / 255.0 * color_alpha;
            let dst = canvas.get_pixel_mut(dx as u32, dy as u32);
            composite_pixel(dst, [color.r, color.g, color.b], alpha, BlendMode::Normal);
        }
    }
}
