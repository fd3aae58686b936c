//! Raster work for sheets: decoding, drawing, compositing, encoding.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode / encode** | `image` codecs behind [`ImageBackend`] |
//! | **Cover-fit** | `crop_imm` in source space, then `resize_exact` |
//! | **Mask lines** | `imageproc::drawing::draw_polygon_mut` + round caps |
//! | **Numbers** | `ab_glyph` via `imageproc::drawing::draw_text_mut` |
//! | **Stroke / shadow** | `imageproc::morphology::dilate`, `gaussian_blur_f32` |
//! | **Overlay** | separable blend modes in [`blend`] |
//!
//! The module is split into:
//! - **Calculations**: Pure geometry for cells (unit testable)
//! - **Parameters**: Colors, anchors, blend modes, export quality
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: Drawing functions combining calculations + pixels

pub mod backend;
pub mod blend;
pub mod calculations;
pub mod operations;
pub mod params;
pub mod rust_backend;
pub mod text;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::CellRect;
pub use params::{
    Anchor, BlendMode, Color, ExportQuality, LineStyle, MaskMode, OutputFormat, TextAlign,
};
pub use rust_backend::RustBackend;
pub use text::TextFace;
