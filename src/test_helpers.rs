//! Shared test utilities for the gridsheet test suite.
//!
//! Builds synthetic payloads and small configs so tests never depend on
//! image files or installed fonts.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let config = small_config(3, 3);       // 12px cells, numbering off
//! let sources = mock_sources(20);        // decodable by MockBackend
//! let png = png_bytes(4, 4, [255, 0, 0]); // decodable by RustBackend
//! ```

use crate::config::{CollageConfig, LayoutConfig, NumberingConfig};
use crate::imaging::backend::tests::mock_payload;
use crate::source::SourceImage;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, Rgb, RgbImage};

// =========================================================================
// Encoded payloads
// =========================================================================

/// A solid-color PNG.
pub fn png_bytes(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb(rgb));
    let mut out = Vec::new();
    PngEncoder::new(&mut out)
        .write_image(img.as_raw(), width, height, ExtendedColorType::Rgb8)
        .unwrap();
    out
}

/// A gradient JPEG.
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 255 / width.max(1)) as u8, (y * 255 / height.max(1)) as u8, 128])
    });
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, 90)
        .write_image(img.as_raw(), width, height, ExtendedColorType::Rgb8)
        .unwrap();
    out
}

// =========================================================================
// Sources
// =========================================================================

/// `n` images the `MockBackend` can decode, named `img-001.jpg`…
pub fn mock_sources(n: usize) -> Vec<SourceImage> {
    (0..n)
        .map(|i| {
            let shade = (i * 37 % 256) as u8;
            SourceImage::new(
                format!("img-{:03}.jpg", i + 1),
                mock_payload(16, 12, [shade, 255 - shade, 64]),
                i as u64,
            )
        })
        .collect()
}

/// `n` solid PNGs for `RustBackend` runs.
pub fn png_sources(n: usize) -> Vec<SourceImage> {
    (0..n)
        .map(|i| {
            SourceImage::new(
                format!("img-{:03}.png", i + 1),
                png_bytes(8, 6, [(i * 50 % 256) as u8, 100, 200]),
                i as u64,
            )
        })
        .collect()
}

// =========================================================================
// Config
// =========================================================================

/// Tiny square cells, numbering off, no pacing.
pub fn small_config(cols: u32, rows: u32) -> CollageConfig {
    let mut config = CollageConfig {
        layout: LayoutConfig {
            cols,
            rows_per_group: rows,
            cell_width: 12,
            aspect_ratio: 1.0,
            ..LayoutConfig::default()
        },
        numbering: NumberingConfig {
            enabled: false,
            ..NumberingConfig::default()
        },
        ..CollageConfig::default()
    };
    config.pacing.cell_pause_ms = 0;
    config.pacing.sheet_pause_ms = 0;
    config
}
