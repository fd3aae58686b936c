//! Production backend on the `image` crate.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP, GIF, BMP) | `image::load_from_memory` |
//! | Surface | `image::RgbImage`, bounded by a pixel budget |
//! | Encode → PNG | `image::codecs::png::PngEncoder` (lossless) |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` at the export quality |

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::params::OutputFormat;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, ImageFormat, ImageReader, RgbImage};
use std::io::Cursor;
use std::sync::LazyLock;

/// Extensions whose decoders are compiled in.
const PHOTO_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("tif", ImageFormat::Tiff),
    ("tiff", ImageFormat::Tiff),
    ("webp", ImageFormat::WebP),
    ("gif", ImageFormat::Gif),
    ("bmp", ImageFormat::Bmp),
];

static SUPPORTED_EXTENSIONS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    PHOTO_CANDIDATES
        .iter()
        .filter(|(_, fmt)| fmt.reading_enabled())
        .map(|(ext, _)| *ext)
        .collect()
});

/// Returns the set of image file extensions that have working decoders compiled in.
pub fn supported_input_extensions() -> &'static [&'static str] {
    &SUPPORTED_EXTENSIONS
}

/// Default upper bound on a single raster surface, in pixels.
pub const DEFAULT_MAX_SURFACE_PIXELS: u64 = 500_000_000;

/// Backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend {
    max_surface_pixels: u64,
}

impl RustBackend {
    pub fn new() -> Self {
        Self {
            max_surface_pixels: DEFAULT_MAX_SURFACE_PIXELS,
        }
    }

    /// Refuse surfaces larger than `pixels`.
    pub fn with_max_surface_pixels(pixels: u64) -> Self {
        Self {
            max_surface_pixels: pixels,
        }
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageBackend for RustBackend {
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, BackendError> {
        image::load_from_memory(bytes).map_err(|e| BackendError::Decode(e.to_string()))
    }

    fn allocate(&self, width: u32, height: u32) -> Result<RgbImage, BackendError> {
        let pixels = width as u64 * height as u64;
        if pixels == 0 || pixels > self.max_surface_pixels {
            return Err(BackendError::SurfaceUnavailable { width, height });
        }
        Ok(RgbImage::new(width, height))
    }

    fn encode(&self, surface: &RgbImage, format: OutputFormat) -> Result<Vec<u8>, BackendError> {
        let (width, height) = surface.dimensions();
        let mut out = Vec::new();
        let result = match format {
            OutputFormat::Png => PngEncoder::new(&mut out).write_image(
                surface.as_raw(),
                width,
                height,
                ExtendedColorType::Rgb8,
            ),
            OutputFormat::Jpeg { quality } => JpegEncoder::new_with_quality(&mut out, quality)
                .write_image(surface.as_raw(), width, height, ExtendedColorType::Rgb8),
        };
        result.map_err(|e| BackendError::Encode(e.to_string()))?;
        Ok(out)
    }

    fn dimensions(&self, bytes: &[u8]) -> Result<Dimensions, BackendError> {
        let (width, height) = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()?
            .into_dimensions()
            .map_err(|e| BackendError::Decode(e.to_string()))?;
        Ok(Dimensions { width, height })
    }
}
