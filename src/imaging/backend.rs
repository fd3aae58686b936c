//! Image backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the three operations the renderer needs
//! from the outside world: decode a payload, acquire a raster surface, and
//! encode a finished surface.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate. Tests use the recording `MockBackend` in this module.

use super::params::OutputFormat;
use image::{DynamicImage, RgbImage};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode image: {0}")]
    Decode(String),
    #[error("No drawing surface available for {width}x{height}")]
    SurfaceUnavailable { width: u32, height: u32 },
    #[error("Failed to encode image: {0}")]
    Encode(String),
}

/// Pixel dimensions of a decoded or encoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for image backends.
///
/// The renderer only ever talks to pixels through this trait, so the
/// orchestration logic can be tested without real codecs.
pub trait ImageBackend {
    /// Decode an encoded payload (PNG, JPEG, ...) into pixels.
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, BackendError>;

    /// Acquire an opaque raster surface of the given size.
    ///
    /// Failure here is fatal to a generation run.
    fn allocate(&self, width: u32, height: u32) -> Result<RgbImage, BackendError>;

    /// Encode a finished surface.
    fn encode(&self, surface: &RgbImage, format: OutputFormat) -> Result<Vec<u8>, BackendError>;

    /// Read dimensions of an encoded payload.
    fn dimensions(&self, bytes: &[u8]) -> Result<Dimensions, BackendError> {
        let img = self.decode(bytes)?;
        Ok(Dimensions {
            width: img.width(),
            height: img.height(),
        })
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use image::Rgb;
    use std::cell::RefCell;

    /// Payloads starting with this marker fail to decode in the mock.
    pub const BROKEN: &[u8] = b"BROKEN";

    /// Mock backend that records operations.
    ///
    /// Decoding yields a solid image whose size and color come from the
    /// payload: `"WxH#rrggbb"`. Encoding yields `"<fmt>:WxH"` so tests can read
    /// the sheet size back without a real codec.
    #[derive(Default)]
    pub struct MockBackend {
        pub operations: RefCell<Vec<RecordedOp>>,
        /// Fail the n-th allocation (0-based).
        pub fail_allocation_at: Option<usize>,
        allocations: RefCell<usize>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Decode { ok: bool },
        Allocate { width: u32, height: u32 },
        Encode { width: u32, height: u32, lossless: bool },
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing_allocation_at(index: usize) -> Self {
            Self {
                fail_allocation_at: Some(index),
                ..Self::default()
            }
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.borrow().clone()
        }

        pub fn encoded_sizes(&self) -> Vec<(u32, u32)> {
            self.get_operations()
                .into_iter()
                .filter_map(|op| match op {
                    RecordedOp::Encode { width, height, .. } => Some((width, height)),
                    _ => None,
                })
                .collect()
        }
    }

    /// Build a mock payload describing a solid image.
    pub fn mock_payload(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
        format!("{width}x{height}#{:02x}{:02x}{:02x}", rgb[0], rgb[1], rgb[2]).into_bytes()
    }

    fn parse_mock_payload(bytes: &[u8]) -> Option<(u32, u32, [u8; 3])> {
        let text = std::str::from_utf8(bytes).ok()?;
        let (size, color) = text.split_once('#')?;
        let (w, h) = size.split_once('x')?;
        let c = crate::imaging::Color::parse(&format!("#{color}"))?;
        Some((w.parse().ok()?, h.parse().ok()?, [c.r, c.g, c.b]))
    }

    impl ImageBackend for MockBackend {
        fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, BackendError> {
            let parsed = if bytes.starts_with(BROKEN) {
                None
            } else {
                parse_mock_payload(bytes)
            };
            self.operations.borrow_mut().push(RecordedOp::Decode {
                ok: parsed.is_some(),
            });
            let (w, h, rgb) =
                parsed.ok_or_else(|| BackendError::Decode("mock payload rejected".into()))?;
            Ok(DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb(rgb))))
        }

        fn allocate(&self, width: u32, height: u32) -> Result<RgbImage, BackendError> {
            let n = {
                let mut count = self.allocations.borrow_mut();
                *count += 1;
                *count - 1
            };
            self.operations
                .borrow_mut()
                .push(RecordedOp::Allocate { width, height });
            if self.fail_allocation_at == Some(n) {
                return Err(BackendError::SurfaceUnavailable { width, height });
            }
            Ok(RgbImage::new(width, height))
        }

        fn encode(&self, surface: &RgbImage, format: OutputFormat) -> Result<Vec<u8>, BackendError> {
            let (width, height) = surface.dimensions();
            self.operations.borrow_mut().push(RecordedOp::Encode {
                width,
                height,
                lossless: format.is_lossless(),
            });
            Ok(format!("{}:{width}x{height}", format.extension()).into_bytes())
        }

        fn dimensions(&self, bytes: &[u8]) -> Result<Dimensions, BackendError> {
            let text = std::str::from_utf8(bytes)
                .map_err(|e| BackendError::Decode(e.to_string()))?;
            let size = text.split_once(':').map(|(_, s)| s).unwrap_or(text);
            let size = size.split('#').next().unwrap_or(size);
            let (w, h) = size
                .split_once('x')
                .ok_or_else(|| BackendError::Decode("mock payload rejected".into()))?;
            Ok(Dimensions {
                width: w.parse().map_err(|_| BackendError::Decode(w.into()))?,
                height: h.parse().map_err(|_| BackendError::Decode(h.into()))?,
            })
        }
    }

    #[test]
    fn mock_decodes_described_payload() {
        let backend = MockBackend::new();
        let img = backend.decode(&mock_payload(4, 3, [10, 20, 30])).unwrap();
        assert_eq!((img.width(), img.height()), (4, 3));
        assert_eq!(img.to_rgb8().get_pixel(0, 0), &Rgb([10, 20, 30]));
        assert_eq!(backend.get_operations(), vec![RecordedOp::Decode { ok: true }]);
    }

    #[test]
    fn mock_rejects_broken_payload() {
        let backend = MockBackend::new();
        assert!(matches!(
            backend.decode(BROKEN),
            Err(BackendError::Decode(_))
        ));
        assert_eq!(backend.get_operations(), vec![RecordedOp::Decode { ok: false }]);
    }

    #[test]
    fn mock_fails_requested_allocation() {
        let backend = MockBackend::failing_allocation_at(1);
        assert!(backend.allocate(10, 10).is_ok());
        assert!(matches!(
            backend.allocate(20, 20),
            Err(BackendError::SurfaceUnavailable {
                width: 20,
                height: 20
            })
        ));
    }

    #[test]
    fn mock_encode_reports_size() {
        let backend = MockBackend::new();
        let bytes = backend
            .encode(&RgbImage::new(30, 40), OutputFormat::Png)
            .unwrap();
        assert_eq!(bytes, b"png:30x40");
        let dims = backend.dimensions(&bytes).unwrap();
        assert_eq!((dims.width, dims.height), (30, 40));
    }
}
