//! Post-export transforms over finished sheets.
//!
//! - [`combine_sheets`] stacks every sheet top to bottom into one image,
//!   refusing when there are too many source images or the result would not
//!   fit the device's pixel budget.
//! - [`bundle_archive`] wraps all sheets into one zip with `Part_<n>.<ext>`
//!   entries.
//!
//! Both take encoded sheet payloads, the same unit the per-sheet files use.
//!
//! ## Parts on disk
//!
//! [`write_parts`] stores a run as `Part_<n>.<ext>` files plus a
//! `summary.json` ([`RunSummary`]) recording sizes, source count and
//! quality. [`read_summary`] and [`load_parts`] bring them back for a later
//! `combine` or `bundle`; without a summary the parts are found by name.

use crate::config::DeviceConfig;
use crate::imaging::{BackendError, ExportQuality, ImageBackend, OutputFormat};
use crate::naming::{parse_sheet_filename, sheet_filename};
use crate::sheet::EncodedSheet;
use serde::{Deserialize, Serialize};
use std::io::{Cursor, Seek, Write};
use std::path::Path;
use thiserror::Error;
use zip::CompressionMethod;
use zip::write::{SimpleFileOptions, ZipWriter};

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Combining {count} images is not supported (limit {limit}); export an archive instead")]
    TooManyImages { count: usize, limit: usize },
    #[error(
        "Combined image of {width}x{height} exceeds the {budget} pixel budget; export an archive instead"
    )]
    CapacityExceeded { width: u32, height: u64, budget: u64 },
    #[error("No sheets to export")]
    NoSheets,
    #[error("Source image count is unknown (no {SUMMARY_FILE}); generate the sheets again to combine them")]
    UnknownSourceCount,
    #[error("Image backend error: {0}")]
    Backend(#[from] BackendError),
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Summary error: {0}")]
    Summary(#[from] serde_json::Error),
}

/// Limits for [`combine_sheets`], supplied by the calling environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CombineLimits {
    /// Largest combined image, in pixels.
    pub max_pixels: u64,
    /// Refuse above this many source images, regardless of pixels.
    pub max_source_images: usize,
}

impl CombineLimits {
    pub fn desktop() -> Self {
        Self {
            max_pixels: 50_000_000,
            max_source_images: 100,
        }
    }

    pub fn mobile() -> Self {
        Self {
            max_pixels: 16_777_216,
            max_source_images: 100,
        }
    }

    pub fn from_device(device: &DeviceConfig) -> Self {
        Self {
            max_pixels: device.combine_pixel_budget(),
            max_source_images: device.max_combine_images,
        }
    }
}

/// One tall image made of every sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedImage {
    pub width: u32,
    pub height: u32,
    pub format: OutputFormat,
    pub bytes: Vec<u8>,
}

/// Stack `sheets` vertically into one image.
///
/// Width is the first sheet's width (all sheets of a run share it); height
/// is the sum of all heights. `source_count` is the number of images the
/// sheets were made from.
pub fn combine_sheets<S: AsRef<[u8]>>(
    backend: &impl ImageBackend,
    sheets: &[S],
    source_count: usize,
    quality: ExportQuality,
    limits: CombineLimits,
) -> Result<CombinedImage, ExportError> {
    if source_count > limits.max_source_images {
        return Err(ExportError::TooManyImages {
            count: source_count,
            limit: limits.max_source_images,
        });
    }
    if sheets.is_empty() {
        return Err(ExportError::NoSheets);
    }

    let dims = sheets
        .iter()
        .map(|s| backend.dimensions(s.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;
    let width = dims[0].width;
    let height: u64 = dims.iter().map(|d| d.height as u64).sum();
    if width as u64 * height > limits.max_pixels || height > u32::MAX as u64 {
        return Err(ExportError::CapacityExceeded {
            width,
            height,
            budget: limits.max_pixels,
        });
    }
    let height = height as u32;
    tracing::debug!(width, height, sheets = sheets.len(), "combining sheets");

    let mut canvas = backend.allocate(width, height)?;
    canvas.fill(255);
    let mut y = 0i64;
    for sheet in sheets {
        let decoded = backend.decode(sheet.as_ref())?.to_rgb8();
        image::imageops::replace(&mut canvas, &decoded, 0, y);
        y += decoded.height() as i64;
    }

    let format = quality.format();
    let bytes = backend.encode(&canvas, format)?;
    Ok(CombinedImage {
        width,
        height,
        format,
        bytes,
    })
}

/// Write `sheets` as `Part_<n>.<ext>` entries of a zip archive into `out`.
pub fn write_archive<W: Write + Seek, S: AsRef<[u8]>>(
    out: W,
    sheets: &[S],
    format: OutputFormat,
) -> Result<W, ExportError> {
    if sheets.is_empty() {
        return Err(ExportError::NoSheets);
    }
    let mut zip = ZipWriter::new(out);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (i, sheet) in sheets.iter().enumerate() {
        zip.start_file(sheet_filename(i, format), options)?;
        zip.write_all(sheet.as_ref())?;
    }
    Ok(zip.finish()?)
}

/// Bundle `sheets` into an in-memory zip archive.
pub fn bundle_archive<S: AsRef<[u8]>>(
    sheets: &[S],
    format: OutputFormat,
) -> Result<Vec<u8>, ExportError> {
    Ok(write_archive(Cursor::new(Vec::new()), sheets, format)?.into_inner())
}

// ============================================================================
// Parts on disk
// ============================================================================

pub const SUMMARY_FILE: &str = "summary.json";

/// One exported sheet file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartEntry {
    pub file: String,
    pub bytes: usize,
    pub width: u32,
    pub height: u32,
    /// Global numbers of the first and last cell; absent when unknown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_index: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_index: Option<i64>,
}

/// What a run exported, stored as `summary.json` next to the parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Images the sheets were made from; unknown for a summary rebuilt from
    /// part files.
    #[serde(default)]
    pub source_count: Option<usize>,
    pub quality: ExportQuality,
    pub parts: Vec<PartEntry>,
}

impl RunSummary {
    pub fn new(sheets: &[EncodedSheet], source_count: usize, quality: ExportQuality) -> Self {
        let parts = sheets
            .iter()
            .enumerate()
            .map(|(i, sheet)| PartEntry {
                file: sheet_filename(i, sheet.format),
                bytes: sheet.byte_size(),
                width: sheet.width,
                height: sheet.height,
                first_index: Some(sheet.first_index),
                last_index: Some(sheet.last_index),
            })
            .collect();
        Self {
            source_count: Some(source_count),
            quality,
            parts,
        }
    }

    /// The source count, required before combining.
    pub fn known_source_count(&self) -> Result<usize, ExportError> {
        self.source_count.ok_or(ExportError::UnknownSourceCount)
    }

    pub fn total_bytes(&self) -> usize {
        self.parts.iter().map(|p| p.bytes).sum()
    }

    pub fn format(&self) -> OutputFormat {
        self.quality.format()
    }
}

/// Write each sheet as `Part_<n>.<ext>` in `dir`, plus `summary.json`.
pub fn write_parts(
    dir: &Path,
    sheets: &[EncodedSheet],
    source_count: usize,
    quality: ExportQuality,
) -> Result<RunSummary, ExportError> {
    std::fs::create_dir_all(dir)?;
    let summary = RunSummary::new(sheets, source_count, quality);
    for (entry, sheet) in summary.parts.iter().zip(sheets) {
        std::fs::write(dir.join(&entry.file), &sheet.bytes)?;
    }
    let json = serde_json::to_string_pretty(&summary)?;
    std::fs::write(dir.join(SUMMARY_FILE), json)?;
    tracing::debug!(dir = %dir.display(), parts = summary.parts.len(), "wrote parts");
    Ok(summary)
}

/// Read `summary.json` from `dir`, or rebuild one from `Part_<n>` files.
///
/// A rebuilt summary does not know how many images went in, so its
/// `source_count` is `None`; its quality follows the extension of the first
/// part.
pub fn read_summary(dir: &Path, backend: &impl ImageBackend) -> Result<RunSummary, ExportError> {
    let path = dir.join(SUMMARY_FILE);
    if path.exists() {
        let content = std::fs::read_to_string(&path)?;
        return Ok(serde_json::from_str(&content)?);
    }

    tracing::warn!(dir = %dir.display(), "no {SUMMARY_FILE}; looking for part files");
    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let name = entry?.file_name().to_string_lossy().into_owned();
        if let Some(n) = parse_sheet_filename(&name) {
            found.push((n, name));
        }
    }
    found.sort();
    if found.is_empty() {
        return Err(ExportError::NoSheets);
    }

    let lossless = found[0].1.to_ascii_lowercase().ends_with(".png");
    let mut parts = Vec::with_capacity(found.len());
    for (_, file) in found {
        let bytes = std::fs::read(dir.join(&file))?;
        let dims = backend.dimensions(&bytes)?;
        parts.push(PartEntry {
            file,
            bytes: bytes.len(),
            width: dims.width,
            height: dims.height,
            first_index: None,
            last_index: None,
        });
    }
    Ok(RunSummary {
        source_count: None,
        quality: if lossless {
            ExportQuality::LOSSLESS
        } else {
            ExportQuality::default()
        },
        parts,
    })
}

/// Read the part files a summary lists, in order.
pub fn load_parts(dir: &Path, summary: &RunSummary) -> Result<Vec<Vec<u8>>, ExportError> {
    if summary.parts.is_empty() {
        return Err(ExportError::NoSheets);
    }
    summary
        .parts
        .iter()
        .map(|p| std::fs::read(dir.join(&p.file)).map_err(ExportError::from))
        .collect()
}
