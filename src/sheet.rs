//! Sheet building.
//!
//! A sheet is drawn on a single reusable [`Surface`]: it is acquired from the
//! backend at the sheet's size, filled white, drawn cell by cell, covered by
//! the optional overlay, encoded, and then shrunk back to one pixel so at
//! most one sheet raster is alive at a time.

use crate::cell::{CellOutcome, CellRenderer};
use crate::imaging::operations::draw_overlay;
use crate::imaging::{BackendError, BlendMode, ImageBackend, OutputFormat};
use crate::layout::SheetPlan;
use image::{RgbImage, RgbaImage};
use std::borrow::Cow;
use std::ops::ControlFlow;

/// Where a cell's encoded image comes from.
///
/// Payloads are read one cell at a time, so a run never holds more than the
/// image being drawn.
pub trait CellSource {
    fn read_bytes(&self) -> std::io::Result<Cow<'_, [u8]>>;
}

impl CellSource for Vec<u8> {
    fn read_bytes(&self) -> std::io::Result<Cow<'_, [u8]>> {
        Ok(Cow::Borrowed(self))
    }
}

/// The raster a run draws on, reused across sheets.
#[derive(Debug)]
pub struct Surface {
    raster: RgbImage,
}

impl Default for Surface {
    fn default() -> Self {
        Self::new()
    }
}

impl Surface {
    pub fn new() -> Self {
        Self {
            raster: RgbImage::new(1, 1),
        }
    }

    /// Drop the current raster and acquire a white one of the given size.
    pub fn prepare(
        &mut self,
        backend: &impl ImageBackend,
        width: u32,
        height: u32,
    ) -> Result<&mut RgbImage, BackendError> {
        self.release();
        let mut raster = backend.allocate(width, height)?;
        raster.fill(255);
        self.raster = raster;
        Ok(&mut self.raster)
    }

    /// Shrink to a 1×1 placeholder, freeing the sheet buffer.
    pub fn release(&mut self) {
        self.raster = RgbImage::new(1, 1);
    }

    pub fn raster(&self) -> &RgbImage {
        &self.raster
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.raster.dimensions()
    }
}

/// Decoded overlay with its compositing settings.
#[derive(Debug)]
pub struct OverlayLayer {
    pub image: RgbaImage,
    pub opacity: f32,
    pub mode: BlendMode,
}

/// One encoded sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedSheet {
    /// 0-based sheet number.
    pub index: usize,
    pub width: u32,
    pub height: u32,
    pub format: OutputFormat,
    pub bytes: Vec<u8>,
    pub first_index: i64,
    pub last_index: i64,
    pub cell_count: usize,
    /// Cells drawn as error placeholders.
    pub placeholders: usize,
}

impl EncodedSheet {
    pub fn byte_size(&self) -> usize {
        self.bytes.len()
    }
}

/// Points where a sheet build asks whether to go on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetStep {
    /// About to draw the cell at this position.
    Cell(usize),
    /// All cells and the overlay are drawn; about to encode.
    Encode,
}

impl SheetStep {
    /// The cell position when it falls on a yield boundary (every `every` cells, from 0).
    pub fn yield_due(self, every: usize) -> Option<usize> {
        match self {
            SheetStep::Cell(i) if i % every.max(1) == 0 => Some(i),
            _ => None,
        }
    }
}

/// Renders [`SheetPlan`]s into encoded sheets.
pub struct SheetBuilder<'a, B: ImageBackend> {
    pub backend: &'a B,
    pub cells: &'a CellRenderer,
    pub overlay: Option<&'a OverlayLayer>,
    pub format: OutputFormat,
}

impl<'a, B: ImageBackend> SheetBuilder<'a, B> {
    /// Render one sheet.
    ///
    /// `step` is consulted before every cell and before encoding; a `Break`
    /// abandons the sheet and returns `Ok(None)`. Payloads are looked up by
    /// [`CellPlan::source`](crate::layout::CellPlan::source) and read as each
    /// cell is drawn.
    pub fn build<S: CellSource>(
        &self,
        surface: &mut Surface,
        plan: &SheetPlan,
        sources: &[S],
        mut step: impl FnMut(SheetStep) -> ControlFlow<()>,
    ) -> Result<Option<EncodedSheet>, BackendError> {
        tracing::debug!(
            sheet = plan.index + 1,
            width = plan.width,
            height = plan.height,
            cells = plan.cells.len(),
            "rendering sheet"
        );
        let canvas = surface.prepare(self.backend, plan.width, plan.height)?;

        let mut placeholders = 0;
        for (position, cell) in plan.cells.iter().enumerate() {
            if step(SheetStep::Cell(position)).is_break() {
                surface.release();
                return Ok(None);
            }
            // Unreadable sources fall through to the placeholder like undecodable ones
            let payload = match sources.get(cell.source).map(CellSource::read_bytes) {
                Some(Ok(bytes)) => bytes,
                Some(Err(e)) => {
                    tracing::warn!(index = cell.global_index, "cannot read image: {e}");
                    Cow::Borrowed(&[][..])
                }
                None => Cow::Borrowed(&[][..]),
            };
            if self.cells.render(canvas, self.backend, &payload, cell) == CellOutcome::Placeholder {
                placeholders += 1;
            }
        }

        if let Some(overlay) = self.overlay {
            draw_overlay(canvas, &overlay.image, overlay.mode, overlay.opacity);
        }

        if step(SheetStep::Encode).is_break() {
            surface.release();
            return Ok(None);
        }

        let encoded = self.backend.encode(surface.raster(), self.format);
        surface.release();
        let bytes = encoded?;

        Ok(Some(EncodedSheet {
            index: plan.index,
            width: plan.width,
            height: plan.height,
            format: self.format,
            bytes,
            first_index: plan.first_index().unwrap_or_default(),
            last_index: plan.last_index().unwrap_or_default(),
            cell_count: plan.cells.len(),
            placeholders,
        }))
    }
}
