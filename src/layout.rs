//! Grid geometry and batching.
//!
//! Everything here is computed up front and is pure: the cell size for the
//! run, how the working set splits into sheets, each cell's rectangle and
//! global index, and which cells carry a mask. The sheet builder only
//! executes a [`SheetPlan`].
//!
//! ## Global index
//!
//! ```text
//! global = start + sheet × batch_size + position_in_sheet
//! ```
//!
//! In repack runs the masked images are removed before planning, so the
//! remaining images are renumbered contiguously from `start`.

use crate::config::LayoutConfig;
use crate::imaging::CellRect;
use crate::indices::IndexSet;
use thiserror::Error;

/// Hard limit for either side of a cell, and the target width of a sheet row.
pub const MAX_CANVAS_DIMENSION: u32 = 8192;

/// Rows per sheet when `rows_per_group` is 0.
pub const DEFAULT_ROWS_PER_GROUP: u32 = 50;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LayoutError {
    #[error("layout needs at least one column")]
    NoColumns,
    #[error("cell aspect ratio must be positive (got {0})")]
    InvalidAspect(f64),
    #[error("{cols} columns with a {gap}px gap leave no room for cells")]
    NoRoomForCells { cols: u32, gap: u32 },
    #[error("sheet of {width}x{height} does not fit a raster")]
    SheetTooLarge { width: u64, height: u64 },
}

/// Pixel size of every cell in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellSize {
    pub width: u32,
    pub height: u32,
}

/// Width / height ratio of a cell: explicit ratio, else the custom sides.
pub fn aspect_ratio(layout: &LayoutConfig) -> f64 {
    if layout.aspect_ratio > 0.0 {
        layout.aspect_ratio
    } else if layout.custom_height > 0 {
        layout.custom_width as f64 / layout.custom_height as f64
    } else {
        0.0
    }
}

/// Compute the cell size once per run.
///
/// The base width shrinks when a full row of base-width cells would exceed
/// [`MAX_CANVAS_DIMENSION`]; height follows the aspect ratio. Both sides are
/// capped at [`MAX_CANVAS_DIMENSION`].
pub fn cell_size(layout: &LayoutConfig) -> Result<CellSize, LayoutError> {
    if layout.cols == 0 {
        return Err(LayoutError::NoColumns);
    }
    let ratio = aspect_ratio(layout);
    if !ratio.is_finite() || ratio <= 0.0 {
        return Err(LayoutError::InvalidAspect(ratio));
    }

    let cols = layout.cols as u64;
    let max = MAX_CANVAS_DIMENSION as u64;
    let mut width = (layout.cell_width as u64).min(max);
    if cols * width > max {
        let room = max as i64 - (cols * layout.gap as u64) as i64;
        width = (room.max(0) as u64) / cols;
    }
    if width == 0 {
        return Err(LayoutError::NoRoomForCells {
            cols: layout.cols,
            gap: layout.gap,
        });
    }

    let height = ((width as f64 / ratio).floor() as u64).clamp(1, max);
    Ok(CellSize {
        width: width as u32,
        height: height as u32,
    })
}

/// Rows per sheet, with 0 meaning [`DEFAULT_ROWS_PER_GROUP`].
pub fn effective_rows(layout: &LayoutConfig) -> u32 {
    if layout.rows_per_group > 0 {
        layout.rows_per_group
    } else {
        DEFAULT_ROWS_PER_GROUP
    }
}

/// Number of cells per full sheet.
pub fn batch_size(layout: &LayoutConfig) -> usize {
    layout.cols.max(1) as usize * effective_rows(layout) as usize
}

/// Sheet size for `count` cells: full column width, only as many rows as needed.
pub fn sheet_dimensions(
    cell: CellSize,
    cols: u32,
    gap: u32,
    count: usize,
) -> Result<(u32, u32), LayoutError> {
    let cols = cols.max(1) as u64;
    let rows = (count as u64).div_ceil(cols).max(1);
    let width = cols * cell.width as u64 + (cols - 1) * gap as u64;
    let height = rows * cell.height as u64 + (rows - 1) * gap as u64;
    if width > u32::MAX as u64 || height > u32::MAX as u64 {
        return Err(LayoutError::SheetTooLarge { width, height });
    }
    Ok((width as u32, height as u32))
}

/// Rectangle of the cell at `position` (row-major) inside a sheet.
pub fn cell_rect(cell: CellSize, cols: u32, gap: u32, position: usize) -> CellRect {
    let cols = cols.max(1) as usize;
    let (row, col) = ((position / cols) as u32, (position % cols) as u32);
    CellRect {
        x: col * (cell.width + gap),
        y: row * (cell.height + gap),
        width: cell.width,
        height: cell.height,
    }
}

/// One cell of a planned sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct CellPlan {
    /// Position in the caller's original image list.
    pub source: usize,
    pub global_index: i64,
    pub rect: CellRect,
    /// Overdraw with mask or sticker.
    pub masked: bool,
}

/// One planned sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetPlan {
    /// 0-based sheet number.
    pub index: usize,
    pub width: u32,
    pub height: u32,
    pub cells: Vec<CellPlan>,
}

impl SheetPlan {
    pub fn first_index(&self) -> Option<i64> {
        self.cells.first().map(|c| c.global_index)
    }

    pub fn last_index(&self) -> Option<i64> {
        self.cells.last().map(|c| c.global_index)
    }
}

/// The full plan of a generation run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunPlan {
    pub cell: CellSize,
    pub cols: u32,
    pub batch_size: usize,
    /// Images that will be rendered (after repack removal).
    pub working_count: usize,
    /// Images dropped by repack.
    pub removed: usize,
    pub sheets: Vec<SheetPlan>,
}

impl RunPlan {
    pub fn total_sheets(&self) -> usize {
        self.sheets.len()
    }

    pub fn masked_cells(&self) -> usize {
        self.sheets
            .iter()
            .flat_map(|s| &s.cells)
            .filter(|c| c.masked)
            .count()
    }
}

/// Plan a run over `count` images.
///
/// With `repack`, images whose original global index is a target are removed
/// and the rest renumbered; otherwise every image is kept and targets are
/// flagged for overdraw.
pub fn plan_run(
    count: usize,
    layout: &LayoutConfig,
    start: i64,
    targets: &IndexSet,
    repack: bool,
) -> Result<RunPlan, LayoutError> {
    let cell = cell_size(layout)?;
    let batch = batch_size(layout);

    let working: Vec<usize> = if repack {
        (0..count)
            .filter(|&i| !targets.contains(start + i as i64))
            .collect()
    } else {
        (0..count).collect()
    };

    let mut sheets = Vec::with_capacity(working.len().div_ceil(batch));
    for (index, chunk) in working.chunks(batch).enumerate() {
        let (width, height) = sheet_dimensions(cell, layout.cols, layout.gap, chunk.len())?;
        let cells = chunk
            .iter()
            .enumerate()
            .map(|(position, &source)| {
                let global_index = start + (index * batch + position) as i64;
                CellPlan {
                    source,
                    global_index,
                    rect: cell_rect(cell, layout.cols, layout.gap, position),
                    masked: !repack && targets.contains(global_index),
                }
            })
            .collect();
        sheets.push(SheetPlan {
            index,
            width,
            height,
            cells,
        });
    }

    Ok(RunPlan {
        cell,
        cols: layout.cols,
        batch_size: batch,
        working_count: working.len(),
        removed: count - working.len(),
        sheets,
    })
}
