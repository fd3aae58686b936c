//! # Gridsheet
//!
//! Turns a large, ordered set of images into a few big numbered collage
//! sheets: fixed-column grids where every cell is cover-fitted, numbered,
//! optionally crossed out or stickered, and the whole sheet can carry an
//! overlay. Sheets are exported one file per sheet, stacked into a single tall
//! image, or bundled as a zip.
//!
//! # Architecture: Plan, Render, Export
//!
//! ```text
//! 1. Plan      images + config  →  RunPlan          (cell size, batches, global numbers)
//! 2. Render    RunPlan          →  EncodedSheet…    (one raster at a time, cancellable)
//! 3. Export    sheets           →  Part_<n> files / Combined image / Collage zip
//! ```
//!
//! Planning is pure arithmetic, so `gridsheet check` can print the complete
//! sheet layout for thousands of images without decoding one of them.
//! Rendering talks to pixels only through [`imaging::ImageBackend`], so the
//! orchestration is tested against a recording mock.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`indices`] | Parses mask target expressions like `1-9, 20` into merged ranges |
//! | [`layout`] | Cell size, batching, global numbering and per-sheet plans |
//! | [`cell`] | Draws one cell: cover-fit image, number, mask or sticker |
//! | [`sheet`] | Builds and encodes one sheet on a reusable raster surface |
//! | [`schedule`] | Cancellation token and the cooperative yield points of a run |
//! | [`generate`] | Run orchestration: state machine, progress events, failures |
//! | [`export`] | Vertical combine, zip bundle, part files and `summary.json` |
//! | [`naming`] | `Part_<n>.<ext>` and related output names |
//! | [`source`] | Loads source images from a directory, ordering, duplicates |
//! | [`config`] | `gridsheet.toml` loading, defaults, validation |
//! | [`imaging`] | Backend trait, geometry, compositing, text and drawing primitives |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## One Sheet Raster at a Time
//!
//! A full sheet at the default cell size is tens of megapixels. A run holds
//! exactly one sheet raster, shrinking it to a single pixel as soon as the
//! sheet is encoded, and keeps only the encoded bytes. Source images loaded
//! from disk are read one cell at a time. Peak memory is one sheet plus the
//! encoded output, regardless of how many images go in.
//!
//! ## Numbers Belong to Positions
//!
//! Global cell numbers are assigned after batching: cell `i` of sheet `g` is
//! `start + g * batch + i`. Mask targets refer to these numbers. In repack
//! mode, targeted images are dropped first and the remaining images are
//! renumbered, so the output has no gaps.
//!
//! ## Cancellation Keeps What Is Done
//!
//! A cancelled or failed run still returns every sheet finished before the
//! stop. Only the sheet in progress is discarded.

pub mod cell;
pub mod config;
pub mod export;
pub mod generate;
pub mod imaging;
pub mod indices;
pub mod layout;
pub mod naming;
pub mod output;
pub mod schedule;
pub mod sheet;
pub mod source;

#[cfg(test)]
pub(crate) mod test_helpers;
