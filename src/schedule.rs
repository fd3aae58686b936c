//! Cooperative pacing and cancellation.
//!
//! The generator hands control to a [`Scheduler`] at a few fixed points:
//! before each sheet, every `yield_every` cells, and after a sheet is
//! encoded. What happens there (sleeping to let a host breathe, nothing at
//! all, or test hooks) is the scheduler's business, not the renderer's.

use crate::config::PacingConfig;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Shared cancellation flag, polled by the generator.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Where the generator is when it yields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YieldPoint {
    /// About to start sheet `sheet` (0-based) of `total`.
    SheetStart { sheet: usize, total: usize },
    /// Inside sheet `sheet`, about to draw cell `cell` (0-based within the sheet).
    CellBatch { sheet: usize, cell: usize },
    /// Sheet `sheet` is encoded and its raster released.
    SheetFinished { sheet: usize },
}

/// Decides what happens at each yield point.
pub trait Scheduler {
    fn yield_now(&mut self, point: YieldPoint);
}

/// Never pauses.
#[derive(Debug, Clone, Copy, Default)]
pub struct Immediate;

impl Scheduler for Immediate {
    fn yield_now(&mut self, _point: YieldPoint) {}
}

/// Sleeps briefly inside sheets and longer between them.
#[derive(Debug, Clone, Copy)]
pub struct PacedScheduler {
    pub cell_pause: Duration,
    pub sheet_pause: Duration,
}

impl PacedScheduler {
    pub fn from_config(pacing: &PacingConfig) -> Self {
        Self {
            cell_pause: pacing.cell_pause(),
            sheet_pause: pacing.sheet_pause(),
        }
    }
}

impl Scheduler for PacedScheduler {
    fn yield_now(&mut self, point: YieldPoint) {
        let pause = match point {
            YieldPoint::SheetStart { .. } => Duration::ZERO,
            YieldPoint::CellBatch { .. } => self.cell_pause,
            YieldPoint::SheetFinished { .. } => self.sheet_pause,
        };
        if !pause.is_zero() {
            std::thread::sleep(pause);
        }
    }
}

impl<F: FnMut(YieldPoint)> Scheduler for F {
    fn yield_now(&mut self, point: YieldPoint) {
        self(point)
    }
}
