//! Generation orchestration.
//!
//! Turns an ordered list of source images into encoded sheets, one sheet at a
//! time. The run moves through these states:
//!
//! ```text
//! Idle → Preparing → RenderingSheet(0) → … → RenderingSheet(n-1) → Completed ─┐
//!                          │                                                   ├→ Idle
//!                          └────────────── cancel ──────→ Cancelled ───────────┤
//!                          └────────────── fatal error ─→ Failed ──────────────┘
//! ```
//!
//! ## Cancellation
//!
//! The [`CancelToken`] is polled before each sheet, before each cell and
//! before encoding. Once seen, the sheet in progress is dropped and the run
//! ends; sheets finished earlier are kept and returned.
//!
//! ## Failures
//!
//! An undecodable source image never stops a run (the cell gets a
//! placeholder). Failing to acquire a sheet raster, decode the overlay or
//! sticker, or encode a sheet ends the run as [`RunOutcome::Failed`], again
//! returning the sheets already produced.
//!
//! ## Progress
//!
//! Status updates go to an optional `mpsc` channel as [`GenerationEvent`]s:
//! at the start of each sheet and every `pacing.yield_every` cells.

use crate::cell::{CellRenderer, MaskStyle, NumberStyle};
use crate::config::CollageConfig;
use crate::imaging::{BackendError, ImageBackend, MaskMode, TextFace};
use crate::indices::IndexExpr;
use crate::layout::{LayoutError, RunPlan, plan_run};
use crate::schedule::{CancelToken, Scheduler, YieldPoint};
use crate::sheet::{EncodedSheet, OverlayLayer, SheetBuilder, Surface};
use crate::source::SourceImage;
use std::ops::ControlFlow;
use std::sync::mpsc::Sender;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("Image backend error: {0}")]
    Backend(#[from] BackendError),
    #[error("Cannot use {name} image: {source}")]
    Asset {
        name: &'static str,
        source: BackendError,
    },
    #[error("Layout error: {0}")]
    Layout(#[from] LayoutError),
}

/// Raw overlay and sticker payloads, read by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assets {
    pub overlay: Option<Vec<u8>>,
    pub sticker: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GenerationState {
    #[default]
    Idle,
    Preparing,
    /// 0-based sheet being rendered.
    RenderingSheet(usize),
    Completed,
    Cancelled,
    Failed,
}

/// What a UI shows while a run is going.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GenerationStatus {
    pub state: GenerationState,
    pub is_generating: bool,
    /// 0..=100
    pub progress: u8,
    pub message: String,
    /// 1-based; 0 before the first sheet.
    pub current_sheet: usize,
    pub total_sheets: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GenerationEvent {
    Status(GenerationStatus),
    SheetEncoded {
        index: usize,
        total: usize,
        width: u32,
        height: u32,
        bytes: usize,
    },
}

/// How a run ended.
#[derive(Debug)]
pub enum RunOutcome {
    Completed,
    Cancelled,
    Failed(GenerateError),
}

impl RunOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed)
    }
}

/// Result of a run: every sheet produced, plus how it ended.
#[derive(Debug)]
pub struct GenerationRun {
    pub sheets: Vec<EncodedSheet>,
    pub outcome: RunOutcome,
    /// Images rendered after repack removal.
    pub working_count: usize,
    /// Images removed by repack.
    pub removed: usize,
    pub total_sheets: usize,
}

impl GenerationRun {
    pub fn total_bytes(&self) -> usize {
        self.sheets.iter().map(EncodedSheet::byte_size).sum()
    }
}

/// Cancellation, progress sink and pacing for one run.
pub struct GenerationContext<S: Scheduler> {
    pub cancel: CancelToken,
    pub events: Option<Sender<GenerationEvent>>,
    pub scheduler: S,
}

impl<S: Scheduler> GenerationContext<S> {
    pub fn new(scheduler: S) -> Self {
        Self {
            cancel: CancelToken::new(),
            events: None,
            scheduler,
        }
    }

    pub fn with_events(mut self, events: Sender<GenerationEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn send(&self, event: GenerationEvent) {
        if let Some(tx) = &self.events {
            // A dropped receiver only means nobody is watching
            tx.send(event).ok();
        }
    }
}

fn percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((done as f64 / total as f64) * 100.0).round().clamp(0.0, 100.0) as u8
}

/// Runs generations and tracks their status.
pub struct Generator<'a, B: ImageBackend> {
    backend: &'a B,
    config: &'a CollageConfig,
    status: GenerationStatus,
}

impl<'a, B: ImageBackend> Generator<'a, B> {
    pub fn new(backend: &'a B, config: &'a CollageConfig) -> Self {
        Self {
            backend,
            config,
            status: GenerationStatus::default(),
        }
    }

    pub fn status(&self) -> &GenerationStatus {
        &self.status
    }

    fn publish<S: Scheduler>(&self, ctx: &GenerationContext<S>) {
        ctx.send(GenerationEvent::Status(self.status.clone()));
    }

    /// Render `sources` into sheets.
    ///
    /// With `repack`, images whose global index is a mask target are removed
    /// and the rest renumbered; otherwise targets are overdrawn in place.
    /// Always ends back in [`GenerationState::Idle`].
    pub fn run<S: Scheduler>(
        &mut self,
        sources: &[SourceImage],
        assets: &Assets,
        repack: bool,
        ctx: &mut GenerationContext<S>,
    ) -> GenerationRun {
        self.status = GenerationStatus {
            state: GenerationState::Preparing,
            is_generating: true,
            message: "Preparing…".into(),
            ..GenerationStatus::default()
        };
        self.publish(ctx);

        let mut sheets = Vec::new();
        let mut plan_summary = (0, 0, 0);
        let result = self.render_all(sources, assets, repack, ctx, &mut sheets, &mut plan_summary);

        let outcome = match result {
            Ok(ControlFlow::Continue(())) => {
                tracing::info!(sheets = sheets.len(), "generation completed");
                self.status.state = GenerationState::Completed;
                self.status.progress = 100;
                self.status.message = "Completed".into();
                RunOutcome::Completed
            }
            Ok(ControlFlow::Break(())) => {
                tracing::info!(sheets = sheets.len(), "generation cancelled");
                self.status.state = GenerationState::Cancelled;
                self.status.message = "Cancelled".into();
                RunOutcome::Cancelled
            }
            Err(e) => {
                tracing::error!(sheets = sheets.len(), "generation failed: {e}");
                self.status.state = GenerationState::Failed;
                self.status.message = format!("Failed: {e}");
                RunOutcome::Failed(e)
            }
        };
        self.publish(ctx);

        self.status.state = GenerationState::Idle;
        self.status.is_generating = false;

        let (working_count, removed, total_sheets) = plan_summary;
        GenerationRun {
            sheets,
            outcome,
            working_count,
            removed,
            total_sheets,
        }
    }

    /// `Break` means cancelled.
    fn render_all<S: Scheduler>(
        &mut self,
        sources: &[SourceImage],
        assets: &Assets,
        repack: bool,
        ctx: &mut GenerationContext<S>,
        sheets: &mut Vec<EncodedSheet>,
        plan_summary: &mut (usize, usize, usize),
    ) -> Result<ControlFlow<()>, GenerateError> {
        let config = self.config;
        let backend = self.backend;

        let targets = IndexExpr::parse(&config.mask.indices);
        if !targets.skipped.is_empty() {
            tracing::warn!(tokens = ?targets.skipped, "ignoring unparseable mask indices");
        }
        let plan: RunPlan = plan_run(
            sources.len(),
            &config.layout,
            config.numbering.start,
            &targets.set,
            repack,
        )?;
        *plan_summary = (plan.working_count, plan.removed, plan.total_sheets());
        tracing::info!(
            images = sources.len(),
            working = plan.working_count,
            sheets = plan.total_sheets(),
            repack,
            cell_width = plan.cell.width,
            cell_height = plan.cell.height,
            "starting generation"
        );

        let renderer = self.prepare_renderer(assets, repack)?;
        let overlay = self.prepare_overlay(assets)?;
        let builder = SheetBuilder {
            backend,
            cells: &renderer,
            overlay: overlay.as_ref(),
            format: config.export.quality.format(),
        };

        let total = plan.total_sheets();
        let working = plan.working_count.max(1);
        let yield_every = config.pacing.yield_every.max(1);
        self.status.total_sheets = total;
        let mut surface = Surface::new();

        for sheet in &plan.sheets {
            if ctx.cancel.is_cancelled() {
                return Ok(ControlFlow::Break(()));
            }

            let done_before = sheet.index * plan.batch_size;
            self.status.state = GenerationState::RenderingSheet(sheet.index);
            self.status.current_sheet = sheet.index + 1;
            self.status.progress = percent(done_before, working);
            self.status.message = format!("Rendering sheet {}/{}", sheet.index + 1, total);
            self.publish(ctx);
            ctx.scheduler.yield_now(YieldPoint::SheetStart {
                sheet: sheet.index,
                total,
            });

            let cell_count = sheet.cells.len();
            let status = &mut self.status;
            let built = builder.build(&mut surface, sheet, sources, |step| {
                if let Some(i) = step.yield_due(yield_every) {
                    status.progress = percent(done_before + i, working);
                    status.message = format!(
                        "Rendering sheet {}/{} ({}/{})",
                        sheet.index + 1,
                        total,
                        i + 1,
                        cell_count
                    );
                    ctx.send(GenerationEvent::Status(status.clone()));
                    ctx.scheduler.yield_now(YieldPoint::CellBatch {
                        sheet: sheet.index,
                        cell: i,
                    });
                }
                if ctx.cancel.is_cancelled() {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            })?;

            let Some(encoded) = built else {
                return Ok(ControlFlow::Break(()));
            };
            ctx.send(GenerationEvent::SheetEncoded {
                index: encoded.index,
                total,
                width: encoded.width,
                height: encoded.height,
                bytes: encoded.byte_size(),
            });
            sheets.push(encoded);
            ctx.scheduler
                .yield_now(YieldPoint::SheetFinished { sheet: sheet.index });
        }

        Ok(ControlFlow::Continue(()))
    }

    fn prepare_renderer(&self, assets: &Assets, repack: bool) -> Result<CellRenderer, GenerateError> {
        let config = self.config;
        let numbering = config.numbering.enabled.then(|| {
            NumberStyle::from_config(
                &config.numbering,
                TextFace::resolve(&config.numbering.font_family),
            )
        });

        // Repack runs never draw masks
        let mask = if repack {
            None
        } else {
            let sticker = match (&config.mask.mode, &assets.sticker) {
                (MaskMode::Image, Some(bytes)) => Some(
                    self.backend
                        .decode(bytes)
                        .map_err(|source| GenerateError::Asset {
                            name: "sticker",
                            source,
                        })?
                        .to_rgba8(),
                ),
                (MaskMode::Image, None) => {
                    tracing::warn!("image mask mode without a sticker; masked cells stay plain");
                    None
                }
                _ => None,
            };
            MaskStyle::from_config(&config.mask, sticker)
        };

        Ok(CellRenderer::new(numbering, mask))
    }

    fn prepare_overlay(&self, assets: &Assets) -> Result<Option<OverlayLayer>, GenerateError> {
        let settings = &self.config.overlay;
        let Some(bytes) = assets.overlay.as_ref().filter(|_| settings.opacity > 0.0) else {
            return Ok(None);
        };
        let image = self
            .backend
            .decode(bytes)
            .map_err(|source| GenerateError::Asset {
                name: "overlay",
                source,
            })?
            .to_rgba8();
        Ok(Some(OverlayLayer {
            image,
            opacity: settings.opacity,
            mode: settings.blend_mode,
        }))
    }
}
