//! CLI output formatting for every command.
//!
//! # Information-First Display
//!
//! Sheets are shown by their position and the cell numbers they hold; file
//! names and byte sizes follow as secondary context. The numbers are what a
//! user cross-references against the printed collage.
//!
//! # Output Format
//!
//! ## Check
//!
//! ```text
//! Images: 20
//! Cell: 1500x2000, 3 per row, 9 per sheet
//! Mask targets: 4-6, 12
//!     Skipped: abc
//! Sheets
//! 001 4500x6000 cells 1-9 (3 masked)
//! 002 4500x6000 cells 10-18 (1 masked)
//! 003 4500x2000 cells 19-20
//! ```
//!
//! ## Generate (progress, from the event channel)
//!
//! ```text
//! [  0%] Preparing…
//! [  0%] Rendering sheet 1/3
//! [  0%] Rendering sheet 1/3 (1/9)
//! Sheet 1/3 encoded: 4500x6000, 2.1 MB
//! ```
//!
//! ## Generate (summary)
//!
//! ```text
//! 001 Part_1.jpg
//!     4500x6000, cells 1-9, 2.1 MB
//! 002 Part_2.jpg
//!     4500x6000, cells 10-18, 2.0 MB
//! Generated 2 sheets from 18 images, 4.1 MB total
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure.

use crate::export::{CombinedImage, RunSummary};
use crate::generate::GenerationEvent;
use crate::indices::IndexExpr;
use crate::layout::RunPlan;
use std::path::Path;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Human-readable byte size, 1024-based.
pub fn format_bytes(bytes: usize) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

/// `cells 1-9`, or `cell 7` for a single cell.
fn cell_span(first: i64, last: i64) -> String {
    if first == last {
        format!("cell {first}")
    } else {
        format!("cells {first}-{last}")
    }
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

// ============================================================================
// Check
// ============================================================================

/// Format the sheet plan for a set of images without rendering anything.
pub fn format_check_output(plan: &RunPlan, targets: &IndexExpr, image_count: usize) -> Vec<String> {
    let mut lines = Vec::new();

    if plan.removed > 0 {
        lines.push(format!(
            "Images: {} ({} removed by repack, {} rendered)",
            image_count, plan.removed, plan.working_count
        ));
    } else {
        lines.push(format!("Images: {image_count}"));
    }
    lines.push(format!(
        "Cell: {}x{}, {} per row, {} per sheet",
        plan.cell.width, plan.cell.height, plan.cols, plan.batch_size
    ));

    if targets.blank {
        lines.push("Mask targets: none".to_string());
    } else {
        lines.push(format!("Mask targets: {}", targets.set));
    }
    if !targets.skipped.is_empty() {
        lines.push(format!("    Skipped: {}", targets.skipped.join(", ")));
    }

    lines.push("Sheets".to_string());
    if plan.sheets.is_empty() {
        lines.push("    (none)".to_string());
    }
    for sheet in &plan.sheets {
        let mut line = format!(
            "{} {}x{}",
            format_index(sheet.index + 1),
            sheet.width,
            sheet.height
        );
        if let (Some(first), Some(last)) = (sheet.first_index(), sheet.last_index()) {
            line.push(' ');
            line.push_str(&cell_span(first, last));
        }
        let masked = sheet.cells.iter().filter(|c| c.masked).count();
        if masked > 0 {
            line.push_str(&format!(" ({masked} masked)"));
        }
        lines.push(line);
    }
    lines
}

pub fn print_check_output(plan: &RunPlan, targets: &IndexExpr, image_count: usize) {
    for line in format_check_output(plan, targets, image_count) {
        println!("{}", line);
    }
}

// ============================================================================
// Generate
// ============================================================================

/// Format one progress event from a running generation.
pub fn format_generation_event(event: &GenerationEvent) -> Vec<String> {
    match event {
        GenerationEvent::Status(status) => {
            vec![format!("[{:>3}%] {}", status.progress, status.message)]
        }
        GenerationEvent::SheetEncoded {
            index,
            total,
            width,
            height,
            bytes,
        } => vec![format!(
            "Sheet {}/{} encoded: {}x{}, {}",
            index + 1,
            total,
            width,
            height,
            format_bytes(*bytes)
        )],
    }
}

/// Format the parts a run exported, with the total size.
pub fn format_run_summary(summary: &RunSummary) -> Vec<String> {
    let mut lines = Vec::new();
    for (i, part) in summary.parts.iter().enumerate() {
        lines.push(format!("{} {}", format_index(i + 1), part.file));
        let mut detail = format!("    {}x{}", part.width, part.height);
        if let (Some(first), Some(last)) = (part.first_index, part.last_index) {
            detail.push_str(&format!(", {}", cell_span(first, last)));
        }
        detail.push_str(&format!(", {}", format_bytes(part.bytes)));
        lines.push(detail);
    }
    let sheets = plural(summary.parts.len(), "sheet");
    let total = format_bytes(summary.total_bytes());
    lines.push(match summary.source_count {
        Some(count) => format!("Generated {sheets} from {}, {total} total", plural(count, "image")),
        None => format!("Generated {sheets}, {total} total"),
    });
    lines
}

pub fn print_run_summary(summary: &RunSummary) {
    for line in format_run_summary(summary) {
        println!("{}", line);
    }
}

// ============================================================================
// Export
// ============================================================================

pub fn format_combined_output(path: &Path, combined: &CombinedImage) -> Vec<String> {
    vec![format!(
        "Combined → {} ({}x{}, {})",
        path.display(),
        combined.width,
        combined.height,
        format_bytes(combined.bytes.len())
    )]
}

pub fn print_combined_output(path: &Path, combined: &CombinedImage) {
    for line in format_combined_output(path, combined) {
        println!("{}", line);
    }
}

pub fn format_archive_output(path: &Path, parts: usize, bytes: usize) -> Vec<String> {
    vec![format!(
        "Archive → {} ({}, {})",
        path.display(),
        plural(parts, "part"),
        format_bytes(bytes)
    )]
}

pub fn print_archive_output(path: &Path, parts: usize, bytes: usize) {
    for line in format_archive_output(path, parts, bytes) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LayoutConfig;
    use crate::export::PartEntry;
    use crate::generate::{GenerationState, GenerationStatus};
    use crate::imaging::{ExportQuality, OutputFormat};
    use crate::layout::plan_run;

    fn layout() -> LayoutConfig {
        LayoutConfig {
            cols: 3,
            rows_per_group: 2,
            cell_width: 10,
            aspect_ratio: 1.0,
            ..LayoutConfig::default()
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    #[test]
    fn index_is_zero_padded() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(1234), "1234");
    }

    #[test]
    fn bytes_pick_a_unit() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn single_cell_span() {
        assert_eq!(cell_span(7, 7), "cell 7");
        assert_eq!(cell_span(1, 9), "cells 1-9");
    }

    // =========================================================================
    // Check
    // =========================================================================

    #[test]
    fn check_lists_sheets_and_masks() {
        let targets = IndexExpr::parse("2, 8, abc");
        let plan = plan_run(8, &layout(), 1, &targets.set, false).unwrap();
        let lines = format_check_output(&plan, &targets, 8);
        assert_eq!(
            lines,
            vec![
                "Images: 8",
                "Cell: 10x10, 3 per row, 6 per sheet",
                "Mask targets: 2, 8",
                "    Skipped: abc",
                "Sheets",
                "001 30x20 cells 1-6 (1 masked)",
                "002 30x10 cells 7-8 (1 masked)",
            ]
        );
    }

    #[test]
    fn check_reports_repack_removals() {
        let targets = IndexExpr::parse("1-2");
        let plan = plan_run(5, &layout(), 1, &targets.set, true).unwrap();
        let lines = format_check_output(&plan, &targets, 5);
        assert_eq!(lines[0], "Images: 5 (2 removed by repack, 3 rendered)");
        assert_eq!(lines.last().unwrap(), "001 30x10 cells 1-3");
    }

    #[test]
    fn check_with_no_targets() {
        let targets = IndexExpr::parse("   ");
        let plan = plan_run(1, &layout(), 1, &targets.set, false).unwrap();
        let lines = format_check_output(&plan, &targets, 1);
        assert!(lines.contains(&"Mask targets: none".to_string()));
        assert_eq!(lines.last().unwrap(), "001 30x10 cell 1");
    }

    // =========================================================================
    // Generate
    // =========================================================================

    #[test]
    fn status_event_shows_progress_and_message() {
        let event = GenerationEvent::Status(GenerationStatus {
            state: GenerationState::RenderingSheet(0),
            is_generating: true,
            progress: 7,
            message: "Rendering sheet 1/3".into(),
            current_sheet: 1,
            total_sheets: 3,
        });
        assert_eq!(format_generation_event(&event), vec!["[  7%] Rendering sheet 1/3"]);
    }

    #[test]
    fn encoded_event_shows_size() {
        let event = GenerationEvent::SheetEncoded {
            index: 1,
            total: 3,
            width: 4500,
            height: 6000,
            bytes: 2048,
        };
        assert_eq!(
            format_generation_event(&event),
            vec!["Sheet 2/3 encoded: 4500x6000, 2.0 KB"]
        );
    }

    #[test]
    fn run_summary_lists_parts_and_total() {
        let summary = RunSummary {
            source_count: Some(10),
            quality: ExportQuality::default(),
            parts: vec![
                PartEntry {
                    file: "Part_1.jpg".into(),
                    bytes: 1024,
                    width: 30,
                    height: 20,
                    first_index: Some(1),
                    last_index: Some(9),
                },
                PartEntry {
                    file: "Part_2.jpg".into(),
                    bytes: 512,
                    width: 30,
                    height: 10,
                    first_index: None,
                    last_index: None,
                },
            ],
        };
        assert_eq!(summary.format(), OutputFormat::Jpeg { quality: 80 });
        assert_eq!(
            format_run_summary(&summary),
            vec![
                "001 Part_1.jpg",
                "    30x20, cells 1-9, 1.0 KB",
                "002 Part_2.jpg",
                "    30x10, 512 B",
                "Generated 2 sheets from 10 images, 1.5 KB total",
            ]
        );
    }

    #[test]
    fn run_summary_without_source_count() {
        let summary = RunSummary {
            source_count: None,
            quality: ExportQuality::LOSSLESS,
            parts: vec![],
        };
        assert_eq!(format_run_summary(&summary), vec!["Generated 0 sheets, 0 B total"]);
    }

    // =========================================================================
    // Export
    // =========================================================================

    #[test]
    fn export_lines() {
        let combined = CombinedImage {
            width: 30,
            height: 50,
            format: OutputFormat::Png,
            bytes: vec![0; 100],
        };
        assert_eq!(
            format_combined_output(Path::new("out/Combined_1.png"), &combined),
            vec!["Combined → out/Combined_1.png (30x50, 100 B)"]
        );
        assert_eq!(
            format_archive_output(Path::new("out/Collage_1.zip"), 1, 2048),
            vec!["Archive → out/Collage_1.zip (1 part, 2.0 KB)"]
        );
    }
}
