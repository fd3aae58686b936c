//! End-to-end runs through the public API with the real `image` backend.
//!
//! Cells are 50px so every run finishes in milliseconds; numbering is off
//! where exact pixel colors are asserted.

use gridsheet::config::{CollageConfig, LayoutConfig, NumberingConfig};
use gridsheet::export::{self, CombineLimits, ExportError};
use gridsheet::generate::{Assets, GenerationContext, GenerationEvent, Generator, RunOutcome};
use gridsheet::imaging::{ExportQuality, ImageBackend, RustBackend};
use gridsheet::schedule::{CancelToken, Immediate, YieldPoint};
use gridsheet::source::{self, Payload, SourceImage};
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, Rgb, RgbImage};
use std::io::{Cursor, Read};

const CELL: u32 = 50;

fn png(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb(rgb));
    let mut out = Vec::new();
    PngEncoder::new(&mut out)
        .write_image(img.as_raw(), width, height, ExtendedColorType::Rgb8)
        .unwrap();
    out
}

fn color(i: usize) -> [u8; 3] {
    [(i * 40 % 256) as u8, 90, (255 - i * 40 % 256) as u8]
}

fn sources(n: usize) -> Vec<SourceImage> {
    (0..n)
        .map(|i| SourceImage::new(format!("photo-{i:02}.png"), png(80, 60, color(i)), i as u64))
        .collect()
}

fn config(masks: &str) -> CollageConfig {
    let mut config = CollageConfig {
        layout: LayoutConfig {
            cols: 2,
            rows_per_group: 2,
            cell_width: CELL,
            aspect_ratio: 1.0,
            ..LayoutConfig::default()
        },
        numbering: NumberingConfig {
            enabled: false,
            ..NumberingConfig::default()
        },
        ..CollageConfig::default()
    };
    config.mask.indices = masks.to_string();
    config.export.quality = ExportQuality::LOSSLESS;
    config.pacing.cell_pause_ms = 0;
    config.pacing.sheet_pause_ms = 0;
    config
}

fn center(img: &RgbImage, col: u32, row: u32) -> [u8; 3] {
    img.get_pixel(col * CELL + CELL / 2, row * CELL + CELL / 2).0
}

// =========================================================================
// Generation
// =========================================================================

#[test]
fn five_images_make_a_full_and_a_partial_sheet() {
    let backend = RustBackend::new();
    let config = config("2");
    let images = sources(5);
    let mut ctx = GenerationContext::new(Immediate);
    let run = Generator::new(&backend, &config).run(&images, &Assets::default(), false, &mut ctx);

    assert!(run.outcome.is_completed());
    assert_eq!(run.sheets.len(), 2);
    assert_eq!((run.sheets[0].width, run.sheets[0].height), (100, 100));
    assert_eq!((run.sheets[1].width, run.sheets[1].height), (100, 50));
    assert_eq!((run.sheets[1].first_index, run.sheets[1].last_index), (5, 5));

    let first = backend.decode(&run.sheets[0].bytes).unwrap().to_rgb8();
    assert_eq!(center(&first, 0, 0), color(0));
    assert_eq!(center(&first, 0, 1), color(2));
    assert_eq!(center(&first, 1, 1), color(3));

    // Cell 2 is crossed out in the default mask red
    let masked = center(&first, 1, 0);
    assert!(masked[0] > 200 && masked[1] < 120, "got {masked:?}");

    // The partial sheet keeps the unused cell white
    let second = backend.decode(&run.sheets[1].bytes).unwrap().to_rgb8();
    assert_eq!(center(&second, 0, 0), color(4));
    assert_eq!(center(&second, 1, 0), [255, 255, 255]);
}

#[test]
fn repack_drops_targets_and_renumbers() {
    let backend = RustBackend::new();
    let config = config("2, 4");
    let images = sources(5);
    let mut ctx = GenerationContext::new(Immediate);
    let run = Generator::new(&backend, &config).run(&images, &Assets::default(), true, &mut ctx);

    assert!(run.outcome.is_completed());
    assert_eq!(run.removed, 2);
    assert_eq!(run.working_count, 3);
    assert_eq!(run.sheets.len(), 1);
    assert_eq!((run.sheets[0].first_index, run.sheets[0].last_index), (1, 3));

    let sheet = backend.decode(&run.sheets[0].bytes).unwrap().to_rgb8();
    assert_eq!(center(&sheet, 0, 0), color(0));
    assert_eq!(center(&sheet, 1, 0), color(2));
    assert_eq!(center(&sheet, 0, 1), color(4));
}

#[test]
fn broken_image_gets_a_placeholder_and_the_run_goes_on() {
    let backend = RustBackend::new();
    let config = config("");
    let mut images = sources(3);
    images[1] = SourceImage::new("broken.jpg", b"not an image".to_vec(), 1);
    let mut ctx = GenerationContext::new(Immediate);
    let run = Generator::new(&backend, &config).run(&images, &Assets::default(), false, &mut ctx);

    assert!(run.outcome.is_completed());
    assert_eq!(run.sheets[0].placeholders, 1);
    let sheet = backend.decode(&run.sheets[0].bytes).unwrap().to_rgb8();
    assert_eq!(sheet.get_pixel(CELL + 2, 2).0, [0xf9, 0xf9, 0xf9]);
    assert_eq!(center(&sheet, 0, 1), color(2));
}

#[test]
fn cancelling_after_first_sheet_keeps_it() {
    let backend = RustBackend::new();
    let config = config("");
    let images = sources(10);
    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    let (tx, rx) = std::sync::mpsc::channel();
    let mut ctx = GenerationContext::new(move |point: YieldPoint| {
        if point == (YieldPoint::SheetFinished { sheet: 0 }) {
            trigger.cancel();
        }
    })
    .with_cancel(cancel)
    .with_events(tx);

    let run = Generator::new(&backend, &config).run(&images, &Assets::default(), false, &mut ctx);
    drop(ctx);

    assert!(matches!(run.outcome, RunOutcome::Cancelled));
    assert_eq!(run.sheets.len(), 1);
    assert_eq!(run.total_sheets, 3);

    let encoded = rx
        .iter()
        .filter(|e| matches!(e, GenerationEvent::SheetEncoded { .. }))
        .count();
    assert_eq!(encoded, 1);
}

#[test]
fn interrupted_run_still_writes_finished_sheets() {
    let tmp = tempfile::TempDir::new().unwrap();
    let backend = RustBackend::new();
    let config = config("");
    let images = sources(10);

    // Tripped from another thread, as a Ctrl-C handler does
    let cancel = CancelToken::new();
    let interrupt = cancel.clone();
    let (finished_tx, finished_rx) = std::sync::mpsc::channel();
    let handler = std::thread::spawn(move || {
        finished_rx.recv().unwrap();
        interrupt.cancel();
    });
    let mut ctx = GenerationContext::new(move |point: YieldPoint| {
        if point == (YieldPoint::SheetFinished { sheet: 0 }) {
            finished_tx.send(()).unwrap();
            // Wait until the other thread has tripped the token
            while !handler.is_finished() {
                std::thread::yield_now();
            }
        }
    })
    .with_cancel(cancel);
    let run = Generator::new(&backend, &config).run(&images, &Assets::default(), false, &mut ctx);
    assert!(matches!(run.outcome, RunOutcome::Cancelled));

    let summary =
        export::write_parts(tmp.path(), &run.sheets, images.len(), config.export.quality).unwrap();
    assert_eq!(summary.parts.len(), 1);
    assert!(tmp.path().join("Part_1.png").exists());
    assert!(!tmp.path().join("Part_2.png").exists());
    assert_eq!(export::read_summary(tmp.path(), &backend).unwrap(), summary);
}

#[test]
fn overlay_covers_every_cell() {
    let backend = RustBackend::new();
    let mut config = config("");
    config.overlay.opacity = 1.0;
    let assets = Assets {
        overlay: Some(png(4, 4, [10, 200, 30])),
        sticker: None,
    };
    let mut ctx = GenerationContext::new(Immediate);
    let run = Generator::new(&backend, &config).run(&sources(2), &assets, false, &mut ctx);

    assert!(run.outcome.is_completed());
    let sheet = backend.decode(&run.sheets[0].bytes).unwrap().to_rgb8();
    assert_eq!(center(&sheet, 0, 0), [10, 200, 30]);
    assert_eq!(center(&sheet, 1, 0), [10, 200, 30]);
}

// =========================================================================
// Export
// =========================================================================

#[test]
fn written_parts_combine_and_bundle() {
    let tmp = tempfile::TempDir::new().unwrap();
    let backend = RustBackend::new();
    let config = config("");
    let images = sources(6);
    let mut ctx = GenerationContext::new(Immediate);
    let run = Generator::new(&backend, &config).run(&images, &Assets::default(), false, &mut ctx);
    assert_eq!(run.sheets.len(), 2);

    let summary =
        export::write_parts(tmp.path(), &run.sheets, images.len(), config.export.quality).unwrap();
    assert_eq!(summary.total_bytes(), run.total_bytes());

    let read = export::read_summary(tmp.path(), &backend).unwrap();
    let parts = export::load_parts(tmp.path(), &read).unwrap();

    let combined = export::combine_sheets(
        &backend,
        &parts,
        read.known_source_count().unwrap(),
        read.quality,
        CombineLimits::desktop(),
    )
    .unwrap();
    assert_eq!((combined.width, combined.height), (100, 150));
    let tall = backend.decode(&combined.bytes).unwrap().to_rgb8();
    assert_eq!(center(&tall, 0, 0), color(0));
    assert_eq!(center(&tall, 1, 2), color(5));

    let archive = export::bundle_archive(&parts, read.format()).unwrap();
    let mut zip = zip::ZipArchive::new(Cursor::new(archive)).unwrap();
    assert_eq!(zip.len(), 2);
    let mut second = Vec::new();
    zip.by_name("Part_2.png")
        .unwrap()
        .read_to_end(&mut second)
        .unwrap();
    assert_eq!(second, parts[1]);
}

#[test]
fn combine_is_refused_for_too_many_images() {
    let backend = RustBackend::new();
    let parts = vec![png(10, 10, [0, 0, 0])];
    let result = export::combine_sheets(
        &backend,
        &parts,
        101,
        ExportQuality::LOSSLESS,
        CombineLimits::mobile(),
    );
    assert!(matches!(
        result,
        Err(ExportError::TooManyImages {
            count: 101,
            limit: 100
        })
    ));
}

// =========================================================================
// Loading from disk
// =========================================================================

#[test]
fn directory_images_load_in_order_and_render() {
    let tmp = tempfile::TempDir::new().unwrap();
    for i in 0..3 {
        std::fs::write(tmp.path().join(format!("photo-{i}.png")), png(20, 20, color(i))).unwrap();
    }
    std::fs::write(tmp.path().join("readme.txt"), b"skip me").unwrap();

    let images = source::load_sources(tmp.path()).unwrap();
    assert_eq!(images.len(), 3);

    let backend = RustBackend::new();
    let config = config("");
    let mut ctx = GenerationContext::new(Immediate);
    let run = Generator::new(&backend, &config).run(&images, &Assets::default(), false, &mut ctx);
    assert!(run.outcome.is_completed());
    assert_eq!(run.sheets[0].cell_count, 3);
}

#[test]
fn directory_images_are_read_per_cell() {
    let tmp = tempfile::TempDir::new().unwrap();
    for i in 0..3 {
        std::fs::write(tmp.path().join(format!("photo-{i}.png")), png(20, 20, color(i))).unwrap();
    }
    let images = source::load_sources(tmp.path()).unwrap();
    assert!(images.iter().all(|i| matches!(i.payload, Payload::File(_))));

    // Gone between loading and drawing: the cell becomes a placeholder
    std::fs::remove_file(tmp.path().join("photo-1.png")).unwrap();

    let backend = RustBackend::new();
    let config = config("");
    let mut ctx = GenerationContext::new(Immediate);
    let run = Generator::new(&backend, &config).run(&images, &Assets::default(), false, &mut ctx);
    assert!(run.outcome.is_completed());
    assert_eq!(run.sheets[0].placeholders, 1);

    let sheet = backend.decode(&run.sheets[0].bytes).unwrap().to_rgb8();
    assert_eq!(center(&sheet, 0, 0), color(0));
    assert_eq!(sheet.get_pixel(CELL + 2, 2).0, [0xf9, 0xf9, 0xf9]);
    assert_eq!(center(&sheet, 0, 1), color(2));
}
