use clap::{Parser, Subcommand};
use gridsheet::config::{self, CollageConfig};
use gridsheet::export::{self, CombineLimits, RunSummary};
use gridsheet::generate::{GenerationContext, Generator, RunOutcome};
use gridsheet::imaging::RustBackend;
use gridsheet::indices::IndexExpr;
use gridsheet::schedule::{CancelToken, PacedScheduler};
use gridsheet::source::{self, SourceImage};
use gridsheet::{layout, naming, output};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing_subscriber::EnvFilter;

/// Shared flags for commands that read source images.
#[derive(clap::Args, Clone)]
struct InputArgs {
    /// Directory of source images
    #[arg(long, default_value = "images")]
    input: PathBuf,

    /// Drop mask targets and renumber the rest instead of masking them
    #[arg(long)]
    repack: bool,

    /// Skip images with the same name and size as an earlier one
    #[arg(long)]
    dedupe: bool,
}

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "gridsheet")]
#[command(about = "Numbered collage sheets from large, ordered image sets")]
#[command(long_about = "\
Numbered collage sheets from large, ordered image sets

Images are read from a directory, ordered by modification time then name,
and laid out row by row into fixed-column sheets. Every cell is numbered;
cells listed in [mask] indices are crossed out or stickered.

Output structure:

  collage/
  ├── Part_1.jpg                   # Sheets, one file each (png at quality 1.0)
  ├── Part_2.jpg
  ├── summary.json                 # Sizes, source count, quality
  ├── Combined_<millis>.jpg        # 'combine': all sheets stacked
  └── Collage_<millis>.zip         # 'bundle': all sheets zipped

Mask indices accept lists and ranges: \"1-9, 20\", \"3~5 7\", \"12、15\".

Run 'gridsheet gen-config' to generate a documented gridsheet.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Config file (missing file means defaults)
    #[arg(long, default_value = "gridsheet.toml", global = true)]
    config: PathBuf,

    /// Output directory for sheets and exports
    #[arg(long, default_value = "collage", global = true)]
    output: PathBuf,

    /// Log more (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render sheets and write them as Part_<n> files
    Generate(InputArgs),
    /// Stack the written sheets into one tall image
    Combine,
    /// Zip the written sheets into one archive
    Bundle,
    /// Generate, then bundle (and optionally combine)
    Build {
        #[command(flatten)]
        input: InputArgs,
        /// Also write the combined image
        #[arg(long)]
        combine: bool,
    },
    /// Validate config and print the sheet plan without rendering
    Check(InputArgs),
    /// Print a stock gridsheet.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;
    let backend = RustBackend::with_max_surface_pixels(cfg.device.max_surface_pixels);

    match &cli.command {
        Command::Generate(input) => {
            generate(&cli, &cfg, &backend, input)?;
        }
        Command::Combine => combine(&cfg, &backend, &cli.output)?,
        Command::Bundle => bundle(&backend, &cli.output)?,
        Command::Build { input, combine: also_combine } => {
            println!("==> Stage 1: Rendering {}", input.input.display());
            generate(&cli, &cfg, &backend, input)?;

            println!("==> Stage 2: Bundling");
            bundle(&backend, &cli.output)?;

            if *also_combine {
                println!("==> Stage 3: Combining");
                combine(&cfg, &backend, &cli.output)?;
            }
            println!("==> Build complete: {}", cli.output.display());
        }
        Command::Check(input) => {
            println!("==> Checking {}", input.input.display());
            let count = if input.dedupe {
                load_inputs(input)?.len()
            } else {
                source::find_image_files(&input.input)?.len()
            };
            let targets = IndexExpr::parse(&cfg.mask.indices);
            let plan = layout::plan_run(
                count,
                &cfg.layout,
                cfg.numbering.start,
                &targets.set,
                input.repack,
            )?;
            output::print_check_output(&plan, &targets, count);
            println!("==> Config is valid");
        }
        Command::GenConfig => {}
    }

    Ok(())
}

/// Log to stderr, `warn` by default, raised by `-v`.
fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_inputs(input: &InputArgs) -> Result<Vec<SourceImage>, Box<dyn Error>> {
    let mut sources = source::load_sources(&input.input)?;
    if input.dedupe {
        let removed = source::remove_duplicates(&mut sources);
        if removed > 0 {
            println!("Skipped {removed} duplicate images");
        }
    }
    Ok(sources)
}

fn generate(
    cli: &Cli,
    cfg: &CollageConfig,
    backend: &RustBackend,
    input: &InputArgs,
) -> Result<RunSummary, Box<dyn Error>> {
    let sources = load_inputs(input)?;
    let base_dir = cli.config.parent().unwrap_or(Path::new("."));
    let assets = source::load_assets(cfg, base_dir)?;

    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            for line in output::format_generation_event(&event) {
                println!("{}", line);
            }
        }
    });
    let mut ctx = GenerationContext::new(PacedScheduler::from_config(&cfg.pacing))
        .with_cancel(interrupt_token()?)
        .with_events(tx);
    let run = Generator::new(backend, cfg).run(&sources, &assets, input.repack, &mut ctx);
    // Closes the channel so the printer drains and exits
    drop(ctx);
    printer.join().map_err(|_| "progress printer panicked")?;

    let summary = export::write_parts(&cli.output, &run.sheets, sources.len(), cfg.export.quality)?;
    output::print_run_summary(&summary);

    match run.outcome {
        RunOutcome::Completed => Ok(summary),
        RunOutcome::Cancelled => Err("generation cancelled".into()),
        RunOutcome::Failed(e) => Err(e.into()),
    }
}

/// A token tripped by the first Ctrl-C; a second one exits at once.
///
/// Sheets finished before the interrupt are still written.
fn interrupt_token() -> Result<CancelToken, ctrlc::Error> {
    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    ctrlc::set_handler(move || {
        if trigger.is_cancelled() {
            std::process::exit(130);
        }
        eprintln!("Interrupted; stopping after the current cell (Ctrl-C again to quit)");
        trigger.cancel();
    })?;
    Ok(cancel)
}

fn combine(cfg: &CollageConfig, backend: &RustBackend, dir: &Path) -> Result<(), Box<dyn Error>> {
    let summary = export::read_summary(dir, backend)?;
    let parts = export::load_parts(dir, &summary)?;
    let combined = export::combine_sheets(
        backend,
        &parts,
        summary.known_source_count()?,
        summary.quality,
        CombineLimits::from_device(&cfg.device),
    )?;
    let path = dir.join(naming::combined_filename(unix_millis(), combined.format));
    std::fs::write(&path, &combined.bytes)?;
    output::print_combined_output(&path, &combined);
    Ok(())
}

fn bundle(backend: &RustBackend, dir: &Path) -> Result<(), Box<dyn Error>> {
    let summary = export::read_summary(dir, backend)?;
    let parts = export::load_parts(dir, &summary)?;
    let path = dir.join(naming::archive_filename(unix_millis()));
    let file = std::fs::File::create(&path)?;
    export::write_archive(file, &parts, summary.format())?;
    let bytes = std::fs::metadata(&path)?.len() as usize;
    output::print_archive_output(&path, parts.len(), bytes);
    Ok(())
}

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}
