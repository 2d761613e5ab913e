//! edgemirror-bench: CLI tool for running the pipeline on image files.
//!
//! Loads an image, resizes it to the configured dimensions, runs the
//! edge-detection pipeline with per-stage diagnostics, and optionally
//! writes the output as a PNG. Useful for:
//!
//! - Checking the edge map of a real photo
//! - Comparing the sequential and parallel convolution schedules
//! - Measuring per-stage durations to identify bottlenecks
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin edgemirror-bench -- [OPTIONS] <IMAGE_PATH>
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::Parser;
use edgemirror_pipeline::diagnostics::{Clock, PipelineDiagnostics, StageEvent, duration_ms};
use edgemirror_pipeline::{ConvolutionSchedule, PipelineConfig, ProcessResult};
use image::imageops::FilterType;
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};

/// Prewitt edge detection and mirroring for image files.
///
/// Runs the pipeline on a given image and prints per-stage timing and
/// metric diagnostics.
#[derive(Parser)]
#[command(name = "edgemirror-bench", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    image_path: PathBuf,

    /// Write the output image (PNG) to this path.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Width the input is resized to before processing.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_WIDTH, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    width: u32,

    /// Height the input is resized to before processing.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_HEIGHT, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    height: u32,

    /// Run the two convolutions back to back instead of forking them.
    #[arg(long)]
    sequential: bool,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output diagnostics as JSON instead of human-readable report.
    #[arg(long)]
    json: bool,

    /// Full pipeline config as a JSON string.
    ///
    /// When provided, `--width`, `--height` and `--sequential` are
    /// ignored. The JSON must be a valid `PipelineConfig` serialization;
    /// missing fields take their defaults.
    #[arg(long)]
    config_json: Option<String>,

    /// Increase log verbosity (`-v` debug, `-vv` trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Build a [`PipelineConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and the
/// individual parameter flags are ignored.
fn config_from_cli(cli: &Cli) -> Result<PipelineConfig, String> {
    let config = if let Some(ref json) = cli.config_json {
        serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"))?
    } else {
        PipelineConfig {
            schedule: if cli.sequential {
                ConvolutionSchedule::Sequential
            } else {
                ConvolutionSchedule::Parallel
            },
            ..PipelineConfig::with_dimensions(cli.width, cli.height)
        }
    };
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

const fn level_from_verbosity(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Load `path` and resize it to the configured dimensions as RGBA bytes.
fn load_rgba(path: &Path, config: &PipelineConfig) -> Result<Vec<u8>, image::ImageError> {
    let image = image::open(path)?;
    log::info!(
        "loaded {} ({}x{})",
        path.display(),
        image.width(),
        image.height()
    );
    let resized = image.resize_exact(
        config.dimensions.width,
        config.dimensions.height,
        FilterType::Triangle,
    );
    Ok(resized.into_rgba8().into_raw())
}

fn write_output(path: &Path, result: ProcessResult) {
    let Some(image) = result.into_image() else {
        log::error!("output buffer does not match its dimensions");
        return;
    };
    match image.save(path) {
        Ok(()) => eprintln!(
            "Output written to {} ({}x{})",
            path.display(),
            image.width(),
            image.height()
        ),
        Err(e) => log::error!("Error writing {}: {e}", path.display()),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = TermLogger::init(
        level_from_verbosity(cli.verbose),
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    ) {
        eprintln!("Error installing logger: {e}");
    }

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let rgba = match load_rgba(&cli.image_path, &config) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error reading {}: {e}", cli.image_path.display());
            return ExitCode::FAILURE;
        }
    };

    eprintln!(
        "Image: {} resized to {} ({} bytes)",
        cli.image_path.display(),
        config.dimensions,
        rgba.len(),
    );
    eprintln!("Config: {config:#?}");
    eprintln!("Runs: {}", cli.runs);
    eprintln!();

    let mut all_diagnostics = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        let mut progress = |event: &StageEvent| {
            log::info!(
                "[{}/5] {} done in {:.3}ms",
                event.index,
                event.stage,
                duration_ms(event.elapsed)
            );
        };

        match edgemirror_pipeline::process_with_diagnostics(&rgba, &config, &StdClock, &mut progress)
        {
            Ok((result, diagnostics)) => {
                if cli.json {
                    match serde_json::to_string_pretty(&diagnostics) {
                        Ok(json) => println!("{json}"),
                        Err(e) => {
                            eprintln!("Error serializing diagnostics: {e}");
                            return ExitCode::FAILURE;
                        }
                    }
                } else {
                    println!("{}", diagnostics.report());
                }

                // Write the image on the first run only.
                if run == 0
                    && let Some(ref output) = cli.output
                {
                    write_output(output, result);
                }

                all_diagnostics.push(diagnostics);
            }
            Err(e) => {
                eprintln!("Pipeline error: {e}");
                return ExitCode::FAILURE;
            }
        }

        if cli.runs > 1 {
            eprintln!();
        }
    }

    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    ExitCode::SUCCESS
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[PipelineDiagnostics]) {
    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    if all_diagnostics.is_empty() {
        println!("Warning: no diagnostics to summarize");
        return;
    }

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| duration_ms(d.total_duration))
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    println!();
    println!("{:<24} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(40));

    let names = all_diagnostics[0].stages().map(|(name, _)| name);
    for (index, name) in names.iter().enumerate() {
        let total: f64 = all_diagnostics
            .iter()
            .map(|d| duration_ms(d.stages()[index].1.duration))
            .sum();
        let stage_mean = total / all_diagnostics.len() as f64;
        println!("{name:<24} {stage_mean:>10.3}ms");
    }
}
