//! scanflow-bench: CLI tool for running images through streaming chains.
//!
//! Decodes an image, streams it through a chain of stages under an
//! optional backpressure pattern, and prints the run report. Useful for:
//!
//! - Checking that results do not change under consumer stalls
//! - Comparing tick counts and stall ratios across chain layouts
//! - Inspecting the per-frame histogram of a chain's output
//! - Writing the processed frame out as a PNG for visual inspection
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin scanflow-bench -- [OPTIONS] <IMAGE_PATH>
//! ```
//!
//! Set `RUST_LOG=debug` to see chain construction and frame events.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use image::ImageFormat;
use log::{info, warn};
use scanflow_pipeline::raster;
use scanflow_pipeline::stages::Histogram;
use scanflow_pipeline::token::max_value;
use scanflow_pipeline::{Backpressure, Chain, ChainConfig, RunOutput, Stage, StageConfig};

/// Stream an image through a scanflow chain and report on the run.
///
/// Stages run in the order given. Windowed stages shrink the frame by
/// their kernel size minus one on each axis.
#[derive(Parser)]
#[command(name = "scanflow-bench", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    image_path: PathBuf,

    /// Stage to append to the chain; repeat for more stages.
    #[arg(long = "stage", value_enum, default_values = ["blur3", "edge"])]
    stages: Vec<StageArg>,

    /// Threshold for the threshold stage.
    #[arg(long, default_value_t = 128)]
    threshold: u32,

    /// Output value for pixels above the threshold (defaults to the
    /// pixel maximum).
    #[arg(long)]
    threshold_max: Option<u32>,

    /// Invert the threshold classification.
    #[arg(long)]
    invert: bool,

    /// Output width of the scale stage.
    #[arg(long, default_value_t = 320)]
    scale_width: usize,

    /// Output height of the scale stage.
    #[arg(long, default_value_t = 240)]
    scale_height: usize,

    /// Bits per pixel (per channel for packed color input).
    #[arg(long, default_value_t = ChainConfig::DEFAULT_PIXEL_WIDTH, value_parser = clap::value_parser!(u32).range(1..=16))]
    pixel_width: u32,

    /// Widest frame the row buffers can hold.
    #[arg(long, default_value_t = ChainConfig::DEFAULT_MAX_IMAGE_WIDTH)]
    max_image_width: usize,

    /// Make the sink stall on every N-th tick.
    #[arg(long)]
    stall_every: Option<u64>,

    /// Number of runs for averaging wall-clock time.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Write the first output frame to this file (always PNG-encoded).
    #[arg(long)]
    output: Option<PathBuf>,

    /// Output the run report as JSON instead of human-readable text.
    #[arg(long)]
    json: bool,

    /// Full chain config as a JSON string.
    ///
    /// When provided, all stage and width flags are ignored. The JSON
    /// must be a valid `ChainConfig` serialization.
    #[arg(long)]
    config_json: Option<String>,
}

/// Stage selection.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum StageArg {
    /// Packed RGB to luma.
    ColorReduce,
    /// Binary threshold.
    Threshold,
    /// 3x3 binomial blur.
    Blur3,
    /// 5x5 binomial blur.
    Blur5,
    /// 3x3 gradient magnitude.
    Edge,
    /// 3x3 median.
    Median,
    /// Per-frame histogram (pass-through).
    Histogram,
    /// Nearest-neighbor downscale.
    Scale,
}

/// Build a [`ChainConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual stage flags are ignored.
fn config_from_cli(cli: &Cli) -> Result<ChainConfig, String> {
    let config = if let Some(ref json) = cli.config_json {
        serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"))?
    } else {
        let stages = cli
            .stages
            .iter()
            .map(|stage| match stage {
                StageArg::ColorReduce => StageConfig::ColorReduce,
                StageArg::Threshold => StageConfig::Threshold {
                    threshold: cli.threshold,
                    max_value: cli
                        .threshold_max
                        .unwrap_or_else(|| max_value(cli.pixel_width)),
                    invert: cli.invert,
                },
                StageArg::Blur3 => StageConfig::Blur3,
                StageArg::Blur5 => StageConfig::Blur5,
                StageArg::Edge => StageConfig::Edge,
                StageArg::Median => StageConfig::Median,
                StageArg::Histogram => StageConfig::Histogram,
                StageArg::Scale => StageConfig::Scale {
                    width: cli.scale_width,
                    height: cli.scale_height,
                },
            })
            .collect();
        ChainConfig {
            pixel_width: cli.pixel_width,
            max_image_width: cli.max_image_width,
            stages,
        }
    };
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let image_bytes = match std::fs::read(&cli.image_path) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error reading {}: {e}", cli.image_path.display());
            return ExitCode::FAILURE;
        }
    };

    let image = match raster::decode(&image_bytes) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("Error decoding {}: {e}", cli.image_path.display());
            return ExitCode::FAILURE;
        }
    };

    let size = raster::image_size(image.width(), image.height());
    if let Err(e) = config.check_frame_size(size) {
        eprintln!(
            "{}: {e} (raise --max-image-width)",
            cli.image_path.display()
        );
        return ExitCode::FAILURE;
    }
    let color_input = matches!(config.stages.first(), Some(StageConfig::ColorReduce));
    let tokens = if color_input {
        raster::rgb_tokens(&image.to_rgb8(), config.pixel_width)
    } else {
        raster::gray_tokens(&image.to_luma8(), config.pixel_width)
    };
    let backpressure = cli
        .stall_every
        .map_or(Backpressure::Always, |period| Backpressure::StallEvery { period });

    info!(
        "image {} ({}x{}, {} bytes, {} input)",
        cli.image_path.display(),
        size.width,
        size.height,
        image_bytes.len(),
        if color_input { "rgb" } else { "gray" },
    );
    info!(
        "chain: {}",
        config
            .stages
            .iter()
            .map(StageConfig::name)
            .collect::<Vec<_>>()
            .join(" -> ")
    );

    let mut durations = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        let mut chain = match Chain::from_config(&config, size) {
            Ok(chain) => chain,
            Err(e) => {
                eprintln!("Chain error: {e}");
                return ExitCode::FAILURE;
            }
        };
        info!(
            "depth {} ticks, first-pixel latency {} ticks",
            chain.depth(),
            chain.latency(size)
        );

        let start = Instant::now();
        let output = match scanflow_pipeline::run(&mut chain, tokens.iter().copied(), &backpressure)
        {
            Ok(output) => output,
            Err(e) => {
                eprintln!("Run error: {e}");
                return ExitCode::FAILURE;
            }
        };
        let elapsed = start.elapsed();
        durations.push((elapsed, output.report.ticks));

        if cli.json {
            match serde_json::to_string_pretty(&output.report) {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    eprintln!("Error serializing report: {e}");
                    return ExitCode::FAILURE;
                }
            }
        } else {
            println!("{}", output.report.report());
            println!("Wall time: {:.3}ms", elapsed.as_secs_f64() * 1000.0);
        }

        if run == 0 {
            if let Some(histogram) = chain.find::<Histogram>() {
                print_histogram_summary(histogram);
            }
            if let Some(ref path) = cli.output {
                write_output(&chain, &output, size, config.pixel_width, path);
            }
        }

        if cli.runs > 1 {
            eprintln!();
        }
    }

    if cli.runs > 1 {
        print_multi_run_summary(&durations);
    }

    ExitCode::SUCCESS
}

/// Write the first output frame as a grayscale PNG.
fn write_output(
    chain: &Chain,
    output: &RunOutput,
    input: scanflow_pipeline::FrameSize,
    pixel_width: u32,
    path: &std::path::Path,
) {
    let frames = raster::split_frames(&output.tokens);
    let Some(frame) = frames.first() else {
        warn!("chain produced no output frame; nothing written");
        return;
    };
    let out_size = chain.output_size(input);
    let result = raster::frame_to_gray(out_size, frame, pixel_width)
        .map_err(|e| e.to_string())
        .and_then(|img| {
            img.save_with_format(path, ImageFormat::Png)
                .map_err(|e| e.to_string())
        });
    match result {
        Ok(()) => eprintln!(
            "Output written to {} ({}x{})",
            path.display(),
            out_size.width,
            out_size.height,
        ),
        Err(e) => eprintln!("Error writing output to {}: {e}", path.display()),
    }
}

/// Print the occupied bins of the last completed histogram frame.
fn print_histogram_summary(histogram: &Histogram) {
    if !histogram.frame_done() {
        warn!("histogram frame did not complete");
        return;
    }
    let bins = histogram.bins();
    let occupied = bins.iter().filter(|&&count| count > 0).count();
    let peak = bins
        .iter()
        .enumerate()
        .max_by_key(|&(_, &count)| count)
        .map_or((0, 0), |(bin, &count)| (bin, count));
    println!();
    println!("Histogram\n{}", "=".repeat(60));
    println!(
        "Pixels: {}  |  Occupied bins: {occupied}  |  Peak: bin {} ({} pixels)",
        bins.iter().map(|&c| u64::from(c)).sum::<u64>(),
        peak.0,
        peak.1,
    );
}

/// Print aggregated wall-clock statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(runs: &[(Duration, u64)]) {
    println!();
    println!("Summary ({} runs)\n{}", runs.len(), "=".repeat(60));

    if runs.is_empty() {
        println!("Warning: no runs to summarize");
        return;
    }

    let millis: Vec<f64> = runs
        .iter()
        .map(|(d, _)| d.as_secs_f64() * 1000.0)
        .collect();
    let min = millis.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = millis.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = millis.iter().sum::<f64>() / millis.len() as f64;
    println!("Wall time: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    let total_ticks: u64 = runs.iter().map(|(_, ticks)| ticks).sum();
    let total_secs: f64 = runs.iter().map(|(d, _)| d.as_secs_f64()).sum();
    if total_secs > 0.0 {
        println!(
            "Throughput: {:.0} ticks/s",
            total_ticks as f64 / total_secs
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("scanflow-bench").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn default_chain_is_blur_then_edge() {
        let config = config_from_cli(&parse(&["in.png"])).unwrap();
        assert_eq!(config.stages, vec![StageConfig::Blur3, StageConfig::Edge]);
        assert_eq!(config.pixel_width, ChainConfig::DEFAULT_PIXEL_WIDTH);
    }

    #[test]
    fn threshold_max_defaults_to_pixel_maximum() {
        let cli = parse(&["in.png", "--stage", "threshold", "--pixel-width", "10"]);
        let config = config_from_cli(&cli).unwrap();
        assert_eq!(
            config.stages,
            vec![StageConfig::Threshold {
                threshold: 128,
                max_value: 1023,
                invert: false,
            }]
        );
    }

    #[test]
    fn config_json_overrides_flags() {
        let cli = parse(&[
            "in.png",
            "--stage",
            "median",
            "--config-json",
            r#"{"stages": [{"kind": "histogram"}]}"#,
        ]);
        let config = config_from_cli(&cli).unwrap();
        assert_eq!(config.stages, vec![StageConfig::Histogram]);
    }

    #[test]
    fn invalid_config_is_reported() {
        let cli = parse(&["in.png", "--config-json", r#"{"pixel_width": 0}"#]);
        assert!(config_from_cli(&cli).is_err());
    }

    #[test]
    fn image_wider_than_max_width_is_rejected() {
        let cli = parse(&["in.png", "--max-image-width", "16"]);
        let config = config_from_cli(&cli).unwrap();
        assert!(config.check_frame_size(raster::image_size(20, 4)).is_err());
        assert!(config.check_frame_size(raster::image_size(16, 4)).is_ok());
    }
}
