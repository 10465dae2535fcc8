//! pixelsheet - Turn images into colored spreadsheets and back
//!
//! A command-line tool for exporting an image as a grid of filled cells and
//! for rebuilding an image from such a grid.

use clap::{Args, Parser, Subcommand};
use log::{info, LevelFilter};
use pixelsheet::pipeline::{DEFAULT_GRID_SIZE, DEFAULT_UPSCALE};
use pixelsheet::{run, Config, Mode, RunReport};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "pixelsheet")]
#[command(version)]
#[command(about = "Turn images into colored spreadsheets and back", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log per-stage details
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Args)]
struct GridArgs {
    /// Grid width in cells (GX)
    #[arg(short = 'W', long, default_value_t = DEFAULT_GRID_SIZE, allow_negative_numbers = true)]
    width: i64,

    /// Grid height in cells (GY)
    #[arg(short = 'H', long, default_value_t = DEFAULT_GRID_SIZE, allow_negative_numbers = true)]
    height: i64,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert an image into a spreadsheet of colored cells
    Export {
        /// Input image file (PNG, JPEG, BMP, GIF, WebP, TIFF)
        input: PathBuf,

        /// Output spreadsheet (.xlsx)
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        grid: GridArgs,
    },

    /// Convert a spreadsheet of colored cells into an image
    Import {
        /// Input spreadsheet (.xlsx)
        input: PathBuf,

        /// Output image file; format follows the extension (default PNG)
        #[arg(short, long)]
        output: PathBuf,

        /// Upscale factor K: every cell becomes a KxK block
        #[arg(short = 'k', long, default_value_t = DEFAULT_UPSCALE, allow_negative_numbers = true)]
        upscale: i64,
    },

    /// Export an image, then import the spreadsheet just written
    Both {
        /// Input image file
        input: PathBuf,

        /// Intermediate spreadsheet (.xlsx)
        #[arg(short, long)]
        sheet: PathBuf,

        /// Output image file
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        grid: GridArgs,

        /// Upscale factor K
        #[arg(short = 'k', long, default_value_t = DEFAULT_UPSCALE, allow_negative_numbers = true)]
        upscale: i64,
    },

    /// Run the conversions described by a JSON config file
    Run {
        /// Config file
        config: PathBuf,
    },
}

impl Commands {
    fn into_config(self) -> Result<Config, Box<dyn std::error::Error>> {
        let config = match self {
            Commands::Export {
                input,
                output,
                grid,
            } => Config {
                mode: Mode::Export,
                input_image: Some(input),
                spreadsheet: output,
                output_image: None,
                grid_width: grid.width,
                grid_height: grid.height,
                upscale: DEFAULT_UPSCALE,
            },
            Commands::Import {
                input,
                output,
                upscale,
            } => Config {
                mode: Mode::Import,
                input_image: None,
                spreadsheet: input,
                output_image: Some(output),
                grid_width: DEFAULT_GRID_SIZE,
                grid_height: DEFAULT_GRID_SIZE,
                upscale,
            },
            Commands::Both {
                input,
                sheet,
                output,
                grid,
                upscale,
            } => Config {
                mode: Mode::Both,
                input_image: Some(input),
                spreadsheet: sheet,
                output_image: Some(output),
                grid_width: grid.width,
                grid_height: grid.height,
                upscale,
            },
            Commands::Run { config } => Config::load(&config)?,
        };
        Ok(config)
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else if quiet {
        LevelFilter::Warn
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .format_target(false)
        .init();
}

fn summarize(report: &RunReport) {
    if let Some(stats) = &report.export {
        info!(
            "Export: {}x{} cells, {} fill styles",
            stats.width, stats.height, stats.styles_created
        );
    }
    if let Some(outcome) = &report.import {
        info!(
            "Import: {}x{} grid, {} colored cells -> {}x{} image",
            outcome.grid_width,
            outcome.grid_height,
            outcome.filled_cells,
            outcome.image_width,
            outcome.image_height
        );
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let config = cli.command.into_config()?;
    let started = Instant::now();

    let report = run(&config)?;
    summarize(&report);

    info!(
        "Total execution time: {:.2} seconds",
        started.elapsed().as_secs_f64()
    );
    Ok(())
}
