//! Command-line interface implementation
//!
//! This module provides the CLI entry point and dispatches to submodules
//! for specific command implementations.

mod export;
mod import;
mod pack;

use crate::atlas::SheetExportSettings;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Level;

/// Exit codes
pub(crate) const EXIT_SUCCESS: u8 = 0;
pub(crate) const EXIT_ERROR: u8 = 1;
pub(crate) const EXIT_INVALID_ARGS: u8 = 2;

/// Pixelaria - Pack animation frames into sprite sheets
#[derive(Parser)]
#[command(name = "pxa")]
#[command(about = "Pixelaria - Pack animation frames into sprite sheets with JSON descriptors")]
#[command(version)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Export every sheet of a pixelaria.toml project
    Export {
        /// Config file (default: search upwards for pixelaria.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the output directory
        #[arg(long)]
        out: Option<PathBuf>,

        /// Override the animation source directory
        #[arg(long)]
        src: Option<PathBuf>,

        /// Number of sheets exported in parallel
        #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
        jobs: Option<u64>,

        /// Only export the sheets with these names
        #[arg(long)]
        sheet: Vec<String>,

        /// Report progress as JSON lines on stderr
        #[arg(long)]
        json_progress: bool,
    },

    /// Pack animation directories into one sheet
    Pack {
        /// Directories of PNG frames, one per animation
        #[arg(required = true)]
        dirs: Vec<PathBuf>,

        /// Output base path; `.png` and `.json` are appended
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        settings: SettingsArgs,
    },

    /// Slice an exported sheet back into frame PNGs
    Import {
        /// Sheet descriptor (.json)
        input: PathBuf,

        /// Output directory; one subdirectory per animation
        #[arg(short, long)]
        output: PathBuf,
    },
}

/// Sheet export settings as command-line flags
#[derive(Args, Debug, Clone, Default)]
pub struct SettingsArgs {
    /// Horizontal padding around each frame (pixels)
    #[arg(long, default_value = "0")]
    pub padding_x: u32,

    /// Vertical padding around each frame (pixels)
    #[arg(long, default_value = "0")]
    pub padding_y: u32,

    /// Store identical frames separately
    #[arg(long)]
    pub no_reuse: bool,

    /// Round sheet dimensions up to powers of two
    #[arg(long)]
    pub power_of_two: bool,

    /// Keep the empty borders of frames
    #[arg(long)]
    pub no_trim: bool,

    /// Try more layouts to find a smaller sheet
    #[arg(long)]
    pub high_precision: bool,

    /// Keep frames in insertion order
    #[arg(long)]
    pub ordered: bool,

    /// Give every frame a cell the size of the largest frame
    #[arg(long)]
    pub uniform_grid: bool,

    /// Prefer square sheets over minimal area
    #[arg(long)]
    pub favor_ratio: bool,

    /// Do not write the JSON descriptor
    #[arg(long)]
    pub no_json: bool,

    /// Do not expand descriptor rectangles by the padding
    #[arg(long)]
    pub no_json_padding: bool,
}

impl SettingsArgs {
    pub fn to_settings(&self) -> SheetExportSettings {
        SheetExportSettings {
            export_json: !self.no_json,
            use_padding_on_json: !self.no_json_padding,
            x_padding: self.padding_x,
            y_padding: self.padding_y,
            reuse_identical_frames: !self.no_reuse,
            force_power_of_two: self.power_of_two,
            force_minimum_dimensions: !self.no_trim,
            high_precision_area_matching: self.high_precision,
            allow_unordered_frames: !self.ordered,
            use_uniform_grid: self.uniform_grid,
            favor_ratio_over_area: self.favor_ratio,
        }
    }
}

/// Install the stderr log subscriber.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Export { config, out, src, jobs, sheet, json_progress } => export::run_export(
            config.as_deref(),
            out.as_deref(),
            src.as_deref(),
            jobs.map(|j| j as usize),
            &sheet,
            json_progress,
            cli.verbose > 0,
        ),
        Commands::Pack { dirs, output, settings } => pack::run_pack(&dirs, &output, &settings.to_settings()),
        Commands::Import { input, output } => import::run_import(&input, &output),
    }
}
