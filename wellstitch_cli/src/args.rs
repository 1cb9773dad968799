use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use wellstitch::{GridSize, Settings, StitchConfig};

#[derive(Parser, Debug)]
#[command(name = "wellstitch", version, about = "Stitch per-well microscopy tiles with Fiji")]
pub struct Cli {
    /// Directory for rolling log files.
    #[arg(long, default_value = "logs", global = true)]
    pub log_dir: PathBuf,
    /// Log filter used when RUST_LOG is unset.
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Stitch every well of a measurement.
    Stitch(StitchArgs),
    /// Rename the tiles of one channel directory into snake order.
    RenameFov(RenameFovArgs),
}

#[derive(Args, Debug)]
pub struct StitchArgs {
    /// Measurement directory, one subdirectory per well.
    #[arg(long)]
    pub measurement: PathBuf,
    /// Channel whose tiles define the registration, e.g. 1 for `ch1`.
    #[arg(long)]
    pub reference_channel: u32,
    /// Fiji.app installation directory.
    #[arg(long)]
    pub fiji: PathBuf,
    /// YAML settings file with grid, stitching and merge parameters.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Tile grid as ROWSxCOLS, overrides the settings file.
    #[arg(long)]
    pub grid: Option<GridSize>,
    /// Rename tiles into snake order before stitching.
    #[arg(long)]
    pub rename_fov: bool,
    /// Fiji launcher executable, when it is not in a standard location.
    #[arg(long)]
    pub launcher: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct RenameFovArgs {
    /// Channel directory holding the tiles.
    pub channel_dir: PathBuf,
    /// Print the planned renames without touching any file.
    #[arg(long)]
    pub dry_run: bool,
}

impl StitchArgs {
    /// Settings file values, overridden by command-line flags, validated.
    pub fn to_config(&self) -> Result<StitchConfig> {
        let mut settings = match &self.config {
            Some(path) => Settings::load(path)?,
            None => Settings::default(),
        };
        if let Some(grid) = self.grid {
            settings.grid = grid;
        }
        if self.rename_fov {
            settings.rename_fov = true;
        }

        StitchConfig::builder(&self.measurement, self.reference_channel, &self.fiji)
            .with_settings(settings)
            .build()
            .context("Invalid configuration")
    }
}
