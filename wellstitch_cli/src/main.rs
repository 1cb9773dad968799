mod args;
mod init;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use wellstitch::{
    plan_fov_renames, process_measurement, rename_fov, FijiEngine, FovLayout, StitchConfig,
};

use crate::args::{Cli, Command, RenameFovArgs, StitchArgs};

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) = init::init(&cli) {
        eprintln!("Failed to initialize logging: {:#}", err);
        return ExitCode::FAILURE;
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Command::Stitch(args) => stitch(args),
        Command::RenameFov(args) => rename(args),
    }
}

fn stitch(args: &StitchArgs) -> Result<()> {
    let config: StitchConfig = args.to_config()?;

    let engine = match &args.launcher {
        Some(launcher) => FijiEngine::new(launcher, config.fiji_dir()),
        None => FijiEngine::locate(config.fiji_dir())?,
    };

    let report = process_measurement(&config, &engine).context("Batch aborted")?;

    for well in &report.completed {
        match &well.merged {
            Some(merged) => println!("{}: {}", well.well, merged.display()),
            None => {
                if let Some(fused) = well.fused.first() {
                    println!("{}: {} (single channel)", well.well, fused.display());
                }
            }
        }
    }
    for skipped in &report.skipped {
        println!("{}: skipped ({})", skipped.well, skipped.reason);
    }
    println!(
        "{} of {} well(s) stitched",
        report.completed.len(),
        report.well_count()
    );

    Ok(())
}

fn rename(args: &RenameFovArgs) -> Result<()> {
    let layout = FovLayout::snake_3x3();
    let renames = if args.dry_run {
        plan_fov_renames(&args.channel_dir, &layout)
    } else {
        rename_fov(&args.channel_dir, &layout)
    }
    .with_context(|| format!("Failed to rename tiles in {}", args.channel_dir.display()))?;

    for r in &renames {
        println!("{} -> {}", r.from, r.to);
    }
    Ok(())
}
