use anyhow::Result;

use crate::args::Cli;

const LOG_FILE_PREFIX: &str = "wellstitch";

pub fn init(cli: &Cli) -> Result<()> {
    common::log_setup::setup_logging(&cli.log_level, &cli.log_dir, LOG_FILE_PREFIX)?;
    tracing::debug!("wellstitch {} starting", env!("CARGO_PKG_VERSION"));

    Ok(())
}
