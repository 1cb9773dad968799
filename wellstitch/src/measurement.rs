//! Batch driver over all wells of a measurement.

use std::path::Path;

use common::file_utils::{file_name_str, subdirectories};

use crate::config::{StitchConfig, STITCHED_DIR_NAME};
use crate::engine::MacroEngine;
use crate::error::WellError;
use crate::stitch::StitchInvoker;
use crate::well::{process_well, WellReport};

/// A well skipped after a recoverable failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedWell {
    pub well: String,
    pub reason: String,
}

/// Outcome of a whole measurement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub completed: Vec<WellReport>,
    pub skipped: Vec<SkippedWell>,
}

impl BatchReport {
    pub fn well_count(&self) -> usize {
        self.completed.len() + self.skipped.len()
    }
}

/// Stitch every well directory under the measurement directory, in name order.
///
/// A well failing with a recoverable error is logged and skipped. Any other
/// error aborts the remaining batch.
pub fn process_measurement<E: MacroEngine>(
    config: &StitchConfig,
    engine: E,
) -> Result<BatchReport, WellError> {
    let measurement_dir = config.measurement_dir();
    let wells = subdirectories(measurement_dir).map_err(|source| WellError::ListMeasurement {
        path: measurement_dir.to_path_buf(),
        source,
    })?;
    let wells: Vec<_> = wells
        .into_iter()
        .filter(|dir| file_name_str(dir) != Some(STITCHED_DIR_NAME))
        .collect();

    tracing::info!(
        "Stitching {} well(s) in {} (reference channel {}, grid {})",
        wells.len(),
        measurement_dir.display(),
        config.reference_channel(),
        config.grid()
    );

    let invoker = StitchInvoker::from_config(engine, config);
    let mut report = BatchReport::default();

    for well_dir in &wells {
        match process_well(well_dir, config, &invoker) {
            Ok(well_report) => report.completed.push(well_report),
            Err(err) if err.is_recoverable() => {
                let well = well_name(well_dir);
                tracing::warn!(well = %well, "Error stitching well, skipping: {}", err);
                report.skipped.push(SkippedWell {
                    well,
                    reason: err.to_string(),
                });
            }
            Err(err) => {
                tracing::error!("Aborting batch at {}: {}", well_dir.display(), err);
                return Err(err);
            }
        }
    }

    tracing::info!(
        "Batch finished: {} stitched, {} skipped",
        report.completed.len(),
        report.skipped.len()
    );
    Ok(report)
}

fn well_name(well_dir: &Path) -> String {
    well_dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| well_dir.display().to_string())
}
