//! Wellstitch - tile stitching driver for multi-well plate microscopy.
//!
//! Each well of a measurement holds one tile directory per channel. Tiles of a
//! reference channel are registered and fused by an external engine (Fiji's
//! Grid/Collection stitching); the computed tile offsets are then replayed for
//! every other channel and the fused channels are merged into one stack.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use wellstitch::{process_measurement, FijiEngine, StitchConfig};
//!
//! let config = StitchConfig::builder("/data/plate1", 1, "/opt/Fiji.app").build()?;
//! let engine = FijiEngine::locate(config.fiji_dir())?;
//! let report = process_measurement(&config, &engine)?;
//!
//! println!("{} wells stitched", report.completed.len());
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod fov;
pub mod measurement;
pub mod stitch;
pub mod well;

#[cfg(test)]
pub(crate) mod testing;

// ============================================================================
// Configuration
// ============================================================================

pub use config::{GridSize, Lut, MergeParams, Settings, StitchConfig, StitchParams};

// ============================================================================
// Errors
// ============================================================================

pub use error::{ConfigError, EngineError, FovError, StitchError, WellError};

// ============================================================================
// Engine boundary
// ============================================================================

pub use engine::{FijiEngine, MacroArgs, MacroEngine, MacroScript};

// ============================================================================
// Pipeline
// ============================================================================

pub use fov::{apply_fov_renames, plan_fov_renames, rename_fov, FovLayout, FovRename};
pub use measurement::{process_measurement, BatchReport, SkippedWell};
pub use stitch::StitchInvoker;
pub use well::{process_well, WellReport};
