//! Error types for configuration, renaming, engine calls and well processing.

use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

/// Invalid operator input, detected before any well is processed.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Measurement directory '{0}' does not exist or is not a directory")]
    MeasurementDirMissing(PathBuf),

    #[error("Reference channel must be a positive integer, got {0}")]
    InvalidReferenceChannel(u32),

    #[error("Fiji installation directory '{0}' does not exist")]
    FijiDirMissing(PathBuf),

    #[error("Fiji installation '{0}' has no plugins directory")]
    PluginsDirMissing(PathBuf),

    #[error("Invalid grid size '{0}': expected ROWSxCOLS with both at least 1")]
    InvalidGrid(String),

    #[error("Failed to read settings file '{path}': {source}")]
    ReadSettings {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse settings file '{path}': {source}")]
    ParseSettings {
        path: PathBuf,
        #[source]
        source: serde_yml::Error,
    },
}

/// Errors of the field-of-view renamer.
#[derive(Debug, Error)]
pub enum FovError {
    #[error("Invalid FOV layout: {0}")]
    InvalidLayout(String),

    #[error("FOV renaming supports only a {expected} grid, got {actual}")]
    UnsupportedGrid { expected: String, actual: String },

    #[error("Expected {expected} tile files in '{dir}', found {found}")]
    TileCountMismatch {
        dir: PathBuf,
        expected: usize,
        found: usize,
    },

    #[error("Tile '{file}' has field index {found}, expected {expected} in acquisition order")]
    OutOfOrder {
        file: String,
        expected: usize,
        found: usize,
    },

    #[error("Directory '{0}' was already renamed to snake order")]
    AlreadyRenamed(PathBuf),

    #[error("Failed to rename '{from}' to '{to}': {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to access '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Errors reported across the external engine boundary.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("No Fiji launcher found in '{0}'")]
    LauncherNotFound(PathBuf),

    #[error("Failed to stage macro '{script}': {source}")]
    StageScript {
        script: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to launch '{launcher}': {source}")]
    Launch {
        launcher: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Macro '{script}' failed ({status}): {output}")]
    ScriptFailed {
        script: String,
        status: String,
        output: String,
    },
}

impl EngineError {
    pub(crate) fn script_failed(script: &str, status: ExitStatus, output: String) -> Self {
        Self::ScriptFailed {
            script: script.to_string(),
            status: status.to_string(),
            output,
        }
    }
}

/// Errors of a single stitching request.
#[derive(Debug, Error)]
pub enum StitchError {
    #[error("Registered tile layout '{0}' is missing")]
    MissingRegisteredLayout(PathBuf),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Errors while processing one well.
#[derive(Debug, Error)]
pub enum WellError {
    #[error("Well '{well}' has no reference channel directory '{channel_dir}'")]
    MissingReferenceChannel { well: String, channel_dir: String },

    #[error("Well directory '{0}' has no usable name")]
    InvalidWellDir(PathBuf),

    #[error("Well '{well}': failed to create output directory '{path}': {source}")]
    CreateOutputDir {
        well: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Well '{well}': failed to copy '{from}' to '{to}': {source}")]
    CopyArtifact {
        well: String,
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Well '{well}': failed to list '{path}': {source}")]
    List {
        well: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Well '{well}': {source}")]
    Stitch {
        well: String,
        #[source]
        source: StitchError,
    },

    #[error("Well '{well}': {source}")]
    Fov {
        well: String,
        #[source]
        source: FovError,
    },

    #[error("Failed to list measurement directory '{path}': {source}")]
    ListMeasurement {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl WellError {
    /// Whether the batch may skip this well and continue.
    ///
    /// Only an engine that ran and reported a failed request is recoverable.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            WellError::Stitch {
                source: StitchError::Engine(EngineError::ScriptFailed { .. }),
                ..
            }
        )
    }
}
