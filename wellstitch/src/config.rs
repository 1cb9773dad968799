//! Validated, immutable run configuration.
//!
//! The three operator inputs (measurement directory, reference channel, Fiji
//! installation) are validated once by [`StitchConfigBuilder::build`]. Everything
//! else has defaults and may be overridden from a YAML [`Settings`] file.

use std::fmt;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Name of the per-well output directory.
pub const STITCHED_DIR_NAME: &str = "Stitched";

/// Prefix of channel directory names (`ch1`, `ch2`, ...).
pub const CHANNEL_DIR_PREFIX: &str = "ch";

/// Name of the Fiji plugins directory inside the installation.
pub const PLUGINS_DIR_NAME: &str = "plugins";

/// Tile grid dimensions of one well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSize {
    pub rows: u32,
    pub cols: u32,
}

impl Default for GridSize {
    fn default() -> Self {
        Self { rows: 3, cols: 3 }
    }
}

impl GridSize {
    pub fn new(rows: u32, cols: u32) -> Result<Self, ConfigError> {
        if rows == 0 || cols == 0 {
            return Err(ConfigError::InvalidGrid(format!("{}x{}", rows, cols)));
        }
        Ok(Self { rows, cols })
    }

    pub fn tile_count(&self) -> usize {
        self.rows as usize * self.cols as usize
    }
}

impl fmt::Display for GridSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.rows, self.cols)
    }
}

impl FromStr for GridSize {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidGrid(s.to_string());
        let (rows, cols) = s
            .trim()
            .split_once(['x', 'X'])
            .ok_or_else(invalid)?;
        let rows = rows.trim().parse().map_err(|_| invalid())?;
        let cols = cols.trim().parse().map_err(|_| invalid())?;
        Self::new(rows, cols).map_err(|_| invalid())
    }
}

/// ImageJ display lookup tables, named as the ImageJ commands that apply them.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
pub enum Lut {
    Grays,
    Red,
    Green,
    Blue,
    Cyan,
    Magenta,
    Yellow,
    Fire,
}

/// Parameters of the grid/collection stitching requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StitchParams {
    /// Nominal tile overlap in percent.
    pub tile_overlap: u32,
    pub first_file_index: u32,
    /// Tile file name pattern. `{well}` is replaced by the well name,
    /// `{ii}` is left for the engine to expand to the tile index.
    ///
    /// The default expects tiles exported as `<well>f01.tif`. Raw Phenix tiles
    /// (`r01c01f01.tiff`, the names the FOV renamer works on) need an override
    /// such as `r01c01f{ii}.tiff`.
    pub file_name_pattern: String,
    /// Initial tile layout written by the first pass.
    pub layout_file: String,
    /// Layout with computed offsets, replayed for every other channel.
    pub registered_layout_file: String,
    pub fusion_method: String,
    pub regression_threshold: f64,
    pub max_avg_displacement_threshold: f64,
    pub absolute_displacement_threshold: f64,
    pub subpixel_accuracy: bool,
    /// Trade speed for a lower memory footprint.
    pub save_memory: bool,
}

impl Default for StitchParams {
    fn default() -> Self {
        Self {
            tile_overlap: 5,
            first_file_index: 1,
            file_name_pattern: "{well}f{ii}.tif".to_string(),
            layout_file: "TileConfiguration.txt".to_string(),
            registered_layout_file: "TileConfiguration.registered.txt".to_string(),
            fusion_method: "Linear Blending".to_string(),
            regression_threshold: 0.30,
            max_avg_displacement_threshold: 2.50,
            absolute_displacement_threshold: 3.50,
            subpixel_accuracy: true,
            save_memory: true,
        }
    }
}

/// Parameters of the per-well channel merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeParams {
    /// Lookup table per channel, in channel order. Channels past the end keep
    /// the engine default.
    pub channel_luts: Vec<Lut>,
}

impl Default for MergeParams {
    fn default() -> Self {
        Self {
            channel_luts: vec![Lut::Red, Lut::Grays],
        }
    }
}

/// Optional settings file contents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub grid: GridSize,
    pub rename_fov: bool,
    pub stitch: StitchParams,
    pub merge: MergeParams,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadSettings {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text).map_err(|source| ConfigError::ParseSettings {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_yaml(text: &str) -> Result<Self, serde_yml::Error> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yml::from_str(text)
    }
}

/// Validated configuration of one batch run.
#[derive(Debug, Clone)]
pub struct StitchConfig {
    measurement_dir: PathBuf,
    reference_channel: NonZeroU32,
    fiji_dir: PathBuf,
    grid: GridSize,
    rename_fov: bool,
    stitch: StitchParams,
    merge: MergeParams,
}

impl StitchConfig {
    pub fn builder(
        measurement_dir: impl Into<PathBuf>,
        reference_channel: u32,
        fiji_dir: impl Into<PathBuf>,
    ) -> StitchConfigBuilder {
        StitchConfigBuilder {
            measurement_dir: measurement_dir.into(),
            reference_channel,
            fiji_dir: fiji_dir.into(),
            settings: Settings::default(),
        }
    }

    pub fn measurement_dir(&self) -> &Path {
        &self.measurement_dir
    }

    pub fn reference_channel(&self) -> NonZeroU32 {
        self.reference_channel
    }

    /// Directory name of the reference channel, e.g. `ch1`.
    pub fn reference_channel_dir(&self) -> String {
        format!("{}{}", CHANNEL_DIR_PREFIX, self.reference_channel)
    }

    pub fn fiji_dir(&self) -> &Path {
        &self.fiji_dir
    }

    pub fn plugins_dir(&self) -> PathBuf {
        self.fiji_dir.join(PLUGINS_DIR_NAME)
    }

    pub fn grid(&self) -> GridSize {
        self.grid
    }

    pub fn rename_fov(&self) -> bool {
        self.rename_fov
    }

    pub fn stitch(&self) -> &StitchParams {
        &self.stitch
    }

    pub fn merge(&self) -> &MergeParams {
        &self.merge
    }
}

#[derive(Debug, Clone)]
pub struct StitchConfigBuilder {
    measurement_dir: PathBuf,
    reference_channel: u32,
    fiji_dir: PathBuf,
    settings: Settings,
}

impl StitchConfigBuilder {
    /// Replace grid, rename switch, stitch and merge parameters.
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_grid(mut self, grid: GridSize) -> Self {
        self.settings.grid = grid;
        self
    }

    pub fn with_rename_fov(mut self, rename_fov: bool) -> Self {
        self.settings.rename_fov = rename_fov;
        self
    }

    pub fn build(self) -> Result<StitchConfig, ConfigError> {
        if !self.measurement_dir.is_dir() {
            return Err(ConfigError::MeasurementDirMissing(self.measurement_dir));
        }
        let reference_channel = NonZeroU32::new(self.reference_channel)
            .ok_or(ConfigError::InvalidReferenceChannel(self.reference_channel))?;
        if !self.fiji_dir.is_dir() {
            return Err(ConfigError::FijiDirMissing(self.fiji_dir));
        }
        if !self.fiji_dir.join(PLUGINS_DIR_NAME).is_dir() {
            return Err(ConfigError::PluginsDirMissing(self.fiji_dir));
        }
        let grid = GridSize::new(self.settings.grid.rows, self.settings.grid.cols)?;

        Ok(StitchConfig {
            measurement_dir: self.measurement_dir,
            reference_channel,
            fiji_dir: self.fiji_dir,
            grid,
            rename_fov: self.settings.rename_fov,
            stitch: self.settings.stitch,
            merge: self.settings.merge,
        })
    }
}
