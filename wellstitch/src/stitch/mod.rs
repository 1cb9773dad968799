//! Stitching requests submitted to the engine.
//!
//! Three requests exist per well:
//! - the first pass over the reference channel, which computes tile offsets and
//!   writes the layout tables next to the tiles,
//! - the replay pass for every other channel, which reads the registered table,
//! - the merge of the fused channel images into one multi-channel stack, in the
//!   order the caller lists them.

mod options;

use std::path::{Path, PathBuf};

pub use options::OptionString;

use crate::config::{GridSize, MergeParams, StitchConfig, StitchParams};
use crate::engine::{MacroArgs, MacroEngine, MacroScript};
use crate::error::StitchError;

pub const FIRST_PASS_SCRIPT: &str = "stitch_first";
pub const REPLAY_SCRIPT: &str = "stitch_remaining";
pub const MERGE_SCRIPT: &str = "merge_channels";

const STITCHING_PLUGIN: &str = "Grid/Collection stitching";

/// Joins the image paths handed to the merge macro.
pub const MERGE_PATH_SEPARATOR: &str = "|";

/// `<well>_<channel>.tif`
pub fn fused_file_name(well: &str, channel: &str) -> String {
    format!("{}_{}.tif", well, channel)
}

/// `<well>.tif`
pub fn merged_file_name(well: &str) -> String {
    format!("{}.tif", well)
}

/// Submits stitching and merge requests for one engine.
#[derive(Debug)]
pub struct StitchInvoker<E> {
    engine: E,
    params: StitchParams,
    merge: MergeParams,
}

impl<E: MacroEngine> StitchInvoker<E> {
    pub fn new(engine: E, params: StitchParams, merge: MergeParams) -> Self {
        Self {
            engine,
            params,
            merge,
        }
    }

    pub fn from_config(engine: E, config: &StitchConfig) -> Self {
        Self::new(engine, config.stitch().clone(), config.merge().clone())
    }

    pub fn params(&self) -> &StitchParams {
        &self.params
    }

    /// Register and fuse the `grid` tiles of `source_dir`.
    ///
    /// The engine writes the layout tables into `source_dir`. Returns the path of
    /// the fused image in `dest_dir`.
    pub fn stitch_first(
        &self,
        source_dir: &Path,
        dest_dir: &Path,
        well: &str,
        channel: &str,
        grid: GridSize,
    ) -> Result<PathBuf, StitchError> {
        let (script, args) =
            first_pass_request(&self.params, source_dir, dest_dir, well, channel, grid);
        self.engine.run_macro(&script, &args)?;
        Ok(dest_dir.join(fused_file_name(well, channel)))
    }

    /// Fuse the tiles of `source_dir` at the offsets of its registered layout table.
    pub fn stitch_remaining(
        &self,
        source_dir: &Path,
        dest_dir: &Path,
        well: &str,
        channel: &str,
    ) -> Result<PathBuf, StitchError> {
        let layout = source_dir.join(&self.params.registered_layout_file);
        if !layout.is_file() {
            return Err(StitchError::MissingRegisteredLayout(layout));
        }

        let (script, args) = replay_request(&self.params, source_dir, dest_dir, well, channel);
        self.engine.run_macro(&script, &args)?;
        Ok(dest_dir.join(fused_file_name(well, channel)))
    }

    /// Stack `images` into `<dir>/<well>.tif`, one channel per image in the given order.
    pub fn merge(&self, dir: &Path, well: &str, images: &[PathBuf]) -> Result<PathBuf, StitchError> {
        let (script, args) = merge_request(&self.merge, dir, well, images);
        self.engine.run_macro(&script, &args)?;
        Ok(dir.join(merged_file_name(well)))
    }
}

fn computation_parameters(params: &StitchParams) -> &'static str {
    if params.save_memory {
        "Save memory (but be slower)"
    } else {
        "Save computation time (but use more RAM)"
    }
}

/// Options shared by both stitching passes, after the layout-specific ones.
fn fusion_options(options: OptionString, params: &StitchParams) -> OptionString {
    options
        .bracketed("fusion_method", &params.fusion_method)
        .value(
            "regression_threshold",
            format!("{:.2}", params.regression_threshold),
        )
        .value(
            "max/avg_displacement_threshold",
            format!("{:.2}", params.max_avg_displacement_threshold),
        )
        .value(
            "absolute_displacement_threshold",
            format!("{:.2}", params.absolute_displacement_threshold),
        )
}

pub(crate) fn first_pass_options(params: &StitchParams) -> OptionString {
    let options = OptionString::new()
        .bracketed("type", "Grid: snake by rows")
        .bracketed("order", "Right & Down                ")
        .param("grid_size_x", "width")
        .param("grid_size_y", "height")
        .value("tile_overlap", params.tile_overlap)
        .value("first_file_index_i", params.first_file_index)
        .bracketed_param("directory", "orgDir")
        .bracketed_param("file_names", "fileNames")
        .bracketed("output_textfile_name", &params.layout_file);

    fusion_options(options, params)
        .flag("compute_overlap")
        .flag_if("subpixel_accuracy", params.subpixel_accuracy)
        .bracketed("computation_parameters", computation_parameters(params))
        .bracketed("image_output", "Fuse and display")
}

pub(crate) fn replay_options(params: &StitchParams) -> OptionString {
    let options = OptionString::new()
        .bracketed("type", "Positions from file")
        .bracketed("order", "Defined by TileConfiguration")
        .bracketed_param("directory", "orgDir")
        .bracketed("layout_file", &params.registered_layout_file);

    fusion_options(options, params)
        .flag_if("subpixel_accuracy", params.subpixel_accuracy)
        .bracketed("computation_parameters", computation_parameters(params))
        .bracketed("image_output", "Fuse and display")
}

fn parameter_header(names: &[&str]) -> String {
    names
        .iter()
        .map(|name| format!("#@ String {}\n", name))
        .collect()
}

/// Stitch call, then save the fused image as `<saveDir>/<wellName>_<chName>.tif`.
fn stitch_and_save_source(params: &[&str], options: &OptionString) -> String {
    format!(
        "{header}\
setBatchMode(true);
run(\"{plugin}\", {options});
saveAs(\"Tiff\", saveDir + File.separator + wellName + \"_\" + chName + \".tif\");
close(\"*\");
",
        header = parameter_header(params),
        plugin = STITCHING_PLUGIN,
        options = options.to_macro_expr(),
    )
}

pub(crate) fn first_pass_request(
    params: &StitchParams,
    source_dir: &Path,
    dest_dir: &Path,
    well: &str,
    channel: &str,
    grid: GridSize,
) -> (MacroScript, MacroArgs) {
    let source = stitch_and_save_source(
        &[
            "orgDir",
            "saveDir",
            "wellName",
            "chName",
            "fileNames",
            "height",
            "width",
        ],
        &first_pass_options(params),
    );
    let args = MacroArgs::new()
        .with("orgDir", source_dir.display())
        .with("saveDir", dest_dir.display())
        .with("wellName", well)
        .with("chName", channel)
        .with("fileNames", params.file_name_pattern.replace("{well}", well))
        .with("height", grid.rows)
        .with("width", grid.cols);

    (MacroScript::new(FIRST_PASS_SCRIPT, source), args)
}

pub(crate) fn replay_request(
    params: &StitchParams,
    source_dir: &Path,
    dest_dir: &Path,
    well: &str,
    channel: &str,
) -> (MacroScript, MacroArgs) {
    let source = stitch_and_save_source(
        &["orgDir", "saveDir", "wellName", "chName"],
        &replay_options(params),
    );
    let args = MacroArgs::new()
        .with("orgDir", source_dir.display())
        .with("saveDir", dest_dir.display())
        .with("wellName", well)
        .with("chName", channel);

    (MacroScript::new(REPLAY_SCRIPT, source), args)
}

pub(crate) fn merge_request(
    merge: &MergeParams,
    dir: &Path,
    well: &str,
    images: &[PathBuf],
) -> (MacroScript, MacroArgs) {
    let luts: String = merge
        .channel_luts
        .iter()
        .take(images.len())
        .enumerate()
        .map(|(i, lut)| format!("Stack.setChannel({});\nrun(\"{}\");\n", i + 1, lut))
        .collect();

    let stack_options = OptionString::new()
        .bracketed("method", "Scale (smallest)")
        .bracketed_param("name", "wellName");
    let reorder_options = OptionString::new()
        .bracketed("channels", "Slices (z)")
        .bracketed("slices", "Channels (c)")
        .bracketed("frames", "Frames (t)");

    let source = format!(
        "{header}\
setBatchMode(true);
images = split(imagePaths, \"{separator}\");
for (i = 0; i < images.length; i++) {{
    open(images[i]);
}}
run(\"Images to Stack\", {stack});
run(\"Re-order Hyperstack ...\", {reorder});
{luts}\
saveAs(\"Tiff\", saveDir + File.separator + wellName + \".tif\");
close(\"*\");
",
        header = parameter_header(&["imagePaths", "saveDir", "wellName"]),
        separator = MERGE_PATH_SEPARATOR,
        stack = stack_options.to_macro_expr(),
        reorder = reorder_options.to_macro_expr(),
        luts = luts,
    );
    let image_paths = images
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(MERGE_PATH_SEPARATOR);
    let args = MacroArgs::new()
        .with("imagePaths", image_paths)
        .with("saveDir", dir.display())
        .with("wellName", well);

    (MacroScript::new(MERGE_SCRIPT, source), args)
}
