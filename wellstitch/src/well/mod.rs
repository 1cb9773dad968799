//! Per-well orchestration.
//!
//! A well directory holds one `ch<N>` directory per channel. The reference
//! channel is stitched first, which leaves the tile layout tables in its
//! directory. Those tables are copied into every other channel directory before
//! that channel is fused at the same offsets. With more than one channel the
//! fused images are merged into one stack.
//!
//! ```text
//! A01/
//!   ch1/  r01c01f01.tiff ... TileConfiguration.txt TileConfiguration.registered.txt
//!   ch2/  r01c01f01.tiff ... (tables copied from the reference)
//!   Stitched/  A01_ch1.tif A01_ch2.tif A01.tif
//! ```
//!
//! Failures abort the well. Files written before the failure are left in place,
//! except that tile renaming only starts once every channel has a valid plan.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use common::file_utils::{file_name_str, files_with_extensions, subdirectories};
use regex::Regex;

use crate::config::{StitchConfig, CHANNEL_DIR_PREFIX, STITCHED_DIR_NAME};
use crate::engine::MacroEngine;
use crate::error::{FovError, WellError};
use crate::fov::{apply_fov_renames, plan_fov_renames, FovLayout};
use crate::stitch::StitchInvoker;

/// Extension of the layout tables the first pass leaves next to the tiles.
const ARTIFACT_EXTENSIONS: &[&str] = &["txt"];

static CHANNEL_DIR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^{}(\d+)$", CHANNEL_DIR_PREFIX)).expect("channel dir regex is valid")
});

/// A `ch<N>` directory of a well.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelDir {
    pub id: u32,
    pub name: String,
    pub path: PathBuf,
}

/// Outputs of one processed well.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WellReport {
    pub well: String,
    /// Fused image per channel, reference first. Also the channel order of the
    /// merged stack.
    pub fused: Vec<PathBuf>,
    /// Merged stack, `None` when the well has a single channel.
    pub merged: Option<PathBuf>,
}

/// Channel directories of `well_dir`, ordered by channel id.
pub fn channel_dirs(well: &str, well_dir: &Path) -> Result<Vec<ChannelDir>, WellError> {
    let dirs = subdirectories(well_dir).map_err(|source| WellError::List {
        well: well.to_string(),
        path: well_dir.to_path_buf(),
        source,
    })?;

    let mut channels: Vec<ChannelDir> = dirs
        .into_iter()
        .filter_map(|path| {
            let name = file_name_str(&path)?.to_string();
            let id = CHANNEL_DIR.captures(&name)?[1].parse().ok()?;
            Some(ChannelDir { id, name, path })
        })
        .collect();
    channels.sort_by(|a, b| a.id.cmp(&b.id).then_with(|| a.name.cmp(&b.name)));
    Ok(channels)
}

/// Stitch every channel of one well and merge the results.
pub fn process_well<E: MacroEngine>(
    well_dir: &Path,
    config: &StitchConfig,
    invoker: &StitchInvoker<E>,
) -> Result<WellReport, WellError> {
    let well = file_name_str(well_dir)
        .ok_or_else(|| WellError::InvalidWellDir(well_dir.to_path_buf()))?
        .to_string();
    tracing::info!(well = %well, "Processing well {}", well_dir.display());

    let stitched_dir = well_dir.join(STITCHED_DIR_NAME);
    fs::create_dir_all(&stitched_dir).map_err(|source| WellError::CreateOutputDir {
        well: well.clone(),
        path: stitched_dir.clone(),
        source,
    })?;

    let reference_name = config.reference_channel_dir();
    let (reference, peers): (Vec<ChannelDir>, Vec<ChannelDir>) = channel_dirs(&well, well_dir)?
        .into_iter()
        .partition(|c| c.name == reference_name);
    let reference = reference
        .into_iter()
        .next()
        .ok_or_else(|| WellError::MissingReferenceChannel {
            well: well.clone(),
            channel_dir: reference_name.clone(),
        })?;
    tracing::info!(
        well = %well,
        "Reference channel {}, {} other channel(s)",
        reference.name,
        peers.len()
    );

    if config.rename_fov() {
        rename_channels(&well, config, std::iter::once(&reference).chain(&peers))?;
    }

    let stitch_err = |source| WellError::Stitch {
        well: well.clone(),
        source,
    };

    let mut fused = Vec::with_capacity(peers.len() + 1);
    fused.push(
        invoker
            .stitch_first(
                &reference.path,
                &stitched_dir,
                &well,
                &reference.name,
                config.grid(),
            )
            .map_err(stitch_err)?,
    );

    let artifacts =
        files_with_extensions(&reference.path, ARTIFACT_EXTENSIONS).map_err(|source| {
            WellError::List {
                well: well.clone(),
                path: reference.path.clone(),
                source,
            }
        })?;
    tracing::debug!(well = %well, "{} layout artifact(s) to propagate", artifacts.len());

    for peer in &peers {
        copy_artifacts(&well, &artifacts, &peer.path)?;
        fused.push(
            invoker
                .stitch_remaining(&peer.path, &stitched_dir, &well, &peer.name)
                .map_err(stitch_err)?,
        );
        tracing::info!(well = %well, "Stitched channel {}", peer.name);
    }

    let merged = if peers.is_empty() {
        tracing::info!(well = %well, "Single channel, skipping merge");
        None
    } else {
        Some(
            invoker
                .merge(&stitched_dir, &well, &fused)
                .map_err(stitch_err)?,
        )
    };

    tracing::info!(well = %well, "Well done");
    Ok(WellReport {
        well,
        fused,
        merged,
    })
}

fn rename_channels<'a>(
    well: &str,
    config: &StitchConfig,
    channels: impl Iterator<Item = &'a ChannelDir>,
) -> Result<(), WellError> {
    let fov_err = |source| WellError::Fov {
        well: well.to_string(),
        source,
    };
    let layout = FovLayout::for_grid(config.grid()).map_err(fov_err)?;
    let plans = channels
        .map(|channel| Ok((channel, plan_fov_renames(&channel.path, &layout)?)))
        .collect::<Result<Vec<_>, FovError>>()
        .map_err(fov_err)?;
    for (channel, renames) in &plans {
        apply_fov_renames(&channel.path, renames).map_err(fov_err)?;
    }
    Ok(())
}

fn copy_artifacts(well: &str, artifacts: &[PathBuf], dest_dir: &Path) -> Result<(), WellError> {
    for artifact in artifacts {
        let Some(name) = artifact.file_name() else {
            continue;
        };
        let dest = dest_dir.join(name);
        tracing::debug!("Copying {} -> {}", artifact.display(), dest.display());
        fs::copy(artifact, &dest).map_err(|source| WellError::CopyArtifact {
            well: well.to_string(),
            from: artifact.clone(),
            to: dest.clone(),
            source,
        })?;
    }
    Ok(())
}
