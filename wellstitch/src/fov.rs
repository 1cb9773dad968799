//! Field-of-view renaming from acquisition order to snake order.
//!
//! The instrument numbers fields in acquisition order. Grid stitching in
//! "snake by rows" mode expects the index to follow the snake traversal, so
//! every tile's `f<n>` segment is rewritten through a fixed [`FovLayout`].
//!
//! Renaming is in place and not idempotent. A marker file is written into the
//! directory afterwards and a second pass is rejected with
//! [`FovError::AlreadyRenamed`].

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use common::file_utils::{file_name_str, files_with_extensions, TIFF_EXTENSIONS};
use regex::Regex;

use crate::config::GridSize;
use crate::error::FovError;

/// Written into a channel directory once its tiles are in snake order.
pub const RENAMED_MARKER: &str = ".fov_renamed";

const TEMP_PREFIX: &str = ".fov_tmp_";

static TILE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<prefix>.*?r\d+c\d+)f(?P<field>\d+)(?P<ext>\.(?i:tiff?))$")
        .expect("tile name regex is valid")
});

/// Mapping from acquisition index (1-based position) to snake index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FovLayout {
    grid: GridSize,
    order: Vec<u32>,
}

impl FovLayout {
    /// Validates that `order` is a permutation of `1..=rows*cols`.
    pub fn new(grid: GridSize, order: Vec<u32>) -> Result<Self, FovError> {
        if order.len() != grid.tile_count() {
            return Err(FovError::InvalidLayout(format!(
                "{} entries for a {} grid",
                order.len(),
                grid
            )));
        }
        let mut sorted = order.clone();
        sorted.sort_unstable();
        if sorted.iter().zip(1u32..).any(|(&v, expected)| v != expected) {
            return Err(FovError::InvalidLayout(format!(
                "{:?} is not a permutation of 1..={}",
                order,
                order.len()
            )));
        }
        Ok(Self { grid, order })
    }

    /// The 3x3 acquisition-to-snake table of the Opera Phenix field layout.
    pub fn snake_3x3() -> Self {
        Self {
            grid: GridSize { rows: 3, cols: 3 },
            order: vec![5, 1, 4, 7, 8, 2, 3, 6, 9],
        }
    }

    /// Layout for `grid`. Only 3x3 has a known table.
    pub fn for_grid(grid: GridSize) -> Result<Self, FovError> {
        let layout = Self::snake_3x3();
        if grid != layout.grid {
            return Err(FovError::UnsupportedGrid {
                expected: layout.grid.to_string(),
                actual: grid.to_string(),
            });
        }
        Ok(layout)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Snake index for the 1-based acquisition index.
    pub fn target(&self, acquisition_index: usize) -> Option<u32> {
        acquisition_index
            .checked_sub(1)
            .and_then(|i| self.order.get(i))
            .copied()
    }
}

/// One planned rename inside a channel directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FovRename {
    pub from: String,
    pub to: String,
}

/// Computes the renames for `dir` without touching the filesystem.
pub fn plan_fov_renames(dir: &Path, layout: &FovLayout) -> Result<Vec<FovRename>, FovError> {
    if dir.join(RENAMED_MARKER).exists() {
        return Err(FovError::AlreadyRenamed(dir.to_path_buf()));
    }

    let io_err = |source| FovError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut names: Vec<String> = files_with_extensions(dir, TIFF_EXTENSIONS)
        .map_err(io_err)?
        .iter()
        .filter_map(|path| file_name_str(path))
        .filter(|name| TILE_NAME.is_match(name))
        .map(str::to_string)
        .collect();
    names.sort();

    plan_names(dir, &names, layout)
}

fn plan_names(dir: &Path, names: &[String], layout: &FovLayout) -> Result<Vec<FovRename>, FovError> {
    if names.len() != layout.len() {
        return Err(FovError::TileCountMismatch {
            dir: dir.to_path_buf(),
            expected: layout.len(),
            found: names.len(),
        });
    }

    names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let acquisition_index = i + 1;
            let out_of_order = |found| FovError::OutOfOrder {
                file: name.clone(),
                expected: acquisition_index,
                found,
            };
            let caps = TILE_NAME.captures(name).ok_or_else(|| out_of_order(0))?;
            let digits = &caps["field"];
            let field: usize = digits.parse().unwrap_or(0);
            if field != acquisition_index {
                return Err(out_of_order(field));
            }
            let target = layout
                .target(acquisition_index)
                .ok_or_else(|| out_of_order(field))?;
            let width = digits.len().max(2);
            Ok(FovRename {
                from: name.clone(),
                to: format!(
                    "{}f{:0width$}{}",
                    &caps["prefix"],
                    target,
                    &caps["ext"],
                    width = width
                ),
            })
        })
        .collect()
}

/// Renames the tiles of `dir` into snake order and marks the directory.
pub fn rename_fov(dir: &Path, layout: &FovLayout) -> Result<Vec<FovRename>, FovError> {
    let renames = plan_fov_renames(dir, layout)?;
    apply_fov_renames(dir, &renames)?;
    Ok(renames)
}

/// Applies renames from [`plan_fov_renames`] and writes the marker.
///
/// Renames go through temporary names first, so a tile is never overwritten
/// by another tile that has not been moved yet.
pub fn apply_fov_renames(dir: &Path, renames: &[FovRename]) -> Result<(), FovError> {
    let staged: Vec<(PathBuf, PathBuf)> = renames
        .iter()
        .map(|r| {
            (
                dir.join(format!("{}{}", TEMP_PREFIX, r.to)),
                dir.join(&r.to),
            )
        })
        .collect();

    for (rename, (temp, _)) in renames.iter().zip(&staged) {
        move_file(&dir.join(&rename.from), temp)?;
    }
    for (temp, target) in &staged {
        move_file(temp, target)?;
    }

    let record: String = renames
        .iter()
        .map(|r| format!("{} -> {}\n", r.from, r.to))
        .collect();
    let marker = dir.join(RENAMED_MARKER);
    fs::write(&marker, record).map_err(|source| FovError::Io {
        path: marker,
        source,
    })?;

    tracing::info!(dir = %dir.display(), tiles = renames.len(), "Renamed fields to snake order");
    Ok(())
}

fn move_file(from: &Path, to: &Path) -> Result<(), FovError> {
    tracing::debug!("Renaming {} -> {}", from.display(), to.display());
    fs::rename(from, to).map_err(|source| FovError::Rename {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_tiles(dir: &Path, count: usize) {
        for i in 1..=count {
            let name = format!("r02c03f{:02}.tiff", i);
            fs::write(dir.join(&name), &name).unwrap();
        }
    }

    #[test]
    fn test_snake_table_is_bijection() {
        let layout = FovLayout::snake_3x3();
        let mut targets: Vec<u32> = (1..=9).map(|i| layout.target(i).unwrap()).collect();
        assert_eq!(targets, vec![5, 1, 4, 7, 8, 2, 3, 6, 9]);
        targets.sort();
        assert_eq!(targets, (1..=9).collect::<Vec<_>>());
        assert_eq!(layout.target(0), None);
        assert_eq!(layout.target(10), None);
    }

    #[test]
    fn test_layout_rejects_non_permutation() {
        let grid = GridSize { rows: 2, cols: 2 };
        assert!(FovLayout::new(grid, vec![1, 2, 3, 4]).is_ok());
        assert!(matches!(
            FovLayout::new(grid, vec![1, 1, 3, 4]),
            Err(FovError::InvalidLayout(_))
        ));
        assert!(matches!(
            FovLayout::new(grid, vec![1, 2, 3]),
            Err(FovError::InvalidLayout(_))
        ));
    }

    #[test]
    fn test_only_3x3_grid_supported() {
        assert!(FovLayout::for_grid(GridSize::default()).is_ok());
        let err = FovLayout::for_grid(GridSize { rows: 4, cols: 4 }).unwrap_err();
        assert!(matches!(err, FovError::UnsupportedGrid { .. }));
    }

    #[test]
    fn test_rename_moves_each_tile_to_its_snake_index() {
        let temp_dir = TempDir::new().unwrap();
        write_tiles(temp_dir.path(), 9);
        fs::write(temp_dir.path().join("notes.txt"), "keep").unwrap();

        let renames = rename_fov(temp_dir.path(), &FovLayout::snake_3x3()).unwrap();
        assert_eq!(renames.len(), 9);
        assert_eq!(renames[0].from, "r02c03f01.tiff");
        assert_eq!(renames[0].to, "r02c03f05.tiff");

        // Every target holds the content of the acquisition tile mapped onto it.
        let expected = [5, 1, 4, 7, 8, 2, 3, 6, 9];
        for (i, target) in expected.iter().enumerate() {
            let content =
                fs::read_to_string(temp_dir.path().join(format!("r02c03f{:02}.tiff", target)))
                    .unwrap();
            assert_eq!(content, format!("r02c03f{:02}.tiff", i + 1));
        }

        assert!(temp_dir.path().join("notes.txt").exists());
        assert!(temp_dir.path().join(RENAMED_MARKER).exists());
        let leftovers = fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(TEMP_PREFIX))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_second_pass_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        write_tiles(temp_dir.path(), 9);
        let layout = FovLayout::snake_3x3();

        rename_fov(temp_dir.path(), &layout).unwrap();
        let err = rename_fov(temp_dir.path(), &layout).unwrap_err();
        assert!(matches!(err, FovError::AlreadyRenamed(_)));

        // Nothing moved on the rejected pass.
        let content = fs::read_to_string(temp_dir.path().join("r02c03f05.tiff")).unwrap();
        assert_eq!(content, "r02c03f01.tiff");
    }

    #[test]
    fn test_wrong_tile_count_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        write_tiles(temp_dir.path(), 8);

        let err = rename_fov(temp_dir.path(), &FovLayout::snake_3x3()).unwrap_err();
        assert!(matches!(
            err,
            FovError::TileCountMismatch {
                expected: 9,
                found: 8,
                ..
            }
        ));
        assert!(!temp_dir.path().join(RENAMED_MARKER).exists());
    }

    #[test]
    fn test_gap_in_acquisition_order_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        write_tiles(temp_dir.path(), 8);
        fs::write(temp_dir.path().join("r02c03f10.tiff"), "x").unwrap();

        let err = plan_fov_renames(temp_dir.path(), &FovLayout::snake_3x3()).unwrap_err();
        assert!(matches!(
            err,
            FovError::OutOfOrder {
                expected: 9,
                found: 10,
                ..
            }
        ));
    }

    #[test]
    fn test_plan_keeps_extension_and_single_digit_fields() {
        let names: Vec<String> = (1..=9).map(|i| format!("r1c1f{}.TIF", i)).collect();
        let renames = plan_names(Path::new("."), &names, &FovLayout::snake_3x3()).unwrap();
        assert_eq!(renames[1].to, "r1c1f01.TIF");
        assert_eq!(renames[8].to, "r1c1f09.TIF");
    }

    #[test]
    fn test_plan_does_not_touch_files() {
        let temp_dir = TempDir::new().unwrap();
        write_tiles(temp_dir.path(), 9);

        let renames = plan_fov_renames(temp_dir.path(), &FovLayout::snake_3x3()).unwrap();
        assert_eq!(renames.len(), 9);
        let content = fs::read_to_string(temp_dir.path().join("r02c03f01.tiff")).unwrap();
        assert_eq!(content, "r02c03f01.tiff");
        assert!(!temp_dir.path().join(RENAMED_MARKER).exists());
    }
}
