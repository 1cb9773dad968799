//! File utility functions for listing and filtering directory entries.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Supported TIFF image file extensions.
pub const TIFF_EXTENSIONS: &[&str] = &["tif", "tiff"];

/// Returns paths to all immediate subdirectories of `dir`, sorted by name.
pub fn subdirectories(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Returns paths to all files in a directory matching the given extensions, sorted by name.
/// Extensions are matched case-insensitively.
pub fn files_with_extensions(dir: &Path, extensions: &[&str]) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");
        if extensions.contains(&ext.to_ascii_lowercase().as_str()) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Returns the final path component as UTF-8, if there is one.
pub fn file_name_str(path: &Path) -> Option<&str> {
    path.file_name().and_then(|name| name.to_str())
}
