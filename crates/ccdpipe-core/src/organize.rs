use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use crate::frame::grouping_value;
use crate::io;

/// Move every FITS file in `dir` into a subdirectory named after its value
/// of `key`. Returns the map from value to subdirectory.
///
/// All headers are classified before anything is moved, so a frame without
/// the key leaves the directory untouched.
pub fn separate_by_key(dir: &Path, key: &str) -> Result<BTreeMap<String, PathBuf>> {
    let files = io::list_fits_files(dir)?;

    let mut plan: Vec<(PathBuf, String)> = Vec::with_capacity(files.len());
    for path in files {
        let header = io::read_header(&path)?;
        let folder = grouping_value(&header, key)
            .and_then(|v| folder_name(&v))
            .ok_or_else(|| PipelineError::Organization {
                path: path.clone(),
                key: key.to_string(),
            })?;
        plan.push((path, folder));
    }

    let mut groups: BTreeMap<String, PathBuf> = BTreeMap::new();
    for (path, value) in plan {
        let target_dir = groups
            .entry(value.clone())
            .or_insert_with(|| dir.join(&value))
            .clone();
        fs::create_dir_all(&target_dir)?;
        move_file(&path, &target_dir.join(io::file_name(&path)))?;
    }

    info!(
        dir = %dir.display(),
        key,
        groups = groups.len(),
        "Frames separated"
    );
    Ok(groups)
}

/// Apply [`separate_by_key`] level by level, e.g. OBJECT, then FILTER inside
/// each object folder, then EXPTIME. Returns the leaf directories.
pub fn separate_tree(dir: &Path, keys: &[&str]) -> Result<Vec<PathBuf>> {
    let Some((key, rest)) = keys.split_first() else {
        return Ok(vec![dir.to_path_buf()]);
    };

    let mut leaves = Vec::new();
    for sub in separate_by_key(dir, key)?.into_values() {
        leaves.extend(separate_tree(&sub, rest)?);
    }
    Ok(leaves)
}

/// Copy files into `dest` (created if absent). Returns the new paths.
pub fn copy_files(files: &[PathBuf], dest: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dest)?;
    let mut copied = Vec::with_capacity(files.len());
    for file in files {
        let target = dest.join(io::file_name(file));
        fs::copy(file, &target)?;
        debug!(from = %file.display(), to = %target.display(), "Copied");
        copied.push(target);
    }
    info!(count = copied.len(), dest = %dest.display(), "Files copied");
    Ok(copied)
}

/// Move files into `dest` (created if absent). Returns the new paths.
pub fn move_files(files: &[PathBuf], dest: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dest)?;
    let mut moved = Vec::with_capacity(files.len());
    for file in files {
        let target = dest.join(io::file_name(file));
        move_file(file, &target)?;
        moved.push(target);
    }
    info!(count = moved.len(), dest = %dest.display(), "Files moved");
    Ok(moved)
}

fn move_file(from: &Path, to: &Path) -> Result<()> {
    if fs::rename(from, to).is_err() {
        // rename fails across filesystems
        fs::copy(from, to)?;
        fs::remove_file(from)?;
    }
    debug!(from = %from.display(), to = %to.display(), "Moved");
    Ok(())
}

/// Folder for a header value: path separators become `_`, and values that
/// would not name a child of the directory (empty, `.`, `..`) are rejected.
fn folder_name(value: &str) -> Option<String> {
    let name = value.replace(['/', '\\'], "_");
    match name.trim() {
        "" | "." | ".." => None,
        _ => Some(name),
    }
}
