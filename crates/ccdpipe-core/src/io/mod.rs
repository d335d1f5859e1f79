pub mod fits;
pub mod fits_writer;
pub mod header;

use std::path::{Path, PathBuf};

use crate::consts::FITS_EXTENSIONS;
use crate::error::Result;

pub use fits::{read_frame, read_header, FitsReader};
pub use fits_writer::write_frame;
pub use header::{Card, Header, HeaderValue};

/// Whether a path has one of the recognised FITS extensions.
pub fn is_fits_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| FITS_EXTENSIONS.iter().any(|x| e.eq_ignore_ascii_case(x)))
        .unwrap_or(false)
}

/// FITS files directly inside `dir`, sorted by file name.
pub fn list_fits_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_fits_file(&path) {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// File name as a string, for headers and logs.
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
