use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Working tree of one reduced night:
///
/// ```text
/// r_<night>/
///   calibration/{bias,flat,master}
///   others/
///   science/{raw,reduced}
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FolderLayout {
    pub root: PathBuf,
}

impl FolderLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `r_<night>` next to the night directory, or inside `output` when given.
    pub fn for_night(night_dir: &Path, output: Option<&Path>) -> Self {
        let name = night_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "night".to_string());
        let parent = output
            .map(Path::to_path_buf)
            .or_else(|| night_dir.parent().map(Path::to_path_buf))
            .unwrap_or_default();
        Self::new(parent.join(format!("r_{}", name)))
    }

    pub fn bias_dir(&self) -> PathBuf {
        self.root.join("calibration").join("bias")
    }

    pub fn flat_dir(&self) -> PathBuf {
        self.root.join("calibration").join("flat")
    }

    pub fn master_dir(&self) -> PathBuf {
        self.root.join("calibration").join("master")
    }

    pub fn others_dir(&self) -> PathBuf {
        self.root.join("others")
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.root.join("science").join("raw")
    }

    pub fn reduced_dir(&self) -> PathBuf {
        self.root.join("science").join("reduced")
    }

    /// Create every folder; existing ones are left alone.
    pub fn create(&self) -> Result<()> {
        for dir in [
            self.bias_dir(),
            self.flat_dir(),
            self.master_dir(),
            self.others_dir(),
            self.raw_dir(),
            self.reduced_dir(),
        ] {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}
