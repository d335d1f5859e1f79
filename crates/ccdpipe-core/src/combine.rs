use std::fs;
use std::path::{Path, PathBuf};

use chrono::DateTime;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::consts::{
    ALIGNED_PREFIX, COMBINED_PREFIX, DEFAULT_BATCH_SIZE, KEY_AIRMASS, KEY_DATE_OBS, KEY_IMAGE,
    KEY_INPUT_PREFIX, KEY_JD, KEY_NCOMBINE,
};
use crate::error::{PipelineError, Result};
use crate::frame::{format_timestamp, parse_timestamp, Frame};
use crate::io::{self, Header};
use crate::stack::{check_shapes, load_frames, median_combine, to_volume};

/// Batching of a sorted frame sequence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Frames per combined output.
    pub size: usize,
    /// Frames shared by consecutive batches.
    pub overlap: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_BATCH_SIZE,
            overlap: 0,
        }
    }
}

impl BatchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.size == 0 {
            return Err(PipelineError::InvalidConfiguration(
                "batch size must be at least 1".into(),
            ));
        }
        if self.overlap >= self.size {
            return Err(PipelineError::InvalidConfiguration(format!(
                "overlap ({}) must be smaller than batch size ({})",
                self.overlap, self.size
            )));
        }
        Ok(())
    }
}

/// Windows of `size` items advancing by `size - overlap`. A final window that
/// would run past the end is dropped.
pub fn chunk<T: Clone>(items: &[T], size: usize, overlap: usize) -> Result<Vec<Vec<T>>> {
    BatchConfig { size, overlap }.validate()?;

    let step = size - overlap;
    let mut windows = Vec::new();
    let mut start = 0;
    while start + size <= items.len() {
        windows.push(items[start..start + size].to_vec());
        start += step;
    }
    Ok(windows)
}

/// Median-combine one batch of aligned frames.
///
/// The header is taken from the middle frame (by file name) and updated with
/// the mean observation time, mean `JD` and `AIRMASS`, `NCOMBINE` and one
/// `IMCMBnnn` card per input.
pub fn combine_batch(paths: &[PathBuf]) -> Result<Frame> {
    if paths.is_empty() {
        return Err(PipelineError::InsufficientFrames("empty batch".into()));
    }

    let mut sorted = paths.to_vec();
    sorted.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    let frames = load_frames(&sorted)?;
    check_shapes(&frames, &sorted)?;
    let images: Vec<&Array2<f32>> = frames.iter().map(|f| &f.data).collect();
    let data = median_combine(&to_volume(&images)?)?;

    let n = frames.len();
    let headers: Vec<&Header> = frames.iter().map(|f| &f.header).collect();
    let mut header = frames[n / 2].header.clone();

    match mean_timestamp(&headers) {
        Some(ts) => header.set(KEY_DATE_OBS, ts),
        None => warn!(
            first = %sorted[0].display(),
            "DATE-OBS missing or unparseable in batch, keeping the middle frame's"
        ),
    }
    if let Some(jd) = mean_of(&headers, KEY_JD) {
        header.set(KEY_JD, jd);
    }
    if let Some(airmass) = mean_of(&headers, KEY_AIRMASS) {
        header.set(KEY_AIRMASS, airmass);
    }
    header.set_with_comment(KEY_NCOMBINE, n, "number of combined frames");
    for (i, path) in sorted.iter().enumerate() {
        header.set(&format!("{}{:03}", KEY_INPUT_PREFIX, i + 1), io::file_name(path));
    }

    Ok(Frame::new(data, header))
}

/// Mean of a numeric key, only when every header has it.
fn mean_of(headers: &[&Header], key: &str) -> Option<f64> {
    let values: Option<Vec<f64>> = headers.iter().map(|h| h.get_f64(key)).collect();
    let values = values?;
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

fn mean_timestamp(headers: &[&Header]) -> Option<String> {
    let micros: Option<Vec<i64>> = headers
        .iter()
        .map(|h| {
            h.get_str(KEY_DATE_OBS)
                .and_then(parse_timestamp)
                .map(|t| t.and_utc().timestamp_micros())
        })
        .collect();
    let micros = micros?;
    if micros.is_empty() {
        return None;
    }
    let mean = micros.iter().map(|&m| m as i128).sum::<i128>() / micros.len() as i128;
    DateTime::from_timestamp_micros(mean as i64).map(|t| format_timestamp(&t.naive_utc()))
}

/// Base of the combined file names: the first file's stem without the
/// alignment prefix and trailing sequence number.
pub fn batch_stem(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut stem = stem.as_str();
    while let Some(rest) = stem.strip_prefix(ALIGNED_PREFIX) {
        stem = rest;
    }
    match stem.rsplit_once('_') {
        Some((head, tail)) if !head.is_empty() && tail.chars().all(|c| c.is_ascii_digit()) => {
            head.to_string()
        }
        _ => stem.to_string(),
    }
}

/// Combine the FITS files of `dir` batch by batch into `out_dir`, as
/// `final_<stem>_<NNNN>.fits`. Returns the written paths.
pub fn combine_batches(
    dir: &Path,
    config: &BatchConfig,
    out_dir: &Path,
    progress: impl Fn(usize),
) -> Result<Vec<PathBuf>> {
    config.validate()?;
    let files = io::list_fits_files(dir)?;
    let windows = chunk(&files, config.size, config.overlap)?;
    if windows.is_empty() {
        return Err(PipelineError::InsufficientFrames(format!(
            "{} frames in {}, batch size is {}",
            files.len(),
            dir.display(),
            config.size
        )));
    }

    let used = (windows.len() - 1) * (config.size - config.overlap) + config.size;
    if used < files.len() {
        warn!(
            dropped = files.len() - used,
            "Trailing frames do not fill a batch and are not combined"
        );
    }

    let stem = batch_stem(&files[0]);
    fs::create_dir_all(out_dir)?;

    let mut outputs = Vec::with_capacity(windows.len());
    for (i, window) in windows.iter().enumerate() {
        let mut frame = combine_batch(window)?;
        let name = format!("{}_{}_{:04}.fits", COMBINED_PREFIX, stem, i);
        frame.header.set(KEY_IMAGE, name.as_str());
        let output = out_dir.join(&name);
        frame.save(&output)?;
        outputs.push(output);
        progress(i + 1);
    }

    info!(
        dir = %dir.display(),
        batches = outputs.len(),
        size = config.size,
        overlap = config.overlap,
        "Batches combined"
    );
    Ok(outputs)
}
