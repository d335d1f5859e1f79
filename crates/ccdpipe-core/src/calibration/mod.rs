pub mod scaling;

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::consts::{
    EPSILON, KEY_MASTER_BIAS, KEY_MASTER_FLAT, KEY_NCOMBINE, MASTER_BIAS_FILENAME,
    MASTER_FLAT_PREFIX,
};
use crate::error::{PipelineError, Result};
use crate::frame::Frame;
use crate::io::Header;
use crate::stack::{check_shapes, load_frames, to_volume, CombineMethod};

pub use scaling::{central_median, FlatNormalization, FlatScaling};

/// How a master flat is derived from bias-subtracted flats.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlatPolicy {
    pub combine: CombineMethod,
    pub scaling: FlatScaling,
    pub normalization: FlatNormalization,
}

impl Default for FlatPolicy {
    fn default() -> Self {
        Self {
            combine: CombineMethod::default(),
            scaling: FlatScaling::CentralMedian,
            normalization: FlatNormalization::None,
        }
    }
}

impl FlatPolicy {
    /// Plain median of bias-subtracted flats, normalized by its mean.
    pub fn legacy() -> Self {
        Self {
            combine: CombineMethod::Median,
            scaling: FlatScaling::None,
            normalization: FlatNormalization::Mean,
        }
    }
}

pub fn master_bias_path(dir: &Path) -> PathBuf {
    dir.join(MASTER_BIAS_FILENAME)
}

pub fn master_flat_path(dir: &Path, filter: &str) -> PathBuf {
    let filter = filter.trim().replace(['/', '\\', ' '], "_");
    dir.join(format!("{}{}.fits", MASTER_FLAT_PREFIX, filter))
}

/// Combine bias frames into `output_dir/master_bias.fits`.
///
/// An existing master is returned as is, without reading any input.
pub fn build_master_bias(
    frames: &[PathBuf],
    output_dir: &Path,
    method: &CombineMethod,
) -> Result<PathBuf> {
    let output = master_bias_path(output_dir);
    if output.exists() {
        debug!(path = %output.display(), "Master bias already exists, skipping");
        return Ok(output);
    }
    if frames.is_empty() {
        return Err(PipelineError::InsufficientFrames(
            "no bias frames for master bias".into(),
        ));
    }

    let loaded = load_frames(frames)?;
    check_shapes(&loaded, frames)?;
    let images: Vec<&Array2<f32>> = loaded.iter().map(|f| &f.data).collect();
    let combined = method.combine(&to_volume(&images)?)?;

    let header = master_header(&loaded[0].header, KEY_MASTER_BIAS, frames.len());
    fs::create_dir_all(output_dir)?;
    Frame::new(combined, header).save(&output)?;

    info!(
        frames = frames.len(),
        method = %method,
        output = %output.display(),
        "Master bias built"
    );
    Ok(output)
}

/// Combine flat frames of one filter into `output_dir/master_flat_<filter>.fits`.
///
/// Each flat has the master bias subtracted and is scaled per `policy`
/// before combining. An existing master is returned as is.
pub fn build_master_flat(
    frames: &[PathBuf],
    master_bias: &Path,
    output_dir: &Path,
    filter: &str,
    policy: &FlatPolicy,
) -> Result<PathBuf> {
    let output = master_flat_path(output_dir, filter);
    if output.exists() {
        debug!(path = %output.display(), "Master flat already exists, skipping");
        return Ok(output);
    }
    if frames.is_empty() {
        return Err(PipelineError::InsufficientFrames(format!(
            "no flat frames for filter {}",
            filter
        )));
    }
    if !master_bias.exists() {
        return Err(PipelineError::MissingDependency(master_bias.to_path_buf()));
    }

    let bias = Frame::load(master_bias)?;
    let loaded = load_frames(frames)?;
    let expected = check_shapes(&loaded, frames)?;
    if bias.dim() != expected {
        return Err(PipelineError::ShapeMismatch {
            path: master_bias.to_path_buf(),
            expected,
            found: bias.dim(),
        });
    }

    let prepared: Vec<Array2<f32>> = loaded
        .par_iter()
        .zip(frames.par_iter())
        .map(|(flat, path)| {
            let mut data = &flat.data - &bias.data;
            if policy.scaling == FlatScaling::CentralMedian {
                let median = central_median(&data);
                if median.abs() < EPSILON {
                    return Err(PipelineError::InvalidData {
                        path: path.clone(),
                        reason: "central median of bias-subtracted flat is zero".into(),
                    });
                }
                data.mapv_inplace(|v| v / median);
            }
            Ok(data)
        })
        .collect::<Result<_>>()?;

    let images: Vec<&Array2<f32>> = prepared.iter().collect();
    let mut combined = policy.combine.combine(&to_volume(&images)?)?;

    if policy.normalization == FlatNormalization::Mean {
        let mean = combined.mean().unwrap_or(0.0);
        if mean.abs() < EPSILON {
            return Err(PipelineError::InvalidData {
                path: output,
                reason: "combined flat has zero mean".into(),
            });
        }
        combined.mapv_inplace(|v| v / mean);
    }

    let header = master_header(&loaded[0].header, KEY_MASTER_FLAT, frames.len());
    fs::create_dir_all(output_dir)?;
    Frame::new(combined, header).save(&output)?;

    info!(
        frames = frames.len(),
        filter,
        method = %policy.combine,
        output = %output.display(),
        "Master flat built"
    );
    Ok(output)
}

fn master_header(first: &Header, marker: &str, count: usize) -> Header {
    let mut header = first.clone();
    header.set_with_comment(KEY_NCOMBINE, count, "number of combined frames");
    header.set(
        marker,
        format!(
            "built from {} inputs on {}",
            count,
            Utc::now().format("%Y-%m-%d")
        ),
    );
    header
}
