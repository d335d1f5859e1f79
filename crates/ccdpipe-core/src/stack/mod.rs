pub mod median;
pub mod sigma_clip;

use std::path::PathBuf;

use ndarray::{Array2, Array3, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::consts::{PARALLEL_FRAME_THRESHOLD, PARALLEL_PIXEL_THRESHOLD};
use crate::error::{PipelineError, Result};
use crate::frame::Frame;

pub use median::{compute_median, median_combine};
pub use sigma_clip::{sigma_clip_combine, ClipCenter, SigmaClipParams};

/// Per-pixel combination rule for a stack of frames.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum CombineMethod {
    SigmaClippedMean(SigmaClipParams),
    Median,
}

impl Default for CombineMethod {
    fn default() -> Self {
        Self::SigmaClippedMean(SigmaClipParams::default())
    }
}

impl std::fmt::Display for CombineMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SigmaClippedMean(p) => write!(
                f,
                "sigma-clipped mean ({}/{} sigma)",
                p.low_sigma, p.high_sigma
            ),
            Self::Median => write!(f, "median"),
        }
    }
}

impl CombineMethod {
    pub fn combine(&self, volume: &Array3<f32>) -> Result<Array2<f32>> {
        match self {
            Self::SigmaClippedMean(params) => sigma_clip_combine(volume, params),
            Self::Median => median_combine(volume),
        }
    }
}

/// Load frames in parallel. The first failure aborts the load.
pub fn load_frames(paths: &[PathBuf]) -> Result<Vec<Frame>> {
    if paths.len() >= PARALLEL_FRAME_THRESHOLD {
        paths.par_iter().map(|p| Frame::load(p)).collect()
    } else {
        paths.iter().map(|p| Frame::load(p)).collect()
    }
}

/// Verify every frame has the dimensions of the first one.
pub fn check_shapes(frames: &[Frame], paths: &[PathBuf]) -> Result<(usize, usize)> {
    let first = frames
        .first()
        .ok_or_else(|| PipelineError::InsufficientFrames("no frames to stack".into()))?;
    let expected = first.dim();
    for (frame, path) in frames.iter().zip(paths) {
        if frame.dim() != expected {
            return Err(PipelineError::ShapeMismatch {
                path: path.clone(),
                expected,
                found: frame.dim(),
            });
        }
    }
    Ok(expected)
}

/// Stack equally sized images into a volume indexed `[frame, row, col]`.
pub fn to_volume(images: &[&Array2<f32>]) -> Result<Array3<f32>> {
    if images.is_empty() {
        return Err(PipelineError::InsufficientFrames("no frames to stack".into()));
    }
    let views: Vec<_> = images.iter().map(|a| a.view()).collect();
    ndarray::stack(Axis(0), &views).map_err(|e| {
        PipelineError::InsufficientFrames(format!("cannot stack frames: {}", e))
    })
}

/// Apply `reduce` to the stack of values at every pixel.
///
/// Parallelizes at the row level for large images.
pub(crate) fn reduce_pixels<F>(volume: &Array3<f32>, reduce: F) -> Result<Array2<f32>>
where
    F: Fn(&mut [f32]) -> f32 + Sync,
{
    let (n, h, w) = volume.dim();
    if n == 0 {
        return Err(PipelineError::InsufficientFrames("empty stack".into()));
    }

    let reduce_row = |row: usize| -> Vec<f32> {
        let mut pixel_values = vec![0.0f32; n];
        let mut row_result = vec![0.0f32; w];
        for (col, result) in row_result.iter_mut().enumerate() {
            for (i, v) in pixel_values.iter_mut().enumerate() {
                *v = volume[[i, row, col]];
            }
            *result = reduce(&mut pixel_values);
        }
        row_result
    };

    let rows: Vec<Vec<f32>> = if h * w >= PARALLEL_PIXEL_THRESHOLD && n > 1 {
        (0..h).into_par_iter().map(reduce_row).collect()
    } else {
        (0..h).map(reduce_row).collect()
    };

    let flat: Vec<f32> = rows.into_iter().flatten().collect();
    Array2::from_shape_vec((h, w), flat)
        .map_err(|e| PipelineError::InsufficientFrames(format!("cannot assemble stack: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn test_check_shapes_names_offender() {
        let frames = vec![
            Frame::new(Array2::zeros((4, 4)), Default::default()),
            Frame::new(Array2::zeros((4, 5)), Default::default()),
        ];
        let paths = vec![PathBuf::from("a.fits"), PathBuf::from("b.fits")];
        match check_shapes(&frames, &paths) {
            Err(PipelineError::ShapeMismatch { path, found, .. }) => {
                assert_eq!(path, PathBuf::from("b.fits"));
                assert_eq!(found, (4, 5));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_default_method_round_trips_through_toml() {
        let method = CombineMethod::default();
        #[derive(Serialize, Deserialize)]
        struct Wrapper {
            combine: CombineMethod,
        }
        let text = toml::to_string(&Wrapper { combine: method.clone() }).unwrap();
        let back: Wrapper = toml::from_str(&text).unwrap();
        assert_eq!(back.combine, method);
    }
}
