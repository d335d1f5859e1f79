use ndarray::{s, Array2};
use serde::{Deserialize, Serialize};

use crate::stack::compute_median;

/// Per-frame scaling applied to bias-subtracted flats before combining.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlatScaling {
    /// Multiply by the inverse median of the central region.
    CentralMedian,
    None,
}

/// Normalization of the combined master flat.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlatNormalization {
    /// Divide by the frame's own mean.
    Mean,
    None,
}

/// Median of the central half of the image: rows `[h/2 - h/4, h/2 + h/4)`
/// and the same for columns. Images too small for a central region use
/// every pixel.
pub fn central_median(data: &Array2<f32>) -> f32 {
    let (h, w) = data.dim();
    let (r0, r1) = (h / 2 - h / 4, h / 2 + h / 4);
    let (c0, c1) = (w / 2 - w / 4, w / 2 + w / 4);

    let mut values: Vec<f32> = if r1 > r0 && c1 > c0 {
        data.slice(s![r0..r1, c0..c1]).iter().copied().collect()
    } else {
        data.iter().copied().collect()
    };
    compute_median(&mut values)
}
