use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_CLIP_MAX_ITERATIONS, DEFAULT_CLIP_SIGMA, EPSILON};
use crate::error::Result;
use crate::stack::median::compute_median;
use crate::stack::reduce_pixels;

/// Statistic the rejection band is centred on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClipCenter {
    Median,
    Mean,
}

/// Parameters for sigma-clipped mean stacking.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SigmaClipParams {
    /// Values below `center - low_sigma * stddev` are rejected (default: 3).
    pub low_sigma: f32,
    /// Values above `center + high_sigma * stddev` are rejected (default: 3).
    pub high_sigma: f32,
    /// Rejection passes stop early once a pass rejects nothing.
    pub max_iterations: usize,
    pub center: ClipCenter,
}

impl Default for SigmaClipParams {
    fn default() -> Self {
        Self {
            low_sigma: DEFAULT_CLIP_SIGMA,
            high_sigma: DEFAULT_CLIP_SIGMA,
            max_iterations: DEFAULT_CLIP_MAX_ITERATIONS,
            center: ClipCenter::Median,
        }
    }
}

/// Combine a `[frame, row, col]` volume with a sigma-clipped mean.
///
/// Per pixel: compute the centre and standard deviation of the surviving
/// values, reject values outside the band, repeat until a pass rejects
/// nothing, then average the survivors.
pub fn sigma_clip_combine(volume: &Array3<f32>, params: &SigmaClipParams) -> Result<Array2<f32>> {
    reduce_pixels(volume, |values| clipped_mean(values, params))
}

/// Sigma-clipped mean of one set of values. If every value is rejected the
/// plain mean is returned.
pub fn clipped_mean(values: &[f32], params: &SigmaClipParams) -> f32 {
    let n = values.len();
    let mut mask = vec![true; n];
    let mut scratch = Vec::with_capacity(n);

    for _ in 0..params.max_iterations {
        scratch.clear();
        scratch.extend(values.iter().zip(&mask).filter(|&(_, &m)| m).map(|(&v, _)| v));
        if scratch.len() < 2 {
            break;
        }

        let (mean, stddev) = mean_stddev(&scratch);
        if stddev < EPSILON {
            break;
        }
        let center = match params.center {
            ClipCenter::Median => compute_median(&mut scratch),
            ClipCenter::Mean => mean,
        };
        let lo = center - params.low_sigma * stddev;
        let hi = center + params.high_sigma * stddev;

        let mut rejected = 0;
        for (v, m) in values.iter().zip(mask.iter_mut()) {
            if *m && (*v < lo || *v > hi) {
                *m = false;
                rejected += 1;
            }
        }
        if rejected == 0 {
            break;
        }
    }

    let mut sum = 0.0f64;
    let mut count = 0usize;
    for (&v, &m) in values.iter().zip(&mask) {
        if m {
            sum += v as f64;
            count += 1;
        }
    }

    if count > 0 {
        (sum / count as f64) as f32
    } else {
        (values.iter().map(|&v| v as f64).sum::<f64>() / n.max(1) as f64) as f32
    }
}

fn mean_stddev(values: &[f32]) -> (f32, f32) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().map(|&v| v as f64).sum::<f64>() / n;
    let var = values
        .iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    (mean as f32, var.sqrt() as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_outlier_is_rejected() {
        let mut values = vec![100.0f32; 20];
        values[3] = 101.0;
        values[7] = 99.0;
        values[11] = 5000.0;
        let result = clipped_mean(&values, &SigmaClipParams::default());
        assert_relative_eq!(result, 100.0, epsilon = 1e-4);
    }

    #[test]
    fn test_constant_values() {
        let result = clipped_mean(&[10.0, 10.0, 10.0], &SigmaClipParams::default());
        assert_eq!(result, 10.0);
    }

    #[test]
    fn test_no_clipping_for_small_spread() {
        let result = clipped_mean(&[10.0, 12.0, 14.0], &SigmaClipParams::default());
        assert_relative_eq!(result, 12.0, epsilon = 1e-6);
    }

    #[test]
    fn test_zero_iterations_is_plain_mean() {
        let params = SigmaClipParams {
            max_iterations: 0,
            ..Default::default()
        };
        let result = clipped_mean(&[1.0, 2.0, 3.0, 100.0], &params);
        assert_relative_eq!(result, 26.5, epsilon = 1e-6);
    }
}
