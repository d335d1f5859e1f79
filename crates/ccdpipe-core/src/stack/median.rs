use ndarray::{Array2, Array3};

use crate::error::Result;
use crate::stack::reduce_pixels;

/// Combine a `[frame, row, col]` volume by the median at each pixel.
///
/// Uses `select_nth_unstable` for O(n) median without full sort.
pub fn median_combine(volume: &Array3<f32>) -> Result<Array2<f32>> {
    reduce_pixels(volume, compute_median)
}

/// Median of a scratch buffer (reordered in place). Even lengths average the
/// two middle values. Empty input yields 0.
pub fn compute_median(values: &mut [f32]) -> f32 {
    let n = values.len();
    if n == 0 {
        0.0
    } else if n == 1 {
        values[0]
    } else if n % 2 == 1 {
        let mid = n / 2;
        *values.select_nth_unstable_by(mid, |a, b| a.total_cmp(b)).1
    } else {
        let mid = n / 2;
        values.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
        let upper = values[mid];
        values[..mid].select_nth_unstable_by(mid - 1, |a, b| a.total_cmp(b));
        (values[mid - 1] + upper) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn test_compute_median_odd_even() {
        assert_eq!(compute_median(&mut [3.0, 1.0, 2.0]), 2.0);
        assert_eq!(compute_median(&mut [4.0, 1.0, 3.0, 2.0]), 2.5);
        assert_eq!(compute_median(&mut []), 0.0);
    }

    #[test]
    fn test_median_rejects_single_outlier() {
        let mut volume = Array3::<f32>::zeros((3, 2, 2));
        volume.index_axis_mut(ndarray::Axis(0), 0).fill(10.0);
        volume.index_axis_mut(ndarray::Axis(0), 1).fill(12.0);
        volume.index_axis_mut(ndarray::Axis(0), 2).fill(1000.0);
        let result = median_combine(&volume).unwrap();
        assert!(result.iter().all(|&v| v == 12.0));
    }
}
