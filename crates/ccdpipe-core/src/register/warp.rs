use ndarray::Array2;
use rayon::prelude::*;

use crate::consts::PARALLEL_PIXEL_THRESHOLD;
use crate::register::transform::SimilarityTransform;

/// Bilinear sample at fractional (row, col); outside pixels read as zero.
pub fn bilinear_sample(data: &Array2<f32>, y: f64, x: f64) -> f32 {
    let (h, w) = data.dim();

    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;
    let fx = (x - x0 as f64) as f32;
    let fy = (y - y0 as f64) as f32;

    let sample = |r: i64, c: i64| -> f32 {
        if r >= 0 && r < h as i64 && c >= 0 && c < w as i64 {
            data[[r as usize, c as usize]]
        } else {
            0.0
        }
    };

    let v00 = sample(y0, x0);
    let v10 = sample(y0, x0 + 1);
    let v01 = sample(y0 + 1, x0);
    let v11 = sample(y0 + 1, x0 + 1);

    v00 * (1.0 - fx) * (1.0 - fy) + v10 * fx * (1.0 - fy) + v01 * (1.0 - fx) * fy + v11 * fx * fy
}

/// Resample `source` onto a grid of `shape = (h, w)` in reference
/// coordinates. Pixels mapping outside the source are zero.
pub fn warp_onto(
    source: &Array2<f32>,
    transform: &SimilarityTransform,
    shape: (usize, usize),
) -> Array2<f32> {
    let (h, w) = shape;
    let resample_row = |row: usize| -> Vec<f32> {
        (0..w)
            .map(|col| {
                let (sx, sy) = transform.inverse_apply(col as f64, row as f64);
                bilinear_sample(source, sy, sx)
            })
            .collect()
    };

    let rows: Vec<Vec<f32>> = if h * w >= PARALLEL_PIXEL_THRESHOLD {
        (0..h).into_par_iter().map(resample_row).collect()
    } else {
        (0..h).map(resample_row).collect()
    };

    let flat: Vec<f32> = rows.into_iter().flatten().collect();
    Array2::from_shape_vec((h, w), flat).unwrap_or_else(|_| Array2::zeros((h, w)))
}
