use std::collections::HashMap;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::consts::{
    DEFAULT_DETECTION_SIGMA, DEFAULT_MAX_CONTROL_POINTS, DEFAULT_MIN_SOURCE_AREA, EPSILON,
    MAD_TO_SIGMA,
};
use crate::stack::compute_median;

/// Star detection settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Threshold above background in robust standard deviations.
    pub sigma: f32,
    /// Minimum connected pixels for a source.
    pub min_area: usize,
    /// Brightest sources kept as control points.
    pub max_sources: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            sigma: DEFAULT_DETECTION_SIGMA,
            min_area: DEFAULT_MIN_SOURCE_AREA,
            max_sources: DEFAULT_MAX_CONTROL_POINTS,
        }
    }
}

/// A detected point source. `x` is the column, `y` the row.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Source {
    pub x: f64,
    pub y: f64,
    /// Background-subtracted flux.
    pub flux: f64,
    pub area: usize,
}

/// Background level and robust noise of an image.
pub fn background(data: &Array2<f32>) -> (f32, f32) {
    let mut values: Vec<f32> = data.iter().copied().collect();
    let median = compute_median(&mut values);

    let mut deviations: Vec<f32> = data.iter().map(|&v| (v - median).abs()).collect();
    let mad = compute_median(&mut deviations);
    let sigma = MAD_TO_SIGMA * mad;
    if sigma > EPSILON {
        return (median, sigma);
    }

    // MAD collapses on mostly flat images; fall back to the plain stddev.
    let n = data.len().max(1) as f64;
    let mean = data.iter().map(|&v| v as f64).sum::<f64>() / n;
    let var = data
        .iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    (median, var.sqrt() as f32)
}

#[derive(Default)]
struct Accumulator {
    area: usize,
    flux: f64,
    sum_x: f64,
    sum_y: f64,
}

/// Detect sources: threshold at `background + sigma * noise`, label
/// 8-connected regions with two-pass union-find, and return flux-weighted
/// centroids of regions of at least `min_area` pixels, brightest first.
pub fn detect_sources(data: &Array2<f32>, config: &DetectionConfig) -> Vec<Source> {
    let (h, w) = data.dim();
    if h == 0 || w == 0 {
        return Vec::new();
    }

    let (bg, noise) = background(data);
    if noise < EPSILON {
        return Vec::new();
    }
    let threshold = bg + config.sigma * noise;

    let mut labels = Array2::<u32>::zeros((h, w));
    let mut parent: Vec<u32> = vec![0];

    // Pass 1: provisional labels from the four already-visited neighbours.
    for row in 0..h {
        for col in 0..w {
            if data[[row, col]] <= threshold {
                continue;
            }

            let mut neighbours = [0u32; 4];
            if col > 0 {
                neighbours[0] = labels[[row, col - 1]];
            }
            if row > 0 {
                neighbours[1] = labels[[row - 1, col]];
                if col > 0 {
                    neighbours[2] = labels[[row - 1, col - 1]];
                }
                if col + 1 < w {
                    neighbours[3] = labels[[row - 1, col + 1]];
                }
            }

            let smallest = neighbours.iter().copied().filter(|&l| l > 0).min();
            match smallest {
                None => {
                    let label = parent.len() as u32;
                    parent.push(label);
                    labels[[row, col]] = label;
                }
                Some(label) => {
                    labels[[row, col]] = label;
                    for &other in neighbours.iter().filter(|&&l| l > 0 && l != label) {
                        union(&mut parent, label, other);
                    }
                }
            }
        }
    }

    // Pass 2: resolve labels and accumulate flux-weighted moments.
    let mut regions: HashMap<u32, Accumulator> = HashMap::new();
    for row in 0..h {
        for col in 0..w {
            let label = labels[[row, col]];
            if label == 0 {
                continue;
            }
            let root = find(&parent, label);
            let weight = (data[[row, col]] - bg) as f64;
            let acc = regions.entry(root).or_default();
            acc.area += 1;
            acc.flux += weight;
            acc.sum_x += weight * col as f64;
            acc.sum_y += weight * row as f64;
        }
    }

    let mut sources: Vec<Source> = regions
        .into_values()
        .filter(|a| a.area >= config.min_area && a.flux > 0.0)
        .map(|a| Source {
            x: a.sum_x / a.flux,
            y: a.sum_y / a.flux,
            flux: a.flux,
            area: a.area,
        })
        .collect();

    sources.sort_by(|a, b| {
        b.flux
            .total_cmp(&a.flux)
            .then(a.y.total_cmp(&b.y))
            .then(a.x.total_cmp(&b.x))
    });
    sources.truncate(config.max_sources);
    sources
}

fn find(parent: &[u32], mut x: u32) -> u32 {
    while parent[x as usize] != x {
        x = parent[x as usize];
    }
    x
}

fn union(parent: &mut [u32], a: u32, b: u32) {
    let ra = find(parent, a);
    let rb = find(parent, b);
    if ra != rb {
        let (small, big) = if ra < rb { (ra, rb) } else { (rb, ra) };
        parent[big as usize] = small;
    }
}
