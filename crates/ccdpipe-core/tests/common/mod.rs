use std::path::{Path, PathBuf};

use ccdpipe_core::frame::Frame;
use ccdpipe_core::io::{Card, Header};
use ndarray::Array2;

/// Observation fields written into a synthetic OPD frame header.
#[derive(Clone, Debug)]
pub struct OpdFields {
    pub object: String,
    pub filter: String,
    pub exptime: f64,
    pub airmass: f64,
    pub date_obs: String,
    pub tag: String,
}

impl OpdFields {
    pub fn science(object: &str, filter: &str) -> Self {
        Self {
            object: object.to_string(),
            filter: filter.to_string(),
            exptime: 60.0,
            airmass: 1.2,
            date_obs: "2019-06-05T23:10:00.000".to_string(),
            tag: "science".to_string(),
        }
    }

    pub fn bias() -> Self {
        Self {
            exptime: 0.0,
            tag: "bias".to_string(),
            ..Self::science("bias", "V")
        }
    }

    pub fn flat(filter: &str) -> Self {
        Self {
            exptime: 5.0,
            tag: "flat".to_string(),
            ..Self::science("flat", filter)
        }
    }

    pub fn header(&self) -> Header {
        let mut header = Header::new();
        header.set("DATE-OBS", self.date_obs.as_str());
        header.set("OBJECT", self.object.as_str());
        header.set("FILTER", self.filter.as_str());
        header.set("EXPTIME", self.exptime);
        header.set("AIRMASS", self.airmass);
        header.add_commentary("COMMENT", &format!("'{}'", self.tag));
        header
    }
}

/// Write a frame with an OPD header to `dir/name`.
pub fn write_opd_frame(dir: &Path, name: &str, data: Array2<f32>, fields: &OpdFields) -> PathBuf {
    let path = dir.join(name);
    Frame::new(data, fields.header()).save(&path).unwrap();
    path
}

/// Same as [`write_opd_frame`] with extra header cards appended.
pub fn write_opd_frame_with(
    dir: &Path,
    name: &str,
    data: Array2<f32>,
    fields: &OpdFields,
    extra: &[Card],
) -> PathBuf {
    let mut header = fields.header();
    for card in extra {
        match &card.value {
            Some(v) => header.set(&card.keyword, v.clone()),
            None => header.add_commentary(&card.keyword, card.comment.as_deref().unwrap_or("")),
        }
    }
    let path = dir.join(name);
    Frame::new(data, header).save(&path).unwrap();
    path
}

pub fn constant(h: usize, w: usize, value: f32) -> Array2<f32> {
    Array2::from_elem((h, w), value)
}

/// Minimal linear congruential generator, deterministic across platforms.
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self(seed)
    }

    /// Uniform in [0, 1).
    pub fn next_f64(&mut self) -> f64 {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        (self.0 >> 11) as f64 / (1u64 << 53) as f64
    }
}

/// Star positions `(x, y)` at least `min_sep` pixels apart, kept `margin`
/// pixels away from the edges.
pub fn star_positions(count: usize, size: usize, margin: f64, min_sep: f64, seed: u64) -> Vec<(f64, f64)> {
    let mut rng = Lcg::new(seed);
    let span = size as f64 - 2.0 * margin;
    let mut stars: Vec<(f64, f64)> = Vec::with_capacity(count);
    let mut attempts = 0;
    while stars.len() < count && attempts < 100_000 {
        attempts += 1;
        let x = margin + rng.next_f64() * span;
        let y = margin + rng.next_f64() * span;
        if stars
            .iter()
            .all(|&(sx, sy)| ((sx - x).powi(2) + (sy - y).powi(2)).sqrt() >= min_sep)
        {
            stars.push((x, y));
        }
    }
    stars
}

/// Gaussian stars (sigma 1.5, amplitude `500 + 40 * i`) on a background of
/// 100 with small uniform noise, shifted by `(dx, dy)`.
pub fn render_starfield(size: usize, stars: &[(f64, f64)], dx: f64, dy: f64, seed: u64) -> Array2<f32> {
    let mut rng = Lcg::new(seed);
    let sigma2 = 2.0 * 1.5f64 * 1.5;
    let mut data = Array2::<f32>::zeros((size, size));
    for ((row, col), v) in data.indexed_iter_mut() {
        let mut value = 100.0 + (rng.next_f64() - 0.5) * 4.0;
        for (i, &(sx, sy)) in stars.iter().enumerate() {
            let d2 = (col as f64 - sx - dx).powi(2) + (row as f64 - sy - dy).powi(2);
            if d2 < 100.0 {
                value += (500.0 + 40.0 * i as f64) * (-d2 / sigma2).exp();
            }
        }
        *v = value as f32;
    }
    data
}

/// 128x128 field with 25 stars.
pub fn starfield(dx: f64, dy: f64, seed: u64) -> Array2<f32> {
    let stars = star_positions(25, 128, 12.0, 12.0, 42);
    render_starfield(128, &stars, dx, dy, seed)
}
