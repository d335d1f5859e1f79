use std::ops::Range;
use std::path::{Path, PathBuf};

use ndarray::{s, Array1, Array2, Axis, Zip};
use tracing::{debug, info, warn};

use crate::consts::{
    EPSILON, KEY_BIASSEC, KEY_CALSTAT, KEY_CCDPROC, KEY_OVERSCAN, KEY_TRIMMED, KEY_TRIMSEC,
};
use crate::error::{PipelineError, Result};
use crate::frame::Frame;
use crate::io;
use crate::stack::compute_median;

/// What a correction step did to a file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CorrectionOutcome {
    Applied,
    Skipped,
}

impl CorrectionOutcome {
    pub fn is_applied(self) -> bool {
        self == Self::Applied
    }
}

/// Pixel region of an image, as zero-based half-open ranges.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Region {
    pub rows: Range<usize>,
    pub cols: Range<usize>,
}

impl Region {
    /// Parse a FITS section `[x1:x2,y1:y2]` (1-based, inclusive; x is the
    /// column axis) and check it lies inside an image of `dim = (h, w)`.
    pub fn parse(section: &str, dim: (usize, usize)) -> Option<Self> {
        let inner = section.trim().strip_prefix('[')?.strip_suffix(']')?;
        let (x, y) = inner.split_once(',')?;
        let cols = parse_axis(x, dim.1)?;
        let rows = parse_axis(y, dim.0)?;
        Some(Self { rows, cols })
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.cols.len()
    }
}

fn parse_axis(text: &str, len: usize) -> Option<Range<usize>> {
    let (a, b) = text.split_once(':')?;
    let a: usize = a.trim().parse().ok()?;
    let b: usize = b.trim().parse().ok()?;
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    if lo == 0 || hi > len {
        return None;
    }
    Some(lo - 1..hi)
}

fn section(frame: &Frame, key: &str, path: &Path) -> Result<Option<Region>> {
    let Some(value) = frame.header.get(key) else {
        return Ok(None);
    };
    let text = value.to_string();
    Region::parse(&text, frame.dim())
        .map(Some)
        .ok_or_else(|| PipelineError::MalformedField {
            path: path.to_path_buf(),
            key: key.to_string(),
            value: text,
        })
}

/// Subtract the overscan level and trim the frame at `path`, in place.
///
/// Frames without `BIASSEC` are skipped.
pub fn correct_overscan(path: &Path) -> Result<CorrectionOutcome> {
    let header = io::read_header(path)?;
    if !header.contains(KEY_BIASSEC) {
        info!(file = %path.display(), "No BIASSEC, overscan correction skipped");
        return Ok(CorrectionOutcome::Skipped);
    }

    let mut frame = Frame::load(path)?;
    let overscan = section(&frame, KEY_BIASSEC, path)?.ok_or_else(|| {
        PipelineError::MissingField {
            path: path.to_path_buf(),
            key: KEY_BIASSEC.to_string(),
        }
    })?;
    let trim = section(&frame, KEY_TRIMSEC, path)?;

    subtract_overscan(&mut frame.data, &overscan);

    if let Some(region) = &trim {
        frame.data = frame
            .data
            .slice(s![region.rows.clone(), region.cols.clone()])
            .to_owned();
    }

    frame.header.remove(KEY_BIASSEC);
    frame.header.remove(KEY_TRIMSEC);
    frame
        .header
        .set_with_comment(KEY_OVERSCAN, true, "overscan subtracted");
    if trim.is_some() {
        frame.header.set_with_comment(KEY_TRIMMED, true, "overscan trimmed");
        frame.header.set(KEY_CALSTAT, "OT");
    } else {
        frame.header.set(KEY_CALSTAT, "O");
    }
    frame.save(path)?;

    debug!(
        file = %path.display(),
        height = frame.height(),
        width = frame.width(),
        "Overscan corrected"
    );
    Ok(CorrectionOutcome::Applied)
}

/// Collapse the overscan strip along its short axis with a median and
/// subtract the resulting levels (one per row for a vertical strip, one per
/// column for a horizontal one). Rows or columns outside the strip get the
/// median of the whole strip.
pub fn subtract_overscan(data: &mut Array2<f32>, overscan: &Region) {
    let strip = data
        .slice(s![overscan.rows.clone(), overscan.cols.clone()])
        .to_owned();
    let mut all: Vec<f32> = strip.iter().copied().collect();
    let global = compute_median(&mut all);

    let per_row = overscan.width() <= overscan.height();
    let (axis, span, len) = if per_row {
        (Axis(0), &overscan.rows, data.nrows())
    } else {
        (Axis(1), &overscan.cols, data.ncols())
    };

    let mut levels = Array1::<f32>::from_elem(len, global);
    for (i, lane) in strip.axis_iter(axis).enumerate() {
        let mut values: Vec<f32> = lane.iter().copied().collect();
        levels[span.start + i] = compute_median(&mut values);
    }

    for (mut lane, level) in data.axis_iter_mut(axis).zip(levels.iter()) {
        lane.mapv_inplace(|v| v - level);
    }
}

/// Master bias and flat loaded once and shared by every science frame of a
/// filter.
#[derive(Clone, Debug)]
pub struct MasterSet {
    pub bias: Frame,
    pub flat: Frame,
}

impl MasterSet {
    pub fn load(bias: &Path, flat: &Path) -> Result<Self> {
        for p in [bias, flat] {
            if !p.exists() {
                return Err(PipelineError::MissingDependency(p.to_path_buf()));
            }
        }
        Ok(Self {
            bias: Frame::load(bias)?,
            flat: Frame::load(flat)?,
        })
    }

    pub fn apply(&self, path: &Path) -> Result<CorrectionOutcome> {
        apply_calibration(path, &self.bias, &self.flat)
    }
}

/// Compute `(frame - bias) / flat` for the frame at `path`, in place, and
/// mark it with `CCDPROC`. A frame already carrying `CCDPROC` is skipped.
pub fn apply_calibration(path: &Path, bias: &Frame, flat: &Frame) -> Result<CorrectionOutcome> {
    let header = io::read_header(path)?;
    if header.contains(KEY_CCDPROC) {
        info!(file = %path.display(), "Already calibrated (CCDPROC), skipped");
        return Ok(CorrectionOutcome::Skipped);
    }

    let mut frame = Frame::load(path)?;
    for master in [bias, flat] {
        if master.dim() != frame.dim() {
            return Err(PipelineError::ShapeMismatch {
                path: path.to_path_buf(),
                expected: master.dim(),
                found: frame.dim(),
            });
        }
    }

    let mut zero_flat = 0usize;
    Zip::from(&mut frame.data)
        .and(&bias.data)
        .and(&flat.data)
        .for_each(|v, &b, &f| {
            if f.abs() < EPSILON {
                zero_flat += 1;
                *v = 0.0;
            } else {
                *v = (*v - b) / f;
            }
        });
    if zero_flat > 0 {
        warn!(
            file = %path.display(),
            pixels = zero_flat,
            "Zero-valued flat pixels, set to 0"
        );
    }

    frame
        .header
        .set_with_comment(KEY_CCDPROC, true, "bias and flat applied");
    frame.save(path)?;

    debug!(file = %path.display(), "Calibration applied");
    Ok(CorrectionOutcome::Applied)
}

/// Overscan-correct every file; returns how many were corrected.
pub fn correct_overscan_all(files: &[PathBuf]) -> Result<usize> {
    let mut applied = 0;
    for file in files {
        if correct_overscan(file)?.is_applied() {
            applied += 1;
        }
    }
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_section() {
        let region = Region::parse("[5:6,1:4]", (4, 6)).unwrap();
        assert_eq!(region.cols, 4..6);
        assert_eq!(region.rows, 0..4);
        assert_eq!(region.width(), 2);
    }

    #[test]
    fn test_parse_section_out_of_bounds() {
        assert!(Region::parse("[5:7,1:4]", (4, 6)).is_none());
        assert!(Region::parse("[0:2,1:4]", (4, 6)).is_none());
        assert!(Region::parse("5:6,1:4", (4, 6)).is_none());
    }

    #[test]
    fn test_per_row_levels() {
        // rows carry a different offset each; overscan columns hold the offset
        let mut data = Array2::from_shape_fn((3, 4), |(r, c)| {
            let offset = 10.0 * (r + 1) as f32;
            if c >= 2 {
                offset
            } else {
                offset + 5.0
            }
        });
        let overscan = Region::parse("[3:4,1:3]", (3, 4)).unwrap();
        subtract_overscan(&mut data, &overscan);
        assert!(data.slice(s![.., 0..2]).iter().all(|&v| v == 5.0));
        assert!(data.slice(s![.., 2..4]).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_per_column_levels() {
        let mut data = Array2::from_shape_fn((4, 3), |(r, c)| {
            let offset = c as f32;
            if r == 0 {
                offset
            } else {
                offset + 2.0
            }
        });
        let overscan = Region::parse("[1:3,1:1]", (4, 3)).unwrap();
        subtract_overscan(&mut data, &overscan);
        assert!(data.slice(s![1.., ..]).iter().all(|&v| v == 2.0));
    }
}
