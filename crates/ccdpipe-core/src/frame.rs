use std::fmt;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use ndarray::Array2;

use crate::consts::{
    KEY_AIRMASS, KEY_COMMENT, KEY_DATE_OBS, KEY_EXPTIME, KEY_FILTER, KEY_OBJECT, OBJECT_BIAS,
    OBJECT_FLAT, TAG_SCIENCE,
};
use crate::error::{PipelineError, Result};
use crate::io::{self, Header, HeaderValue};

/// A single CCD image with its header.
/// Pixel values are physical counts, shape = (height, width).
#[derive(Clone, Debug)]
pub struct Frame {
    pub data: Array2<f32>,
    pub header: Header,
}

impl Frame {
    pub fn new(data: Array2<f32>, header: Header) -> Self {
        Self { data, header }
    }

    pub fn load(path: &Path) -> Result<Self> {
        io::read_frame(path)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        io::write_frame(path, self)
    }

    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    pub fn height(&self) -> usize {
        self.data.nrows()
    }

    /// (height, width)
    pub fn dim(&self) -> (usize, usize) {
        self.data.dim()
    }
}

/// Role of a frame in the night's reduction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FrameKind {
    Bias,
    Flat,
    Science,
    Other,
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bias => write!(f, "bias"),
            Self::Flat => write!(f, "flat"),
            Self::Science => write!(f, "science"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Observation metadata of an OPD/LNA frame, parsed once from its header.
#[derive(Clone, Debug, PartialEq)]
pub struct Observation {
    pub date_obs: String,
    pub object: String,
    pub filter: String,
    pub exposure: f64,
    pub airmass: f64,
    pub tag: String,
}

impl Observation {
    pub fn from_header(header: &Header, path: &Path) -> Result<Self> {
        let date_obs = required(header, KEY_DATE_OBS, path)?.to_string();

        let exposure_value = required(header, KEY_EXPTIME, path)?;
        let exposure = parse_exposure(exposure_value)
            .ok_or_else(|| malformed(path, KEY_EXPTIME, exposure_value))?;

        let airmass_value = required(header, KEY_AIRMASS, path)?;
        let airmass = airmass_value
            .as_f64()
            .ok_or_else(|| malformed(path, KEY_AIRMASS, airmass_value))?;

        Ok(Self {
            date_obs,
            object: normalize_object(&required(header, KEY_OBJECT, path)?.to_string()),
            filter: required(header, KEY_FILTER, path)?.to_string().trim().to_string(),
            exposure,
            airmass,
            tag: comment_tag(header, path)?,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_header(&io::read_header(path)?, path)
    }

    pub fn kind(&self) -> FrameKind {
        if self.object.eq_ignore_ascii_case(OBJECT_BIAS) {
            FrameKind::Bias
        } else if self.object.eq_ignore_ascii_case(OBJECT_FLAT) {
            FrameKind::Flat
        } else if self.tag.eq_ignore_ascii_case(TAG_SCIENCE) {
            FrameKind::Science
        } else {
            FrameKind::Other
        }
    }

    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        parse_timestamp(&self.date_obs)
    }
}

fn required<'a>(header: &'a Header, key: &str, path: &Path) -> Result<&'a HeaderValue> {
    header.get(key).ok_or_else(|| PipelineError::MissingField {
        path: path.to_path_buf(),
        key: key.to_string(),
    })
}

fn malformed(path: &Path, key: &str, value: &HeaderValue) -> PipelineError {
    PipelineError::MalformedField {
        path: path.to_path_buf(),
        key: key.to_string(),
        value: value.to_string(),
    }
}

/// The quoted tag in the first `COMMENT` card, e.g. `COMMENT 'science'`.
fn comment_tag(header: &Header, path: &Path) -> Result<String> {
    let text = header
        .commentary(KEY_COMMENT)
        .next()
        .ok_or_else(|| PipelineError::MissingField {
            path: path.to_path_buf(),
            key: KEY_COMMENT.to_string(),
        })?;
    text.split('\'')
        .nth(1)
        .map(|t| t.trim().to_string())
        .ok_or_else(|| PipelineError::MalformedField {
            path: path.to_path_buf(),
            key: KEY_COMMENT.to_string(),
            value: text.to_string(),
        })
}

pub fn normalize_object(object: &str) -> String {
    object.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Exposure in seconds. OPD headers sometimes store it as text with a decimal
/// comma (`'60,00000'`); only the integer part is meaningful there.
pub fn parse_exposure(value: &HeaderValue) -> Option<f64> {
    match value {
        HeaderValue::Text(s) => {
            let head = s.split(',').next().unwrap_or("").trim();
            head.parse::<f64>().ok()
        }
        other => other.as_f64(),
    }
}

/// Folder label for an exposure: integral values without a fractional part.
pub fn format_exposure(exposure: f64) -> String {
    if exposure.fract() == 0.0 {
        format!("{}", exposure as i64)
    } else {
        format!("{}", exposure)
    }
}

/// Normalized string form of a header key, as used for grouping frames.
pub fn grouping_value(header: &Header, key: &str) -> Option<String> {
    let key = key.to_ascii_uppercase();
    if key == KEY_COMMENT {
        let text = header.commentary(KEY_COMMENT).next()?;
        return text.split('\'').nth(1).map(|t| t.trim().to_string());
    }

    let value = header.get(&key)?;
    let normalized = match key.as_str() {
        KEY_OBJECT => normalize_object(&value.to_string()),
        KEY_EXPTIME => format_exposure(parse_exposure(value)?),
        _ => value.to_string().trim().to_string(),
    };
    Some(normalized).filter(|v| !v.is_empty())
}

pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.3f").to_string()
}
