use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid FITS file {path}: {reason}")]
    InvalidFits { path: PathBuf, reason: String },

    #[error("{path}: missing header field {key}")]
    MissingField { path: PathBuf, key: String },

    #[error("{path}: malformed value {value:?} for header field {key}")]
    MalformedField {
        path: PathBuf,
        key: String,
        value: String,
    },

    #[error("Shape mismatch for {path}: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        path: PathBuf,
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("Insufficient frames: {0}")]
    InsufficientFrames(String),

    #[error("Missing dependency: {0} does not exist")]
    MissingDependency(PathBuf),

    #[error("Registration failed for {path}: {reason}")]
    RegistrationFailure { path: PathBuf, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Cannot organize {path}: no usable value for {key}")]
    Organization { path: PathBuf, key: String },

    #[error("Invalid data in {path}: {reason}")]
    InvalidData { path: PathBuf, reason: String },
}

pub type Result<T> = std::result::Result<T, PipelineError>;
