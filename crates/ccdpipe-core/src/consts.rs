/// Minimum pixel count (h*w) to use row-level Rayon parallelism.
pub const PARALLEL_PIXEL_THRESHOLD: usize = 65_536;

/// Minimum frame count to use frame-level Rayon parallelism.
pub const PARALLEL_FRAME_THRESHOLD: usize = 4;

/// Small epsilon to avoid division by zero in floating-point comparisons.
pub const EPSILON: f32 = 1e-10;

/// FITS logical record size in bytes.
pub const FITS_BLOCK_SIZE: usize = 2880;

/// FITS header card size in bytes.
pub const FITS_CARD_SIZE: usize = 80;

/// Extensions recognised as frame files (compared case-insensitively).
pub const FITS_EXTENSIONS: [&str; 3] = ["fits", "fit", "fts"];

// Header keys read from OPD/LNA frames.
pub const KEY_DATE_OBS: &str = "DATE-OBS";
pub const KEY_OBJECT: &str = "OBJECT";
pub const KEY_FILTER: &str = "FILTER";
pub const KEY_EXPTIME: &str = "EXPTIME";
pub const KEY_AIRMASS: &str = "AIRMASS";
pub const KEY_COMMENT: &str = "COMMENT";
pub const KEY_JD: &str = "JD";
pub const KEY_IMAGE: &str = "IMAGE";
pub const KEY_BIASSEC: &str = "BIASSEC";
pub const KEY_TRIMSEC: &str = "TRIMSEC";

// Header keys written by the pipeline.
pub const KEY_CCDPROC: &str = "CCDPROC";
pub const KEY_OVERSCAN: &str = "OVERSCAN";
pub const KEY_TRIMMED: &str = "TRIMMED";
pub const KEY_CALSTAT: &str = "CALSTAT";
pub const KEY_NCOMBINE: &str = "NCOMBINE";
pub const KEY_MASTER_BIAS: &str = "MASTERBS";
pub const KEY_MASTER_FLAT: &str = "MASTERFL";
pub const KEY_ALIGNED_TO: &str = "ALIGNTO";
pub const KEY_INPUT_PREFIX: &str = "IMCMB";

/// Frame-type tags used by the mission's headers.
pub const OBJECT_BIAS: &str = "bias";
pub const OBJECT_FLAT: &str = "flat";
pub const TAG_SCIENCE: &str = "science";

/// Output file names for master calibration frames.
pub const MASTER_BIAS_FILENAME: &str = "master_bias.fits";
pub const MASTER_FLAT_PREFIX: &str = "master_flat_";

/// Prefix given to a frame after it has been resampled onto a reference.
pub const ALIGNED_PREFIX: &str = "a_";

/// Prefix of combined batch outputs.
pub const COMBINED_PREFIX: &str = "final";

/// Default sigma-clipping threshold, in standard deviations, on each side.
pub const DEFAULT_CLIP_SIGMA: f32 = 3.0;

/// Upper bound on sigma-clipping passes; clipping normally converges in 2-3.
pub const DEFAULT_CLIP_MAX_ITERATIONS: usize = 10;

/// Detection threshold above background, in robust standard deviations.
pub const DEFAULT_DETECTION_SIGMA: f32 = 5.0;

/// Minimum connected pixels for a detection to count as a source.
pub const DEFAULT_MIN_SOURCE_AREA: usize = 5;

/// Brightest sources kept as control points for triangle matching.
pub const DEFAULT_MAX_CONTROL_POINTS: usize = 50;

/// Registration needs roughly this many detectable sources to be reliable.
pub const DEFAULT_MIN_SOURCES: usize = 10;

/// Nearest neighbours used to build triangles around each source.
pub const TRIANGLE_NEIGHBOURS: usize = 5;

/// Maximum distance between triangle invariants to be considered a match.
pub const DEFAULT_INVARIANT_TOLERANCE: f64 = 0.1;

/// Maximum residual (pixels) for a control point to count as an inlier.
pub const DEFAULT_PIXEL_TOLERANCE: f64 = 2.0;

/// Minimum inlier control points for an accepted transform.
pub const DEFAULT_MIN_INLIERS: usize = 4;

/// Scale factor from median absolute deviation to Gaussian sigma.
pub const MAD_TO_SIGMA: f32 = 1.4826;

/// Default frames per combined batch.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Name of the per-night index and summary files (after the directory name).
pub const NIGHT_LOG_SUFFIX: &str = "_night.log";
pub const NIGHT_SUMMARY_SUFFIX: &str = "_night.summary";
