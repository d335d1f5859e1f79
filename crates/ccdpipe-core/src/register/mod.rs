pub mod detect;
pub mod transform;
pub mod triangle;
pub mod warp;

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::consts::{
    ALIGNED_PREFIX, DEFAULT_INVARIANT_TOLERANCE, DEFAULT_MIN_INLIERS, DEFAULT_MIN_SOURCES,
    DEFAULT_PIXEL_TOLERANCE, KEY_ALIGNED_TO, TRIANGLE_NEIGHBOURS,
};
use crate::error::{PipelineError, Result};
use crate::frame::Frame;
use crate::io;

pub use detect::{detect_sources, DetectionConfig, Source};
pub use transform::SimilarityTransform;
pub use triangle::{build_triangles, match_triangles, Triangle};
pub use warp::{bilinear_sample, warp_onto};

/// Star-registration settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationConfig {
    pub detection: DetectionConfig,
    /// Fewer detected sources than this in either image fails registration.
    pub min_sources: usize,
    /// Nearest neighbours used to build triangles around each source.
    pub neighbours: usize,
    /// Maximum distance between triangle invariants for a match.
    pub invariant_tolerance: f64,
    /// Maximum residual (pixels) for a control point to count as an inlier.
    pub pixel_tolerance: f64,
    /// Minimum inlier control points for an accepted transform.
    pub min_inliers: usize,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            detection: DetectionConfig::default(),
            min_sources: DEFAULT_MIN_SOURCES,
            neighbours: TRIANGLE_NEIGHBOURS,
            invariant_tolerance: DEFAULT_INVARIANT_TOLERANCE,
            pixel_tolerance: DEFAULT_PIXEL_TOLERANCE,
            min_inliers: DEFAULT_MIN_INLIERS,
        }
    }
}

/// Accepted transform and the control points supporting it.
#[derive(Clone, Debug)]
pub struct TransformMatch {
    pub transform: SimilarityTransform,
    pub inliers: usize,
}

/// Reference frame, loaded and measured once for a whole folder.
#[derive(Clone, Debug)]
pub struct ReferenceImage {
    pub path: PathBuf,
    /// Name written to `ALIGNTO` of every frame aligned onto this reference.
    pub name: String,
    pub dim: (usize, usize),
    pub sources: Vec<Source>,
}

impl ReferenceImage {
    pub fn load(path: &Path, config: &RegistrationConfig) -> Result<Self> {
        let frame = Frame::load(path)?;
        let sources = detect_sources(&frame.data, &config.detection);
        if sources.len() < config.min_sources {
            return Err(too_few_sources(path, sources.len(), config));
        }

        // an already aligned reference keeps the name of the original one
        let name = frame
            .header
            .get_str(KEY_ALIGNED_TO)
            .map(str::to_string)
            .unwrap_or_else(|| io::file_name(path));

        debug!(reference = %name, sources = sources.len(), "Reference loaded");
        Ok(Self {
            path: path.to_path_buf(),
            name,
            dim: frame.dim(),
            sources,
        })
    }
}

/// Result of aligning one file.
#[derive(Clone, Debug)]
pub enum AlignOutcome {
    Aligned {
        output: PathBuf,
        transform: SimilarityTransform,
        inliers: usize,
    },
    /// Already aligned onto the same reference.
    Skipped(PathBuf),
}

fn too_few_sources(path: &Path, found: usize, config: &RegistrationConfig) -> PipelineError {
    PipelineError::RegistrationFailure {
        path: path.to_path_buf(),
        reason: format!(
            "only {} sources detected, at least {} needed",
            found, config.min_sources
        ),
    }
}

fn points(sources: &[Source]) -> Vec<(f64, f64)> {
    sources.iter().map(|s| (s.x, s.y)).collect()
}

/// One-to-one correspondences `(source, reference)` whose transformed
/// positions lie within `tolerance` pixels.
fn correspondences(
    transform: &SimilarityTransform,
    source: &[(f64, f64)],
    reference: &[(f64, f64)],
    tolerance: f64,
) -> Vec<(usize, usize)> {
    let tol2 = tolerance * tolerance;
    let mut used = HashSet::new();
    let mut pairs = Vec::new();
    for (i, &(x, y)) in source.iter().enumerate() {
        let (tx, ty) = transform.apply(x, y);
        let nearest = reference
            .iter()
            .enumerate()
            .filter(|(j, _)| !used.contains(j))
            .map(|(j, &(rx, ry))| ((rx - tx).powi(2) + (ry - ty).powi(2), j))
            .filter(|&(d2, _)| d2 <= tol2)
            .min_by(|a, b| a.0.total_cmp(&b.0));
        if let Some((_, j)) = nearest {
            used.insert(j);
            pairs.push((i, j));
        }
    }
    pairs
}

fn point_pairs(
    pairs: &[(usize, usize)],
    source: &[(f64, f64)],
    reference: &[(f64, f64)],
) -> Vec<((f64, f64), (f64, f64))> {
    pairs.iter().map(|&(i, j)| (source[i], reference[j])).collect()
}

/// Find the similarity transform mapping `source` positions onto `reference`
/// positions by triangle matching.
///
/// Every matched triangle pair proposes a transform; the one with the most
/// consistent control points wins and is refitted on all of them.
pub fn estimate_transform(
    source: &[Source],
    reference: &[Source],
    config: &RegistrationConfig,
) -> Option<TransformMatch> {
    let src = points(source);
    let refs = points(reference);

    let src_triangles = build_triangles(&src, config.neighbours);
    let ref_triangles = build_triangles(&refs, config.neighbours);
    let matches = match_triangles(&src_triangles, &ref_triangles, config.invariant_tolerance);
    debug!(
        source_triangles = src_triangles.len(),
        reference_triangles = ref_triangles.len(),
        matches = matches.len(),
        "Triangle matching"
    );

    let perfect = src.len().min(refs.len());
    let mut best: Vec<(usize, usize)> = Vec::new();
    for (si, ri) in matches {
        let s = &src_triangles[si].vertices;
        let r = &ref_triangles[ri].vertices;
        let pairs: Vec<(usize, usize)> = s.iter().copied().zip(r.iter().copied()).collect();
        let Some(hypothesis) = SimilarityTransform::fit(&point_pairs(&pairs, &src, &refs)) else {
            continue;
        };
        let inliers = correspondences(&hypothesis, &src, &refs, config.pixel_tolerance);
        if inliers.len() > best.len() {
            best = inliers;
            if best.len() == perfect {
                break;
            }
        }
    }

    if best.len() < config.min_inliers.max(2) {
        return None;
    }

    let refit = SimilarityTransform::fit(&point_pairs(&best, &src, &refs))?;
    let inliers = correspondences(&refit, &src, &refs, config.pixel_tolerance).len();
    if inliers < config.min_inliers {
        return None;
    }
    Some(TransformMatch {
        transform: refit,
        inliers,
    })
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Resample the frame at `path` onto the reference grid and write it as
/// `a_<name>` next to the input, which is then removed.
pub fn align_frame(
    path: &Path,
    reference: &ReferenceImage,
    config: &RegistrationConfig,
) -> Result<AlignOutcome> {
    let header = io::read_header(path)?;
    if header.get_str(KEY_ALIGNED_TO) == Some(reference.name.as_str()) {
        debug!(file = %path.display(), "Already aligned, skipped");
        return Ok(AlignOutcome::Skipped(path.to_path_buf()));
    }

    let mut frame = Frame::load(path)?;
    let matched = if same_file(path, &reference.path) {
        TransformMatch {
            transform: SimilarityTransform::identity(),
            inliers: reference.sources.len(),
        }
    } else {
        let sources = detect_sources(&frame.data, &config.detection);
        if sources.len() < config.min_sources {
            return Err(too_few_sources(path, sources.len(), config));
        }
        estimate_transform(&sources, &reference.sources, config).ok_or_else(|| {
            PipelineError::RegistrationFailure {
                path: path.to_path_buf(),
                reason: format!(
                    "no consistent triangle match with {} (need {} control points)",
                    reference.name, config.min_inliers
                ),
            }
        })?
    };

    let t = matched.transform;
    if t != SimilarityTransform::identity() || frame.dim() != reference.dim {
        frame.data = warp_onto(&frame.data, &t, reference.dim);
    }
    frame
        .header
        .set_with_comment(KEY_ALIGNED_TO, reference.name.as_str(), "registration reference");

    let output = path.with_file_name(format!("{}{}", ALIGNED_PREFIX, io::file_name(path)));
    frame.save(&output)?;
    if output != path {
        fs::remove_file(path)?;
    }

    debug!(
        file = %path.display(),
        dx = t.tx,
        dy = t.ty,
        rotation = t.rotation(),
        scale = t.scale(),
        inliers = matched.inliers,
        "Frame aligned"
    );
    Ok(AlignOutcome::Aligned {
        output,
        transform: t,
        inliers: matched.inliers,
    })
}

/// Align every FITS file in `dir` onto `reference` (default: the first file
/// by name). The reference is loaded once. `progress` receives the number
/// of frames done.
pub fn align_folder(
    dir: &Path,
    reference: Option<&Path>,
    config: &RegistrationConfig,
    progress: impl Fn(usize),
) -> Result<Vec<AlignOutcome>> {
    let files = io::list_fits_files(dir)?;
    let first = files.first().ok_or_else(|| {
        PipelineError::InsufficientFrames(format!("no frames to align in {}", dir.display()))
    })?;
    let reference_path = reference.map(Path::to_path_buf).unwrap_or_else(|| first.clone());
    let reference = ReferenceImage::load(&reference_path, config)?;

    let mut outcomes = Vec::with_capacity(files.len());
    for (i, file) in files.iter().enumerate() {
        outcomes.push(align_frame(file, &reference, config)?);
        progress(i + 1);
    }

    let aligned = outcomes
        .iter()
        .filter(|o| matches!(o, AlignOutcome::Aligned { .. }))
        .count();
    info!(
        dir = %dir.display(),
        reference = %reference.name,
        aligned,
        skipped = outcomes.len() - aligned,
        "Folder aligned"
    );
    Ok(outcomes)
}
