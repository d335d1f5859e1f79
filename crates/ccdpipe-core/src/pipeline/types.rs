use std::collections::BTreeMap;
use std::path::PathBuf;

/// Pipeline processing stage, used for progress reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineStage {
    Indexing,
    Organizing,
    MasterBias,
    MasterFlat,
    Calibrating,
    Sorting,
    Aligning,
    Combining,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Indexing => write!(f, "Indexing headers"),
            Self::Organizing => write!(f, "Organizing frames"),
            Self::MasterBias => write!(f, "Master bias"),
            Self::MasterFlat => write!(f, "Master flats"),
            Self::Calibrating => write!(f, "Calibrating science"),
            Self::Sorting => write!(f, "Sorting science"),
            Self::Aligning => write!(f, "Aligning frames"),
            Self::Combining => write!(f, "Combining batches"),
        }
    }
}

/// What an initial reduction produced.
#[derive(Clone, Debug, Default)]
pub struct ReductionReport {
    pub root: PathBuf,
    pub total_frames: usize,
    pub bias_frames: usize,
    pub flat_frames: usize,
    pub science_frames: usize,
    pub other_frames: usize,
    pub master_bias: Option<PathBuf>,
    pub master_flats: BTreeMap<String, PathBuf>,
    pub overscan_corrected: usize,
    pub calibrated: usize,
    pub already_calibrated: usize,
    /// Leaf folders of the organized science tree.
    pub science_dirs: Vec<PathBuf>,
}

/// What an align-and-combine run produced.
#[derive(Clone, Debug, Default)]
pub struct AlignCombineReport {
    pub aligned: usize,
    pub skipped: usize,
    pub combined: Vec<PathBuf>,
}

/// Thread-safe progress reporting for the pipeline.
///
/// Implementors can use this to drive progress bars, logging, or any other
/// UI feedback. All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    /// A new pipeline stage has started. `total_items` is the number of
    /// work items in this stage (e.g., frame count), if known.
    fn begin_stage(&self, _stage: PipelineStage, _total_items: Option<usize>) {}

    /// One work item within the current stage has completed.
    fn advance(&self, _items_done: usize) {}

    /// The current stage is finished.
    fn finish_stage(&self) {}
}

/// No-op progress reporter, used by the unreported entry points.
pub struct NoOpReporter;
impl ProgressReporter for NoOpReporter {}
