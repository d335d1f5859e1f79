pub mod config;
pub mod layout;
mod align_combine;
mod reduction;
mod types;

pub use align_combine::{align_and_combine, align_and_combine_reported};
pub use layout::FolderLayout;
pub use reduction::{initial_reduction, initial_reduction_reported};
pub use types::{
    AlignCombineReport, NoOpReporter, PipelineStage, ProgressReporter, ReductionReport,
};
