use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::combine::{chunk, combine_batches};
use crate::error::Result;
use crate::io;
use crate::register::{align_folder, AlignOutcome};

use super::config::AlignCombineConfig;
use super::types::{AlignCombineReport, NoOpReporter, PipelineStage, ProgressReporter};

pub fn align_and_combine(
    folder: &Path,
    reference: Option<&Path>,
    config: &AlignCombineConfig,
) -> Result<AlignCombineReport> {
    align_and_combine_reported(folder, reference, config, Arc::new(NoOpReporter))
}

/// Align every frame of a science folder onto one reference, then
/// median-combine the aligned frames batch by batch into
/// `<folder>/combined` (or `config.output`).
pub fn align_and_combine_reported(
    folder: &Path,
    reference: Option<&Path>,
    config: &AlignCombineConfig,
    reporter: Arc<dyn ProgressReporter>,
) -> Result<AlignCombineReport> {
    config.batch.validate()?;

    let total = io::list_fits_files(folder)?.len();
    reporter.begin_stage(PipelineStage::Aligning, Some(total));
    let r = reporter.clone();
    let outcomes = align_folder(folder, reference, &config.registration, |done| {
        r.advance(done)
    })?;
    reporter.finish_stage();

    let aligned = outcomes
        .iter()
        .filter(|o| matches!(o, AlignOutcome::Aligned { .. }))
        .count();

    let out_dir = config
        .output
        .clone()
        .unwrap_or_else(|| folder.join("combined"));
    let files = io::list_fits_files(folder)?;
    let batches = chunk(&files, config.batch.size, config.batch.overlap)?.len();

    reporter.begin_stage(PipelineStage::Combining, Some(batches));
    let r = reporter.clone();
    let combined = combine_batches(folder, &config.batch, &out_dir, |done| r.advance(done))?;
    reporter.finish_stage();

    info!(
        folder = %folder.display(),
        aligned,
        combined = combined.len(),
        "Align and combine complete"
    );
    Ok(AlignCombineReport {
        aligned,
        skipped: outcomes.len() - aligned,
        combined,
    })
}
