use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::calibration::{build_master_bias, build_master_flat, master_flat_path};
use crate::consts::KEY_FILTER;
use crate::correct::{correct_overscan, CorrectionOutcome, MasterSet};
use crate::error::{PipelineError, Result};
use crate::frame::{grouping_value, FrameKind};
use crate::index::index_directory;
use crate::io;
use crate::organize::{copy_files, separate_by_key, separate_tree};

use super::config::ReductionConfig;
use super::layout::FolderLayout;
use super::types::{NoOpReporter, PipelineStage, ProgressReporter, ReductionReport};

/// Run the initial reduction of a night without progress reporting.
pub fn initial_reduction(night_dir: &Path, config: &ReductionConfig) -> Result<ReductionReport> {
    initial_reduction_reported(night_dir, config, Arc::new(NoOpReporter))
}

/// Index, organize and calibrate one observing night.
///
/// Raw frames are copied, never modified. The reduced science frames end up
/// sorted by `config.organize_keys` under `science/reduced`.
pub fn initial_reduction_reported(
    night_dir: &Path,
    config: &ReductionConfig,
    reporter: Arc<dyn ProgressReporter>,
) -> Result<ReductionReport> {
    reporter.begin_stage(PipelineStage::Indexing, None);
    let index = index_directory(night_dir, &config.extra_index_keys, config.persist_index)?;
    reporter.finish_stage();

    let layout = FolderLayout::for_night(night_dir, config.output.as_deref());
    layout.create()?;

    let mut report = ReductionReport {
        root: layout.root.clone(),
        total_frames: index.len(),
        ..Default::default()
    };

    // Copy raw frames into the working tree.
    let groups = [
        (FrameKind::Bias, layout.bias_dir()),
        (FrameKind::Flat, layout.flat_dir()),
        (FrameKind::Science, layout.raw_dir()),
        (FrameKind::Other, layout.others_dir()),
    ];
    reporter.begin_stage(PipelineStage::Organizing, Some(groups.len()));
    for (i, (kind, dir)) in groups.iter().enumerate() {
        let files = index.paths_of(*kind);
        match kind {
            FrameKind::Bias => report.bias_frames = files.len(),
            FrameKind::Flat => report.flat_frames = files.len(),
            FrameKind::Science => report.science_frames = files.len(),
            FrameKind::Other => report.other_frames = files.len(),
        }
        copy_files(&files, dir)?;
        reporter.advance(i + 1);
    }
    reporter.finish_stage();
    info!(
        bias = report.bias_frames,
        flat = report.flat_frames,
        science = report.science_frames,
        others = report.other_frames,
        root = %layout.root.display(),
        "Night organized"
    );

    // Master bias.
    let bias_files = io::list_fits_files(&layout.bias_dir())?;
    reporter.begin_stage(PipelineStage::MasterBias, Some(bias_files.len()));
    for (i, file) in bias_files.iter().enumerate() {
        if correct_overscan(file)?.is_applied() {
            report.overscan_corrected += 1;
        }
        reporter.advance(i + 1);
    }
    let master_bias = build_master_bias(&bias_files, &layout.master_dir(), &config.bias_method)?;
    reporter.finish_stage();
    report.master_bias = Some(master_bias.clone());

    // Master flat per filter.
    let flat_groups = separate_by_key(&layout.flat_dir(), KEY_FILTER)?;
    reporter.begin_stage(PipelineStage::MasterFlat, Some(flat_groups.len()));
    for (i, (filter, dir)) in flat_groups.iter().enumerate() {
        let files = io::list_fits_files(dir)?;
        for file in &files {
            if correct_overscan(file)?.is_applied() {
                report.overscan_corrected += 1;
            }
        }
        let master = build_master_flat(
            &files,
            &master_bias,
            &layout.master_dir(),
            filter,
            &config.flat,
        )?;
        report.master_flats.insert(filter.clone(), master);
        reporter.advance(i + 1);
    }
    reporter.finish_stage();

    // Calibrate copies of the raw science frames.
    let raw = io::list_fits_files(&layout.raw_dir())?;
    let reduced = copy_files(&raw, &layout.reduced_dir())?;
    let mut masters: BTreeMap<String, MasterSet> = BTreeMap::new();

    reporter.begin_stage(PipelineStage::Calibrating, Some(reduced.len()));
    for (i, file) in reduced.iter().enumerate() {
        if correct_overscan(file)?.is_applied() {
            report.overscan_corrected += 1;
        }

        let header = io::read_header(file)?;
        let filter =
            grouping_value(&header, KEY_FILTER).ok_or_else(|| PipelineError::MissingField {
                path: file.clone(),
                key: KEY_FILTER.to_string(),
            })?;
        if !masters.contains_key(&filter) {
            let flat = master_flat_path(&layout.master_dir(), &filter);
            if !flat.exists() {
                return Err(PipelineError::MissingDependency(flat));
            }
            masters.insert(filter.clone(), MasterSet::load(&master_bias, &flat)?);
        }

        let set = masters.get(&filter).ok_or_else(|| {
            PipelineError::MissingDependency(master_flat_path(&layout.master_dir(), &filter))
        })?;
        match set.apply(file)? {
            CorrectionOutcome::Applied => report.calibrated += 1,
            CorrectionOutcome::Skipped => report.already_calibrated += 1,
        }
        reporter.advance(i + 1);
    }
    reporter.finish_stage();

    reporter.begin_stage(PipelineStage::Sorting, None);
    let keys: Vec<&str> = config.organize_keys.iter().map(String::as_str).collect();
    report.science_dirs = separate_tree(&layout.reduced_dir(), &keys)?;
    reporter.finish_stage();

    if config.cleanup_calibration {
        cleanup_calibration(&layout, &report)?;
    }

    info!(
        calibrated = report.calibrated,
        skipped = report.already_calibrated,
        folders = report.science_dirs.len(),
        "Initial reduction complete"
    );
    Ok(report)
}

/// Remove the raw calibration copies whose masters exist.
fn cleanup_calibration(layout: &FolderLayout, report: &ReductionReport) -> Result<()> {
    let bias_done = report.master_bias.as_ref().is_some_and(|p| p.exists());
    if bias_done && layout.bias_dir().exists() {
        fs::remove_dir_all(layout.bias_dir())?;
        info!(dir = %layout.bias_dir().display(), "Raw bias copies removed");
    }

    let flats_done = report.master_flats.values().all(|p| p.exists());
    if flats_done && layout.flat_dir().exists() {
        fs::remove_dir_all(layout.flat_dir())?;
        info!(dir = %layout.flat_dir().display(), "Raw flat copies removed");
    }
    Ok(())
}
