use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use ccdpipe_core::io::list_fits_files;
use ccdpipe_core::pipeline::{align_and_combine_reported, PipelineStage, ProgressReporter};
use ccdpipe_core::register::{align_folder, AlignOutcome};

use super::load_config;
use crate::progress::BarReporter;
use crate::summary::print_align_combine_report;

#[derive(Args)]
pub struct AlignArgs {
    /// Folder of reduced frames of one object, filter and exposure
    pub folder: PathBuf,

    /// Reference frame (default: first file by name)
    #[arg(short, long)]
    pub reference: Option<PathBuf>,

    /// Pipeline config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Minimum detected sources per frame
    #[arg(long)]
    pub min_sources: Option<usize>,

    /// Also combine the aligned frames in batches
    #[arg(long)]
    pub combine: bool,
}

pub fn run(args: &AlignArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(n) = args.min_sources {
        config.registration.min_sources = n;
    }

    let reporter = Arc::new(BarReporter::new()?);

    if args.combine {
        let report = align_and_combine_reported(
            &args.folder,
            args.reference.as_deref(),
            &config.align_combine(),
            reporter.clone(),
        )
        .with_context(|| format!("Align and combine of {} failed", args.folder.display()))?;
        reporter.finish();
        print_align_combine_report(&report);
        return Ok(());
    }

    let total = list_fits_files(&args.folder)?.len();
    reporter.begin_stage(PipelineStage::Aligning, Some(total));
    let outcomes = align_folder(
        &args.folder,
        args.reference.as_deref(),
        &config.registration,
        |done| reporter.advance(done),
    )
    .with_context(|| format!("Alignment of {} failed", args.folder.display()))?;
    reporter.finish();

    let aligned = outcomes
        .iter()
        .filter(|o| matches!(o, AlignOutcome::Aligned { .. }))
        .count();
    println!(
        "\n{} frames aligned, {} already aligned",
        aligned,
        outcomes.len() - aligned
    );
    Ok(())
}
