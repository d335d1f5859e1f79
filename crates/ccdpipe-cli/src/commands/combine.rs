use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use ccdpipe_core::combine::{chunk, combine_batches};
use ccdpipe_core::io::list_fits_files;
use ccdpipe_core::pipeline::{PipelineStage, ProgressReporter};

use super::load_config;
use crate::progress::BarReporter;

#[derive(Args)]
pub struct CombineArgs {
    /// Folder of aligned frames
    pub folder: PathBuf,

    /// Frames per combined output
    #[arg(short, long)]
    pub batch_size: Option<usize>,

    /// Frames shared by consecutive batches
    #[arg(long)]
    pub overlap: Option<usize>,

    /// Output directory (default: <FOLDER>/combined)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Pipeline config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

pub fn run(args: &CombineArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(size) = args.batch_size {
        config.batch.size = size;
    }
    if let Some(overlap) = args.overlap {
        config.batch.overlap = overlap;
    }
    config.batch.validate()?;

    let out_dir = args
        .output
        .clone()
        .unwrap_or_else(|| args.folder.join("combined"));

    let files = list_fits_files(&args.folder)?;
    let batches = chunk(&files, config.batch.size, config.batch.overlap)?.len();

    let reporter = BarReporter::new()?;
    reporter.begin_stage(PipelineStage::Combining, Some(batches));
    let outputs = combine_batches(&args.folder, &config.batch, &out_dir, |done| {
        reporter.advance(done)
    })
    .with_context(|| format!("Combining {} failed", args.folder.display()))?;
    reporter.finish();

    println!();
    for path in &outputs {
        println!("Saved {}", path.display());
    }
    Ok(())
}
