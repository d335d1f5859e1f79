use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use ccdpipe_core::calibration::FlatPolicy;
use ccdpipe_core::pipeline::initial_reduction_reported;

use super::load_config;
use crate::progress::BarReporter;
use crate::summary::{print_reduction_plan, print_reduction_report};

#[derive(Args)]
pub struct ReduceArgs {
    /// Night directory holding the raw FITS frames
    pub night_dir: PathBuf,

    /// Parent directory of the reduced tree (default: next to the night)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Pipeline config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Keep the raw calibration copies after the masters are built
    #[arg(long)]
    pub keep_calibration: bool,

    /// Median-combined, mean-normalized master flats
    #[arg(long)]
    pub legacy_flat: bool,
}

pub fn run(args: &ReduceArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if args.output.is_some() {
        config.reduction.output = args.output.clone();
    }
    if args.keep_calibration {
        config.reduction.cleanup_calibration = false;
    }
    if args.legacy_flat {
        config.reduction.flat = FlatPolicy::legacy();
    }

    print_reduction_plan(&config);

    let reporter = Arc::new(BarReporter::new()?);
    let report = initial_reduction_reported(&args.night_dir, &config.reduction, reporter.clone())
        .with_context(|| format!("Reduction of {} failed", args.night_dir.display()))?;
    reporter.finish();

    print_reduction_report(&report);
    Ok(())
}
