use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use ccdpipe_core::index::{index_directory, log_path, NightSummary};

use crate::summary::print_night_summary;

#[derive(Args)]
pub struct LogArgs {
    /// Night directory holding the raw FITS frames
    pub dir: PathBuf,

    /// Extra header keys recorded in the log (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub keys: Vec<String>,

    /// Index without writing the log and summary files
    #[arg(long)]
    pub dry_run: bool,
}

pub fn run(args: &LogArgs) -> Result<()> {
    let keys: Vec<String> = args.keys.iter().map(|k| k.trim().to_uppercase()).collect();
    let index = index_directory(&args.dir, &keys, !args.dry_run)
        .with_context(|| format!("Failed to index {}", args.dir.display()))?;

    print_night_summary(&NightSummary::from_index(&index));
    if !args.dry_run {
        println!("Log saved to {}", log_path(&args.dir).display());
    }
    Ok(())
}
