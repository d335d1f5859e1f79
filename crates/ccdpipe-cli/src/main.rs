mod commands;
mod progress;
mod summary;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ccdpipe", about = "CCD reduction pipeline for OPD/LNA observing nights")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index a night directory and write its log and summary
    Log(commands::log::LogArgs),
    /// Show FITS frame dimensions and header
    Info(commands::info::InfoArgs),
    /// Organize and calibrate a night (masters, overscan, bias/flat)
    Reduce(commands::reduce::ReduceArgs),
    /// Register every frame of a folder onto a reference frame
    Align(commands::align::AlignArgs),
    /// Median-combine aligned frames in batches
    Combine(commands::combine::CombineArgs),
    /// Print or save the default configuration
    Config(commands::config::ConfigArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &cli.command {
        Commands::Log(args) => commands::log::run(args),
        Commands::Info(args) => commands::info::run(args),
        Commands::Reduce(args) => commands::reduce::run(args),
        Commands::Align(args) => commands::align::run(args),
        Commands::Combine(args) => commands::combine::run(args),
        Commands::Config(args) => commands::config::run(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_combine_args() {
        let cli = Cli::try_parse_from([
            "ccdpipe",
            "-v",
            "combine",
            "night/NGC6752/V/60",
            "--batch-size",
            "5",
            "--overlap",
            "2",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Combine(args) => {
                assert_eq!(args.batch_size, Some(5));
                assert_eq!(args.overlap, Some(2));
            }
            _ => panic!("expected combine"),
        }
    }
}
