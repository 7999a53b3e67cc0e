mod args;
mod batch_loader;
mod build_dataset;
mod info;
mod self_check;
mod stats;
mod validate;

use crate::batch_loader::{batch_loader, BatchLoaderCommand};
use crate::build_dataset::{build_dataset, BuildDatasetCommand};
use crate::info::{info, InfoCommand};
use crate::self_check::{self_check, SelfCheckCommand};
use crate::stats::{stats, StatsCommand};
use crate::validate::{validate, ValidateCommand};
use clap::{Parser, Subcommand};
use std::error::Error;

#[derive(Parser)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encodes the scored positions of a PGN archive into a dataset store
    BuildDataset(BuildDatasetCommand),
    /// Prints the layout of a dataset store and, optionally, one of its samples
    Info(InfoCommand),
    /// Checks every record of a dataset store
    Validate(ValidateCommand),
    /// Computes the label statistics of a dataset store
    Stats(StatsCommand),
    /// Runs the encoding self-check and prints the encoding of a position
    SelfCheck(SelfCheckCommand),
    /// Starts a process that writes sampled batches to a shared memory file on demand (e.g. for training)
    BatchLoader(BatchLoaderCommand),
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Cli::parse();

    // logs go to stderr, stdout is reserved for command output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    match args.command {
        Commands::BuildDataset(cmd) => build_dataset(cmd),
        Commands::Info(cmd) => info(cmd),
        Commands::Validate(cmd) => validate(cmd),
        Commands::Stats(cmd) => stats(cmd),
        Commands::SelfCheck(cmd) => self_check(cmd),
        Commands::BatchLoader(cmd) => batch_loader(cmd),
    }
}
