use crate::args::{ExperimentArgs, StoreArgs};
use clap::Args;
use dataset::config::Normalization;
use dataset::stats::resolve_stats;
use dataset::{Dataset, Store, StoreOptions};
use std::error::Error;

#[derive(Args)]
pub struct StatsCommand {
    #[clap(flatten)]
    store: StoreArgs,

    #[clap(flatten)]
    experiment: ExperimentArgs,

    /// Cache the statistics in the store for later runs
    #[arg(long, default_value = "false")]
    persist: bool,
}

pub fn stats(cmd: StatsCommand) -> Result<(), Box<dyn Error>> {
    let config = cmd.experiment.resolve()?;

    let options = if cmd.persist {
        cmd.store.options(StoreOptions {
            read_only: false,
            ..config.store.clone()
        })
    } else {
        cmd.store.read_options(&config)
    };
    let store = Store::open(&cmd.store.store, &options)?;
    let dataset = Dataset::from_store(store, config.scheme)?;

    let normalization = if cmd.persist {
        Normalization::Persisted
    } else {
        config.normalization
    };
    let stats = resolve_stats(&dataset, normalization)?;
    dataset.close();

    println!("{}", serde_json::to_string_pretty(&stats)?);

    Ok(())
}
