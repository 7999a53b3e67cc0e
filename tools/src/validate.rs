use crate::args::{ExperimentArgs, StoreArgs};
use clap::Args;
use dataset::encoding::self_check;
use dataset::integrity;
use dataset::{Dataset, Store};
use std::error::Error;

#[derive(Args)]
pub struct ValidateCommand {
    #[clap(flatten)]
    store: StoreArgs,

    #[clap(flatten)]
    experiment: ExperimentArgs,

    /// Also unpack and decode every tensor
    #[arg(long, default_value = "false")]
    deep: bool,
}

pub fn validate(cmd: ValidateCommand) -> Result<(), Box<dyn Error>> {
    let config = cmd.experiment.resolve()?;
    self_check(&config.scheme)?;

    let store = Store::open(&cmd.store.store, &cmd.store.read_options(&config))?;
    let dataset = Dataset::from_store(store, config.scheme)?;

    let report = integrity::check(&dataset, cmd.deep)?;
    dataset.close();

    for problem in &report.problems {
        println!("{}", problem);
    }
    if report.num_problems > report.problems.len() {
        println!("... and {} more", report.num_problems - report.problems.len());
    }

    if !report.is_ok() {
        return Err(format!(
            "{} problems in {} records",
            report.num_problems, report.checked
        )
        .into());
    }

    println!("{} records ok", report.checked);
    Ok(())
}
