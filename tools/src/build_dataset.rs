use crate::args::{DurabilityArg, StoreArgs};
use clap::Args;
use dataset::archive::{open_archive, ArchiveReader, GameFilter};
use dataset::encoding::{self_check, Encoding};
use dataset::ingest::{ingest_games, Ingestor};
use dataset::{Scheme, Store, StoreOptions};
use indicatif::{HumanCount, ProgressBar, ProgressStyle};
use std::error::Error;

#[derive(Args)]
pub struct BuildDatasetCommand {
    /// Path or URL of a .pgn or .pgn.zst file to read games
    #[arg(long, value_name = "input")]
    input: String,

    #[clap(flatten)]
    store: StoreArgs,

    /// Encoding scheme: planes or flat
    #[arg(long, value_name = "scheme", default_value = "planes")]
    scheme: Scheme,

    /// Records per transaction
    #[arg(long, value_name = "batch-size", default_value = "1024")]
    batch_size: usize,

    #[arg(long, value_enum, default_value = "buffered")]
    durability: DurabilityArg,

    /// Only accept positions that are at least this many plies deep
    #[arg(long, value_name = "min-ply", default_value = "0")]
    min_ply: usize,

    /// Only accept games where both player have at least this elo
    #[arg(long, value_name = "min-elo")]
    min_elo: Option<u32>,
}

pub fn build_dataset(cmd: BuildDatasetCommand) -> Result<(), Box<dyn Error>> {
    self_check(&cmd.scheme)?;

    let options = cmd.store.options(StoreOptions {
        durability: cmd.durability.into(),
        ..StoreOptions::default()
    });
    let store = Store::open(&cmd.store.store, &options)?;

    log::info!("input: {}", cmd.input);
    log::info!(
        "store: {} (scheme '{}', {} bytes per record)",
        cmd.store.store.display(),
        cmd.scheme,
        cmd.scheme.packed_len() + 8
    );

    let filter = GameFilter {
        min_ply: cmd.min_ply,
        min_elo: cmd.min_elo,
    };
    let mut archive = ArchiveReader::new(open_archive(&cmd.input)?, filter);
    let mut ingestor = Ingestor::create(&store, cmd.scheme, cmd.batch_size)?;

    let bar = ProgressBar::new_spinner().with_style(
        ProgressStyle::default_spinner()
            .template(
                "{spinner:.green} [Elapsed {elapsed_precise}] [Games {human_pos} @ {per_sec}] {msg}",
            )?,
    );

    let games = ingest_games(&mut ingestor, &mut archive, |games, report| {
        bar.set_position(games as u64);
        bar.set_message(format!(
            "[Samples {}] [Skipped {}]",
            HumanCount(report.accepted as u64),
            HumanCount((report.skipped + report.unscored) as u64)
        ));
    })?;
    bar.finish();

    let report = ingestor.finish()?;

    log::info!(
        "done. games: {} ({} rejected), accepted positions: {}, records in store: {}",
        games,
        archive.rejected(),
        report.accepted,
        report.count
    );
    if let Ok(size) = store.disk_size() {
        log::info!("store size: {}", indicatif::HumanBytes(size));
    }
    store.close();

    Ok(())
}
