use crate::args::{ExperimentArgs, StoreArgs};
use clap::Args;
use dataset::encoding::Encoding;
use dataset::config::TransformSpec;
use dataset::stats;
use dataset::{Dataset, LabelTransform, Store};
use shakmaty::fen::Fen;
use shakmaty::{CastlingMode, Chess, FromSetup, Setup};
use std::error::Error;

#[derive(Args)]
pub struct InfoCommand {
    #[clap(flatten)]
    store: StoreArgs,

    #[clap(flatten)]
    experiment: ExperimentArgs,

    /// If provided, it will print the sample stored at this index
    #[arg(long, value_name = "index")]
    index: Option<usize>,
}

pub fn info(cmd: InfoCommand) -> Result<(), Box<dyn Error>> {
    let config = cmd.experiment.resolve()?;
    let store = Store::open(&cmd.store.store, &cmd.store.read_options(&config))?;

    let stored_scheme = store.begin_read()?.scheme()?;
    let scheme = match &stored_scheme {
        Some(name) => name.parse()?,
        None => config.scheme,
    };

    let dataset = Dataset::from_store(store, scheme)?;

    println!("store: {}", dataset.store().path().display());
    println!("scheme: {}", scheme);
    println!("shape: {:?}", scheme.shape());
    println!("packed bytes: {}", scheme.packed_len());
    println!("records: {}", dataset.len());
    println!("disk size: {}", indicatif::HumanBytes(dataset.store().disk_size()?));

    match stats::load(&dataset)? {
        Some(norm) => println!(
            "label stats (at {} records): min {} max {} max-abs {} mean {:.2} std {:.2}",
            norm.count, norm.min_eval, norm.max_eval, norm.max_abs_eval, norm.mean_eval, norm.std_eval
        ),
        None => println!("label stats: not persisted"),
    }

    if let Some(index) = cmd.index {
        let transform = match config.transform {
            TransformSpec::Fixed(transform) => transform,
            // max-abs needs a scan, not worth it for one sample
            TransformSpec::MaxAbsFromData => LabelTransform::Raw,
        };

        let dataset = dataset.clone().with_transform(transform);
        let sample = dataset.get(index)?;
        let decoded = scheme.decode(&sample.tensor)?;

        let mut setup = Setup::empty();
        setup.board = decoded.board;
        setup.turn = decoded.turn;

        println!();
        println!("sample {}", sample.index);
        println!("eval: {} cp", sample.eval_cp);
        println!("label ({}): {}", transform, sample.label);
        println!("board: {}", Fen(setup.clone()));
        println!("active elements: {}", sample.tensor.count_ones());

        if let Err(err) = Chess::from_setup(setup, CastlingMode::Standard) {
            log::warn!("decoded board is not a legal position: {}", err);
        } else if let Some(castling) = decoded.castling {
            println!("castling (K Q k q): {:?}", castling);
        }
    }

    dataset.close();
    Ok(())
}
