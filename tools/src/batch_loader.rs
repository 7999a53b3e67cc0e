use crate::args::{ExperimentArgs, StoreArgs};
use byteorder::{NativeEndian, WriteBytesExt};
use clap::Args;
use crossbeam::channel::{bounded, Sender};
use dataset::encoding::{self_check, Encoding};
use dataset::manifest::Manifest;
use dataset::stats::resolve_transform;
use dataset::{Dataset, Store};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared_memory::ShmemConf;
use std::error::Error;
use std::io::{self, Cursor, Read, Seek, Write};
use std::path::PathBuf;
use std::time::Duration;

struct BatchData {
    x: Vec<u8>,
    y: Vec<u8>,
}

#[derive(Args, Clone)]
pub struct BatchLoaderCommand {
    #[clap(flatten)]
    store: StoreArgs,

    #[clap(flatten)]
    experiment: ExperimentArgs,

    /// The shared memory file to write the samples.
    /// Must be `batch_size * (elements + 1) * 4` bytes: the f32 tensors, then the f32 labels
    #[arg(long)]
    shmem: String,

    /// Number of samples in one batch
    #[arg(long, default_value = "8192")]
    batch_size: usize,

    /// Number of batch threads to use
    #[arg(long, default_value = "4")]
    threads: usize,

    /// Seed for the samplers, each thread derives its own from it
    #[arg(long)]
    seed: Option<u64>,

    /// Where to write the manifest describing the batches
    #[arg(long, value_name = "manifest")]
    manifest: Option<PathBuf>,
}

pub fn batch_loader(cmd: BatchLoaderCommand) -> Result<(), Box<dyn Error>> {
    let config = cmd.experiment.resolve()?;
    self_check(&config.scheme)?;

    let store = Store::open(&cmd.store.store, &cmd.store.read_options(&config))?;
    let dataset = Dataset::from_store(store, config.scheme)?;
    if dataset.is_empty() {
        return Err("the dataset has no records".into());
    }

    let (transform, norm) = resolve_transform(&config.transform, &dataset, config.normalization)?;
    let dataset = dataset.with_transform(transform);
    log::info!("labels: {}", transform);

    if let Some(path) = &cmd.manifest {
        Manifest::new(&dataset, norm).write(path)?;
        log::info!("manifest written to {}", path.display());
    }

    let x_batch_size = cmd.batch_size * config.scheme.num_elements() * 4;
    let y_batch_size = cmd.batch_size * 4;

    // open shared memory file
    let mut shmem = ShmemConf::new().os_id(&cmd.shmem).open()?;
    let shmem_slice = unsafe { shmem.as_slice_mut() };
    if shmem_slice.len() != x_batch_size + y_batch_size {
        return Err(format!(
            "shared memory has {} bytes, expected {}",
            shmem_slice.len(),
            x_batch_size + y_batch_size
        )
        .into());
    }

    let (batch_sender, batch_receiver) = bounded(64); // keep up to X batches ready in memory

    // the threads own every sender, when all of them stop the channel is disconnected
    let mut join_handles = vec![];
    for i in 0..cmd.threads.max(1) {
        let batch_sender = batch_sender.clone();
        let dataset = dataset.clone();
        let rng = match cmd.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(i as u64)),
            None => StdRng::from_entropy(),
        };
        let batch_size = cmd.batch_size;

        join_handles.push(std::thread::spawn(move || {
            build_batches_thread(dataset, rng, batch_size, batch_sender)
        }));
    }
    drop(batch_sender);

    // loop to write batches
    loop {
        // receive a batch from another thread
        if let Ok(batch) = batch_receiver.recv_timeout(Duration::from_millis(10)) {
            // a failed read ends the run, the other threads stop once the channel is gone
            let batch: BatchData = batch.map_err(|err| format!("batch thread failed: {}", err))?;

            // wait for the reader to signal that it has finished copying the data of the last batch (1 byte)
            // the reader closing its end means training is over
            if let Err(err) = io::stdin().read_exact(&mut [0]) {
                if err.kind() == io::ErrorKind::UnexpectedEof {
                    log::info!("consumer closed the pipe, exiting");
                    return Ok(());
                }
                return Err(err.into());
            }

            // copy new batch to shared memory
            shmem_slice[..x_batch_size].copy_from_slice(&batch.x);
            shmem_slice[x_batch_size..].copy_from_slice(&batch.y);

            // send a signal to the consumer (1 byte)
            io::stdout().write_all(&[64])?;
            io::stdout().flush()?;
        } else if batch_receiver.is_empty() && join_handles.iter().all(|h| h.is_finished()) {
            return Err("every batch thread stopped".into());
        }
    }
}

/// Fills batches until the receiver is gone. A failed read is sent to the
/// receiver and ends the thread.
fn build_batches_thread(
    dataset: Dataset,
    rng: StdRng,
    batch_size: usize,
    batch_sender: Sender<Result<BatchData, String>>,
) {
    if let Err(err) = fill_batches(dataset, rng, batch_size, &batch_sender) {
        log::error!("{}", err);
        // the receiver may be gone already
        let _ = batch_sender.send(Err(err.to_string()));
    }
}

fn fill_batches(
    dataset: Dataset,
    rng: StdRng,
    batch_size: usize,
    batch_sender: &Sender<Result<BatchData, String>>,
) -> Result<(), Box<dyn Error>> {
    let x_batch_size = batch_size * dataset.scheme().num_elements() * 4;

    let mut x_cursor = Cursor::new(vec![0u8; x_batch_size]);
    let mut y_cursor = Cursor::new(vec![0u8; batch_size * 4]);
    let mut samples = dataset.sampler(rng);

    loop {
        for _ in 0..batch_size {
            let sample = match samples.next() {
                Some(sample) => sample?,
                None => return Ok(()),
            };

            for value in sample.tensor.as_slice() {
                x_cursor.write_f32::<NativeEndian>(*value as f32)?;
            }
            y_cursor.write_f32::<NativeEndian>(sample.label)?;
        }

        let batch = BatchData {
            x: x_cursor.get_ref().clone(),
            y: y_cursor.get_ref().clone(),
        };
        if batch_sender.send(Ok(batch)).is_err() {
            // the writer is gone
            return Ok(());
        }

        // reset buffers
        x_cursor.rewind()?;
        y_cursor.rewind()?;
    }
}
