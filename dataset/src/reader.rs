use crate::codec;
use crate::encoding::{Encoding, Scheme};
use crate::error::{DatasetError, StoreError};
use crate::record::PackedRecord;
use crate::store::{Store, StoreOptions};
use crate::tensor::Tensor;
use crate::transform::LabelTransform;
use rand::Rng;
use std::path::Path;

/// A decoded training sample
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub index: usize,
    /// Centipawns from white's point of view, as stored
    pub eval_cp: i32,
    pub tensor: Tensor,
    /// `eval_cp` after the dataset's label transform
    pub label: f32,
}

/// Read side of a dataset store, the interface handed to the trainer.
///
/// The record count is read once when the dataset is opened; the store is not
/// expected to change while training reads it. Cloning is cheap and each call
/// opens its own snapshot, so clones can be moved to worker threads freely.
#[derive(Clone)]
pub struct Dataset {
    store: Store,
    scheme: Scheme,
    transform: LabelTransform,
    count: usize,
}

impl Dataset {
    pub fn open<P: AsRef<Path>>(
        path: P,
        options: &StoreOptions,
        scheme: Scheme,
    ) -> Result<Self, DatasetError> {
        Self::from_store(Store::open(path, options)?, scheme)
    }

    /// Fails if the store was built with another scheme or has no count
    pub fn from_store(store: Store, scheme: Scheme) -> Result<Self, DatasetError> {
        let (count, stored_scheme) = {
            let txn = store.begin_read()?;
            (txn.count()?, txn.scheme()?)
        };

        match stored_scheme {
            Some(stored) if stored != scheme.name() => {
                return Err(StoreError::SchemeMismatch {
                    stored,
                    requested: scheme.name().to_string(),
                }
                .into());
            }
            Some(_) => {}
            None => log::warn!(
                "store {} does not record its scheme, assuming '{}'",
                store.path().display(),
                scheme
            ),
        }

        log::info!(
            "dataset {}: {} records, scheme '{}' ({} bytes per tensor)",
            store.path().display(),
            count,
            scheme,
            scheme.packed_len()
        );

        Ok(Self {
            store,
            scheme,
            transform: LabelTransform::Raw,
            count,
        })
    }

    pub fn with_transform(mut self, transform: LabelTransform) -> Self {
        self.transform = transform;
        self
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn scheme(&self) -> &Scheme {
        &self.scheme
    }

    pub fn transform(&self) -> &LabelTransform {
        &self.transform
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Closes the underlying store, see [`Store::close`]
    pub fn close(self) {
        self.store.close();
    }

    fn check_range(&self, index: usize) -> Result<(), DatasetError> {
        if index >= self.count {
            return Err(DatasetError::OutOfRange {
                index,
                count: self.count,
            });
        }
        Ok(())
    }

    /// Validated record at `index`: right length and carrying its own index
    pub fn raw(&self, index: usize) -> Result<PackedRecord, DatasetError> {
        self.check_range(index)?;

        let txn = self.store.begin_read()?;
        Ok(txn.record(index, self.scheme.packed_len())?)
    }

    pub fn get(&self, index: usize) -> Result<Sample, DatasetError> {
        let record = self.raw(index)?;
        let tensor = codec::unpack(&record.packed, self.scheme.shape())?;

        Ok(Sample {
            index,
            eval_cp: record.eval_cp,
            tensor,
            label: self.transform.apply(record.eval_cp),
        })
    }

    /// Endless samples drawn uniformly with replacement
    pub fn sampler<R: Rng>(&self, rng: R) -> Sampler<'_, R> {
        Sampler { dataset: self, rng }
    }
}

pub struct Sampler<'d, R> {
    dataset: &'d Dataset,
    rng: R,
}

impl<R: Rng> Iterator for Sampler<'_, R> {
    type Item = Result<Sample, DatasetError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.dataset.is_empty() {
            return None;
        }

        let index = self.rng.gen_range(0..self.dataset.len());
        Some(self.dataset.get(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::{Flat, Planes};
    use crate::ingest::Ingestor;
    use crate::store::Durability;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use shakmaty::Chess;
    use std::collections::HashSet;

    fn options() -> StoreOptions {
        StoreOptions {
            map_size: 16 * 1024 * 1024,
            durability: Durability::Buffered,
            read_only: false,
        }
    }

    /// Store with `count` copies of the starting position, eval = 10 * index
    fn build(dir: &Path, scheme: Scheme, count: usize) -> Store {
        let store = Store::open(dir, &options()).unwrap();
        let mut ingestor = Ingestor::create(&store, scheme, 4).unwrap();
        for index in 0..count {
            ingestor.push(&Chess::default(), 10 * index as i32).unwrap();
        }
        ingestor.finish().unwrap();
        store
    }

    #[test]
    fn test_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = build(dir.path(), Planes.into(), 10);

        let dataset = Dataset::from_store(store, Planes.into())
            .unwrap()
            .with_transform(LabelTransform::default());
        assert_eq!(dataset.len(), 10);

        let sample = dataset.get(7).unwrap();
        assert_eq!(sample.index, 7);
        assert_eq!(sample.eval_cp, 70);
        assert_eq!(sample.label, 0.7);
        assert_eq!(sample.tensor, Planes.encode(&Chess::default()).unwrap());
    }

    #[test]
    fn test_out_of_range() {
        let dir = tempfile::tempdir().unwrap();
        let store = build(dir.path(), Planes.into(), 3);
        let dataset = Dataset::from_store(store, Planes.into()).unwrap();

        assert!(matches!(
            dataset.get(3),
            Err(DatasetError::OutOfRange { index: 3, count: 3 })
        ));
    }

    #[test]
    fn test_scheme_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let store = build(dir.path(), Planes.into(), 3);

        assert!(matches!(
            Dataset::from_store(store, Flat.into()),
            Err(DatasetError::Store(StoreError::SchemeMismatch { .. }))
        ));
    }

    #[test]
    fn test_sampler_draws_with_replacement() {
        let dir = tempfile::tempdir().unwrap();
        let store = build(dir.path(), Flat.into(), 5);
        let dataset = Dataset::from_store(store, Flat.into()).unwrap();

        let indexes: Vec<usize> = dataset
            .sampler(StdRng::seed_from_u64(7))
            .take(200)
            .map(|sample| sample.unwrap().index)
            .collect();

        // more draws than records, every record seen
        assert_eq!(indexes.len(), 200);
        assert_eq!(indexes.iter().collect::<HashSet<_>>().len(), 5);
    }

    #[test]
    fn test_concurrent_readers() {
        let dir = tempfile::tempdir().unwrap();
        let store = build(dir.path(), Planes.into(), 50);
        let dataset = Dataset::from_store(store, Planes.into()).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|seed| {
                let dataset = dataset.clone();
                std::thread::spawn(move || {
                    dataset
                        .sampler(StdRng::seed_from_u64(seed))
                        .take(100)
                        .map(|sample| sample.unwrap().eval_cp)
                        .sum::<i32>()
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap() >= 0);
        }
    }

    #[test]
    fn test_empty_sampler() {
        let dir = tempfile::tempdir().unwrap();
        let store = build(dir.path(), Planes.into(), 0);
        let dataset = Dataset::from_store(store, Planes.into()).unwrap();

        assert!(dataset.is_empty());
        assert!(dataset.sampler(StdRng::seed_from_u64(0)).next().is_none());
    }
}
