//! Label statistics of a dataset, the source of the `max-abs` constant.

use crate::config::{Normalization, TransformSpec};
use crate::encoding::Encoding;
use crate::error::{DatasetError, StoreError};
use crate::reader::Dataset;
use crate::store::NORM_KEY;
use crate::transform::LabelTransform;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Records read per snapshot during a scan
const SCAN_CHUNK: usize = 64 * 1024;

/// Evaluation statistics, tagged with the count they were computed at
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormStats {
    pub count: usize,
    pub min_eval: i32,
    pub max_eval: i32,
    pub max_abs_eval: i32,
    pub mean_eval: f64,
    pub std_eval: f64,
}

#[derive(Debug, Clone, Copy)]
struct Accumulator {
    count: usize,
    min: i32,
    max: i32,
    sum: f64,
    sum_sq: f64,
}

impl Default for Accumulator {
    fn default() -> Self {
        Accumulator {
            count: 0,
            min: i32::MAX,
            max: i32::MIN,
            sum: 0.0,
            sum_sq: 0.0,
        }
    }
}

impl Accumulator {
    fn add(&mut self, eval: i32) {
        self.count += 1;
        self.min = self.min.min(eval);
        self.max = self.max.max(eval);
        self.sum += eval as f64;
        self.sum_sq += (eval as f64) * (eval as f64);
    }

    fn merge(self, other: Accumulator) -> Accumulator {
        Accumulator {
            count: self.count + other.count,
            min: self.min.min(other.min),
            max: self.max.max(other.max),
            sum: self.sum + other.sum,
            sum_sq: self.sum_sq + other.sum_sq,
        }
    }

    fn finish(self) -> NormStats {
        if self.count == 0 {
            return NormStats {
                count: 0,
                min_eval: 0,
                max_eval: 0,
                max_abs_eval: 0,
                mean_eval: 0.0,
                std_eval: 0.0,
            };
        }

        let n = self.count as f64;
        let mean = self.sum / n;
        let variance = (self.sum_sq / n - mean * mean).max(0.0);

        NormStats {
            count: self.count,
            min_eval: self.min,
            max_eval: self.max,
            max_abs_eval: self.min.saturating_abs().max(self.max.saturating_abs()),
            mean_eval: mean,
            std_eval: variance.sqrt(),
        }
    }
}

/// Reads every record in parallel, one snapshot per chunk of indices
pub fn scan(dataset: &Dataset) -> Result<NormStats, DatasetError> {
    let count = dataset.len();
    let packed_len = dataset.scheme().packed_len();
    let chunks = count.div_ceil(SCAN_CHUNK);

    log::info!("scanning {} records for label statistics", count);

    let accumulator = (0..chunks)
        .into_par_iter()
        .map(|chunk| -> Result<Accumulator, StoreError> {
            let txn = dataset.store().begin_read()?;
            let mut accumulator = Accumulator::default();

            let start = chunk * SCAN_CHUNK;
            for index in start..(start + SCAN_CHUNK).min(count) {
                accumulator.add(txn.record(index, packed_len)?.eval_cp);
            }

            Ok(accumulator)
        })
        .try_reduce(Accumulator::default, |a, b| Ok(a.merge(b)))?;

    Ok(accumulator.finish())
}

/// Statistics cached under the `norm` key, whatever count they were taken at
pub fn load(dataset: &Dataset) -> Result<Option<NormStats>, DatasetError> {
    let txn = dataset.store().begin_read()?;

    match txn.get(NORM_KEY)? {
        Some(bytes) => Ok(Some(
            serde_json::from_slice(bytes).map_err(StoreError::from)?,
        )),
        None => Ok(None),
    }
}

pub fn persist(dataset: &Dataset, stats: &NormStats) -> Result<(), DatasetError> {
    let bytes = serde_json::to_vec(stats).map_err(StoreError::from)?;

    let mut txn = dataset.store().begin_write()?;
    txn.put(NORM_KEY, &bytes)?;
    txn.commit()?;

    Ok(())
}

/// Statistics for the current dataset according to the normalization policy
pub fn resolve_stats(
    dataset: &Dataset,
    normalization: Normalization,
) -> Result<NormStats, DatasetError> {
    match normalization {
        Normalization::Scan => scan(dataset),
        Normalization::Persisted => {
            if let Some(stats) = load(dataset)? {
                if stats.count == dataset.len() {
                    log::debug!("reusing label statistics of {} records", stats.count);
                    return Ok(stats);
                }
                log::info!(
                    "label statistics were taken at {} records, the dataset has {}",
                    stats.count,
                    dataset.len()
                );
            }

            let stats = scan(dataset)?;
            if dataset.store().options().read_only {
                log::warn!("store is read only, label statistics are not persisted");
            } else {
                persist(dataset, &stats)?;
            }

            Ok(stats)
        }
    }
}

/// Turns a configured transform into a concrete one, measuring the
/// `max-abs` constant when the configuration leaves it to the data.
/// The statistics it was measured from are returned along with it.
pub fn resolve_transform(
    spec: &TransformSpec,
    dataset: &Dataset,
    normalization: Normalization,
) -> Result<(LabelTransform, Option<NormStats>), DatasetError> {
    match spec {
        TransformSpec::Fixed(transform) => Ok((*transform, None)),
        TransformSpec::MaxAbsFromData => {
            let stats = resolve_stats(dataset, normalization)?;

            if stats.max_abs_eval == 0 {
                log::warn!("every label is 0, using max-abs:1");
            }

            let transform = LabelTransform::MaxAbs {
                max_abs: stats.max_abs_eval.max(1) as f32,
            };
            Ok((transform, Some(stats)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::Planes;
    use crate::ingest::Ingestor;
    use crate::store::{Durability, Store, StoreOptions};
    use shakmaty::Chess;

    fn dataset(dir: &std::path::Path, evals: &[i32]) -> Dataset {
        let options = StoreOptions {
            map_size: 16 * 1024 * 1024,
            durability: Durability::Buffered,
            read_only: false,
        };
        let store = Store::open(dir, &options).unwrap();

        let mut ingestor = Ingestor::create(&store, Planes.into(), 16).unwrap();
        for &eval in evals {
            ingestor.push(&Chess::default(), eval).unwrap();
        }
        ingestor.finish().unwrap();

        Dataset::from_store(store, Planes.into()).unwrap()
    }

    #[test]
    fn test_scan() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = dataset(dir.path(), &[-300, 100, 200, 0]);

        let stats = scan(&dataset).unwrap();
        assert_eq!(stats.count, 4);
        assert_eq!(stats.min_eval, -300);
        assert_eq!(stats.max_eval, 200);
        assert_eq!(stats.max_abs_eval, 300);
        assert_eq!(stats.mean_eval, 0.0);
        assert!((stats.std_eval - 187.08).abs() < 0.01);
    }

    #[test]
    fn test_scan_empty() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = dataset(dir.path(), &[]);

        assert_eq!(scan(&dataset).unwrap().count, 0);
    }

    #[test]
    fn test_persisted_stats_are_reused() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = dataset(dir.path(), &[50, -80]);

        assert!(load(&dataset).unwrap().is_none());
        let stats = resolve_stats(&dataset, Normalization::Persisted).unwrap();
        assert_eq!(load(&dataset).unwrap(), Some(stats));

        // a doctored cache with the right count is trusted as is
        let doctored = NormStats {
            max_abs_eval: 1000,
            ..stats
        };
        persist(&dataset, &doctored).unwrap();
        assert_eq!(
            resolve_stats(&dataset, Normalization::Persisted).unwrap(),
            doctored
        );
        assert_eq!(resolve_stats(&dataset, Normalization::Scan).unwrap(), stats);
    }

    #[test]
    fn test_resolve_max_abs() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = dataset(dir.path(), &[400, -1200, 30]);

        let (transform, stats) =
            resolve_transform(&TransformSpec::MaxAbsFromData, &dataset, Normalization::Scan)
                .unwrap();
        assert_eq!(transform, LabelTransform::MaxAbs { max_abs: 1200.0 });
        assert_eq!(transform.apply(-1200), -1.0);
        assert_eq!(stats.map(|stats| stats.max_abs_eval), Some(1200));

        let fixed = TransformSpec::Fixed(LabelTransform::Raw);
        assert_eq!(
            resolve_transform(&fixed, &dataset, Normalization::Scan).unwrap(),
            (LabelTransform::Raw, None)
        );
    }
}
