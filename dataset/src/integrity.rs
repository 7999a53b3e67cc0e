//! Full-store validation.

use crate::codec;
use crate::encoding::Encoding;
use crate::error::{DatasetError, RecordError, StoreError};
use crate::reader::Dataset;
use rayon::prelude::*;
use std::fmt::{self, Display, Formatter};

const CHECK_CHUNK: usize = 16 * 1024;

/// Problems kept in a report, the rest are only counted
const MAX_REPORTED: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub enum Problem {
    /// No key for an index below the count
    Missing(usize),
    /// Wrong length or foreign index
    Record { index: usize, error: RecordError },
    /// Packed tensor that does not decode into a position
    Undecodable { index: usize, reason: String },
    /// A record key at or above the count, beyond the committed range
    Trailing(usize),
}

impl Display for Problem {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Problem::Missing(index) => write!(f, "record {} is missing", index),
            Problem::Record { index, error } => write!(f, "record {}: {}", index, error),
            Problem::Undecodable { index, reason } => {
                write!(f, "record {} does not decode: {}", index, reason)
            }
            Problem::Trailing(index) => write!(f, "unexpected record at index {}", index),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntegrityReport {
    pub count: usize,
    pub checked: usize,
    pub num_problems: usize,
    /// The first problems found, in index order
    pub problems: Vec<Problem>,
}

impl IntegrityReport {
    pub fn is_ok(&self) -> bool {
        self.num_problems == 0
    }

    fn merge(mut self, other: IntegrityReport) -> IntegrityReport {
        self.checked += other.checked;
        self.num_problems += other.num_problems;
        self.problems.extend(other.problems);
        self.problems.truncate(MAX_REPORTED);
        self
    }

    fn push(&mut self, problem: Problem) {
        self.num_problems += 1;
        if self.problems.len() < MAX_REPORTED {
            self.problems.push(problem);
        }
    }
}

/// Checks that every index below the count holds a well-formed record.
/// With `deep`, every tensor is also unpacked and decoded.
pub fn check(dataset: &Dataset, deep: bool) -> Result<IntegrityReport, DatasetError> {
    let count = dataset.len();
    let scheme = *dataset.scheme();
    let packed_len = scheme.packed_len();
    let chunks = count.div_ceil(CHECK_CHUNK);

    log::info!(
        "checking {} records ({})",
        count,
        if deep { "deep" } else { "records only" }
    );

    let mut report = (0..chunks)
        .into_par_iter()
        .map(|chunk| -> Result<IntegrityReport, StoreError> {
            let txn = dataset.store().begin_read()?;
            let mut report = IntegrityReport::default();

            let start = chunk * CHECK_CHUNK;
            for index in start..(start + CHECK_CHUNK).min(count) {
                report.checked += 1;

                let record = match txn.record(index, packed_len) {
                    Ok(record) => record,
                    Err(StoreError::MissingRecord(index)) => {
                        report.push(Problem::Missing(index));
                        continue;
                    }
                    Err(StoreError::Record(error)) => {
                        report.push(Problem::Record { index, error });
                        continue;
                    }
                    Err(err) => return Err(err),
                };

                if deep {
                    let decoded = codec::unpack(&record.packed, scheme.shape())
                        .map_err(|err| err.to_string())
                        .and_then(|tensor| scheme.decode(&tensor).map_err(|err| err.to_string()));

                    if let Err(reason) = decoded {
                        report.push(Problem::Undecodable { index, reason });
                    }
                }
            }

            Ok(report)
        })
        .try_reduce(IntegrityReport::default, |a, b| Ok(a.merge(b)))?;

    let txn = dataset.store().begin_read()?;
    for index in txn.record_keys_from(count)? {
        report.push(Problem::Trailing(index));
    }
    report.count = count;

    Ok(report)
}
