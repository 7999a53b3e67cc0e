//! Streaming, append-only ingestion into a [`Store`].

use crate::archive::ArchiveReader;
use crate::codec;
use crate::encoding::{Encoding, Scheme};
use crate::error::{IngestError, StoreError};
use crate::record::PackedRecord;
use crate::store::{Durability, Store, SCHEME_KEY};
use shakmaty::Chess;
use std::io::Read;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IngestReport {
    /// Records written by this run
    pub accepted: usize,
    /// Positions the scheme failed to encode
    pub skipped: usize,
    /// Positions without an evaluation
    pub unscored: usize,
    /// Count the store was resumed from
    pub resumed_from: usize,
    /// Count after the last commit
    pub count: usize,
}

/// Sequential writer assigning consecutive indices.
///
/// Records are buffered and committed `batch_size` at a time, each batch in a
/// single transaction together with the updated count. A crash or a dropped
/// ingestor loses at most the uncommitted batch, the store stays consistent.
pub struct Ingestor<'s> {
    store: &'s Store,
    scheme: Scheme,
    batch_size: usize,
    next_index: usize,
    pending: Vec<PackedRecord>,
    report: IngestReport,
}

impl<'s> Ingestor<'s> {
    /// Starts ingesting at the stored count. The scheme is written with the
    /// first transaction and must match on every later run.
    pub fn create(store: &'s Store, scheme: Scheme, batch_size: usize) -> Result<Self, StoreError> {
        let mut txn = store.begin_write()?;

        let stored = txn.get(SCHEME_KEY)?.map(|bytes| bytes.to_vec());
        match stored {
            Some(stored) if stored != scheme.name().as_bytes() => {
                return Err(StoreError::SchemeMismatch {
                    stored: String::from_utf8_lossy(&stored).into_owned(),
                    requested: scheme.name().to_string(),
                });
            }
            Some(_) => {}
            None => txn.put(SCHEME_KEY, scheme.name().as_bytes())?,
        }

        let count = match txn.count()? {
            Some(count) => count,
            None => {
                txn.put_count(0)?;
                0
            }
        };
        txn.commit()?;

        if count > 0 {
            log::info!("resuming {} at index {}", store.path().display(), count);
        }

        Ok(Self {
            store,
            scheme,
            batch_size: batch_size.max(1),
            next_index: count,
            pending: Vec::with_capacity(batch_size.max(1)),
            report: IngestReport {
                resumed_from: count,
                count,
                ..IngestReport::default()
            },
        })
    }

    /// Encodes and buffers a position, committing when the batch is full.
    /// Returns `false` if the position could not be encoded and was skipped.
    pub fn push(&mut self, position: &Chess, eval_cp: i32) -> Result<bool, StoreError> {
        let packed = match self
            .scheme
            .encode(position)
            .and_then(|tensor| Ok(codec::pack(&tensor)?))
        {
            Ok(packed) => packed,
            Err(err) => {
                log::warn!("skipping position {}: {}", self.next_index, err);
                self.report.skipped += 1;
                return Ok(false);
            }
        };

        let index = i32::try_from(self.next_index)
            .map_err(|_| StoreError::IndexOverflow(self.next_index))?;
        self.pending.push(PackedRecord {
            index,
            eval_cp,
            packed,
        });
        self.next_index += 1;

        if self.pending.len() >= self.batch_size {
            self.flush()?;
        }

        Ok(true)
    }

    /// Counts a position that had no evaluation
    pub fn skip_unscored(&mut self) {
        self.report.unscored += 1;
    }

    /// Commits the buffered records and the new count in one transaction
    pub fn flush(&mut self) -> Result<(), StoreError> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let mut txn = self.store.begin_write()?;
        for record in &self.pending {
            txn.put_record(record)?;
        }
        txn.put_count(self.next_index)?;
        txn.commit()?;

        log::debug!(
            "committed {} records, count is now {}",
            self.pending.len(),
            self.next_index
        );

        self.report.accepted += self.pending.len();
        self.report.count = self.next_index;
        self.pending.clear();

        Ok(())
    }

    /// Records accepted so far, committed or not
    pub fn next_index(&self) -> usize {
        self.next_index
    }

    pub fn report(&self) -> &IngestReport {
        &self.report
    }

    /// Commits the tail and, for buffered stores, flushes everything to disk
    pub fn finish(mut self) -> Result<IngestReport, StoreError> {
        self.flush()?;

        if self.store.options().durability == Durability::Buffered {
            self.store.sync()?;
        }

        log::info!(
            "ingested {} records ({} skipped, {} without evaluation), count is {}",
            self.report.accepted,
            self.report.skipped,
            self.report.unscored,
            self.report.count
        );

        Ok(self.report)
    }
}

/// Feeds every scored position of an archive to the ingestor, calling
/// `progress` after each game. Returns the number of games read.
pub fn ingest_games<R: Read>(
    ingestor: &mut Ingestor<'_>,
    archive: &mut ArchiveReader<R>,
    mut progress: impl FnMut(usize, &IngestReport),
) -> Result<usize, IngestError> {
    let mut games = 0;

    while let Some(positions) = archive.next_game()? {
        for scored in positions {
            match scored.eval_cp {
                Some(eval_cp) => {
                    ingestor.push(&scored.position, eval_cp)?;
                }
                None => ingestor.skip_unscored(),
            }
        }

        games += 1;
        progress(games, ingestor.report());
    }

    Ok(games)
}
