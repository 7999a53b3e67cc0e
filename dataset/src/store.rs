//! LMDB-backed key-value store holding a dataset.
//!
//! Layout: `"0"`..`"{count-1}"` map to [`PackedRecord`] bytes, `"count"` holds
//! the number of records as a native-endian i32. `"scheme"` names the encoding
//! the records were built with and `"norm"` optionally caches label statistics.

use crate::error::StoreError;
use crate::record::PackedRecord;
use byteorder::{ByteOrder, NativeEndian};
use heed::types::{Bytes, Str};
use heed::{Database, Env, EnvFlags, EnvOpenOptions, RoTxn, RwTxn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const COUNT_KEY: &str = "count";
pub const SCHEME_KEY: &str = "scheme";
pub const NORM_KEY: &str = "norm";

/// Map sizes are rounded up to this, a multiple of every common page size
const MAP_ALIGN: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Durability {
    /// Every commit is flushed to disk
    #[default]
    Strict,
    /// Commits skip fsync, for batch ingestion that can be re-run from the archive.
    /// A crash may lose the latest commits but never leaves a torn one.
    Buffered,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreOptions {
    /// Upper bound of the store size in bytes, allocated up front.
    /// Writes beyond it fail with [`StoreError::SizeExceeded`].
    pub map_size: usize,
    pub durability: Durability,
    pub read_only: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            map_size: 64 * 1024 * 1024 * 1024, // 64 GB
            durability: Durability::Strict,
            read_only: false,
        }
    }
}

impl StoreOptions {
    /// Options for training-time readers
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Self::default()
        }
    }

    fn flags(&self) -> EnvFlags {
        let mut flags = EnvFlags::empty();

        if self.read_only {
            flags |= EnvFlags::READ_ONLY;
        }
        if self.durability == Durability::Buffered {
            flags |= EnvFlags::NO_SYNC | EnvFlags::NO_META_SYNC;
        }

        flags
    }
}

/// Handle to an opened store. Cheap to clone and shareable between threads;
/// every reader opens its own snapshot with [`Store::begin_read`].
#[derive(Clone)]
pub struct Store {
    env: Env,
    db: Database<Str, Bytes>,
    options: StoreOptions,
    path: PathBuf,
}

impl Store {
    pub fn open<P: AsRef<Path>>(path: P, options: &StoreOptions) -> Result<Self, StoreError> {
        let path = path.as_ref();

        if !options.read_only {
            fs::create_dir_all(path)?;
        }

        let map_size = options.map_size.div_ceil(MAP_ALIGN).max(1) * MAP_ALIGN;

        let mut env_options = EnvOpenOptions::new();
        env_options.map_size(map_size);

        // the flags are only unsafe in combination with concurrent writers
        // from other processes, the store has a single writer
        let env = unsafe {
            env_options.flags(options.flags());
            env_options.open(path)?
        };

        let db = if options.read_only {
            let rtxn = env.read_txn()?;
            // the unnamed database always exists, a missing one means this is no store
            let db = env.open_database(&rtxn, None)?;
            db.ok_or(StoreError::MissingCount)?
        } else {
            let mut wtxn = env.write_txn()?;
            let db = env.create_database(&mut wtxn, None)?;
            wtxn.commit()?;
            db
        };

        log::debug!(
            "opened store {} (map size {} bytes, {:?}, read only: {})",
            path.display(),
            map_size,
            options.durability,
            options.read_only
        );

        Ok(Self {
            env,
            db,
            options: options.clone(),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Starts the single write transaction. Nothing is visible to readers until
    /// [`WriteTxn::commit`]; dropping it aborts every write it holds.
    pub fn begin_write(&self) -> Result<WriteTxn<'_>, StoreError> {
        Ok(WriteTxn {
            txn: self.env.write_txn()?,
            db: self.db,
        })
    }

    /// Starts a read snapshot. It sees every commit finished before this call and
    /// nothing of transactions still in flight.
    pub fn begin_read(&self) -> Result<ReadTxn<'_>, StoreError> {
        Ok(ReadTxn {
            txn: self.env.read_txn()?,
            db: self.db,
        })
    }

    /// Number of records, from a fresh snapshot
    pub fn count(&self) -> Result<usize, StoreError> {
        self.begin_read()?.count()
    }

    /// Flushes buffered commits to disk
    pub fn sync(&self) -> Result<(), StoreError> {
        Ok(self.env.force_sync()?)
    }

    /// Bytes used by the data file
    pub fn disk_size(&self) -> Result<u64, StoreError> {
        Ok(fs::metadata(self.path.join("data.mdb"))?.len())
    }

    /// Releases the environment, after which the path can be opened again with
    /// other options. Blocks until every other clone of this store is dropped.
    pub fn close(self) {
        let Store { env, path, .. } = self;
        env.prepare_for_closing().wait();
        log::debug!("closed store {}", path.display());
    }
}

pub struct WriteTxn<'s> {
    txn: RwTxn<'s>,
    db: Database<Str, Bytes>,
}

impl WriteTxn<'_> {
    /// Inserts or overwrites a key
    pub fn put(&mut self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        Ok(self.db.put(&mut self.txn, key, value)?)
    }

    pub fn get(&self, key: &str) -> Result<Option<&[u8]>, StoreError> {
        Ok(self.db.get(&self.txn, key)?)
    }

    pub fn put_record(&mut self, record: &PackedRecord) -> Result<(), StoreError> {
        self.put(&record.index.to_string(), &record.to_bytes())
    }

    pub fn put_count(&mut self, count: usize) -> Result<(), StoreError> {
        let count = i32::try_from(count).map_err(|_| StoreError::IndexOverflow(count))?;
        self.put(COUNT_KEY, &count.to_ne_bytes())
    }

    /// Count stored so far, `None` for a store that was never written to
    pub fn count(&self) -> Result<Option<usize>, StoreError> {
        self.get(COUNT_KEY)?.map(decode_count).transpose()
    }

    pub fn commit(self) -> Result<(), StoreError> {
        Ok(self.txn.commit()?)
    }
}

pub struct ReadTxn<'s> {
    txn: RoTxn<'s>,
    db: Database<Str, Bytes>,
}

impl ReadTxn<'_> {
    pub fn get(&self, key: &str) -> Result<Option<&[u8]>, StoreError> {
        Ok(self.db.get(&self.txn, key)?)
    }

    /// Number of records. A store without a count is not a dataset
    pub fn count(&self) -> Result<usize, StoreError> {
        match self.get(COUNT_KEY)? {
            Some(bytes) => decode_count(bytes),
            None => Err(StoreError::MissingCount),
        }
    }

    /// Name of the encoding scheme the store was built with
    pub fn scheme(&self) -> Result<Option<String>, StoreError> {
        Ok(self
            .get(SCHEME_KEY)?
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned()))
    }

    /// Record stored under `index`, validated against the scheme's packed length
    pub fn record(&self, index: usize, packed_len: usize) -> Result<PackedRecord, StoreError> {
        let bytes = self
            .get(&index.to_string())?
            .ok_or(StoreError::MissingRecord(index))?;
        let record = PackedRecord::from_bytes(bytes, packed_len)?;

        if usize::try_from(record.index) != Ok(index) {
            return Err(crate::error::RecordError::IndexMismatch {
                expected: index,
                actual: record.index,
            }
            .into());
        }

        Ok(record)
    }

    /// Record keys at or above `start`, in ascending order. Walks every key,
    /// the string ordering of the store does not follow the numeric one.
    pub fn record_keys_from(&self, start: usize) -> Result<Vec<usize>, StoreError> {
        let mut indices = Vec::new();

        for entry in self.db.iter(&self.txn)? {
            let (key, _) = entry?;
            if let Ok(index) = key.parse::<usize>() {
                if index >= start {
                    indices.push(index);
                }
            }
        }

        indices.sort_unstable();
        Ok(indices)
    }
}

fn decode_count(bytes: &[u8]) -> Result<usize, StoreError> {
    let corrupt = |reason: String| StoreError::Corrupt {
        key: COUNT_KEY.to_string(),
        reason,
    };

    if bytes.len() != 4 {
        return Err(corrupt(format!("{} bytes instead of 4", bytes.len())));
    }

    let count = NativeEndian::read_i32(bytes);
    usize::try_from(count).map_err(|_| corrupt(format!("negative count {}", count)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RecordError;

    fn buffered() -> StoreOptions {
        StoreOptions {
            map_size: 16 * 1024 * 1024,
            durability: Durability::Buffered,
            read_only: false,
        }
    }

    fn record(index: i32) -> PackedRecord {
        PackedRecord {
            index,
            eval_cp: index * 10 - 50,
            packed: vec![index as u8; 97],
        }
    }

    #[test]
    fn test_count_consistency() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path(), &buffered()).unwrap();

        for index in 0..25 {
            let mut txn = store.begin_write().unwrap();
            txn.put_record(&record(index)).unwrap();
            txn.put_count(index as usize + 1).unwrap();
            txn.commit().unwrap();
        }

        let txn = store.begin_read().unwrap();
        assert_eq!(txn.count().unwrap(), 25);
        for index in 0..25 {
            assert_eq!(txn.record(index, 97).unwrap(), record(index as i32));
        }
        assert!(txn.get("25").unwrap().is_none());
    }

    #[test]
    fn test_uncommitted_writes_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path(), &buffered()).unwrap();

        let mut txn = store.begin_write().unwrap();
        txn.put_record(&record(0)).unwrap();
        txn.put_count(1).unwrap();
        txn.commit().unwrap();

        {
            let mut txn = store.begin_write().unwrap();
            txn.put_record(&record(1)).unwrap();
            txn.put_count(2).unwrap();
            // dropped without commit
        }

        let txn = store.begin_read().unwrap();
        assert_eq!(txn.count().unwrap(), 1);
        assert!(matches!(
            txn.record(1, 97),
            Err(StoreError::MissingRecord(1))
        ));
    }

    #[test]
    fn test_snapshot_isolation() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path(), &buffered()).unwrap();

        let mut writer = store.begin_write().unwrap();
        writer.put_record(&record(0)).unwrap();
        writer.put_count(1).unwrap();

        // a reader on another thread does not see the in-flight transaction
        let reader_store = store.clone();
        let seen = std::thread::spawn(move || {
            let txn = reader_store.begin_read().unwrap();
            (txn.get(COUNT_KEY).unwrap().is_some(), txn.get("0").unwrap().is_some())
        })
        .join()
        .unwrap();
        assert_eq!(seen, (false, false));

        writer.commit().unwrap();
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_missing_count() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path(), &buffered()).unwrap();

        assert!(matches!(store.count(), Err(StoreError::MissingCount)));
    }

    #[test]
    fn test_corrupt_records() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path(), &buffered()).unwrap();

        let mut txn = store.begin_write().unwrap();
        txn.put("0", &record(0).to_bytes()[..100]).unwrap();
        txn.put("1", &record(7).to_bytes()).unwrap();
        txn.put(COUNT_KEY, &[2, 0]).unwrap();
        txn.commit().unwrap();

        let txn = store.begin_read().unwrap();
        assert!(matches!(
            txn.record(0, 97),
            Err(StoreError::Record(RecordError::LengthMismatch { .. }))
        ));
        assert!(matches!(
            txn.record(1, 97),
            Err(StoreError::Record(RecordError::IndexMismatch { .. }))
        ));
        assert!(matches!(txn.count(), Err(StoreError::Corrupt { .. })));
    }

    #[test]
    fn test_size_exceeded() {
        let dir = tempfile::tempdir().unwrap();
        let options = StoreOptions {
            map_size: 1024 * 1024,
            ..buffered()
        };
        let store = Store::open(dir.path(), &options).unwrap();

        let mut result = Ok(());
        'fill: for batch in 0..300 {
            let mut txn = store.begin_write().unwrap();
            for index in batch * 100..(batch + 1) * 100 {
                result = txn.put_record(&record(index));
                if result.is_err() {
                    break 'fill;
                }
            }
            result = txn.put_count((batch as usize + 1) * 100);
            if result.is_err() {
                break;
            }
            result = txn.commit();
            if result.is_err() {
                break;
            }
        }

        assert!(matches!(result, Err(StoreError::SizeExceeded)));

        // whatever was committed before the failure is intact
        let count = store.count().unwrap();
        assert!(count > 0 && count < 30_000);
        assert_eq!(count % 100, 0);
        assert!(store.begin_read().unwrap().record(count - 1, 97).is_ok());
    }

    #[test]
    fn test_reopen_with_other_options() {
        let dir = tempfile::tempdir().unwrap();

        let store = Store::open(dir.path(), &StoreOptions::default()).unwrap();
        let mut txn = store.begin_write().unwrap();
        txn.put_record(&record(0)).unwrap();
        txn.put_count(1).unwrap();
        txn.commit().unwrap();
        store.close();

        let store = Store::open(dir.path(), &StoreOptions::read_only()).unwrap();
        let txn = store.begin_read().unwrap();
        assert_eq!(txn.count().unwrap(), 1);
        assert_eq!(txn.record(0, 97).unwrap(), record(0));
    }
}
