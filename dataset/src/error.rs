use std::io;
use thiserror::Error;

/// A position or tensor could not be handled by an encoding scheme.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("unknown encoding scheme: '{0}'")]
    UnknownScheme(String),

    #[error("tensor shape {actual:?} does not match the scheme shape {expected:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("invalid tensor for scheme '{scheme}': {reason}")]
    InvalidTensor {
        scheme: &'static str,
        reason: String,
    },

    #[error("self-check failed for scheme '{scheme}': {reason}")]
    SelfCheck {
        scheme: &'static str,
        reason: String,
    },

    #[error(transparent)]
    Codec(#[from] CodecError),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("element {position} has value {value}, only 0 and 1 can be packed")]
    NonBinary { position: usize, value: u8 },

    #[error("packed buffer has {actual} bytes, expected {expected}")]
    LengthMismatch { expected: usize, actual: usize },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("record has {actual} bytes, expected {expected}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("record stored under key {expected} carries index {actual}")]
    IndexMismatch { expected: usize, actual: i32 },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store size bound exceeded, re-run with a larger map size")]
    SizeExceeded,

    #[error("store has no \"count\" key")]
    MissingCount,

    #[error("store has no record for index {0}")]
    MissingRecord(usize),

    #[error("store value for key \"{key}\" is corrupt: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("store was built with scheme '{stored}', requested '{requested}'")]
    SchemeMismatch { stored: String, requested: String },

    #[error("record index {0} does not fit the 32-bit record header")]
    IndexOverflow(usize),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error("lmdb error: {0}")]
    Heed(heed::Error),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl From<heed::Error> for StoreError {
    fn from(err: heed::Error) -> Self {
        match err {
            heed::Error::Mdb(heed::MdbError::MapFull) => StoreError::SizeExceeded,
            heed::Error::Io(err) => StoreError::Io(err),
            err => StoreError::Heed(err),
        }
    }
}

/// Errors of the training-time read path.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("index {index} is out of range for a dataset of {count} records")]
    OutOfRange { index: usize, count: usize },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Encode(#[from] EncodeError),
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("failed to fetch archive: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid label transform '{0}', expected raw, clamp:<div>:<limit>, log2:<div> or max-abs[:<value>]")]
    Transform(String),

    #[error("unknown normalization '{0}', expected scan or persisted")]
    Normalization(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
