use crate::encoding::{Encoding, Scheme};
use crate::error::ConfigError;
use crate::reader::Dataset;
use crate::stats::NormStats;
use crate::transform::LabelTransform;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// What a model was trained on, saved next to its weights so inference can
/// encode positions and read outputs the same way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub scheme: Scheme,
    pub shape: Vec<usize>,
    pub packed_len: usize,
    pub transform: LabelTransform,
    pub count: usize,
    pub store: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub norm: Option<NormStats>,
}

impl Manifest {
    pub fn new(dataset: &Dataset, norm: Option<NormStats>) -> Self {
        let scheme = *dataset.scheme();

        Manifest {
            scheme,
            shape: scheme.shape().to_vec(),
            packed_len: scheme.packed_len(),
            transform: *dataset.transform(),
            count: dataset.len(),
            store: dataset.store().path().to_path_buf(),
            norm,
        }
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}
