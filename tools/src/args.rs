use clap::{Args, ValueEnum};
use dataset::config::{ExperimentConfig, Normalization, TransformSpec};
use dataset::error::ConfigError;
use dataset::{Durability, Scheme, StoreOptions};
use std::path::PathBuf;

#[derive(ValueEnum, Clone, Copy)]
pub enum DurabilityArg {
    /// fsync every commit
    Strict,
    /// Let the OS flush commits, the store is synced once at the end
    Buffered,
}

impl From<DurabilityArg> for Durability {
    fn from(value: DurabilityArg) -> Self {
        match value {
            DurabilityArg::Strict => Durability::Strict,
            DurabilityArg::Buffered => Durability::Buffered,
        }
    }
}

#[derive(Args, Clone)]
pub struct StoreArgs {
    /// Directory of the LMDB dataset store
    #[arg(long, value_name = "store", default_value = "./dataset.lmdb")]
    pub store: PathBuf,

    /// Upper bound of the store size, in GiB [default: 64]
    #[arg(long, value_name = "map-size")]
    pub map_size: Option<usize>,
}

impl StoreArgs {
    /// `base` with the flags applied on top
    pub fn options(&self, base: StoreOptions) -> StoreOptions {
        StoreOptions {
            map_size: self
                .map_size
                .map_or(base.map_size, |gib| gib * 1024 * 1024 * 1024),
            ..base
        }
    }

    /// Options for commands that only read the store
    pub fn read_options(&self, config: &ExperimentConfig) -> StoreOptions {
        self.options(StoreOptions {
            read_only: true,
            ..config.store.clone()
        })
    }
}

/// Experiment settings, from a JSON file and/or flags. Flags win.
#[derive(Args, Clone)]
pub struct ExperimentArgs {
    /// JSON experiment configuration
    #[arg(long, value_name = "config")]
    pub config: Option<PathBuf>,

    /// Encoding scheme: planes or flat
    #[arg(long, value_name = "scheme")]
    pub scheme: Option<Scheme>,

    /// Label transform: raw, clamp:<div>:<limit>, log2:<div>, max-abs or max-abs:<value>
    #[arg(long, value_name = "transform")]
    pub transform: Option<TransformSpec>,

    /// Source of the max-abs constant: scan or persisted
    #[arg(long, value_name = "normalization")]
    pub normalization: Option<Normalization>,
}

impl ExperimentArgs {
    pub fn resolve(&self) -> Result<ExperimentConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => ExperimentConfig::load(path)?,
            None => ExperimentConfig::default(),
        };

        if let Some(scheme) = self.scheme {
            config.scheme = scheme;
        }
        if let Some(transform) = self.transform {
            config.transform = transform;
        }
        if let Some(normalization) = self.normalization {
            config.normalization = normalization;
        }

        Ok(config)
    }
}
