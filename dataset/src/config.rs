//! Experiment configuration: which scheme, label transform and normalization
//! a dataset is read with. Loaded from JSON or assembled from command line flags.

use crate::encoding::Scheme;
use crate::error::ConfigError;
use crate::store::StoreOptions;
use crate::transform::LabelTransform;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::str::FromStr;

/// A label transform as configured. `max-abs` without a value is resolved
/// against the dataset according to the [`Normalization`] policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TransformSpec {
    Fixed(LabelTransform),
    MaxAbsFromData,
}

impl Default for TransformSpec {
    fn default() -> Self {
        TransformSpec::Fixed(LabelTransform::default())
    }
}

impl FromStr for TransformSpec {
    type Err = ConfigError;

    /// `raw`, `clamp:<divisor>:<limit>`, `log2:<divisor>`, `max-abs` or `max-abs:<value>`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::Transform(s.to_string());
        let number = |x: &str| x.parse::<f32>().ok().filter(|x| x.is_finite() && *x > 0.0);

        let parts: Vec<&str> = s.split(':').collect();

        let transform = match parts.as_slice() {
            ["raw"] => LabelTransform::Raw,
            ["clamp"] => LabelTransform::default(),
            ["clamp", divisor, limit] => LabelTransform::Clamp {
                divisor: number(divisor).ok_or_else(invalid)?,
                limit: number(limit).ok_or_else(invalid)?,
            },
            ["log2"] => LabelTransform::SignedLog2 { divisor: 10.0 },
            ["log2", divisor] => LabelTransform::SignedLog2 {
                divisor: number(divisor).ok_or_else(invalid)?,
            },
            ["max-abs"] => return Ok(TransformSpec::MaxAbsFromData),
            ["max-abs", max_abs] => LabelTransform::MaxAbs {
                max_abs: number(max_abs).ok_or_else(invalid)?,
            },
            _ => return Err(invalid()),
        };

        Ok(TransformSpec::Fixed(transform))
    }
}

impl Display for TransformSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TransformSpec::Fixed(transform) => Display::fmt(transform, f),
            TransformSpec::MaxAbsFromData => write!(f, "max-abs"),
        }
    }
}

impl TryFrom<String> for TransformSpec {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TransformSpec> for String {
    fn from(value: TransformSpec) -> Self {
        value.to_string()
    }
}

/// Where the `max-abs` normalization constant comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Normalization {
    /// Scan the whole dataset on every run
    #[default]
    Scan,
    /// Reuse the statistics cached in the store while its count is unchanged,
    /// rescan and rewrite them otherwise
    Persisted,
}

impl FromStr for Normalization {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scan" => Ok(Normalization::Scan),
            "persisted" => Ok(Normalization::Persisted),
            _ => Err(ConfigError::Normalization(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub scheme: Scheme,
    pub transform: TransformSpec,
    pub normalization: Normalization,
    pub store: StoreOptions,
}

impl ExperimentConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}
