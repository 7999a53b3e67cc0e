//! Label policies applied on the read path.
//!
//! Records always store raw centipawns. Which transform a model was trained
//! with is an experiment setting, recorded in its [`Manifest`](crate::manifest::Manifest).

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum LabelTransform {
    /// Centipawns as they are stored
    Raw,
    /// `clamp(cp / divisor, -limit, limit)`
    Clamp { divisor: f32, limit: f32 },
    /// `sign(cp) * log2(|cp / divisor| + 1)`: extreme scores weigh less
    SignedLog2 { divisor: f32 },
    /// `cp / max_abs`, with `max_abs` usually measured on the dataset
    MaxAbs { max_abs: f32 },
}

impl Default for LabelTransform {
    fn default() -> Self {
        LabelTransform::Clamp {
            divisor: 100.0,
            limit: 15.0,
        }
    }
}

impl LabelTransform {
    pub fn apply(&self, eval_cp: i32) -> f32 {
        let cp = eval_cp as f32;

        match *self {
            LabelTransform::Raw => cp,
            LabelTransform::Clamp { divisor, limit } => (cp / divisor).clamp(-limit, limit),
            LabelTransform::SignedLog2 { divisor } => {
                let x = cp / divisor;
                (x.abs() + 1.0).log2().copysign(x)
            }
            LabelTransform::MaxAbs { max_abs } => cp / max_abs,
        }
    }

    /// Centipawns for a model output. Clamped labels saturate, so values at the
    /// limit only give a lower bound of the score.
    pub fn invert(&self, label: f32) -> f32 {
        match *self {
            LabelTransform::Raw => label,
            LabelTransform::Clamp { divisor, limit } => label.clamp(-limit, limit) * divisor,
            LabelTransform::SignedLog2 { divisor } => {
                (label.abs().exp2() - 1.0).copysign(label) * divisor
            }
            LabelTransform::MaxAbs { max_abs } => label * max_abs,
        }
    }
}

impl Display for LabelTransform {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            LabelTransform::Raw => write!(f, "raw"),
            LabelTransform::Clamp { divisor, limit } => write!(f, "clamp:{}:{}", divisor, limit),
            LabelTransform::SignedLog2 { divisor } => write!(f, "log2:{}", divisor),
            LabelTransform::MaxAbs { max_abs } => write!(f, "max-abs:{}", max_abs),
        }
    }
}
