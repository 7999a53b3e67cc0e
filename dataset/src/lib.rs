//! Scored chess positions to a packed, fixed-width training dataset.
//!
//! Positions are encoded into 0/1 tensors ([`encoding`]), bit-packed ([`codec`]),
//! framed as fixed-length records ([`record`]) and appended to an LMDB store
//! ([`store`], [`ingest`]). Training reads them back through [`reader::Dataset`],
//! which applies the experiment's [`transform::LabelTransform`].

pub mod archive;
pub mod codec;
pub mod config;
pub mod encoding;
pub mod error;
pub mod ingest;
pub mod integrity;
pub mod manifest;
pub mod reader;
pub mod record;
pub mod stats;
pub mod store;
pub mod tensor;
pub mod transform;

pub use encoding::{Encoding, Scheme};
pub use error::{DatasetError, StoreError};
pub use reader::{Dataset, Sample};
pub use store::{Durability, Store, StoreOptions};
pub use tensor::Tensor;
pub use transform::LabelTransform;
