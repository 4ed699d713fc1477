#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod azure;
pub mod clock;
mod error;
pub mod memory;
pub mod sas;
mod store;
pub mod types;

#[doc(hidden)]
pub mod prelude;

pub use error::{BoxedError, StoreError, StoreErrorKind, StoreResult};
pub use store::{ObjectStore, StoreOperation, StoreService};

/// Tracing target for object store operations.
pub const TRACING_TARGET: &str = "sasgate_store";
