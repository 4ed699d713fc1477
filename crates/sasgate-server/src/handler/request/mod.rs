//! Request types for HTTP handlers.

mod storage;

pub use storage::*;
