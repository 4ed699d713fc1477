//! Request extractors with structured error handling.
//!
//! Drop-in replacements for their axum counterparts that reject with the
//! crate's HTTP [`Error`] so malformed requests get the same JSON error body
//! as every other failure, with the offending parameter named.
//!
//! - [`Path`] - Path parameter extraction with detailed error context
//! - [`Query`] - Query parameter extraction with enhanced error messages
//! - [`Json`] - JSON response body with OpenAPI documentation support
//! - [`Version`] - API version extraction and validation
//!
//! [`Error`]: crate::handler::Error

mod json;
pub mod reject;
mod version;

pub use crate::extract::json::Json;
pub use crate::extract::reject::{Path, Query};
pub use crate::extract::version::Version;
