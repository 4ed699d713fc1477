//! Prelude module for sasgate-server.
//!
//! ```rust
//! use sasgate_server::prelude::*;
//! ```

pub use crate::extract::*;
pub use crate::handler::routes;
pub use crate::middleware::*;
pub use crate::service::*;
