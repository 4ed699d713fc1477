//! Response types for HTTP handlers.

mod errors;
mod monitors;
mod storage;

pub use errors::ErrorResponse;
pub use monitors::{HealthState, MonitorStatus};
pub use storage::FileCapability;
