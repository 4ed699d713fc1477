//! Monitor response types.

use jiff::Timestamp;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Liveness of the server process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    /// Accepting requests.
    Ok,
}

/// Response of the health endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MonitorStatus {
    /// Liveness of the process.
    pub status: HealthState,
    /// Version of the server.
    pub version: String,
    /// When the server state was created.
    pub started_at: Timestamp,
    /// Seconds since `started_at`.
    pub uptime_secs: i64,
}
