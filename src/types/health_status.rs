use serde::{Deserialize, Serialize};

/// Response body from the `/health` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthStatus {
    /// Overall status, `healthy` or `degraded`.
    pub status: String,

    /// Reporting service name.
    #[serde(default)]
    pub service: Option<String>,

    /// Service version.
    #[serde(default)]
    pub version: Option<String>,
}

impl HealthStatus {
    /// Returns true if the service reports itself healthy.
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}
