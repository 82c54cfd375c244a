//! Tool health reports

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Coarse tool health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Result of probing one tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub tool: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Whatever the tool's own probe returned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl HealthReport {
    pub fn healthy(tool: impl Into<String>, details: Option<Value>) -> Self {
        Self {
            tool: tool.into(),
            status: HealthStatus::Healthy,
            reason: details
                .is_none()
                .then(|| "basic validation passed".to_string()),
            details,
        }
    }

    pub fn unhealthy(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            status: HealthStatus::Unhealthy,
            reason: Some(reason.into()),
            details: None,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}
