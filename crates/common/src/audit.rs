use serde::{Deserialize, Serialize};

/// Audit trail entry posted to the gateway after each pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AuditEvent {
    pub message: String,
    pub owner: String,
    pub repo: String,
    pub source: String,
}
