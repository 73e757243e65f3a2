//! Pipeline audit trail
//!
//! Fire-and-forget delivery of audit events to the gateway's async
//! audit-event function. Delivery problems are logged and dropped.

use std::time::Duration;

use tracing::warn;

use slipway_common::{AuditEvent, Result};

/// Source tag stamped on every audit event this service emits.
pub const AUDIT_SOURCE: &str = "slipway-orchestrator";

const AUDIT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct AuditSink {
    client: reqwest::Client,
    gateway_url: String,
}

impl AuditSink {
    pub fn new(gateway_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(AUDIT_TIMEOUT).build()?;

        Ok(Self {
            client,
            gateway_url: gateway_url.to_string(),
        })
    }

    pub async fn post(&self, event: &AuditEvent) {
        let url = format!("{}async-function/audit-event", self.gateway_url);
        match self.client.post(&url).json(event).send().await {
            Ok(response) if !response.status().is_success() => {
                warn!(
                    "Audit event for {}/{} rejected with HTTP {}",
                    event.owner,
                    event.repo,
                    response.status()
                );
            }
            Ok(_) => {}
            Err(err) => {
                warn!(
                    "Failed to deliver audit event for {}/{}: {}",
                    event.owner, event.repo, err
                );
            }
        }
    }
}
