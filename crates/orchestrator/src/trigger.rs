//! Trigger metadata
//!
//! One pipeline run is described by request headers set by the webhook
//! dispatcher. Owner, repository and service are required; everything else
//! degrades to an empty value, and malformed env/secret JSON is tolerated
//! so a bad annotation cannot take the pipeline down.

use std::collections::HashMap;

use axum::http::HeaderMap;
use tracing::warn;

use slipway_common::{Error, Result};

pub const HEADER_OWNER: &str = "x-slipway-owner";
pub const HEADER_REPO: &str = "x-slipway-repo";
pub const HEADER_SERVICE: &str = "x-slipway-service";
pub const HEADER_SHA: &str = "x-slipway-sha";
pub const HEADER_URL: &str = "x-slipway-url";
pub const HEADER_INSTALLATION_ID: &str = "x-slipway-installation-id";
pub const HEADER_ENV: &str = "x-slipway-env";
pub const HEADER_SECRETS: &str = "x-slipway-secrets";

/// Everything one pipeline invocation knows about its trigger.
#[derive(Debug, Clone)]
pub struct TriggerEvent {
    pub owner: String,
    pub repository: String,
    pub service: String,
    pub sha: String,
    pub url: String,
    pub installation_id: u64,
    pub environment: HashMap<String, String>,

    /// Secret names, already prefixed with `{owner}-`.
    pub secrets: Vec<String>,
}

impl TriggerEvent {
    pub fn from_headers(headers: &HeaderMap) -> Result<Self> {
        let owner = required_header(headers, HEADER_OWNER)?;
        let repository = required_header(headers, HEADER_REPO)?;
        let service = required_header(headers, HEADER_SERVICE)?;

        let installation_id = match header_value(headers, HEADER_INSTALLATION_ID) {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                warn!("Ignoring unparsable installation id '{}'", raw);
                0
            }),
            None => 0,
        };

        let environment = match header_value(headers, HEADER_ENV) {
            Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|err| {
                warn!("Ignoring malformed env-vars for {}: {}", service, err);
                HashMap::new()
            }),
            None => HashMap::new(),
        };

        let secrets: Vec<String> = match header_value(headers, HEADER_SECRETS) {
            Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|err| {
                warn!("Ignoring malformed secret list for {}: {}", service, err);
                Vec::new()
            }),
            None => Vec::new(),
        };
        let secrets = secrets
            .into_iter()
            .map(|name| format!("{owner}-{name}"))
            .collect();

        Ok(Self {
            owner,
            repository,
            service,
            sha: header_value(headers, HEADER_SHA).unwrap_or_default(),
            url: header_value(headers, HEADER_URL).unwrap_or_default(),
            installation_id,
            environment,
            secrets,
        })
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn required_header(headers: &HeaderMap, name: &str) -> Result<String> {
    header_value(headers, name)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| Error::Validation(format!("missing {name} header")))
}
