//! Deployment client
//!
//! Idempotent function upsert against the serving platform's gateway: list
//! the current functions, then update when the service name already exists,
//! create otherwise. A name match always overwrites; no digest or label
//! comparison is made.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use slipway_common::Result;

const GATEWAY_TIMEOUT: Duration = Duration::from_secs(30);

/// Function deployment request accepted by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeploymentDescriptor {
    pub service: String,
    pub image: String,
    pub network: String,
    pub labels: HashMap<String, String>,
    pub limits: Limits,

    #[serde(rename = "envVars")]
    pub env_vars: HashMap<String, String>,

    pub secrets: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Limits {
    pub memory: String,
}

#[derive(Debug, Deserialize)]
struct FunctionSummary {
    #[serde(rename = "Name")]
    name: String,
}

#[derive(Debug, Clone)]
struct BasicAuth {
    username: String,
    password: String,
}

/// Client for the gateway's `system/functions` API.
pub struct DeploymentClient {
    client: reqwest::Client,
    gateway_url: String,
    credentials: Option<BasicAuth>,
}

impl DeploymentClient {
    /// `gateway_url` must be slash-terminated. Credentials are read from
    /// the secret mount once; when unavailable the client proceeds
    /// unauthenticated and leaves rejection to the gateway.
    pub fn new(gateway_url: impl Into<String>, secret_mount_path: &Path) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(GATEWAY_TIMEOUT).build()?;

        Ok(Self {
            client,
            gateway_url: gateway_url.into(),
            credentials: read_credentials(secret_mount_path),
        })
    }

    /// Create or update `descriptor`, keyed by its service name.
    /// Returns the gateway's response body.
    pub async fn deploy(&self, descriptor: &DeploymentDescriptor) -> Result<String> {
        let exists = self.function_exists(&descriptor.service).await?;
        let url = format!("{}system/functions", self.gateway_url);

        info!(
            "Deploying {} as {} ({})",
            descriptor.image,
            descriptor.service,
            if exists { "update" } else { "create" }
        );

        let request = if exists {
            self.client.put(&url)
        } else {
            self.client.post(&url)
        };
        let response = self.with_auth(request).json(descriptor).send().await?;

        let status = response.status();
        info!("Deploy status: {}", status);
        if !status.is_success() {
            return Err(anyhow::anyhow!("http status code {}", status.as_u16()).into());
        }

        Ok(response.text().await.unwrap_or_default())
    }

    async fn function_exists(&self, service: &str) -> Result<bool> {
        let url = format!("{}system/functions", self.gateway_url);
        let response = self.with_auth(self.client.get(&url)).send().await?;

        info!("Function list status: {}", response.status());

        // An unreadable list degrades to "not deployed yet".
        let functions: Vec<FunctionSummary> = response.json().await.unwrap_or_default();
        Ok(functions.iter().any(|function| function.name == service))
    }

    fn with_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.credentials {
            Some(auth) => request.basic_auth(&auth.username, Some(&auth.password)),
            None => request,
        }
    }
}

fn read_credentials(dir: &Path) -> Option<BasicAuth> {
    let username = fs::read_to_string(dir.join("basic-auth-user"));
    let password = fs::read_to_string(dir.join("basic-auth-password"));

    match (username, password) {
        (Ok(username), Ok(password)) => Some(BasicAuth {
            username: username.trim().to_string(),
            password: password.trim().to_string(),
        }),
        (username, password) => {
            let err = username.err().or(password.err());
            warn!(
                "Basic auth unavailable, calling gateway unauthenticated: {}",
                err.map(|e| e.to_string()).unwrap_or_default()
            );
            None
        }
    }
}
