//! Commit-status reporting
//!
//! Posts per-stage commit statuses back to the source-control host. The
//! credential is short-lived: an RS256 app token signed with the mounted
//! private key is exchanged for an installation access token on every
//! report. All failures here are logged and swallowed; reporting must
//! never change the outcome of a pipeline run.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::header;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use slipway_common::{Error, Result};

use crate::config::Config;
use crate::trigger::TriggerEvent;

/// Stage label for the build hop.
pub const STAGE_BUILD: &str = "BUILD";
/// Stage label for validation and deployment.
pub const STAGE_DEPLOY: &str = "DEPLOY";

const USER_AGENT: &str = "slipway-orchestrator";
const ACCEPT_JSON: &str = "application/vnd.github+json";
const SCM_TIMEOUT: Duration = Duration::from_secs(30);

/// Commit status payload.
#[derive(Debug, Clone, Serialize)]
pub struct CommitStatus {
    pub state: String,
    pub target_url: String,
    pub description: String,
    pub context: String,
}

#[derive(Debug, Serialize)]
struct AppClaims {
    iat: i64,
    exp: i64,
    iss: String,
}

#[derive(Debug, Deserialize)]
struct InstallationToken {
    token: String,
}

pub struct StatusReporter {
    client: reqwest::Client,
    enabled: bool,
    app_id: Option<String>,
    private_key_path: PathBuf,
    scm_api_url: String,
    gateway_public_url: Option<String>,
    gateway_pretty_url: Option<String>,
}

impl StatusReporter {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(SCM_TIMEOUT).build()?;

        Ok(Self {
            client,
            enabled: config.report_status,
            app_id: config.app_id.clone(),
            private_key_path: config.private_key_path(),
            scm_api_url: config.scm_api_url.clone(),
            gateway_public_url: config.gateway_public_url.clone(),
            gateway_pretty_url: config.gateway_pretty_url.clone(),
        })
    }

    /// Post one commit status. Disabled reporting is a no-op; any failure
    /// is logged and dropped.
    pub async fn report(&self, state: &str, description: &str, stage: &str, event: &TriggerEvent) {
        if !self.enabled {
            return;
        }

        if let Err(err) = self.post_status(state, description, stage, event).await {
            warn!(
                "Failed to report {} status for {}/{}: {}",
                state, event.owner, event.repository, err
            );
        }
    }

    async fn post_status(
        &self,
        state: &str,
        description: &str,
        stage: &str,
        event: &TriggerEvent,
    ) -> Result<()> {
        let status = CommitStatus {
            state: state.to_string(),
            target_url: self.public_status_url(state, event),
            description: description.to_string(),
            context: stage.to_string(),
        };

        info!(
            "Status: {} ({}) for {}/{} at {}",
            state, stage, event.owner, event.repository, event.sha
        );

        let token = self.mint_installation_token(event.installation_id).await?;
        let url = format!(
            "{}/repos/{}/{}/statuses/{}",
            self.scm_api_url, event.owner, event.repository, event.sha
        );
        let response = self
            .client
            .post(&url)
            .bearer_auth(&token)
            .header(header::ACCEPT, ACCEPT_JSON)
            .header(header::USER_AGENT, USER_AGENT)
            .json(&status)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::Credential(format!(
                "commit status rejected with HTTP {}",
                response.status()
            )));
        }

        Ok(())
    }

    /// RS256 app token signed with the mounted key, exchanged for an
    /// installation access token.
    async fn mint_installation_token(&self, installation_id: u64) -> Result<String> {
        let app_id = self
            .app_id
            .as_deref()
            .ok_or_else(|| Error::Credential("no app id configured".into()))?;

        let pem = fs::read(&self.private_key_path)
            .map_err(|err| Error::Credential(format!("private key unavailable: {err}")))?;
        let key = EncodingKey::from_rsa_pem(&pem)
            .map_err(|err| Error::Credential(format!("private key rejected: {err}")))?;

        let now = Utc::now().timestamp();
        let claims = AppClaims {
            iat: now - 10,
            exp: now + 9 * 60,
            iss: app_id.to_string(),
        };
        let jwt = encode(&Header::new(Algorithm::RS256), &claims, &key)
            .map_err(|err| Error::Credential(format!("app token signing failed: {err}")))?;

        let url = format!(
            "{}/app/installations/{}/access_tokens",
            self.scm_api_url, installation_id
        );
        let response = self
            .client
            .post(&url)
            .bearer_auth(jwt)
            .header(header::ACCEPT, ACCEPT_JSON)
            .header(header::USER_AGENT, USER_AGENT)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::Credential(format!(
                "token exchange returned HTTP {}",
                response.status()
            )));
        }

        let token: InstallationToken = response.json().await?;
        if token.token.is_empty() {
            return Err(Error::Credential(
                "token exchange returned an empty token".into(),
            ));
        }

        Ok(token.token)
    }

    /// Target URL shown next to the status. Success statuses point at the
    /// deployed function when a public or templated URL is configured;
    /// everything else points back at the triggering commit.
    fn public_status_url(&self, state: &str, event: &TriggerEvent) -> String {
        if state != "success" {
            return event.url.clone();
        }

        if let Some(pretty) = &self.gateway_pretty_url {
            let url = pretty.replacen("user", &event.owner, 1);
            return url.replacen("function", &event.service, 1);
        }

        if let Some(public) = &self.gateway_public_url {
            let base = if public.ends_with('/') {
                public.clone()
            } else {
                format!("{public}/")
            };
            return format!("{}function/{}-{}", base, event.owner, event.service);
        }

        event.url.clone()
    }
}
