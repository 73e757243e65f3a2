//! Build-and-deploy pipeline
//!
//! One run ships the source context to the builder, validates the image
//! reference that comes back, rewrites its registry prefix for pulling,
//! upserts the function at the gateway and reports the outcome through
//! commit statuses and audit events.

use std::collections::HashMap;

use axum::body::Bytes;
use chrono::Utc;
use reqwest::header;
use tracing::{error, info};

use slipway_common::{AuditEvent, Error, Result};

use crate::audit::{AuditSink, AUDIT_SOURCE};
use crate::config::Config;
use crate::deploy::{DeploymentClient, DeploymentDescriptor, Limits};
use crate::image::{rewrite_image, valid_image};
use crate::status::{StatusReporter, STAGE_BUILD, STAGE_DEPLOY};
use crate::trigger::TriggerEvent;

/// Network every deployed function joins.
const FUNCTION_NETWORK: &str = "func_functions";

pub struct Pipeline {
    config: Config,
    client: reqwest::Client,
    deployments: DeploymentClient,
    reporter: StatusReporter,
    audit: AuditSink,
}

impl Pipeline {
    pub fn new(config: Config) -> Result<Self> {
        let deployments =
            DeploymentClient::new(config.gateway_url.clone(), &config.secret_mount_path)?;
        let reporter = StatusReporter::new(&config)?;
        let audit = AuditSink::new(&config.gateway_url)?;

        // The build call gets no overall timeout; solves legitimately run
        // for minutes.
        Ok(Self {
            client: reqwest::Client::new(),
            deployments,
            reporter,
            audit,
            config,
        })
    }

    /// Run the whole pipeline for one trigger. Returns a one-line summary
    /// of the build and deployment.
    pub async fn run(&self, event: &TriggerEvent, payload: Bytes) -> Result<String> {
        let build_url = format!("{}build", self.config.builder_url);
        info!(
            "Submitting {} byte context for {}/{} to {}",
            payload.len(),
            event.owner,
            event.repository,
            build_url
        );

        let response = match self
            .client
            .post(&build_url)
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .header(header::ACCEPT, "text/plain")
            .body(payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                let description = err.to_string();
                return Err(self.fail(STAGE_BUILD, &description, err.into(), event).await);
            }
        };

        let build_status = response.status();
        let build_output = match response.text().await {
            Ok(body) => body,
            Err(err) => {
                let description = err.to_string();
                return Err(self.fail(STAGE_BUILD, &description, err.into(), event).await);
            }
        };

        let image_name = build_output.trim();
        if !valid_image(image_name) {
            let error = Error::Validation(format!(
                "builder returned an invalid image reference: {image_name:?}"
            ));
            return Err(self
                .fail(
                    STAGE_DEPLOY,
                    "Unable to build image, check builder logs",
                    error,
                    event,
                )
                .await);
        }

        let image = rewrite_image(
            image_name,
            &self.config.push_registry_url,
            &self.config.registry_url,
        );
        let service = format!("{}-{}", event.owner, event.service);
        info!("Built image {}, deploying as {}", image, service);

        let descriptor = DeploymentDescriptor {
            service: service.clone(),
            image: image.clone(),
            network: FUNCTION_NETWORK.to_string(),
            labels: self.deployment_labels(&service, event),
            limits: Limits {
                memory: self.config.default_memory_limit.clone(),
            },
            env_vars: event.environment.clone(),
            secrets: event.secrets.clone(),
        };

        match self.deployments.deploy(&descriptor).await {
            Ok(result) => {
                if !result.trim().is_empty() {
                    info!("Gateway response: {}", result.trim());
                }
            }
            Err(err) => {
                let description = err.to_string();
                return Err(self.fail(STAGE_DEPLOY, &description, err, event).await);
            }
        }

        self.post_audit(format!("{AUDIT_SOURCE} succeeded: deployed {image}"), event)
            .await;
        self.reporter
            .report(
                "success",
                &format!("function successfully deployed as: {service}"),
                STAGE_DEPLOY,
                event,
            )
            .await;

        Ok(format!(
            "buildStatus {} {} {}",
            build_output, image, build_status
        ))
    }

    fn deployment_labels(&self, service: &str, event: &TriggerEvent) -> HashMap<String, String> {
        let mut labels = HashMap::new();
        labels.insert("Git-Cloud".to_string(), "1".to_string());
        labels.insert("Git-Owner".to_string(), event.owner.clone());
        labels.insert("Git-Repo".to_string(), event.repository.clone());
        labels.insert(
            "Git-DeployTime".to_string(),
            Utc::now().timestamp().to_string(),
        );
        labels.insert("Git-SHA".to_string(), event.sha.clone());
        labels.insert("faas_function".to_string(), service.to_string());
        labels.insert("app".to_string(), service.to_string());
        labels
    }

    /// Report a stage failure, record it in the audit trail and hand the
    /// error back for the response.
    async fn fail(
        &self,
        stage: &str,
        description: &str,
        error: Error,
        event: &TriggerEvent,
    ) -> Error {
        error!(
            "{} stage failed for {}/{}: {}",
            stage, event.owner, event.repository, error
        );
        self.reporter
            .report("failure", description, stage, event)
            .await;
        self.post_audit(format!("{AUDIT_SOURCE} failure: {description}"), event)
            .await;
        error
    }

    async fn post_audit(&self, message: String, event: &TriggerEvent) {
        let audit_event = AuditEvent {
            message,
            owner: event.owner.clone(),
            repo: event.repository.clone(),
            source: AUDIT_SOURCE.to_string(),
        };
        self.audit.post(&audit_event).await;
    }
}
