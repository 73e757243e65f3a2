//! Configuration for the orchestrator
//!
//! Endpoint URLs for the builder, the serving platform and the
//! source-control API come from environment variables. The four
//! pipeline-critical URLs are required; everything else has a default.

use std::env;
use std::path::PathBuf;

use slipway_common::{Error, Result};

const DEFAULT_MAX_CONTEXT_BYTES: usize = 512 * 1024 * 1024;

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// API server host
    pub host: String,

    /// API server port
    pub port: u16,

    /// Build service base URL (slash-terminated)
    pub builder_url: String,

    /// Serving-platform gateway base URL (slash-terminated)
    pub gateway_url: String,

    /// Registry prefix the platform pulls from
    pub registry_url: String,

    /// Registry prefix the builder pushes to
    pub push_registry_url: String,

    /// Public base URL for deployed functions, used in success statuses
    pub gateway_public_url: Option<String>,

    /// Templated per-account URL, takes precedence over the public base
    pub gateway_pretty_url: Option<String>,

    /// Memory limit applied to every deployment
    pub default_memory_limit: String,

    /// Whether commit statuses are posted at all
    pub report_status: bool,

    /// Source-control app identifier used when minting tokens
    pub app_id: Option<String>,

    /// File name of the app's private key under the secret mount
    pub private_key_name: String,

    /// Directory holding mounted secrets
    pub secret_mount_path: PathBuf,

    /// Source-control API base URL (no trailing slash)
    pub scm_api_url: String,

    /// Upper bound on the forwarded build-context size
    pub max_context_bytes: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let config = Config {
            host: env::var("ORCHESTRATOR_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),

            port: env::var("ORCHESTRATOR_PORT")
                .unwrap_or_else(|_| "8081".to_string())
                .parse()
                .map_err(|_| Error::Configuration("Invalid ORCHESTRATOR_PORT".into()))?,

            builder_url: slash_terminated(required("BUILDER_URL")?),
            gateway_url: slash_terminated(required("GATEWAY_URL")?),
            registry_url: required("REGISTRY_URL")?,
            push_registry_url: required("PUSH_REGISTRY_URL")?,

            gateway_public_url: optional("GATEWAY_PUBLIC_URL"),
            gateway_pretty_url: optional("GATEWAY_PRETTY_URL"),

            default_memory_limit: env::var("DEFAULT_MEMORY_LIMIT")
                .unwrap_or_else(|_| "20m".to_string()),

            report_status: env::var("REPORT_STATUS")
                .map(|value| value == "true")
                .unwrap_or(false),

            app_id: optional("APP_ID"),

            private_key_name: env::var("PRIVATE_KEY_NAME")
                .unwrap_or_else(|_| "private-key".to_string()),

            secret_mount_path: PathBuf::from(
                env::var("SECRET_MOUNT_PATH")
                    .unwrap_or_else(|_| "/var/slipway/secrets".to_string()),
            ),

            scm_api_url: env::var("SCM_API_URL")
                .unwrap_or_else(|_| "https://api.github.com".to_string())
                .trim_end_matches('/')
                .to_string(),

            max_context_bytes: env::var("MAX_CONTEXT_BYTES")
                .unwrap_or_else(|_| DEFAULT_MAX_CONTEXT_BYTES.to_string())
                .parse()
                .map_err(|_| Error::Configuration("Invalid MAX_CONTEXT_BYTES".into()))?,
        };

        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(Error::Configuration(
                "ORCHESTRATOR_PORT must be greater than 0".into(),
            ));
        }

        if self.max_context_bytes == 0 {
            return Err(Error::Configuration(
                "MAX_CONTEXT_BYTES must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Get the API server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Path of the private key used for token minting
    pub fn private_key_path(&self) -> PathBuf {
        self.secret_mount_path.join(&self.private_key_name)
    }
}

fn required(key: &str) -> Result<String> {
    env::var(key)
        .ok()
        .filter(|value| !value.is_empty())
        .ok_or_else(|| Error::Configuration(format!("{key} env-var not set")))
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.is_empty())
}

fn slash_terminated(url: String) -> String {
    if url.ends_with('/') {
        url
    } else {
        format!("{url}/")
    }
}
