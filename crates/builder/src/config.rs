//! Configuration for the builder service
//!
//! Loads configuration from environment variables with sensible defaults.

use anyhow::{Context, Result};
use std::env;

const DEFAULT_MAX_CONTEXT_BYTES: usize = 512 * 1024 * 1024;

/// Builder configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// API server host
    pub host: String,

    /// API server port
    pub port: u16,

    /// Base URL of the external build engine
    pub engine_url: String,

    /// Whether pushes may target a registry without TLS
    pub insecure_registry: bool,

    /// Whether to apply ownership metadata (lchown) while unpacking
    pub preserve_ownership: bool,

    /// Upper bound on the uploaded build-context size
    pub max_context_bytes: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let config = Config {
            host: env::var("BUILDER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),

            port: env::var("BUILDER_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("Invalid BUILDER_PORT")?,

            engine_url: env::var("ENGINE_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:1234".to_string()),

            insecure_registry: env::var("INSECURE_REGISTRY")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .context("Invalid INSECURE_REGISTRY (expected true/false)")?,

            preserve_ownership: env::var("PRESERVE_OWNERSHIP")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .context("Invalid PRESERVE_OWNERSHIP (expected true/false)")?,

            max_context_bytes: env::var("MAX_CONTEXT_BYTES")
                .unwrap_or_else(|_| DEFAULT_MAX_CONTEXT_BYTES.to_string())
                .parse()
                .context("Invalid MAX_CONTEXT_BYTES")?,
        };

        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.port == 0 {
            anyhow::bail!("BUILDER_PORT must be greater than 0");
        }

        if self.engine_url.is_empty() {
            anyhow::bail!("ENGINE_URL must not be empty");
        }

        if self.max_context_bytes == 0 {
            anyhow::bail!("MAX_CONTEXT_BYTES must be greater than 0");
        }

        Ok(())
    }

    /// Get the API server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
