//! Slipway Orchestrator
//!
//! Entry point for the build-and-deploy pipeline service.

use anyhow::{Context, Result};
use slipway_orchestrator::{create_router, AppState, Config, Pipeline};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "slipway_orchestrator=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    info!("Starting Slipway Orchestrator");
    info!("  Builder URL: {}", config.builder_url);
    info!("  Gateway URL: {}", config.gateway_url);
    info!(
        "  Registry: {} (push: {})",
        config.registry_url, config.push_registry_url
    );
    info!("  Commit-status reporting: {}", config.report_status);

    let addr = config.bind_address();
    let pipeline = Pipeline::new(config.clone())?;
    let app = create_router(AppState { config, pipeline });

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;
    info!("Orchestrator API listening on {}", addr);

    let server_task = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Server error: {:#}", e);
        }
    });

    tokio::select! {
        _ = server_task => {
            error!("Server task terminated unexpectedly");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    info!("Shutting down Slipway Orchestrator");

    Ok(())
}
