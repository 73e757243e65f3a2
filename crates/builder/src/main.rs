//! Slipway Builder
//!
//! Entry point for the image build service.

use anyhow::{Context, Result};
use slipway_builder::{create_router, AppState, Config, EngineClient};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "slipway_builder=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    info!("Starting Slipway Builder");
    info!("  Engine URL: {}", config.engine_url);
    info!("  Insecure registry: {}", config.insecure_registry);
    info!("  Preserve ownership: {}", config.preserve_ownership);
    info!("  Context size limit: {} bytes", config.max_context_bytes);

    let addr = config.bind_address();
    let engine = EngineClient::new(&config.engine_url);
    let app = create_router(AppState { config, engine });

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;
    info!("Builder API listening on {}", addr);

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

    info!("Shutting down Slipway Builder");

    Ok(())
}
