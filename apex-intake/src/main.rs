//! apex-intake - Document Intake Detection Service
//!
//! Tracks, per intake job, which expected reports have been located among the
//! uploaded files and whether their fields and attributes could be mapped.
//!
//! Integrates with the APEX front end via HTTP REST + SSE.

use anyhow::{Context, Result};
use apex_common::config::load_config;
use apex_common::EventBus;
use apex_intake::config::{Args, Settings};
use apex_intake::AppState;
use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // TOML is read before tracing exists; its level seeds the filter
    let (toml_config, config_path) = load_config(args.config.as_deref())
        .context("Failed to load configuration file")?;
    let settings = Settings::resolve(&args, &toml_config);

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting apex-intake (Document Intake Detection) service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    match &config_path {
        Some(path) => info!(path = %path.display(), "Configuration file loaded"),
        None => info!("No configuration file found; using CLI/ENV and defaults"),
    }
    info!(
        tick_interval_ms = settings.tick_interval.as_millis() as u64,
        tier_timeout_ms = settings.tier_timeout.as_millis() as u64,
        event_capacity = settings.event_capacity,
        "Detection settings resolved"
    );

    let dataset = settings
        .load_dataset()
        .context("Failed to load reference dataset")?;

    let event_bus = EventBus::new(settings.event_capacity);
    let state = AppState::new(dataset, event_bus, settings.orchestrator_config());
    let orchestrator = Arc::clone(&state.orchestrator);

    let app = apex_intake::build_router(state);

    let listener = tokio::net::TcpListener::bind(&settings.listen)
        .await
        .with_context(|| format!("Failed to bind {}", settings.listen))?;
    info!("Listening on http://{}", settings.listen);
    info!("Health check: http://{}/health", settings.listen);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Cancel every scheduling loop; in-flight steps finish on their own
    orchestrator.shutdown().await;
    info!("apex-intake stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
