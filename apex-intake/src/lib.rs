//! apex-intake library interface for testing
//!
//! Exposes public APIs for integration testing

pub mod api;
pub mod config;
pub mod detection;
pub mod error;
pub mod models;

pub use crate::error::{ApiError, ApiResult};

use apex_common::{EventBus, ReferenceDataset};
use axum::Router;
use chrono::{DateTime, Utc};
use detection::{DetectionOrchestrator, InMemoryUploadRegistry, OrchestratorConfig, UploadRegistry};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Per-job detection state machines
    pub orchestrator: Arc<DetectionOrchestrator>,
    /// Uploaded file descriptors by job id
    pub uploads: Arc<dyn UploadRegistry>,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// State with in-memory stores and the default tiers
    pub fn new(dataset: ReferenceDataset, event_bus: EventBus, config: OrchestratorConfig) -> Self {
        let uploads: Arc<dyn UploadRegistry> = Arc::new(InMemoryUploadRegistry::new());
        let orchestrator = DetectionOrchestrator::new(
            Arc::new(dataset),
            Arc::clone(&uploads),
            event_bus.clone(),
            config,
        );
        Self::with_orchestrator(Arc::new(orchestrator), uploads, event_bus)
    }

    /// State around an already-built orchestrator
    ///
    /// `uploads` must be the registry the orchestrator reads from.
    pub fn with_orchestrator(
        orchestrator: Arc<DetectionOrchestrator>,
        uploads: Arc<dyn UploadRegistry>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            orchestrator,
            uploads,
            event_bus,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::detection_routes())
        .merge(api::upload_routes())
        .merge(api::event_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
