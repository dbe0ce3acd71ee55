//! Detection API handlers
//!
//! POST /api/detect/start, GET /api/detect/status/:job_id,
//! POST /api/detect/stop/:job_id

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::{
    detection::{StartAck, StartRequest},
    error::{ApiError, ApiResult},
    models::{DetectionSeed, JobSnapshot},
    AppState,
};

/// POST /api/detect/start request
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartDetectionRequest {
    pub job_id: Option<String>,
    #[serde(default, alias = "reports")]
    pub report_keys: Vec<String>,
    pub engagement_id: Option<String>,
    pub admin_id: Option<String>,
    #[serde(default)]
    pub routines: Vec<String>,
}

impl From<StartDetectionRequest> for StartRequest {
    fn from(request: StartDetectionRequest) -> Self {
        StartRequest {
            job_id: request.job_id.unwrap_or_default(),
            report_keys: request.report_keys,
            seed: DetectionSeed {
                engagement_id: request.engagement_id,
                admin_id: request.admin_id,
                routines: request.routines,
            },
        }
    }
}

/// POST /api/detect/stop response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopDetectionResponse {
    pub job_id: String,
    pub stopped: bool,
}

/// POST /api/detect/start
///
/// Seed the job on first call and schedule it. Safe to repeat.
pub async fn start_detection(
    State(state): State<AppState>,
    Json(request): Json<StartDetectionRequest>,
) -> ApiResult<Json<StartAck>> {
    let request = StartRequest::from(request);
    tracing::info!(
        job_id = %request.job_id,
        reports = request.report_keys.len(),
        routines = request.seed.routines.len(),
        "Detection start requested"
    );

    let ack = state.orchestrator.start(request).await?;
    Ok(Json(ack))
}

/// GET /api/detect/status/:job_id
///
/// Poll detection progress. 404 for unknown jobs.
pub async fn get_detection_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<JobSnapshot>> {
    state
        .orchestrator
        .status(&job_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Detection job not found: {}", job_id)))
}

/// POST /api/detect/stop/:job_id
///
/// Stop the job's scheduling loop; the job itself is left as is.
pub async fn stop_detection(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<StopDetectionResponse>> {
    if state.orchestrator.status(&job_id).await?.is_none() {
        return Err(ApiError::NotFound(format!(
            "Detection job not found: {}",
            job_id
        )));
    }

    let stopped = state.orchestrator.stop(&job_id).await;
    Ok(Json(StopDetectionResponse { job_id, stopped }))
}

/// Build detection routes
pub fn detection_routes() -> Router<AppState> {
    Router::new()
        .route("/api/detect/start", post(start_detection))
        .route("/api/detect/status/:job_id", get(get_detection_status))
        .route("/api/detect/stop/:job_id", post(stop_detection))
}
