//! Upload descriptor registration
//!
//! POST /api/jobs/:job_id/files — records descriptors of files already
//! stored by the upload service so the tiers can see them.

use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use serde::Serialize;

use crate::{
    error::{ApiError, ApiResult},
    models::UploadedFile,
    AppState,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterFilesResponse {
    pub job_id: String,
    pub registered: usize,
    pub total_files: usize,
}

/// POST /api/jobs/:job_id/files
pub async fn register_files(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    Json(files): Json<Vec<UploadedFile>>,
) -> ApiResult<Json<RegisterFilesResponse>> {
    if let Some(file) = files.iter().find(|f| f.original_name.trim().is_empty()) {
        return Err(ApiError::BadRequest(format!(
            "File descriptor without original name (stored as '{}')",
            file.stored_name
        )));
    }

    let registered = files.len();
    let total_files = state.uploads.register(&job_id, files).await;
    tracing::info!(job_id = %job_id, registered, total_files, "Upload descriptors registered");

    Ok(Json(RegisterFilesResponse {
        job_id,
        registered,
        total_files,
    }))
}

pub fn upload_routes() -> Router<AppState> {
    Router::new().route("/api/jobs/:job_id/files", post(register_files))
}
