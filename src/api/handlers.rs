// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Html,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use super::errors::ApiError;
use super::http_server::{ApiErrorResponse, AppState};
use crate::models::{JobError, ModelArtifact, TrainingJob, TrainingJobStatus};

const LANDING_PAGE: &str = include_str!("../../templates/index.html");

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub model: ModelArtifact,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_training_job: Option<Uuid>,
}

impl From<JobError> for ApiError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::AlreadyRunning(job_id) => ApiError::TrainingInProgress(job_id),
        }
    }
}

/// GET / - static landing page
pub async fn home_handler() -> Html<&'static str> {
    Html(LANDING_PAGE)
}

/// GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: crate::version::VERSION_NUMBER.to_string(),
        model: state.training.current_model().await,
        active_training_job: state.training.active_job().await,
    })
}

/// GET /train - run the training pipeline and wait for it to finish
pub async fn train_handler(State(state): State<AppState>) -> Result<String, ApiErrorResponse> {
    let handle = state.training.submit().await.map_err(ApiError::from)?;
    let job_id = handle.job_id;

    let job = handle.wait().await.ok_or_else(|| {
        ApiError::TrainingFailed(format!("training job {} was aborted", job_id))
    })?;

    match job.status {
        TrainingJobStatus::Completed => {
            info!("Training completed successfully!");
            Ok("Training completed successfully!".to_string())
        }
        _ => {
            let message = job.error.unwrap_or_else(|| "unknown failure".to_string());
            error!("Training job {} failed: {}", job_id, message);
            Err(ApiError::TrainingFailed(message).into())
        }
    }
}

/// POST /train/jobs - start training in the background
pub async fn submit_training_job_handler(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<TrainingJob>), ApiErrorResponse> {
    let handle = state.training.submit().await.map_err(ApiError::from)?;
    let job = state.training.get(handle.job_id).await.ok_or_else(|| {
        ApiError::InternalError(format!("training job {} vanished", handle.job_id))
    })?;

    Ok((StatusCode::ACCEPTED, Json(job)))
}

/// GET /train/jobs/:id - poll a training job
pub async fn training_job_status_handler(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<TrainingJob>, ApiErrorResponse> {
    let not_found = || ApiError::NotFound(format!("training job '{}'", job_id));

    let id = Uuid::parse_str(&job_id).map_err(|_| not_found())?;
    let job = state.training.get(id).await.ok_or_else(not_found)?;
    Ok(Json(job))
}
