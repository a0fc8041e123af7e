// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Predict endpoint handler

use axum::{body::Bytes, extract::State, Json};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use super::request::{decode_image, encode_image, extract_image_field};
use super::response::PredictResponse;
use crate::api::errors::ApiError;
use crate::api::http_server::{ApiErrorResponse, AppState};
use crate::config::AppConfig;
use crate::detection::{DetectionJob, Detector, RequestWorkspace};

/// Turns one predict request into one detector run inside its own workspace
pub struct DetectionRequestHandler {
    data_dir: PathBuf,
    input_file_name: String,
    run_name: String,
    weights: PathBuf,
    detector: Arc<dyn Detector>,
}

impl DetectionRequestHandler {
    pub fn new(
        data_dir: impl Into<PathBuf>,
        weights: impl Into<PathBuf>,
        detector: Arc<dyn Detector>,
    ) -> Self {
        Self {
            data_dir: data_dir.into(),
            input_file_name: "inputImage.jpg".to_string(),
            run_name: "exp".to_string(),
            weights: weights.into(),
            detector,
        }
    }

    pub fn from_config(config: &AppConfig, weights: PathBuf, detector: Arc<dyn Detector>) -> Self {
        Self {
            data_dir: config.paths.data_dir.clone(),
            input_file_name: config.detector.input_file_name.clone(),
            run_name: config.detector.run_name.clone(),
            weights,
            detector,
        }
    }

    pub async fn handle_predict(&self, body: &[u8]) -> Result<PredictResponse, ApiError> {
        let encoded = extract_image_field(body)?;
        let image = decode_image(&encoded)?;

        let workspace = RequestWorkspace::create(&self.data_dir)
            .await
            .map_err(|e| {
                ApiError::PredictionFailed(format!(
                    "failed to create request workspace under {}: {}",
                    self.data_dir.display(),
                    e
                ))
            })?;

        debug!("Running detection in request workspace {}", workspace.id());
        let result = self.run_in_workspace(&workspace, image).await;
        workspace.cleanup().await;
        result
    }

    async fn run_in_workspace(
        &self,
        workspace: &RequestWorkspace,
        image: Vec<u8>,
    ) -> Result<PredictResponse, ApiError> {
        let input_path = workspace.input_path(&self.input_file_name);
        tokio::fs::write(&input_path, image).await.map_err(|e| {
            ApiError::PredictionFailed(format!(
                "failed to write {}: {}",
                input_path.display(),
                e
            ))
        })?;

        if !tokio::fs::try_exists(&input_path).await.unwrap_or(false) {
            return Err(ApiError::ImageNotSaved);
        }

        let job = DetectionJob {
            weights: self.weights.clone(),
            source: input_path,
            project_dir: workspace.runs_dir(),
            run_name: self.run_name.clone(),
        };

        let output_path = self
            .detector
            .detect(&job)
            .await
            .map_err(|e| ApiError::PredictionFailed(e.to_string()))?;

        let annotated = tokio::fs::read(&output_path).await.map_err(|e| {
            ApiError::PredictionFailed(format!(
                "failed to read detector output {}: {}",
                output_path.display(),
                e
            ))
        })?;

        Ok(PredictResponse {
            image: encode_image(&annotated),
        })
    }
}

/// POST /predict (GET accepted too) - run object detection on a base64 image
pub async fn predict_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<PredictResponse>, ApiErrorResponse> {
    let started = Instant::now();

    match state.predict.handle_predict(&body).await {
        Ok(response) => {
            info!(
                "Prediction completed in {}ms",
                started.elapsed().as_millis()
            );
            Ok(Json(response))
        }
        Err(e) => {
            if e.is_client_error() {
                warn!("Rejected prediction request: {}", e);
            } else {
                error!("Prediction failed: {}", e);
            }
            Err(e.into())
        }
    }
}
