// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    health_handler, home_handler, submit_training_job_handler, train_handler,
    training_job_status_handler,
};
use super::predict::{predict_handler, DetectionRequestHandler};
use super::ApiError;
use crate::models::TrainingJobManager;

#[derive(Clone)]
pub struct AppState {
    pub predict: Arc<DetectionRequestHandler>,
    pub training: Arc<TrainingJobManager>,
    pub max_request_bytes: usize,
}

impl AppState {
    pub fn new(
        predict: DetectionRequestHandler,
        training: Arc<TrainingJobManager>,
        max_request_bytes: usize,
    ) -> Self {
        Self {
            predict: Arc::new(predict),
            training,
            max_request_bytes,
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    let max_request_bytes = state.max_request_bytes;

    Router::new()
        // Landing page
        .route("/", get(home_handler))
        // Health check
        .route("/health", get(health_handler))
        // Training
        .route("/train", get(train_handler))
        .route("/train/jobs", post(submit_training_job_handler))
        .route("/train/jobs/:id", get(training_job_status_handler))
        // Inference
        .route("/predict", get(predict_handler).post(predict_handler))
        .layer(DefaultBodyLimit::max(max_request_bytes))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let app = create_app(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("API server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Plain-text error response
pub struct ApiErrorResponse(pub ApiError);

impl From<ApiError> for ApiErrorResponse {
    fn from(err: ApiError) -> Self {
        ApiErrorResponse(err)
    }
}

impl IntoResponse for ApiErrorResponse {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        (status, self.0.to_string()).into_response()
    }
}
