// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod errors;
pub mod handlers;
pub mod http_server;
pub mod predict;

pub use errors::ApiError;
pub use handlers::HealthResponse;
pub use http_server::{create_app, start_server, ApiErrorResponse, AppState};
pub use predict::{predict_handler, DetectionRequestHandler, PredictResponse};
