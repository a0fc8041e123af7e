// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod cli;
pub mod config;
pub mod detection;
pub mod models;
pub mod process;
pub mod storage;
pub mod version;

pub use api::{create_app, start_server, ApiError, AppState, DetectionRequestHandler};
pub use config::AppConfig;
pub use detection::{DetectionJob, Detector, YoloDetector};
pub use models::{ModelArtifact, ModelResolver, ResolveError, TrainingJobManager};
pub use storage::{ObjectStore, ObjectStoreClient, StorageError};
