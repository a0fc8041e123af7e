// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Shared fixtures for the API tests
#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request},
    response::Response,
    Router,
};
use detection_node::{
    api::{create_app, AppState, DetectionRequestHandler},
    detection::{DetectionJob, Detector, DetectorError},
    models::{
        ModelArtifact, ModelLocation, ModelResolver, ModelSource, TrainingError,
        TrainingJobManager, TrainingPipeline,
    },
    process::ProcessError,
    storage::MemoryObjectStore,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::sync::Notify;

/// Bytes every detector run "annotates" the input into
pub const FIXED_OUTPUT: &[u8] = b"\xFF\xD8\xFF\xE0annotated-detections";

/// Detector that always succeeds and writes [`FIXED_OUTPUT`]
#[derive(Default)]
pub struct FixedOutputDetector {
    pub jobs: Mutex<Vec<DetectionJob>>,
    pub inputs: Mutex<Vec<Vec<u8>>>,
}

impl FixedOutputDetector {
    pub fn jobs(&self) -> Vec<DetectionJob> {
        self.jobs.lock().unwrap().clone()
    }

    pub fn inputs(&self) -> Vec<Vec<u8>> {
        self.inputs.lock().unwrap().clone()
    }
}

#[async_trait]
impl Detector for FixedOutputDetector {
    async fn detect(&self, job: &DetectionJob) -> Result<PathBuf, DetectorError> {
        let input = tokio::fs::read(&job.source).await.unwrap();
        tokio::fs::create_dir_all(job.output_dir()).await.unwrap();
        tokio::fs::write(job.output_path(), FIXED_OUTPUT)
            .await
            .unwrap();

        self.inputs.lock().unwrap().push(input);
        self.jobs.lock().unwrap().push(job.clone());
        Ok(job.output_path())
    }
}

/// Training pipeline whose outcome is chosen by the test
pub struct ScriptedPipeline {
    pub writes_model_to: Option<PathBuf>,
    pub fails: bool,
    pub gate: Option<Arc<Notify>>,
    pub runs: AtomicUsize,
}

impl ScriptedPipeline {
    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TrainingPipeline for ScriptedPipeline {
    async fn run_pipeline(&self) -> Result<(), TrainingError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.fails {
            return Err(TrainingError::Process(ProcessError::NonZeroExit {
                program: "python".to_string(),
                code: Some(1),
                stderr: "dataset.yaml not found".to_string(),
            }));
        }
        if let Some(path) = &self.writes_model_to {
            tokio::fs::write(path, b"trained-weights").await.unwrap();
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub enum TrainingOutcome {
    #[default]
    Succeeds,
    Fails,
    WaitsForGate,
}

pub struct TestApp {
    pub app: Router,
    pub root: TempDir,
    pub data_dir: PathBuf,
    pub detector: Arc<FixedOutputDetector>,
    pub pipeline: Arc<ScriptedPipeline>,
    pub gate: Arc<Notify>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::build(TrainingOutcome::Succeeds, 20 * 1024 * 1024).await
    }

    pub async fn with_training(outcome: TrainingOutcome) -> Self {
        Self::build(outcome, 20 * 1024 * 1024).await
    }

    pub async fn with_body_limit(max_request_bytes: usize) -> Self {
        Self::build(TrainingOutcome::Succeeds, max_request_bytes).await
    }

    async fn build(outcome: TrainingOutcome, max_request_bytes: usize) -> Self {
        let root = tempfile::tempdir().unwrap();
        let data_dir = root.path().join("data");
        let model_path = root.path().join("yolov7").join("best.pt");
        std::fs::create_dir_all(model_path.parent().unwrap()).unwrap();
        std::fs::write(&model_path, b"existing-weights").unwrap();

        let location = ModelLocation::new(&model_path, "models", "best.pt");
        let gate = Arc::new(Notify::new());
        let pipeline = Arc::new(ScriptedPipeline {
            writes_model_to: Some(model_path.clone()),
            fails: matches!(outcome, TrainingOutcome::Fails),
            gate: matches!(outcome, TrainingOutcome::WaitsForGate).then(|| gate.clone()),
            runs: AtomicUsize::new(0),
        });
        let resolver = Arc::new(ModelResolver::new(
            location.clone(),
            Arc::new(MemoryObjectStore::new()),
            pipeline.clone(),
        ));

        let detector = Arc::new(FixedOutputDetector::default());
        let predict = DetectionRequestHandler::new(&data_dir, &model_path, detector.clone());
        let model = ModelArtifact::new(
            &location,
            ModelSource::Local,
            b"existing-weights".len() as u64,
        );

        let state = AppState::new(
            predict,
            Arc::new(TrainingJobManager::new(resolver, model)),
            max_request_bytes,
        );

        Self {
            app: create_app(state),
            root,
            data_dir,
            detector,
            pipeline,
            gate,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        use tower::util::ServiceExt;
        self.app.clone().oneshot(request).await.unwrap()
    }

    /// Number of request workspaces still on disk
    pub fn workspaces_left(&self) -> usize {
        std::fs::read_dir(self.data_dir.join("requests"))
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

pub fn json_request(method: Method, uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn empty_request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub async fn body_string(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_str(&body_string(response).await).unwrap()
}
