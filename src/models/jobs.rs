// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Asynchronous training jobs with status polling

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{oneshot, Mutex, RwLock};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::artifact::{ModelArtifact, ModelSource};
use super::resolver::ModelResolver;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingJobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingJob {
    pub job_id: Uuid,
    pub status: TrainingJobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub submitted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl TrainingJob {
    fn new() -> Self {
        Self {
            job_id: Uuid::new_v4(),
            status: TrainingJobStatus::Pending,
            error: None,
            submitted_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(
            self.status,
            TrainingJobStatus::Completed | TrainingJobStatus::Failed
        )
    }
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("Training job {0} is already running")]
    AlreadyRunning(Uuid),
}

/// Returned by [`TrainingJobManager::submit`]
#[derive(Debug)]
pub struct TrainingJobHandle {
    pub job_id: Uuid,
    completion: oneshot::Receiver<TrainingJob>,
}

impl TrainingJobHandle {
    /// Wait for the job to finish; `None` if the job task was dropped
    pub async fn wait(self) -> Option<TrainingJob> {
        self.completion.await.ok()
    }
}

/// Finished jobs kept for status polling; older ones are forgotten
const RETAINED_FINISHED_JOBS: usize = 32;

/// Runs at most one training job at a time in the background
pub struct TrainingJobManager {
    resolver: Arc<ModelResolver>,
    jobs: Arc<RwLock<HashMap<Uuid, TrainingJob>>>,
    active: Arc<Mutex<Option<Uuid>>>,
    model: Arc<RwLock<ModelArtifact>>,
}

impl TrainingJobManager {
    /// `model` is the artifact resolved at startup
    pub fn new(resolver: Arc<ModelResolver>, model: ModelArtifact) -> Self {
        Self {
            resolver,
            jobs: Arc::new(RwLock::new(HashMap::new())),
            active: Arc::new(Mutex::new(None)),
            model: Arc::new(RwLock::new(model)),
        }
    }

    pub async fn submit(&self) -> Result<TrainingJobHandle, JobError> {
        let mut active = self.active.lock().await;
        if let Some(running) = *active {
            return Err(JobError::AlreadyRunning(running));
        }

        let job = TrainingJob::new();
        let job_id = job.job_id;
        {
            let mut jobs = self.jobs.write().await;
            prune_finished(&mut jobs);
            jobs.insert(job_id, job);
        }
        *active = Some(job_id);
        drop(active);

        let (tx, rx) = oneshot::channel();
        let resolver = Arc::clone(&self.resolver);
        let jobs = Arc::clone(&self.jobs);
        let active = Arc::clone(&self.active);
        let model = Arc::clone(&self.model);

        tokio::spawn(async move {
            Self::update(&jobs, job_id, |job| {
                job.status = TrainingJobStatus::Running;
                job.started_at = Some(Utc::now());
            })
            .await;
            info!("Training job {} started", job_id);

            // Run on its own task so a panic in the pipeline still lands here
            let training = tokio::spawn({
                let resolver = Arc::clone(&resolver);
                async move { resolver.train().await }
            });
            let result = match training.await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(e.to_string()),
                Err(e) => Err(format!("training task aborted: {}", e)),
            };

            if result.is_ok() {
                match resolver.current_artifact(ModelSource::Trained).await {
                    Ok(artifact) => *model.write().await = artifact,
                    Err(e) => warn!("Trained model could not be inspected: {}", e),
                }
            }

            let finished = Self::update(&jobs, job_id, |job| {
                job.finished_at = Some(Utc::now());
                match &result {
                    Ok(()) => job.status = TrainingJobStatus::Completed,
                    Err(e) => {
                        job.status = TrainingJobStatus::Failed;
                        job.error = Some(e.clone());
                    }
                }
            })
            .await;

            match &result {
                Ok(()) => info!("Training job {} completed", job_id),
                Err(e) => error!("Training job {} failed: {}", job_id, e),
            }

            *active.lock().await = None;
            if let Some(job) = finished {
                let _ = tx.send(job);
            }
        });

        Ok(TrainingJobHandle {
            job_id,
            completion: rx,
        })
    }

    pub async fn get(&self, job_id: Uuid) -> Option<TrainingJob> {
        self.jobs.read().await.get(&job_id).cloned()
    }

    pub async fn active_job(&self) -> Option<Uuid> {
        *self.active.lock().await
    }

    /// The model the detector is currently running with
    pub async fn current_model(&self) -> ModelArtifact {
        self.model.read().await.clone()
    }

    async fn update<F>(
        jobs: &RwLock<HashMap<Uuid, TrainingJob>>,
        job_id: Uuid,
        apply: F,
    ) -> Option<TrainingJob>
    where
        F: FnOnce(&mut TrainingJob),
    {
        let mut jobs = jobs.write().await;
        jobs.get_mut(&job_id).map(|job| {
            apply(job);
            job.clone()
        })
    }
}

fn prune_finished(jobs: &mut HashMap<Uuid, TrainingJob>) {
    let mut finished: Vec<(DateTime<Utc>, Uuid)> = jobs
        .values()
        .filter(|job| job.is_finished())
        .map(|job| (job.submitted_at, job.job_id))
        .collect();
    if finished.len() <= RETAINED_FINISHED_JOBS {
        return;
    }

    finished.sort();
    let excess = finished.len() - RETAINED_FINISHED_JOBS;
    for (_, job_id) in finished.into_iter().take(excess) {
        jobs.remove(&job_id);
    }
}
