// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Startup model resolution
//!
//! Reuse a local weights file if present, otherwise fetch it from the
//! object store, otherwise train one. A downloaded artifact is not checked
//! for corruption.

use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use super::artifact::{ModelArtifact, ModelLocation, ModelSource};
use super::training::{TrainingError, TrainingPipeline};
use crate::storage::{ObjectStore, StorageError};

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Object store error: {0}")]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Training(#[from] TrainingError),
    #[error("Training completed, but model was not saved at {0}")]
    TrainedButMissing(PathBuf),
    #[error("Model path error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub struct ModelResolver {
    location: ModelLocation,
    store: Arc<dyn ObjectStore>,
    pipeline: Arc<dyn TrainingPipeline>,
    push_after_training: bool,
}

impl ModelResolver {
    pub fn new(
        location: ModelLocation,
        store: Arc<dyn ObjectStore>,
        pipeline: Arc<dyn TrainingPipeline>,
    ) -> Self {
        Self {
            location,
            store,
            pipeline,
            push_after_training: false,
        }
    }

    /// Upload freshly trained weights to the object store
    pub fn with_push_after_training(mut self, enabled: bool) -> Self {
        self.push_after_training = enabled;
        self
    }

    /// Guarantee a model file exists at the local path, or fail
    pub async fn ensure_model_available(&self) -> Result<ModelArtifact, ResolveError> {
        self.ensure_model_dir().await?;

        if self.location.exists_locally().await {
            info!(
                "Using existing model at {}",
                self.location.local_path.display()
            );
            return self.current_artifact(ModelSource::Local).await;
        }

        let present = self
            .store
            .is_model_present(&self.location.bucket, &self.location.key)
            .await?;

        if present {
            info!(
                "Downloading model {}/{} to {}",
                self.location.bucket,
                self.location.key,
                self.location.local_path.display()
            );
            self.store
                .download_object(
                    &self.location.key,
                    &self.location.bucket,
                    &self.location.local_path,
                )
                .await?;
            return self.current_artifact(ModelSource::Downloaded).await;
        }

        info!(
            "Model {}/{} not found in object store, starting training",
            self.location.bucket, self.location.key
        );
        self.train().await?;

        if !self.location.exists_locally().await {
            return Err(ResolveError::TrainedButMissing(
                self.location.local_path.clone(),
            ));
        }

        self.current_artifact(ModelSource::Trained).await
    }

    /// Run the training pipeline without any existence checks
    pub async fn train(&self) -> Result<(), ResolveError> {
        self.ensure_model_dir().await?;
        self.pipeline.run_pipeline().await?;
        info!("Training completed successfully");

        if self.push_after_training {
            self.push_model().await;
        }

        Ok(())
    }

    async fn push_model(&self) {
        if !self.location.exists_locally().await {
            warn!(
                "Skipping model push: no weights at {}",
                self.location.local_path.display()
            );
            return;
        }

        match self
            .store
            .upload_object(
                &self.location.local_path,
                &self.location.bucket,
                &self.location.key,
            )
            .await
        {
            Ok(()) => info!(
                "Pushed model to {}/{}",
                self.location.bucket, self.location.key
            ),
            Err(e) => warn!("Failed to push trained model: {}", e),
        }
    }

    async fn ensure_model_dir(&self) -> Result<(), ResolveError> {
        if let Some(dir) = self.location.model_dir() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|source| ResolveError::Io {
                    path: dir.to_path_buf(),
                    source,
                })?;
        }
        Ok(())
    }

    /// Describe the weights currently at the local path
    pub async fn current_artifact(
        &self,
        source: ModelSource,
    ) -> Result<ModelArtifact, ResolveError> {
        let metadata = tokio::fs::metadata(&self.location.local_path)
            .await
            .map_err(|e| ResolveError::Io {
                path: self.location.local_path.clone(),
                source: e,
            })?;
        Ok(ModelArtifact::new(&self.location, source, metadata.len()))
    }
}
