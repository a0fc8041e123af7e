// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::AppConfig;

/// Where the model weights live locally and remotely
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelLocation {
    pub local_path: PathBuf,
    pub bucket: String,
    pub key: String,
}

impl ModelLocation {
    pub fn new(local_path: impl Into<PathBuf>, bucket: &str, key: &str) -> Self {
        Self {
            local_path: local_path.into(),
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.model_path(),
            &config.storage.bucket,
            &config.storage.model_key,
        )
    }

    /// Directory holding the weights file, if the path has one
    pub fn model_dir(&self) -> Option<&Path> {
        self.local_path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
    }

    pub async fn exists_locally(&self) -> bool {
        tokio::fs::try_exists(&self.local_path)
            .await
            .unwrap_or(false)
    }
}

/// How the active model was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelSource {
    Local,
    Downloaded,
    Trained,
}

/// The trained weights the detector runs with. Immutable once resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelArtifact {
    pub local_path: PathBuf,
    pub bucket: String,
    pub key: String,
    pub source: ModelSource,
    pub size_bytes: u64,
}

impl ModelArtifact {
    pub fn new(location: &ModelLocation, source: ModelSource, size_bytes: u64) -> Self {
        Self {
            local_path: location.local_path.clone(),
            bucket: location.bucket.clone(),
            key: location.key.clone(),
            source,
            size_bytes,
        }
    }
}
