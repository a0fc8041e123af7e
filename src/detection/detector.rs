// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! External object detector adapter

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::config::DetectorSettings;
use crate::process::{CommandSpec, ProcessError, ProcessRunner};

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("Detector failed: {0}")]
    Process(#[from] ProcessError),
    #[error("Invalid detector path {path}: {source}")]
    InvalidPath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One detector invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionJob {
    pub weights: PathBuf,
    pub source: PathBuf,
    /// Directory the detector writes its run directories into
    pub project_dir: PathBuf,
    pub run_name: String,
}

impl DetectionJob {
    pub fn output_dir(&self) -> PathBuf {
        self.project_dir.join(&self.run_name)
    }

    /// Where the annotated copy of `source` is expected
    pub fn output_path(&self) -> PathBuf {
        let file_name = self.source.file_name().unwrap_or_default();
        self.output_dir().join(file_name)
    }
}

#[async_trait]
pub trait Detector: Send + Sync {
    /// Run detection and return the path of the annotated output image
    async fn detect(&self, job: &DetectionJob) -> Result<PathBuf, DetectorError>;
}

/// Invokes a YOLO-style `detect.py` script from the detector directory
pub struct YoloDetector {
    settings: DetectorSettings,
    detector_dir: PathBuf,
    runner: Arc<dyn ProcessRunner>,
}

impl YoloDetector {
    pub fn new(
        settings: DetectorSettings,
        detector_dir: impl Into<PathBuf>,
        runner: Arc<dyn ProcessRunner>,
    ) -> Self {
        Self {
            settings,
            detector_dir: detector_dir.into(),
            runner,
        }
    }

    pub fn command_for(&self, job: &DetectionJob) -> Result<CommandSpec, DetectorError> {
        // The script runs from the detector directory, so every path
        // handed to it must be absolute.
        let weights = absolute(&job.weights)?;
        let source = absolute(&job.source)?;
        let project = absolute(&job.project_dir)?;

        Ok(CommandSpec::new(&self.settings.program)
            .arg(&self.settings.script)
            .arg("--weights")
            .arg(weights.to_string_lossy())
            .arg("--source")
            .arg(source.to_string_lossy())
            .arg("--project")
            .arg(project.to_string_lossy())
            .arg("--name")
            .arg(&job.run_name)
            .arg("--exist-ok")
            .args(self.settings.extra_args.iter().cloned())
            .current_dir(&self.detector_dir))
    }
}

fn absolute(path: &Path) -> Result<PathBuf, DetectorError> {
    std::path::absolute(path).map_err(|source| DetectorError::InvalidPath {
        path: path.to_path_buf(),
        source,
    })
}

#[async_trait]
impl Detector for YoloDetector {
    async fn detect(&self, job: &DetectionJob) -> Result<PathBuf, DetectorError> {
        let command = self.command_for(job)?;
        info!("Running detector on {}", job.source.display());
        self.runner.run(&command).await?;
        Ok(job.output_path())
    }
}
