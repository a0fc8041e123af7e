// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::info;

use crate::process::{CommandSpec, ProcessError, ProcessRunner};

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("Training pipeline failed: {0}")]
    Process(#[from] ProcessError),
}

/// Produces the model weights from scratch; expected to write them to the
/// configured model path as a side effect
#[async_trait]
pub trait TrainingPipeline: Send + Sync {
    async fn run_pipeline(&self) -> Result<(), TrainingError>;
}

/// Runs an external training program
pub struct CommandTrainingPipeline {
    command: CommandSpec,
    runner: Arc<dyn ProcessRunner>,
}

impl CommandTrainingPipeline {
    pub fn new(
        program: &str,
        args: &[String],
        working_dir: impl Into<PathBuf>,
        runner: Arc<dyn ProcessRunner>,
    ) -> Self {
        let command = CommandSpec::new(program)
            .args(args.iter().cloned())
            .current_dir(working_dir);
        Self { command, runner }
    }
}

#[async_trait]
impl TrainingPipeline for CommandTrainingPipeline {
    async fn run_pipeline(&self) -> Result<(), TrainingError> {
        info!("Starting training pipeline: {}", self.command);
        let started = Instant::now();
        self.runner.run(&self.command).await?;
        info!(
            "Training pipeline finished in {:.1}s",
            started.elapsed().as_secs_f64()
        );
        Ok(())
    }
}
