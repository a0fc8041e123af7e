// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Model artifact lifecycle: resolution at startup, training and jobs

pub mod artifact;
pub mod jobs;
pub mod resolver;
pub mod training;

pub use artifact::{ModelArtifact, ModelLocation, ModelSource};
pub use jobs::{JobError, TrainingJob, TrainingJobHandle, TrainingJobManager, TrainingJobStatus};
pub use resolver::{ModelResolver, ResolveError};
pub use training::{CommandTrainingPipeline, TrainingError, TrainingPipeline};
