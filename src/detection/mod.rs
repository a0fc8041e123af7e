// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detector invocation and request-scoped working directories

pub mod detector;
pub mod workspace;

pub use detector::{DetectionJob, Detector, DetectorError, YoloDetector};
pub use workspace::RequestWorkspace;
