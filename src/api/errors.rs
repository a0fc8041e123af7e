// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use std::fmt;
use uuid::Uuid;

/// Errors surfaced to HTTP clients. The `Display` text is the response body.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    /// Request body has no `image` key
    MissingImageField,
    /// Body or image payload could not be decoded
    InvalidPayload(String),
    /// Body is structurally wrong: not an object, or `image` is not a string
    InvalidKey(String),
    /// Decoded image is not on disk after writing it
    ImageNotSaved,
    PredictionFailed(String),
    TrainingFailed(String),
    TrainingInProgress(Uuid),
    NotFound(String),
    InternalError(String),
}

impl ApiError {
    pub fn error_type(&self) -> &'static str {
        match self {
            ApiError::MissingImageField => "missing_image_field",
            ApiError::InvalidPayload(_) => "value_error",
            ApiError::InvalidKey(_) => "key_error",
            ApiError::ImageNotSaved => "image_not_saved",
            ApiError::PredictionFailed(_) => "prediction_failed",
            ApiError::TrainingFailed(_) => "training_failed",
            ApiError::TrainingInProgress(_) => "training_in_progress",
            ApiError::NotFound(_) => "not_found",
            ApiError::InternalError(_) => "internal_error",
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::MissingImageField
            | ApiError::InvalidPayload(_)
            | ApiError::InvalidKey(_)
            | ApiError::ImageNotSaved => 400,
            ApiError::NotFound(_) => 404,
            ApiError::TrainingInProgress(_) => 409,
            ApiError::PredictionFailed(_)
            | ApiError::TrainingFailed(_)
            | ApiError::InternalError(_) => 500,
        }
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::MissingImageField => write!(f, "No image file found in the request."),
            ApiError::InvalidPayload(msg) => write!(f, "Value error: {}", msg),
            ApiError::InvalidKey(msg) => {
                write!(f, "Key value error: incorrect key passed: {}", msg)
            }
            ApiError::ImageNotSaved => write!(f, "Failed to save the image"),
            ApiError::PredictionFailed(msg) => {
                write!(f, "An error occurred during prediction: {}", msg)
            }
            ApiError::TrainingFailed(msg) => write!(f, "Error during training: {}", msg),
            ApiError::TrainingInProgress(job_id) => {
                write!(f, "Training job {} is already running", job_id)
            }
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}
