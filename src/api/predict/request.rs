// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Predict request parsing and image transport encoding

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::Value;

use crate::api::errors::ApiError;

pub const IMAGE_FIELD: &str = "image";

/// Pull the base64 `image` string out of a JSON request body
pub fn extract_image_field(body: &[u8]) -> Result<String, ApiError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| ApiError::InvalidPayload(format!("request body is not valid JSON: {}", e)))?;

    let object = value.as_object().ok_or_else(|| {
        ApiError::InvalidKey("request body must be a JSON object".to_string())
    })?;

    match object.get(IMAGE_FIELD) {
        None => Err(ApiError::MissingImageField),
        Some(Value::String(image)) => Ok(image.clone()),
        Some(_) => Err(ApiError::InvalidKey(format!(
            "`{}` must be a base64 string",
            IMAGE_FIELD
        ))),
    }
}

/// Decode a base64 image payload; ASCII whitespace is ignored
pub fn decode_image(encoded: &str) -> Result<Vec<u8>, ApiError> {
    let compact: String = encoded
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();

    let bytes = STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| ApiError::InvalidPayload(format!("invalid base64 image data: {}", e)))?;

    if bytes.is_empty() {
        return Err(ApiError::InvalidPayload("image data is empty".to_string()));
    }

    Ok(bytes)
}

pub fn encode_image(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}
