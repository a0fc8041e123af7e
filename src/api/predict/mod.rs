// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Predict API endpoint module
//!
//! Provides POST /predict for running the external detector on an image.

pub mod handler;
pub mod request;
pub mod response;

pub use handler::{predict_handler, DetectionRequestHandler};
pub use request::{decode_image, encode_image, extract_image_field};
pub use response::PredictResponse;
