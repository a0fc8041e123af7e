// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Version information for the detection node

/// Semantic version number
pub const VERSION_NUMBER: &str = "0.1.0";

/// Build date
pub const BUILD_DATE: &str = "2026-10-19";

/// Get formatted version string for logging
pub fn get_version_string() -> String {
    format!("Detection Node {} ({})", VERSION_NUMBER, BUILD_DATE)
}
