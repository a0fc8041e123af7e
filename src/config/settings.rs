// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Process-level configuration for the detection node
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! environment variables. Paths are fixed for the lifetime of the process.

use serde::{Deserialize, Serialize};
use std::env;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Maximum accepted request body (base64 images are ~4/3 of the raw size)
const DEFAULT_MAX_REQUEST_BYTES: usize = 20 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerSettings {
    pub listen_addr: String,
    pub max_request_bytes: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
        }
    }
}

/// Local filesystem layout
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PathSettings {
    /// Root for per-request workspaces
    pub data_dir: PathBuf,
    /// Directory of the external detection framework
    pub detector_dir: PathBuf,
    /// Weights file name inside `detector_dir`
    pub weights_file: String,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            detector_dir: PathBuf::from("yolov7"),
            weights_file: "best.pt".to_string(),
        }
    }
}

/// Remote object store holding the shared copy of the model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageSettings {
    /// Base URL of an S3-compatible endpoint. `None` selects the in-memory store.
    pub endpoint: Option<String>,
    pub bucket: String,
    pub model_key: String,
    pub api_key: Option<String>,
    /// Bounds connection setup only; transfers themselves are not time-limited
    pub connect_timeout_secs: u64,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            bucket: "detection-models".to_string(),
            model_key: "best.pt".to_string(),
            api_key: None,
            connect_timeout_secs: 30,
        }
    }
}

/// External detector invocation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DetectorSettings {
    pub program: String,
    pub script: String,
    pub extra_args: Vec<String>,
    /// Name of the run directory the detector creates under its project dir
    pub run_name: String,
    /// File name the uploaded image is stored under
    pub input_file_name: String,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            program: "python".to_string(),
            script: "detect.py".to_string(),
            extra_args: Vec::new(),
            run_name: "exp".to_string(),
            input_file_name: "inputImage.jpg".to_string(),
        }
    }
}

/// External training pipeline invocation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrainingSettings {
    pub program: String,
    pub args: Vec<String>,
    /// Defaults to the detector directory when unset
    pub working_dir: Option<PathBuf>,
    /// Upload the trained weights to the object store after a successful run
    pub push_after_training: bool,
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            program: "python".to_string(),
            args: vec!["train.py".to_string()],
            working_dir: None,
            push_after_training: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSettings,
    pub paths: PathSettings,
    pub storage: StorageSettings,
    pub detector: DetectorSettings,
    pub training: TrainingSettings,
}

impl AppConfig {
    /// Load defaults, the optional TOML file and then environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("LISTEN_ADDR") {
            self.server.listen_addr = v;
        }
        if let Some(v) = lookup("MAX_REQUEST_BYTES").and_then(|v| v.parse().ok()) {
            self.server.max_request_bytes = v;
        }

        if let Some(v) = lookup("DATA_DIR") {
            self.paths.data_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("DETECTOR_DIR") {
            self.paths.detector_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("WEIGHTS_FILE") {
            self.paths.weights_file = v;
        }

        if let Some(v) = lookup("STORAGE_ENDPOINT") {
            self.storage.endpoint = if v.trim().is_empty() { None } else { Some(v) };
        }
        if let Some(v) = lookup("MODEL_BUCKET_NAME") {
            self.storage.bucket = v;
        }
        if let Some(v) = lookup("S3_MODEL_KEY_PATH") {
            self.storage.model_key = v;
        }
        if let Some(v) = lookup("STORAGE_API_KEY") {
            self.storage.api_key = Some(v);
        }
        if let Some(v) = lookup("STORAGE_CONNECT_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.storage.connect_timeout_secs = v;
        }

        if let Some(v) = lookup("DETECTOR_PROGRAM") {
            self.detector.program = v;
        }
        if let Some(v) = lookup("DETECTOR_SCRIPT") {
            self.detector.script = v;
        }
        if let Some(v) = lookup("DETECTOR_EXTRA_ARGS") {
            self.detector.extra_args = split_args(&v);
        }
        if let Some(v) = lookup("DETECTOR_RUN_NAME") {
            self.detector.run_name = v;
        }

        if let Some(v) = lookup("TRAINING_PROGRAM") {
            self.training.program = v;
        }
        if let Some(v) = lookup("TRAINING_ARGS") {
            self.training.args = split_args(&v);
        }
        if let Some(v) = lookup("TRAINING_WORKING_DIR") {
            self.training.working_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("PUSH_MODEL_AFTER_TRAINING") {
            self.training.push_after_training = v.to_lowercase() == "true" || v == "1";
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server
            .listen_addr
            .parse::<SocketAddr>()
            .map_err(|e| {
                ConfigError::Invalid(format!(
                    "listen_addr '{}' is not a socket address: {}",
                    self.server.listen_addr, e
                ))
            })?;

        if self.server.max_request_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_request_bytes must be greater than 0".to_string(),
            ));
        }

        let required = [
            ("paths.weights_file", &self.paths.weights_file),
            ("storage.bucket", &self.storage.bucket),
            ("storage.model_key", &self.storage.model_key),
            ("detector.program", &self.detector.program),
            ("detector.run_name", &self.detector.run_name),
            ("detector.input_file_name", &self.detector.input_file_name),
            ("training.program", &self.training.program),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{} must not be empty", name)));
            }
        }

        Ok(())
    }

    /// Local path of the model weights
    pub fn model_path(&self) -> PathBuf {
        self.paths.detector_dir.join(&self.paths.weights_file)
    }

    pub fn training_working_dir(&self) -> PathBuf {
        self.training
            .working_dir
            .clone()
            .unwrap_or_else(|| self.paths.detector_dir.clone())
    }
}

fn split_args(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(str::to_string).collect()
}
