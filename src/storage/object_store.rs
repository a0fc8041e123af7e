// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::StorageSettings;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Invalid object location: {0}")]
    InvalidLocation(String),
    #[error("Object not found: {0}")]
    NotFound(String),
    #[error("Authentication error: {0}")]
    AuthError(String),
    #[error("Server error: {0}")]
    ServerError(String),
    #[error("Local file error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Remote store holding the shared copy of the model weights
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn is_model_present(&self, bucket: &str, key: &str) -> Result<bool, StorageError>;

    /// Fetch `bucket/key` into `local_path`, replacing any existing file
    async fn download_object(
        &self,
        key: &str,
        bucket: &str,
        local_path: &Path,
    ) -> Result<(), StorageError>;

    async fn upload_object(
        &self,
        local_path: &Path,
        bucket: &str,
        key: &str,
    ) -> Result<(), StorageError>;
}

fn validate_location(bucket: &str, key: &str) -> Result<(), StorageError> {
    if bucket.is_empty() || bucket.contains('/') {
        return Err(StorageError::InvalidLocation(format!(
            "invalid bucket '{}'",
            bucket
        )));
    }

    if key.is_empty() {
        return Err(StorageError::InvalidLocation("Empty key".to_string()));
    }

    if key.split('/').any(|segment| segment == "..") {
        return Err(StorageError::InvalidLocation(
            "Path traversal not allowed".to_string(),
        ));
    }

    Ok(())
}

/// Call counters exposed by [`MemoryObjectStore`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCallStats {
    pub presence_checks: usize,
    pub downloads: usize,
    pub uploads: usize,
}

/// In-process store used when no endpoint is configured, and by tests
#[derive(Debug, Clone, Default)]
pub struct MemoryObjectStore {
    objects: Arc<Mutex<HashMap<(String, String), Vec<u8>>>>,
    injected_error: Arc<Mutex<Option<StorageError>>>,
    stats: Arc<Mutex<StoreCallStats>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, bucket: &str, key: &str, data: Vec<u8>) {
        let mut objects = self.objects.lock().await;
        objects.insert((bucket.to_string(), key.to_string()), data);
    }

    pub async fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        let objects = self.objects.lock().await;
        objects.get(&(bucket.to_string(), key.to_string())).cloned()
    }

    /// Make the next store call fail with `error`
    pub async fn inject_error(&self, error: StorageError) {
        *self.injected_error.lock().await = Some(error);
    }

    pub async fn stats(&self) -> StoreCallStats {
        *self.stats.lock().await
    }

    async fn check_injected_error(&self) -> Result<(), StorageError> {
        match self.injected_error.lock().await.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn is_model_present(&self, bucket: &str, key: &str) -> Result<bool, StorageError> {
        self.stats.lock().await.presence_checks += 1;
        self.check_injected_error().await?;
        validate_location(bucket, key)?;

        let objects = self.objects.lock().await;
        Ok(objects.contains_key(&(bucket.to_string(), key.to_string())))
    }

    async fn download_object(
        &self,
        key: &str,
        bucket: &str,
        local_path: &Path,
    ) -> Result<(), StorageError> {
        self.stats.lock().await.downloads += 1;
        self.check_injected_error().await?;
        validate_location(bucket, key)?;

        let data = self
            .object(bucket, key)
            .await
            .ok_or_else(|| StorageError::NotFound(format!("{}/{}", bucket, key)))?;

        tokio::fs::write(local_path, data)
            .await
            .map_err(|e| StorageError::io(local_path, e))
    }

    async fn upload_object(
        &self,
        local_path: &Path,
        bucket: &str,
        key: &str,
    ) -> Result<(), StorageError> {
        self.stats.lock().await.uploads += 1;
        self.check_injected_error().await?;
        validate_location(bucket, key)?;

        let data = tokio::fs::read(local_path)
            .await
            .map_err(|e| StorageError::io(local_path, e))?;
        self.insert(bucket, key, data).await;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct HttpStoreConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub connect_timeout_seconds: u64,
}

/// Path-style S3-compatible endpoint: objects live at `{endpoint}/{bucket}/{key}`
#[derive(Debug, Clone)]
pub struct HttpObjectStore {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpObjectStore {
    pub fn new(config: HttpStoreConfig) -> Result<Self, StorageError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .build()
            .map_err(|e| StorageError::NetworkError(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key,
        })
    }

    fn object_url(&self, bucket: &str, key: &str) -> Result<String, StorageError> {
        validate_location(bucket, key)?;
        Ok(format!(
            "{}/{}/{}",
            self.endpoint,
            bucket,
            key.trim_start_matches('/')
        ))
    }

    async fn make_request(
        &self,
        method: reqwest::Method,
        url: &str,
        body: Option<Vec<u8>>,
    ) -> Result<reqwest::Response, StorageError> {
        let mut request_builder = self.client.request(method, url);

        if let Some(api_key) = &self.api_key {
            request_builder =
                request_builder.header("Authorization", format!("Bearer {}", api_key));
        }

        if let Some(body) = body {
            request_builder = request_builder.body(body);
        }

        request_builder
            .send()
            .await
            .map_err(|e| StorageError::NetworkError(e.to_string()))
    }

    fn status_error(status: reqwest::StatusCode, what: &str) -> StorageError {
        match status {
            reqwest::StatusCode::NOT_FOUND => StorageError::NotFound(what.to_string()),
            reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
                StorageError::AuthError(format!("{} for {}", status, what))
            }
            _ => StorageError::ServerError(format!("{} for {}", status, what)),
        }
    }

    async fn write_body(
        response: reqwest::Response,
        part_path: &Path,
    ) -> Result<u64, StorageError> {
        let mut file = tokio::fs::File::create(part_path)
            .await
            .map_err(|e| StorageError::io(part_path, e))?;

        let mut written = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| StorageError::NetworkError(e.to_string()))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| StorageError::io(part_path, e))?;
            written += chunk.len() as u64;
        }

        file.flush()
            .await
            .map_err(|e| StorageError::io(part_path, e))?;
        Ok(written)
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn is_model_present(&self, bucket: &str, key: &str) -> Result<bool, StorageError> {
        let url = self.object_url(bucket, key)?;
        let response = self.make_request(reqwest::Method::HEAD, &url, None).await?;

        let status = response.status();
        if status.is_success() {
            Ok(true)
        } else if status == reqwest::StatusCode::NOT_FOUND {
            Ok(false)
        } else {
            Err(Self::status_error(status, &url))
        }
    }

    async fn download_object(
        &self,
        key: &str,
        bucket: &str,
        local_path: &Path,
    ) -> Result<(), StorageError> {
        let url = self.object_url(bucket, key)?;
        let response = self.make_request(reqwest::Method::GET, &url, None).await?;

        if !response.status().is_success() {
            return Err(Self::status_error(response.status(), &url));
        }

        // Stream into a sibling file so an interrupted transfer never
        // leaves a file at the final path.
        let mut part_name = local_path.as_os_str().to_owned();
        part_name.push(".part");
        let part_path = PathBuf::from(part_name);

        match Self::write_body(response, &part_path).await {
            Ok(bytes) => {
                tokio::fs::rename(&part_path, local_path)
                    .await
                    .map_err(|e| StorageError::io(local_path, e))?;
                info!("Downloaded {} ({} bytes) to {}", url, bytes, local_path.display());
                Ok(())
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&part_path).await;
                Err(e)
            }
        }
    }

    async fn upload_object(
        &self,
        local_path: &Path,
        bucket: &str,
        key: &str,
    ) -> Result<(), StorageError> {
        let url = self.object_url(bucket, key)?;
        let data = tokio::fs::read(local_path)
            .await
            .map_err(|e| StorageError::io(local_path, e))?;
        debug!("Uploading {} bytes to {}", data.len(), url);

        let response = self
            .make_request(reqwest::Method::PUT, &url, Some(data))
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::status_error(response.status(), &url))
        }
    }
}

pub struct ObjectStoreClient;

impl ObjectStoreClient {
    /// Build the store selected by the settings
    pub fn create(settings: &StorageSettings) -> Result<Arc<dyn ObjectStore>, StorageError> {
        match &settings.endpoint {
            Some(endpoint) => {
                info!("Using object store at {}", endpoint);
                let store = HttpObjectStore::new(HttpStoreConfig {
                    endpoint: endpoint.clone(),
                    api_key: settings.api_key.clone(),
                    connect_timeout_seconds: settings.connect_timeout_secs,
                })?;
                Ok(Arc::new(store))
            }
            None => {
                info!("No STORAGE_ENDPOINT configured, using in-memory object store");
                Ok(Arc::new(MemoryObjectStore::new()))
            }
        }
    }
}
