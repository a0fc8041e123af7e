// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Per-request working directories
//!
//! Every predict request gets `<data-dir>/requests/<uuid>/` holding its
//! input image and the detector's `runs/` output. Nothing in it outlives
//! the request: a workspace dropped before `cleanup` ran (for example
//! when the client disconnects mid-request) removes itself on drop.

use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;
use uuid::Uuid;

const REQUESTS_DIR: &str = "requests";
const RUNS_DIR: &str = "runs";

#[derive(Debug)]
pub struct RequestWorkspace {
    id: Uuid,
    root: PathBuf,
    removed: bool,
}

impl RequestWorkspace {
    /// Create a fresh workspace under `data_dir`, creating `data_dir` if needed
    pub async fn create(data_dir: &Path) -> io::Result<Self> {
        let id = Uuid::new_v4();
        let root = data_dir.join(REQUESTS_DIR).join(id.to_string());
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self {
            id,
            root,
            removed: false,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn input_path(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }

    /// Project directory handed to the detector
    pub fn runs_dir(&self) -> PathBuf {
        self.root.join(RUNS_DIR)
    }

    /// Remove the workspace and everything the detector wrote into it
    pub async fn cleanup(mut self) {
        let result = tokio::fs::remove_dir_all(&self.root).await;
        report_removal(&self.root, result);
        self.removed = true;
    }
}

impl Drop for RequestWorkspace {
    fn drop(&mut self) {
        if !self.removed {
            report_removal(&self.root, std::fs::remove_dir_all(&self.root));
        }
    }
}

fn report_removal(root: &Path, result: io::Result<()>) {
    match result {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(
            "Failed to remove request workspace {}: {}",
            root.display(),
            e
        ),
    }
}
