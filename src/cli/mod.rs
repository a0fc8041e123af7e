// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use clap::Parser;
use std::path::PathBuf;

use crate::config::AppConfig;

/// Detection node: object detection over HTTP backed by an external detector
#[derive(Parser, Debug)]
#[command(name = "detection-node")]
#[command(version = crate::version::VERSION_NUMBER)]
#[command(about = "Serve object detection and training over HTTP", long_about = None)]
pub struct Args {
    /// Optional TOML configuration file
    #[arg(long, env = "DETECTION_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address to listen on (overrides config and LISTEN_ADDR)
    #[arg(long)]
    pub listen_addr: Option<String>,

    /// Directory of the external detection framework
    #[arg(long)]
    pub detector_dir: Option<PathBuf>,

    /// Root directory for per-request workspaces
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

impl Args {
    /// Apply command-line overrides on top of the loaded configuration
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(addr) = &self.listen_addr {
            config.server.listen_addr = addr.clone();
        }
        if let Some(dir) = &self.detector_dir {
            config.paths.detector_dir = dir.clone();
        }
        if let Some(dir) = &self.data_dir {
            config.paths.data_dir = dir.clone();
        }
    }
}
