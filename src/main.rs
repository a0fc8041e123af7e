// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use clap::Parser;
use detection_node::{
    api::{start_server, AppState, DetectionRequestHandler},
    cli::Args,
    config::AppConfig,
    detection::YoloDetector,
    models::{CommandTrainingPipeline, ModelLocation, ModelResolver, TrainingJobManager},
    process::{ProcessRunner, TokioProcessRunner},
    storage::ObjectStoreClient,
    version,
};
use std::{env, net::SocketAddr, sync::Arc};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize tracing subscriber for logging
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    info!("Starting {}", version::get_version_string());

    let args = Args::parse();
    let mut config = AppConfig::load(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate()?;

    let addr: SocketAddr = config
        .server
        .listen_addr
        .parse()
        .context("invalid listen address")?;

    let runner: Arc<dyn ProcessRunner> = Arc::new(TokioProcessRunner);
    let store = ObjectStoreClient::create(&config.storage)?;
    let pipeline = Arc::new(CommandTrainingPipeline::new(
        &config.training.program,
        &config.training.args,
        config.training_working_dir(),
        Arc::clone(&runner),
    ));

    let resolver = Arc::new(
        ModelResolver::new(ModelLocation::from_config(&config), store, pipeline)
            .with_push_after_training(config.training.push_after_training),
    );

    // The server only starts once a model is in place
    let model = match resolver.ensure_model_available().await {
        Ok(model) => model,
        Err(e) => {
            error!("Model unavailable, aborting startup: {}", e);
            std::process::exit(1);
        }
    };
    info!(
        "Model ready at {} ({:?}, {} bytes)",
        model.local_path.display(),
        model.source,
        model.size_bytes
    );

    let detector = Arc::new(YoloDetector::new(
        config.detector.clone(),
        config.paths.detector_dir.clone(),
        Arc::clone(&runner),
    ));
    let predict =
        DetectionRequestHandler::from_config(&config, model.local_path.clone(), detector);
    let training = Arc::new(TrainingJobManager::new(resolver, model));

    let state = AppState::new(predict, training, config.server.max_request_bytes);
    start_server(state, addr).await?;

    info!("Goodbye!");
    Ok(())
}
