use std::env;
use std::path::PathBuf;
use tokio::sync::watch;

use alert_triage::classifier::ModelBundle;
use alert_triage::config::Config;
use alert_triage::engine::TriageEngine;
use alert_triage::server::{create_router, AppState};

/// HTTP entry point for the alert triage service
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    log::info!("Starting triage server...");

    let config_path = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));
    let config = Config::load_or_default(&config_path)?;

    // The model is loaded once; a missing or broken artifact stops start-up
    let bundle = ModelBundle::from_file(&config.model.path)?;
    let engine = TriageEngine::new(bundle, config.report);
    let app = create_router(AppState::new(engine), &config.server);

    // Setup graceful shutdown signal handling
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal, gracefully stopping...");
        let _ = shutdown_tx.send(true);
    })?;

    let listener = tokio::net::TcpListener::bind(&config.server.bind_address).await?;
    log::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.wait_for(|stop| *stop).await;
        })
        .await?;

    log::info!("Triage server stopped");
    Ok(())
}
