//! SeeSay Server - HTTP API for visual question answering with spoken answers

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod error;
mod settings;
mod state;

use seesay_core::VqaService;
use settings::Settings;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    "seesay_server=debug,seesay_core=debug,tower_http=debug".into()
                }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting SeeSay Server");

    let settings = Settings::load()?;
    info!("Model: {}", settings.engine.model_id);
    info!("Static files: {:?}", settings.engine.static_dir);

    // Model download and daemon startup block; keep them off the runtime threads
    let engine_config = settings.engine.clone();
    let service =
        tokio::task::spawn_blocking(move || VqaService::from_config(&engine_config)).await??;
    let state = AppState::new(service);

    // The daemon is stopped whether or not serving succeeded
    let served = serve(state.clone(), &settings).await;

    info!("Shutting down model daemon");
    let service = state.service.clone();
    if let Err(e) = tokio::task::spawn_blocking(move || service.shutdown()).await? {
        warn!("Model shutdown failed: {}", e);
    }

    served
}

async fn serve(state: AppState, settings: &Settings) -> anyhow::Result<()> {
    let app = api::create_router(state, &settings.server, &settings.engine.static_dir);

    let addr = settings.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
}
