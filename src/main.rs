//! Attention Engine Service
//!
//! HTTP service scoring face presence, gaze centering and head orientation
//! from camera frames, with OpenVINO acceleration.

use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use attention_engine::config::Config;
use attention_engine::engine::ModelPool;
use attention_engine::service::AttentionService;
use attention_engine::api::rest::{AppState, create_rest_router};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    info!("Starting Attention Engine Service v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Config::load(Config::default_path()).unwrap_or_else(|e| {
        info!("Using default config ({})", e);
        Config::default()
    });

    let port = config.resolve_port();

    info!("Configuration loaded:");
    info!("  Port: {}", port);
    info!("  Device: {}", config.inference.device);
    info!("  Model idle timeout: {}s", config.inference.model_idle_timeout);
    info!("  Min detection confidence: {}", config.attention.min_detection_confidence);

    // Initialize model pool
    let pool = Arc::new(ModelPool::new(
        &config.inference,
        config.models.detector.to_str().unwrap(),
        config.models.landmarker.to_str().unwrap(),
    )?);

    // Start model cleanup task
    let pool_clone = pool.clone();
    tokio::spawn(async move {
        pool_clone.start_cleanup_task().await;
    });

    // Create attention service
    let service = Arc::new(AttentionService::new(pool.clone(), &config));

    // Create REST app state and router
    let app_state = Arc::new(AppState::new(service));
    let router = create_rest_router(app_state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;

    info!("Attention Engine Service is ready!");
    info!("REST: http://localhost:{}/health", port);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received, cleaning up...");
        })
        .await?;

    // Shutdown model pool
    pool.shutdown();

    info!("Goodbye!");
    Ok(())
}
