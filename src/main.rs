use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use ocr_dispatch::{
    app_state::AppState,
    config::AppConfig,
    routes,
    services::{
        engine::{self, EngineFactory, RecognitionEngine},
        ocr::WorkersAiEngine,
        worker_pool::{WorkerPool, WorkerPoolConfig},
    },
};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing OCR dispatch server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);
    routes::metrics::describe();

    // Engines are built on the worker threads themselves.
    let account_id = config.cf_account_id.clone().unwrap_or_default();
    let api_token = config.cf_api_token.clone().unwrap_or_default();
    let factory: EngineFactory = Arc::new(move |_worker: usize| {
        WorkersAiEngine::new(&account_id, &api_token)
            .map(|engine| Box::new(engine) as Box<dyn RecognitionEngine>)
    });
    let factory = engine::with_sharing(factory, config.engine_sharing);

    tracing::info!(
        workers = config.worker_count,
        sharing = %config.engine_sharing,
        "Starting recognition worker pool"
    );
    let pool = WorkerPool::new(
        WorkerPoolConfig {
            workers: config.worker_count,
            artificial_delay: config.artificial_delay(),
        },
        factory,
    )
    .expect("Failed to start worker pool");
    let pool = Arc::new(pool);

    let state = AppState::new(Arc::clone(&pool));
    let app = routes::router(state, prometheus_handle, config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // Joining workers blocks; keep it off the async executor.
    let drained = tokio::task::spawn_blocking(move || pool.shutdown()).await;
    if let Err(e) = drained {
        tracing::error!(error = %e, "Worker pool shutdown did not complete cleanly");
    }

    tracing::info!("Server stopped");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
