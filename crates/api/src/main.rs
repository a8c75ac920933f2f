use anyhow::Result;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use tempo_api::{
    app::{create_app, AppState},
    config::Config,
    jobs::{ExportCleanupJob, JobScheduler},
    middleware,
};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::load()?;

    // Initialize logging and metrics
    middleware::logging::init_logging(&config.logging)?;
    middleware::init_metrics()?;

    info!("Starting Tempo export service v{}", env!("CARGO_PKG_VERSION"));

    // Create database pool
    let pool = persistence::db::create_pool(&config.database.pool_config()).await?;

    // Run migrations
    info!("Running database migrations...");
    persistence::db::run_migrations(&pool).await?;
    info!("Migrations completed");

    let shutdown = CancellationToken::new();
    let addr = config.socket_addr()?;
    let cleanup_interval = config.export.cleanup_interval_minutes;

    let state = AppState::new(config, pool, shutdown.clone());
    state.artifacts.ensure_dir().await?;
    info!(dir = %state.artifacts.dir().display(), "Export artifact directory ready");

    // Background jobs
    let mut scheduler = JobScheduler::new();
    scheduler.register(ExportCleanupJob::new(
        state.garbage_collector(),
        cleanup_interval,
    ));
    scheduler.start();

    let exports = state.exports.clone();

    // Build application
    let app = create_app(state);

    // Start server
    info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    // In-flight export jobs observe the token and record their cancellation.
    shutdown.cancel();
    if !exports.drain(SHUTDOWN_GRACE).await {
        warn!("Export jobs still running after {:?}", SHUTDOWN_GRACE);
    }
    scheduler.shutdown();
    scheduler.wait_for_shutdown(SHUTDOWN_GRACE).await;
    info!("Shutdown complete");

    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM, or when the token is cancelled elsewhere.
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
        _ = token.cancelled() => {}
    }
}
