use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use domain::services::{ExportAuditStore, ExportMailer};
use persistence::repositories::{ActivityRecordRepository, ExportAuditRepository};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::middleware::{metrics_handler, metrics_middleware, trace_id};
use crate::routes::{exports, health};
use crate::services::{
    ArtifactStore, EmailService, ExportCoordinator, ExportGarbageCollector, ExportSettings,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub exports: ExportCoordinator,
    pub audit: Arc<dyn ExportAuditStore>,
    pub artifacts: ArtifactStore,
}

impl AppState {
    /// Wires the Postgres repositories and the configured mailer into the
    /// export pipeline. `shutdown` cancels in-flight jobs.
    pub fn new(config: Config, pool: PgPool, shutdown: CancellationToken) -> Self {
        let records = Arc::new(ActivityRecordRepository::new(pool.clone()));
        let audit: Arc<dyn ExportAuditStore> = Arc::new(ExportAuditRepository::new(pool.clone()));
        let mailer: Arc<dyn ExportMailer> = Arc::new(EmailService::new(config.email.clone()));
        let artifacts = ArtifactStore::new(config.export.artifact_path());

        let exports = ExportCoordinator::new(
            records,
            audit.clone(),
            mailer,
            artifacts.clone(),
            ExportSettings::from_config(&config),
            shutdown,
        );

        Self {
            pool,
            config: Arc::new(config),
            exports,
            audit,
            artifacts,
        }
    }

    /// Garbage collector over the same audit store and artifact directory.
    pub fn garbage_collector(&self) -> ExportGarbageCollector {
        ExportGarbageCollector::new(self.audit.clone(), self.artifacts.clone())
    }
}

pub fn create_app(state: AppState) -> Router {
    let request_timeout = Duration::from_secs(state.config.server.request_timeout_secs);

    let export_routes = Router::new()
        .route("/api/v1/exports", post(exports::create_export))
        .route(
            "/api/v1/users/:user_id/exports",
            get(exports::list_user_exports),
        )
        .route(
            "/exports/download/:file_name",
            get(exports::download_export),
        );

    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/ready", get(health::ready))
        .route("/api/health/live", get(health::live))
        .route("/metrics", get(metrics_handler));

    Router::new()
        .merge(public_routes)
        .merge(export_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
