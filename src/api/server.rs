//! formreview API server implementation
//!
//! HTTP REST API server using Axum. Serves template CRUD, spreadsheet import
//! and preview, and the org catalog.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use super::{error, handlers};
use crate::config::AppConfig;
use crate::service::TemplateService;

/// Room for multipart framing and the text fields around the file.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Shared application state
pub struct AppState {
    pub version: String,
    pub service: TemplateService,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(service: TemplateService) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            service,
            started_at: Instant::now(),
        }
    }
}

/// Build the router. Request bodies are capped at `max_upload_bytes` plus
/// multipart overhead; the exact file-size check happens in the service.
pub fn build_router(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health and info endpoints
        .route("/health", get(handlers::health))
        .route("/version", get(handlers::version))
        // Templates
        .route(
            "/api/templates",
            get(handlers::list_templates).post(handlers::upsert_template),
        )
        .route("/api/templates/bulk", post(handlers::bulk_upsert))
        .route("/api/templates/import", post(handlers::import_one))
        .route("/api/templates/import-bulk", post(handlers::import_bulk))
        .route("/api/templates/preview", post(handlers::preview))
        .route(
            "/api/templates/:key",
            get(handlers::get_template).delete(handlers::remove_template),
        )
        // Org catalog
        .route("/api/org", get(handlers::org_catalog))
        .route("/api/org/combinations", get(handlers::org_combinations))
        .fallback(error::not_found)
        .with_state(state)
        .layer(DefaultBodyLimit::max(
            max_upload_bytes.saturating_add(MULTIPART_OVERHEAD),
        ))
        .layer(middleware::from_fn(error::request_id))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Run the API server
pub async fn run_api_server(config: AppConfig) -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "formreview=info,tower_http=info".into()),
        )
        .init();

    let service = config.build_service()?;
    let storage = service.backend();
    let state = Arc::new(AppState::new(service));
    let app = build_router(state, config.max_upload_bytes);

    let addr: SocketAddr = config.address().parse()?;
    info!("📋 formreview API server starting on http://{}", addr);
    info!(
        "   Storage: {}, input policy: {}, upload limit: {} bytes",
        storage, config.ingest.input_policy, config.max_upload_bytes
    );
    info!("   Endpoints: /api/templates, /api/templates/import, /api/templates/import-bulk, /api/org");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("formreview API server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
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
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, stopping server...");
}
