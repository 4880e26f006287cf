//! HTTP server setup and routing
//!
//! Default bind address: http://127.0.0.1:5050

use crate::analysis::ResultStore;
use crate::error::{Error, Result};
use crate::persistence::FeatureLog;
use crate::playback::session::Session;
use axum::{
    routing::{get, post},
    Router,
};
use mirstream_common::EventBus;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Notify;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub session: Arc<Session>,
    pub store: Arc<ResultStore>,
    pub feature_log: Arc<FeatureLog>,
    pub events: Arc<EventBus>,
    /// Notified by `POST /shutdown` to stop the server
    pub shutdown: Arc<Notify>,
}

impl AppContext {
    pub fn new(session: Arc<Session>, feature_log: Arc<FeatureLog>, events: Arc<EventBus>) -> Self {
        Self {
            store: session.store(),
            session,
            feature_log,
            events,
            shutdown: Arc::new(Notify::new()),
        }
    }
}

/// Build the router with all routes
pub fn create_router(ctx: AppContext) -> Router {
    Router::new()
        // Feature queries
        .route("/get_features/:index", get(super::handlers::get_features))
        .route("/get_zcr/:index", get(super::handlers::get_zcr))
        .route("/get_dom_freq/:index", get(super::handlers::get_dominant_frequency))
        // Lifecycle
        .route("/shutdown", post(super::handlers::shutdown))
        .route("/status", get(super::handlers::status))
        .route("/health", get(super::handlers::health))
        // SSE event stream
        .route("/events", get(super::sse::event_stream))
        .with_state(ctx)
        .layer(TraceLayer::new_for_http())
        // Enable CORS for local access
        .layer(CorsLayer::permissive())
}

/// Run the HTTP server until `POST /shutdown`, SIGINT or SIGTERM
pub async fn run(ctx: AppContext, addr: SocketAddr) -> Result<()> {
    let shutdown = Arc::clone(&ctx.shutdown);
    let app = create_router(ctx);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Http(format!("Failed to bind to {}: {}", addr, e)))?;
    info!("HTTP server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .map_err(|e| Error::Http(format!("Server error: {}", e)))?;

    info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal(shutdown: Arc<Notify>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
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
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
        _ = shutdown.notified() => info!("Shutdown requested over HTTP"),
    }
}
