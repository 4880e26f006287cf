//! HTTP request handlers

use crate::api::server::AppContext;
use crate::playback::session::SessionStats;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use mirstream_common::api::types::{
    DominantFrequencyResponse, ErrorResponse, FeatureRecord, MessageResponse, ZcrResponse,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

type ApiError = (StatusCode, Json<ErrorResponse>);

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
    git_hash: String,
    build_timestamp: String,
    build_profile: String,
}

fn not_available(index: i64) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse::new(format!(
            "Index {} is out of range or no features available",
            index
        ))),
    )
}

// ============================================================================
// Feature Queries
// ============================================================================

/// GET /get_features/:index
///
/// Served records are also appended to the feature log.
pub async fn get_features(
    State(ctx): State<AppContext>,
    Path(index): Path<i64>,
) -> Result<Json<FeatureRecord>, ApiError> {
    let record = ctx.store.get(index).ok_or_else(|| not_available(index))?;

    if let Err(e) = ctx.feature_log.append(record).await {
        warn!("Failed to log features for index {}: {}", index, e);
    }

    Ok(Json(record))
}

/// GET /get_zcr/:index
pub async fn get_zcr(
    State(ctx): State<AppContext>,
    Path(index): Path<i64>,
) -> Result<Json<ZcrResponse>, ApiError> {
    let record = ctx.store.get(index).ok_or_else(|| not_available(index))?;
    Ok(Json(ZcrResponse {
        index: record.index,
        zcr: record.zcr,
    }))
}

/// GET /get_dom_freq/:index
pub async fn get_dominant_frequency(
    State(ctx): State<AppContext>,
    Path(index): Path<i64>,
) -> Result<Json<DominantFrequencyResponse>, ApiError> {
    let record = ctx.store.get(index).ok_or_else(|| not_available(index))?;
    Ok(Json(DominantFrequencyResponse {
        index: record.index,
        dominant_frequency: record.dominant_frequency,
    }))
}

// ============================================================================
// Lifecycle
// ============================================================================

/// POST /shutdown
///
/// Stops and tears down the session, then stops the HTTP server.
pub async fn shutdown(
    State(ctx): State<AppContext>,
) -> Result<Json<MessageResponse>, ApiError> {
    info!("Shutdown requested");

    let session = Arc::clone(&ctx.session);
    let result = tokio::task::spawn_blocking(move || session.shutdown()).await;

    // Stop the server whatever happened to the session
    ctx.shutdown.notify_one();

    match result {
        Ok(Ok(())) => Ok(Json(MessageResponse {
            message: "Shutting down...".to_string(),
        })),
        Ok(Err(e)) => {
            error!("Session shutdown failed: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(e.to_string())),
            ))
        }
        Err(e) => {
            error!("Session shutdown task failed: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(format!("Shutdown task failed: {}", e))),
            ))
        }
    }
}

/// GET /status
pub async fn status(State(ctx): State<AppContext>) -> Json<SessionStats> {
    Json(ctx.session.stats())
}

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "mirstream-ap".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: env!("GIT_HASH").to_string(),
        build_timestamp: env!("BUILD_TIMESTAMP").to_string(),
        build_profile: env!("BUILD_PROFILE").to_string(),
    })
}
