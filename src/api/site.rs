//! Site-wide endpoints
//!
//! - GET /feed.xml - RSS 2.0 feed of recent posts
//! - GET /api/v1/site/info - Public site title and description
//! - GET /api/v1/health - Liveness with a database ping

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;

use crate::api::middleware::{ApiError, AppState};

#[derive(Debug, Serialize)]
pub struct SiteInfoResponse {
    pub version: String,
    pub title: String,
    pub description: String,
    pub base_url: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
    pub version: &'static str,
}

/// GET /feed.xml
pub async fn rss_feed(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let xml = state.feed_service.rss().await?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/rss+xml; charset=utf-8"),
            (header::CACHE_CONTROL, "public, max-age=600"),
        ],
        xml,
    ))
}

/// GET /api/v1/site/info
pub async fn site_info(State(state): State<AppState>) -> Json<SiteInfoResponse> {
    Json(SiteInfoResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        title: state.config.site.title.clone(),
        description: state.config.site.description.clone(),
        base_url: state.config.server.base_url.clone(),
    })
}

/// GET /api/v1/health
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let (status, database, code) = match state.pool.ping().await {
        Ok(()) => ("ok", "ok", StatusCode::OK),
        Err(e) => {
            tracing::error!("Health check failed: {:#}", e);
            ("degraded", "unreachable", StatusCode::SERVICE_UNAVAILABLE)
        }
    };
    (
        code,
        Json(HealthResponse {
            status,
            database,
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}
