//! View counter endpoints
//!
//! Slugs may contain slashes (`blog/hello-world`), so they are matched as the
//! rest of the path.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, AppState};
use crate::models::ContentMeta;

const MAX_SLUG_LENGTH: usize = 255;

#[derive(Debug, Serialize, Deserialize)]
pub struct ViewCount {
    pub slug: String,
    pub views: i64,
}

#[derive(Debug, Deserialize)]
pub struct TopQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    10
}

fn checked_slug(slug: String) -> Result<String, ApiError> {
    let trimmed = slug.trim().trim_matches('/');
    if trimmed.is_empty() || trimmed.len() > MAX_SLUG_LENGTH {
        return Err(ApiError::validation_error("Invalid content slug"));
    }
    Ok(trimmed.to_string())
}

/// GET /api/v1/views
pub async fn most_viewed(
    State(state): State<AppState>,
    Query(query): Query<TopQuery>,
) -> Result<Json<Vec<ContentMeta>>, ApiError> {
    let top = state
        .view_service
        .most_viewed(query.limit)
        .await
        .map_err(ApiError::internal)?;
    Ok(Json(top))
}

/// GET /api/v1/views/{slug}
pub async fn get_views(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ViewCount>, ApiError> {
    let slug = checked_slug(slug)?;
    let views = state.view_service.views(&slug).await.map_err(ApiError::internal)?;
    Ok(Json(ViewCount { slug, views }))
}

/// POST /api/v1/views/{slug}
pub async fn record_view(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ViewCount>, ApiError> {
    let slug = checked_slug(slug)?;
    let views = state
        .view_service
        .record_view(&slug)
        .await
        .map_err(ApiError::internal)?;
    Ok(Json(ViewCount { slug, views }))
}
