//! Short URL management endpoints (admin)
//!
//! - GET|POST /api/v1/short-urls
//! - GET|PUT|DELETE /api/v1/short-urls/{id}
//! - GET /api/v1/og?url= - Preview a destination's Open Graph tags

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;

use crate::api::common::{ListResponse, PaginationQuery};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{CreateShortUrlInput, OgMetadata, ShortUrl, UpdateShortUrlInput};

#[derive(Debug, Deserialize)]
pub struct OgQuery {
    pub url: String,
}

/// GET /api/v1/short-urls
pub async fn list_short_urls(
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<ListResponse<ShortUrl>>, ApiError> {
    let page = state.short_url_service.list(&query.into()).await?;
    Ok(Json(page.into()))
}

/// POST /api/v1/short-urls
pub async fn create_short_url(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(body): Json<CreateShortUrlInput>,
) -> Result<(StatusCode, Json<ShortUrl>), ApiError> {
    let link = state.short_url_service.create(body, Some(user.0.sub)).await?;
    Ok((StatusCode::CREATED, Json(link)))
}

/// GET /api/v1/short-urls/{id}
pub async fn get_short_url(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ShortUrl>, ApiError> {
    Ok(Json(state.short_url_service.get(id).await?))
}

/// PUT /api/v1/short-urls/{id}
pub async fn update_short_url(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateShortUrlInput>,
) -> Result<Json<ShortUrl>, ApiError> {
    Ok(Json(state.short_url_service.update(id, body).await?))
}

/// DELETE /api/v1/short-urls/{id}
pub async fn delete_short_url(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.short_url_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/og?url=
pub async fn preview_og(
    State(state): State<AppState>,
    Query(query): Query<OgQuery>,
) -> Result<Json<OgMetadata>, ApiError> {
    let url = query.url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ApiError::validation_error("url must be an absolute http(s) URL"));
    }
    let metadata = state.og_fetcher.fetch(url).await.map_err(|e| {
        tracing::warn!("Open Graph preview failed for {}: {:#}", url, e);
        ApiError::bad_request("Could not fetch a preview for that URL")
    })?;
    Ok(Json(metadata))
}
