//! Gallery API endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::api::common::{default_page, default_per_page, ListResponse};
use crate::api::middleware::{ApiError, AppState};
use crate::models::{CreateGalleryItemInput, GalleryItem, ListParams, UpdateGalleryItemInput};

#[derive(Debug, Deserialize)]
pub struct GalleryListQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    pub category: Option<String>,
}

/// GET /api/v1/gallery
pub async fn list_items(
    State(state): State<AppState>,
    Query(query): Query<GalleryListQuery>,
) -> Result<Json<ListResponse<GalleryItem>>, ApiError> {
    let params = ListParams::new(query.page, query.per_page);
    let page = state
        .gallery_service
        .list(query.category.as_deref(), &params)
        .await?;
    Ok(Json(page.into()))
}

/// GET /api/v1/gallery/categories
pub async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.gallery_service.categories().await?))
}

/// GET /api/v1/gallery/{id}
pub async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<GalleryItem>, ApiError> {
    Ok(Json(state.gallery_service.get(id).await?))
}

/// POST /api/v1/gallery
pub async fn create_item(
    State(state): State<AppState>,
    Json(body): Json<CreateGalleryItemInput>,
) -> Result<(StatusCode, Json<GalleryItem>), ApiError> {
    let item = state.gallery_service.create(body).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// PUT /api/v1/gallery/{id}
pub async fn update_item(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateGalleryItemInput>,
) -> Result<Json<GalleryItem>, ApiError> {
    Ok(Json(state.gallery_service.update(id, body).await?))
}

/// DELETE /api/v1/gallery/{id}
pub async fn delete_item(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.gallery_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
