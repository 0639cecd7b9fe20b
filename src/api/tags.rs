//! Tag API endpoints
//!
//! - GET /api/v1/tags - Tags with published post counts
//! - GET /api/v1/tags/{slug}/blogs - Published posts under a tag
//! - POST /api/v1/tags, DELETE /api/v1/tags/{id} - Admin

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::api::common::{ListResponse, PaginationQuery};
use crate::api::middleware::{ApiError, AppState};
use crate::models::{ListParams, Tag, TagWithCount};
use crate::services::BlogView;

#[derive(Debug, Deserialize)]
pub struct CreateTagRequest {
    pub name: String,
}

/// A tag and one page of its posts
#[derive(Debug, Serialize)]
pub struct TagBlogsResponse {
    pub tag: Tag,
    #[serde(flatten)]
    pub blogs: ListResponse<BlogView>,
}

/// GET /api/v1/tags
pub async fn list_tags(State(state): State<AppState>) -> Result<Json<Vec<TagWithCount>>, ApiError> {
    Ok(Json(state.tag_service.list_with_counts().await?))
}

/// GET /api/v1/tags/{slug}/blogs
pub async fn list_tag_blogs(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<TagBlogsResponse>, ApiError> {
    let params: ListParams = query.into();
    let (tag, page) = state.blog_service.list_by_tag(&slug, &params).await?;
    Ok(Json(TagBlogsResponse {
        tag,
        blogs: page.into(),
    }))
}

/// POST /api/v1/tags
pub async fn create_tag(
    State(state): State<AppState>,
    Json(body): Json<CreateTagRequest>,
) -> Result<(StatusCode, Json<Tag>), ApiError> {
    let tag = state.tag_service.create(&body.name).await?;
    Ok((StatusCode::CREATED, Json(tag)))
}

/// DELETE /api/v1/tags/{id}
pub async fn delete_tag(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.tag_service.delete(id).await?;
    // Cached post listings embed tag lists
    state.blog_service.invalidate().await;
    Ok(StatusCode::NO_CONTENT)
}
