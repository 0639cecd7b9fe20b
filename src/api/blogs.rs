//! Blog API endpoints
//!
//! Public reads only ever see published posts. Writes and the any-status
//! listing sit behind the admin guard.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::api::common::{default_page, default_per_page, ListResponse};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{BlogStatus, CreateBlogInput, ListParams, UpdateBlogInput};
use crate::services::BlogView;

/// Query for the public listing
#[derive(Debug, Deserialize)]
pub struct BlogListQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    /// Tag slug
    pub tag: Option<String>,
}

/// Query for the dashboard listing
#[derive(Debug, Deserialize)]
pub struct AdminBlogListQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    pub status: Option<BlogStatus>,
}

#[derive(Debug, Serialize)]
pub struct BlogDetail {
    #[serde(flatten)]
    pub blog: BlogView,
    pub comment_count: i64,
}

/// GET /api/v1/blogs
pub async fn list_blogs(
    State(state): State<AppState>,
    Query(query): Query<BlogListQuery>,
) -> Result<Json<ListResponse<BlogView>>, ApiError> {
    let params = ListParams::new(query.page, query.per_page);
    let page = state.blog_service.list_published(query.tag, &params).await?;
    Ok(Json(page.into()))
}

/// GET /api/v1/blogs/{slug}
pub async fn get_blog(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<BlogDetail>, ApiError> {
    let blog = state.blog_service.get_published(&slug).await?;
    let comment_count = state.comment_service.count_for_blog(blog.blog.id).await?;
    Ok(Json(BlogDetail {
        blog,
        comment_count,
    }))
}

/// GET /api/v1/admin/blogs
pub async fn list_all_blogs(
    State(state): State<AppState>,
    Query(query): Query<AdminBlogListQuery>,
) -> Result<Json<ListResponse<BlogView>>, ApiError> {
    let params = ListParams::new(query.page, query.per_page);
    let page = state.blog_service.list_all(query.status, &params).await?;
    Ok(Json(page.into()))
}

/// POST /api/v1/blogs
pub async fn create_blog(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(body): Json<CreateBlogInput>,
) -> Result<(StatusCode, Json<BlogView>), ApiError> {
    let blog = state.blog_service.create(user.0.sub, body).await?;
    tracing::info!("Blog '{}' created by {}", blog.blog.slug, user.0.username);
    Ok((StatusCode::CREATED, Json(blog)))
}

/// PUT /api/v1/blogs/{id}
pub async fn update_blog(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateBlogInput>,
) -> Result<Json<BlogView>, ApiError> {
    Ok(Json(state.blog_service.update(id, body).await?))
}

/// DELETE /api/v1/blogs/{id}
pub async fn delete_blog(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.blog_service.delete(id).await?;
    tracing::info!("Blog {} deleted", id);
    Ok(StatusCode::NO_CONTENT)
}
