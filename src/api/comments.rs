//! Comment API endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::api::middleware::{ApiError, AppState};
use crate::models::{CommentThread, CreateCommentInput};

/// GET /api/v1/blogs/{slug}/comments
pub async fn list_comments(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Vec<CommentThread>>, ApiError> {
    Ok(Json(state.comment_service.list_for_blog(&slug).await?))
}

/// POST /api/v1/blogs/{slug}/comments
pub async fn create_comment(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(body): Json<CreateCommentInput>,
) -> Result<(StatusCode, Json<CommentThread>), ApiError> {
    let comment = state.comment_service.create(&slug, body).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// DELETE /api/v1/comments/{id}
pub async fn delete_comment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.comment_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
