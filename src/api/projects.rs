//! Project API endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState};
use crate::models::{CreateProjectInput, Project, UpdateProjectInput};

#[derive(Debug, Default, Deserialize)]
pub struct ProjectListQuery {
    #[serde(default)]
    pub featured: bool,
}

/// GET /api/v1/projects
pub async fn list_projects(
    State(state): State<AppState>,
    Query(query): Query<ProjectListQuery>,
) -> Result<Json<Vec<Project>>, ApiError> {
    Ok(Json(state.project_service.list(query.featured).await?))
}

/// GET /api/v1/projects/{slug}
pub async fn get_project(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Project>, ApiError> {
    Ok(Json(state.project_service.get_by_slug(&slug).await?))
}

/// POST /api/v1/projects
pub async fn create_project(
    State(state): State<AppState>,
    Json(body): Json<CreateProjectInput>,
) -> Result<(StatusCode, Json<Project>), ApiError> {
    let project = state.project_service.create(body).await?;
    tracing::info!("Project '{}' created", project.slug);
    Ok((StatusCode::CREATED, Json(project)))
}

/// PUT /api/v1/projects/{id}
pub async fn update_project(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateProjectInput>,
) -> Result<Json<Project>, ApiError> {
    Ok(Json(state.project_service.update(id, body).await?))
}

/// DELETE /api/v1/projects/{id}
pub async fn delete_project(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.project_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
