//! Project service

use crate::cache::{Cache, CacheLayer};
use crate::db::repositories::ProjectRepository;
use crate::models::{CreateProjectInput, Project, UpdateProjectInput};
use crate::services::slug::{generate_slug, unique_slug};
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

const PROJECT_CACHE_TTL: Duration = Duration::from_secs(600);

#[derive(Debug, thiserror::Error)]
pub enum ProjectServiceError {
    #[error("Project not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Slug already in use: {0}")]
    DuplicateSlug(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct ProjectService {
    repo: Arc<dyn ProjectRepository>,
    cache: Arc<Cache>,
}

impl ProjectService {
    pub fn new(repo: Arc<dyn ProjectRepository>, cache: Arc<Cache>) -> Self {
        Self { repo, cache }
    }

    pub async fn create(&self, input: CreateProjectInput) -> Result<Project, ProjectServiceError> {
        let title = required("Title", &input.title)?;
        let description = required("Description", &input.description)?;

        let slug = match input.slug.as_deref().map(generate_slug).filter(|s| !s.is_empty()) {
            Some(slug) => {
                if self.repo.exists_by_slug(&slug, None).await? {
                    return Err(ProjectServiceError::DuplicateSlug(slug));
                }
                slug
            }
            None => {
                let base = generate_slug(&title);
                let base = if base.is_empty() { "project".to_string() } else { base };
                let repo = &self.repo;
                unique_slug(&base, |c| async move { repo.exists_by_slug(&c, None).await }).await?
            }
        };

        let now = Utc::now();
        let project = Project {
            id: 0,
            slug,
            title,
            description,
            content: optional(input.content),
            tech_stack: clean_stack(input.tech_stack),
            github_url: optional_url("github_url", input.github_url)?,
            live_url: optional_url("live_url", input.live_url)?,
            image_url: optional(input.image_url),
            featured: input.featured,
            sort_order: input.sort_order,
            created_at: now,
            updated_at: now,
        };

        let created = self.repo.create(&project).await.context("Failed to create project")?;
        self.invalidate().await;
        Ok(created)
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Project, ProjectServiceError> {
        self.repo
            .get_by_slug(slug)
            .await?
            .ok_or_else(|| ProjectServiceError::NotFound(slug.to_string()))
    }

    /// All projects by `sort_order`, newest first within a position
    pub async fn list(&self, featured_only: bool) -> Result<Vec<Project>, ProjectServiceError> {
        let cache_key = format!("projects:list:{}", featured_only);
        if let Ok(Some(cached)) = self.cache.get::<Vec<Project>>(&cache_key).await {
            return Ok(cached);
        }
        let projects = self.repo.list(featured_only).await.context("Failed to list projects")?;
        let _ = self.cache.set(&cache_key, &projects, PROJECT_CACHE_TTL).await;
        Ok(projects)
    }

    pub async fn update(
        &self,
        id: i64,
        input: UpdateProjectInput,
    ) -> Result<Project, ProjectServiceError> {
        let mut project = self
            .repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ProjectServiceError::NotFound(format!("id {}", id)))?;

        if let Some(title) = input.title {
            project.title = required("Title", &title)?;
        }
        if let Some(slug) = input.slug {
            let slug = generate_slug(&slug);
            if slug.is_empty() {
                return Err(ProjectServiceError::ValidationError("Invalid slug".to_string()));
            }
            if slug != project.slug && self.repo.exists_by_slug(&slug, Some(id)).await? {
                return Err(ProjectServiceError::DuplicateSlug(slug));
            }
            project.slug = slug;
        }
        if let Some(description) = input.description {
            project.description = required("Description", &description)?;
        }
        if input.content.is_some() {
            project.content = optional(input.content);
        }
        if let Some(stack) = input.tech_stack {
            project.tech_stack = clean_stack(stack);
        }
        if input.github_url.is_some() {
            project.github_url = optional_url("github_url", input.github_url)?;
        }
        if input.live_url.is_some() {
            project.live_url = optional_url("live_url", input.live_url)?;
        }
        if input.image_url.is_some() {
            project.image_url = optional(input.image_url);
        }
        if let Some(featured) = input.featured {
            project.featured = featured;
        }
        if let Some(sort_order) = input.sort_order {
            project.sort_order = sort_order;
        }

        let updated = self.repo.update(&project).await.context("Failed to update project")?;
        self.invalidate().await;
        Ok(updated)
    }

    pub async fn delete(&self, id: i64) -> Result<(), ProjectServiceError> {
        if !self.repo.delete(id).await.context("Failed to delete project")? {
            return Err(ProjectServiceError::NotFound(format!("id {}", id)));
        }
        self.invalidate().await;
        Ok(())
    }

    async fn invalidate(&self) {
        let _ = self.cache.delete_pattern("projects:*").await;
    }
}

fn required(field: &str, value: &str) -> Result<String, ProjectServiceError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ProjectServiceError::ValidationError(format!(
            "{} cannot be empty",
            field
        )));
    }
    Ok(value.to_string())
}

fn optional(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn optional_url(field: &str, value: Option<String>) -> Result<Option<String>, ProjectServiceError> {
    match optional(value) {
        Some(url) if !(url.starts_with("http://") || url.starts_with("https://")) => Err(
            ProjectServiceError::ValidationError(format!("{} must be an http(s) URL", field)),
        ),
        other => Ok(other),
    }
}

fn clean_stack(stack: Vec<String>) -> Vec<String> {
    let mut cleaned: Vec<String> = Vec::new();
    for item in stack.into_iter().map(|s| s.trim().to_string()) {
        if !item.is_empty() && !cleaned.iter().any(|c| c.eq_ignore_ascii_case(&item)) {
            cleaned.push(item);
        }
    }
    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::db::repositories::SqlxProjectRepository;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_service() -> ProjectService {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        ProjectService::new(SqlxProjectRepository::boxed(pool), Arc::new(MemoryCache::new()))
    }

    fn input(title: &str, sort_order: i32) -> CreateProjectInput {
        CreateProjectInput {
            title: title.to_string(),
            description: "A thing I built".to_string(),
            tech_stack: vec!["Rust".into(), " rust ".into(), "SQLite".into(), "".into()],
            sort_order,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_cleans_input() {
        let service = setup_test_service().await;
        let project = service.create(input("My Tool", 0)).await.unwrap();
        assert_eq!(project.slug, "my-tool");
        assert_eq!(project.tech_stack, vec!["Rust", "SQLite"]);

        let again = service.create(input("My Tool", 0)).await.unwrap();
        assert_eq!(again.slug, "my-tool-2");
    }

    #[tokio::test]
    async fn test_rejects_bad_urls() {
        let service = setup_test_service().await;
        let mut bad = input("X", 0);
        bad.github_url = Some("github.com/me/x".into());
        assert!(matches!(
            service.create(bad).await,
            Err(ProjectServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_list_order_and_cache_invalidation() {
        let service = setup_test_service().await;
        service.create(input("Second", 2)).await.unwrap();
        service.create(input("First", 1)).await.unwrap();
        let titles: Vec<String> = service.list(false).await.unwrap().into_iter().map(|p| p.title).collect();
        assert_eq!(titles, vec!["First", "Second"]);

        let first = service.get_by_slug("first").await.unwrap();
        service
            .update(first.id, UpdateProjectInput { sort_order: Some(3), featured: Some(true), ..Default::default() })
            .await
            .unwrap();
        let titles: Vec<String> = service.list(false).await.unwrap().into_iter().map(|p| p.title).collect();
        assert_eq!(titles, vec!["Second", "First"]);
        assert_eq!(service.list(true).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_slug_conflict_and_delete() {
        let service = setup_test_service().await;
        let a = service.create(input("Alpha", 0)).await.unwrap();
        service.create(input("Beta", 0)).await.unwrap();
        assert!(matches!(
            service
                .update(a.id, UpdateProjectInput { slug: Some("beta".into()), ..Default::default() })
                .await,
            Err(ProjectServiceError::DuplicateSlug(_))
        ));
        service.delete(a.id).await.unwrap();
        assert!(matches!(
            service.get_by_slug("alpha").await,
            Err(ProjectServiceError::NotFound(_))
        ));
    }
}
