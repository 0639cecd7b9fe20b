//! Tag service

use crate::cache::{Cache, CacheLayer};
use crate::db::repositories::TagRepository;
use crate::models::{Tag, TagWithCount};
use crate::services::slug::generate_slug;
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;

const TAG_LIST_CACHE_KEY: &str = "tags:counts";
const TAG_LIST_CACHE_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, thiserror::Error)]
pub enum TagServiceError {
    #[error("Tag not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Tag already exists: {0}")]
    DuplicateTag(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct TagService {
    repo: Arc<dyn TagRepository>,
    cache: Arc<Cache>,
}

impl TagService {
    pub fn new(repo: Arc<dyn TagRepository>, cache: Arc<Cache>) -> Self {
        Self { repo, cache }
    }

    /// Create a tag; fails if the name or slug is taken
    pub async fn create(&self, name: &str) -> Result<Tag, TagServiceError> {
        let (name, slug) = normalize(name)?;

        if self.repo.get_by_name(&name).await.context("Failed to check tag name")?.is_some()
            || self.repo.get_by_slug(&slug).await.context("Failed to check tag slug")?.is_some()
        {
            return Err(TagServiceError::DuplicateTag(name));
        }

        let tag = self.repo.create(&Tag::new(name, slug)).await.context("Failed to create tag")?;
        self.invalidate().await;
        Ok(tag)
    }

    /// Existing tag with this name (case-insensitive), or a new one
    pub async fn get_or_create(&self, name: &str) -> Result<Tag, TagServiceError> {
        let (name, slug) = normalize(name)?;

        if let Some(tag) = self.repo.get_by_name(&name).await.context("Failed to look up tag")? {
            return Ok(tag);
        }
        if let Some(tag) = self.repo.get_by_slug(&slug).await.context("Failed to look up tag")? {
            return Ok(tag);
        }

        let tag = self.repo.create(&Tag::new(name, slug)).await.context("Failed to create tag")?;
        self.invalidate().await;
        Ok(tag)
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Tag, TagServiceError> {
        self.repo
            .get_by_slug(slug)
            .await
            .context("Failed to get tag")?
            .ok_or_else(|| TagServiceError::NotFound(slug.to_string()))
    }

    /// Every tag with its published-blog count, most used first
    pub async fn list_with_counts(&self) -> Result<Vec<TagWithCount>, TagServiceError> {
        if let Ok(Some(cached)) = self.cache.get::<Vec<TagWithCount>>(TAG_LIST_CACHE_KEY).await {
            tracing::debug!("Tag list served from cache");
            return Ok(cached);
        }

        let tags = self.repo.list_with_counts().await.context("Failed to list tags")?;
        let _ = self.cache.set(TAG_LIST_CACHE_KEY, &tags, TAG_LIST_CACHE_TTL).await;
        Ok(tags)
    }

    pub async fn tags_for_blog(&self, blog_id: i64) -> Result<Vec<Tag>, TagServiceError> {
        Ok(self
            .repo
            .get_by_blog_id(blog_id)
            .await
            .context("Failed to get blog tags")?)
    }

    pub async fn delete(&self, id: i64) -> Result<(), TagServiceError> {
        if !self.repo.delete(id).await.context("Failed to delete tag")? {
            return Err(TagServiceError::NotFound(format!("id {}", id)));
        }
        self.invalidate().await;
        let _ = self.cache.delete_pattern("blogs:*").await;
        Ok(())
    }

    /// Drop cached tag counts
    pub async fn invalidate(&self) {
        let _ = self.cache.delete_pattern("tags:*").await;
    }
}

fn normalize(name: &str) -> Result<(String, String), TagServiceError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(TagServiceError::ValidationError(
            "Tag name cannot be empty".to_string(),
        ));
    }
    if name.chars().count() > 100 {
        return Err(TagServiceError::ValidationError(
            "Tag name must be at most 100 characters".to_string(),
        ));
    }
    let slug = generate_slug(name);
    if slug.is_empty() {
        return Err(TagServiceError::ValidationError(format!(
            "Tag name '{}' has no usable characters",
            name
        )));
    }
    Ok((name.to_string(), slug))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::db::repositories::SqlxTagRepository;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_service() -> TagService {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        TagService::new(SqlxTagRepository::boxed(pool), Arc::new(MemoryCache::new()))
    }

    #[tokio::test]
    async fn test_create_generates_slug() {
        let service = setup_test_service().await;
        let tag = service.create("  Web Dev ").await.unwrap();
        assert_eq!(tag.name, "Web Dev");
        assert_eq!(tag.slug, "web-dev");

        assert!(matches!(
            service.create("web dev").await,
            Err(TagServiceError::DuplicateTag(_))
        ));
        assert!(matches!(
            service.create("  ").await,
            Err(TagServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_get_or_create_reuses() {
        let service = setup_test_service().await;
        let first = service.get_or_create("Rust").await.unwrap();
        let second = service.get_or_create("rust").await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(service.list_with_counts().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cached_list_is_invalidated_on_create() {
        let service = setup_test_service().await;
        service.create("One").await.unwrap();
        assert_eq!(service.list_with_counts().await.unwrap().len(), 1);
        service.create("Two").await.unwrap();
        assert_eq!(service.list_with_counts().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let service = setup_test_service().await;
        let tag = service.create("Gone").await.unwrap();
        service.delete(tag.id).await.unwrap();
        assert!(matches!(service.delete(tag.id).await, Err(TagServiceError::NotFound(_))));
        assert!(matches!(
            service.get_by_slug("gone").await,
            Err(TagServiceError::NotFound(_))
        ));
    }
}
