//! Blog service
//!
//! Public reads only ever see published posts and are cached under `blogs:*`.
//! Every write clears that prefix along with the tag counts.

use crate::cache::{Cache, CacheLayer};
use crate::db::repositories::BlogRepository;
use crate::models::{
    Blog, BlogFilter, BlogStatus, CreateBlogInput, ListParams, PagedResult, Tag, UpdateBlogInput,
};
use crate::services::slug::{generate_slug, unique_slug};
use crate::services::tag::{TagService, TagServiceError};
use anyhow::Context;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const BLOG_CACHE_TTL: Duration = Duration::from_secs(300);
const MAX_TITLE_LENGTH: usize = 255;

#[derive(Debug, thiserror::Error)]
pub enum BlogServiceError {
    #[error("Blog not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Slug already in use: {0}")]
    DuplicateSlug(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<TagServiceError> for BlogServiceError {
    fn from(err: TagServiceError) -> Self {
        match err {
            TagServiceError::ValidationError(msg) => BlogServiceError::ValidationError(msg),
            TagServiceError::NotFound(msg) => BlogServiceError::NotFound(msg),
            TagServiceError::DuplicateTag(msg) => BlogServiceError::ValidationError(msg),
            TagServiceError::InternalError(e) => BlogServiceError::InternalError(e),
        }
    }
}

/// A post with its tags and reading time, as returned by the API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlogView {
    #[serde(flatten)]
    pub blog: Blog,
    pub tags: Vec<Tag>,
    pub reading_time: u32,
}

pub struct BlogService {
    repo: Arc<dyn BlogRepository>,
    tags: Arc<TagService>,
    cache: Arc<Cache>,
}

impl BlogService {
    pub fn new(repo: Arc<dyn BlogRepository>, tags: Arc<TagService>, cache: Arc<Cache>) -> Self {
        Self { repo, tags, cache }
    }

    pub async fn create(
        &self,
        author_id: i64,
        input: CreateBlogInput,
    ) -> Result<BlogView, BlogServiceError> {
        let title = validate_title(&input.title)?;
        if input.content.trim().is_empty() {
            return Err(BlogServiceError::ValidationError(
                "Content cannot be empty".to_string(),
            ));
        }

        let slug = match input.slug.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(custom) => {
                let slug = validate_slug(custom)?;
                if self.repo.exists_by_slug(&slug, None).await? {
                    return Err(BlogServiceError::DuplicateSlug(slug));
                }
                slug
            }
            None => self.generated_slug(&title, None).await?,
        };

        let status = input.status.unwrap_or_default();
        let now = Utc::now();
        let blog = Blog {
            id: 0,
            slug,
            title,
            excerpt: non_empty(input.excerpt),
            content: input.content,
            cover_image: non_empty(input.cover_image),
            status,
            author_id,
            published_at: (status == BlogStatus::Published).then_some(now),
            created_at: now,
            updated_at: now,
        };

        let created = self.repo.create(&blog).await.context("Failed to create blog")?;
        let tags = self.assign_tags(created.id, &input.tags).await?;
        self.invalidate().await;

        tracing::info!("Created blog '{}' ({})", created.slug, created.status);
        Ok(view(created, tags))
    }

    /// A published post by slug; drafts are reported as missing
    pub async fn get_published(&self, slug: &str) -> Result<BlogView, BlogServiceError> {
        let cache_key = format!("blogs:slug:{}", slug);
        if let Ok(Some(cached)) = self.cache.get::<BlogView>(&cache_key).await {
            return Ok(cached);
        }

        let blog = self
            .repo
            .get_by_slug(slug)
            .await?
            .filter(Blog::is_published)
            .ok_or_else(|| BlogServiceError::NotFound(slug.to_string()))?;
        let tags = self.tags.tags_for_blog(blog.id).await?;
        let result = view(blog, tags);

        let _ = self.cache.set(&cache_key, &result, BLOG_CACHE_TTL).await;
        Ok(result)
    }

    /// Any post by id, for the dashboard
    pub async fn get_by_id(&self, id: i64) -> Result<BlogView, BlogServiceError> {
        let blog = self
            .repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| BlogServiceError::NotFound(format!("id {}", id)))?;
        let tags = self.tags.tags_for_blog(blog.id).await?;
        Ok(view(blog, tags))
    }

    /// Published posts, newest first, optionally under one tag slug
    pub async fn list_published(
        &self,
        tag: Option<String>,
        params: &ListParams,
    ) -> Result<PagedResult<BlogView>, BlogServiceError> {
        let filter = BlogFilter::published().with_tag(tag);
        let cache_key = format!(
            "blogs:list:{}:{}:{}",
            filter.tag.as_deref().unwrap_or(""),
            params.page,
            params.per_page
        );
        if let Ok(Some(cached)) = self.cache.get::<PagedResult<BlogView>>(&cache_key).await {
            tracing::debug!("Blog list served from cache: {}", cache_key);
            return Ok(cached);
        }

        let result = self.list(&filter, params).await?;
        let _ = self.cache.set(&cache_key, &result, BLOG_CACHE_TTL).await;
        Ok(result)
    }

    /// Published posts under a tag; unknown tags are an error
    pub async fn list_by_tag(
        &self,
        tag_slug: &str,
        params: &ListParams,
    ) -> Result<(Tag, PagedResult<BlogView>), BlogServiceError> {
        let tag = self.tags.get_by_slug(tag_slug).await?;
        let page = self.list_published(Some(tag.slug.clone()), params).await?;
        Ok((tag, page))
    }

    /// All posts regardless of status, uncached
    pub async fn list_all(
        &self,
        status: Option<BlogStatus>,
        params: &ListParams,
    ) -> Result<PagedResult<BlogView>, BlogServiceError> {
        let filter = BlogFilter { status, tag: None };
        self.list(&filter, params).await
    }

    /// Newest published posts for the feed
    pub async fn latest_published(&self, limit: u32) -> Result<Vec<Blog>, BlogServiceError> {
        let (blogs, _) = self
            .repo
            .list(&BlogFilter::published(), &ListParams::new(1, limit))
            .await?;
        Ok(blogs)
    }

    pub async fn update(
        &self,
        id: i64,
        input: UpdateBlogInput,
    ) -> Result<BlogView, BlogServiceError> {
        let mut blog = self
            .repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| BlogServiceError::NotFound(format!("id {}", id)))?;

        if let Some(title) = input.title {
            blog.title = validate_title(&title)?;
        }
        if let Some(slug) = input.slug {
            let slug = validate_slug(&slug)?;
            if slug != blog.slug && self.repo.exists_by_slug(&slug, Some(id)).await? {
                return Err(BlogServiceError::DuplicateSlug(slug));
            }
            blog.slug = slug;
        }
        if let Some(content) = input.content {
            if content.trim().is_empty() {
                return Err(BlogServiceError::ValidationError(
                    "Content cannot be empty".to_string(),
                ));
            }
            blog.content = content;
        }
        if input.excerpt.is_some() {
            blog.excerpt = non_empty(input.excerpt);
        }
        if input.cover_image.is_some() {
            blog.cover_image = non_empty(input.cover_image);
        }
        if let Some(status) = input.status {
            // First publication stamps the date; later edits keep it
            if status == BlogStatus::Published && blog.published_at.is_none() {
                blog.published_at = Some(Utc::now());
            }
            blog.status = status;
        }

        let updated = self.repo.update(&blog).await.context("Failed to update blog")?;
        let tags = match input.tags {
            Some(names) => self.assign_tags(id, &names).await?,
            None => self.tags.tags_for_blog(id).await?,
        };
        self.invalidate().await;
        Ok(view(updated, tags))
    }

    pub async fn delete(&self, id: i64) -> Result<(), BlogServiceError> {
        if !self.repo.delete(id).await.context("Failed to delete blog")? {
            return Err(BlogServiceError::NotFound(format!("id {}", id)));
        }
        self.invalidate().await;
        Ok(())
    }

    async fn list(
        &self,
        filter: &BlogFilter,
        params: &ListParams,
    ) -> Result<PagedResult<BlogView>, BlogServiceError> {
        let (blogs, total) = self.repo.list(filter, params).await?;
        let tag_lists = futures::future::try_join_all(
            blogs.iter().map(|b| self.tags.tags_for_blog(b.id)),
        )
        .await?;

        let items = blogs
            .into_iter()
            .zip(tag_lists)
            .map(|(blog, tags)| view(blog, tags))
            .collect();
        Ok(PagedResult::new(items, total, params))
    }

    async fn assign_tags(&self, blog_id: i64, names: &[String]) -> Result<Vec<Tag>, BlogServiceError> {
        let mut tags: Vec<Tag> = Vec::new();
        for name in names.iter().filter(|n| !n.trim().is_empty()) {
            let tag = self.tags.get_or_create(name).await?;
            if !tags.iter().any(|t| t.id == tag.id) {
                tags.push(tag);
            }
        }
        let ids: Vec<i64> = tags.iter().map(|t| t.id).collect();
        self.repo.set_tags(blog_id, &ids).await.context("Failed to set blog tags")?;
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tags)
    }

    async fn generated_slug(
        &self,
        title: &str,
        exclude_id: Option<i64>,
    ) -> Result<String, BlogServiceError> {
        let base = generate_slug(title);
        let base = if base.is_empty() { "post".to_string() } else { base };
        let repo = &self.repo;
        Ok(unique_slug(&base, |candidate| async move {
            repo.exists_by_slug(&candidate, exclude_id).await
        })
        .await?)
    }

    /// Drop cached post listings and tag counts
    pub async fn invalidate(&self) {
        let _ = self.cache.delete_pattern("blogs:*").await;
        self.tags.invalidate().await;
    }
}

fn view(blog: Blog, tags: Vec<Tag>) -> BlogView {
    BlogView {
        reading_time: blog.reading_time_minutes(),
        blog,
        tags,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn validate_title(title: &str) -> Result<String, BlogServiceError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(BlogServiceError::ValidationError(
            "Title cannot be empty".to_string(),
        ));
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(BlogServiceError::ValidationError(format!(
            "Title must be at most {} characters",
            MAX_TITLE_LENGTH
        )));
    }
    Ok(title.to_string())
}

fn validate_slug(slug: &str) -> Result<String, BlogServiceError> {
    let normalized = generate_slug(slug);
    if normalized.is_empty() {
        return Err(BlogServiceError::ValidationError(format!(
            "Invalid slug: '{}'",
            slug
        )));
    }
    Ok(normalized)
}
